//! Extracted method representation and derived keys.

use serde::{Deserialize, Serialize};

/// Name every emitted candidate unit exposes as its callable surface.
pub const ENTRY_POINT: &str = "__target__";

/// Id value of a method that has not been inserted into the store yet.
pub const UNASSIGNED_ID: i64 = -1;

/// Compilation state of a candidate unit.
///
/// Stored as -1/0/1 at the SQL boundary; the sentinel never leaks past
/// the store API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompileState {
    NotEvaluated,
    NotCompilable,
    Compilable,
}

impl CompileState {
    /// Decode the store's column value.
    pub fn from_column(value: i64) -> Self {
        match value {
            1 => Self::Compilable,
            0 => Self::NotCompilable,
            _ => Self::NotEvaluated,
        }
    }

    /// Encode for the store's column.
    pub fn as_column(&self) -> i64 {
        match self {
            Self::Compilable => 1,
            Self::NotCompilable => 0,
            Self::NotEvaluated => -1,
        }
    }
}

/// A method extracted from the corpus. Immutable once created; the id is
/// assigned by the store on insertion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedMethod {
    /// Return type text as written in the source.
    pub return_type: String,
    /// Method name as written in the source.
    pub name: String,
    /// Method text with annotations, modifiers and doc comments removed.
    pub raw_text: String,
    /// Canonical text with identifiers and literals erased. Used only for
    /// fingerprinting, never for compilation.
    pub normalized_text: String,
    /// Number of statements collected by the flat body traversal.
    pub statements: u32,
    /// Number of collected statements that introduce control flow.
    pub branches: u32,
    /// Source path relative to the corpus root.
    pub path: String,
    /// 1-indexed start line.
    pub start_line: u32,
    /// 1-indexed end line.
    pub end_line: u32,
    /// Origin repository URL, if the corpus is a git snapshot.
    pub repository: Option<String>,
    /// Revision identifier, if the corpus is a git snapshot.
    pub revision: Option<String>,
    /// Ordered parameter type texts.
    pub parameters: Vec<String>,
    /// Store-assigned identifier, [`UNASSIGNED_ID`] before insertion.
    pub id: i64,
}

impl ExtractedMethod {
    /// Structural signature: return type plus ordered parameter types.
    /// Two methods share a signature iff these strings are equal.
    pub fn signature(&self) -> String {
        format!("{}({})", self.return_type, self.parameters.join(","))
    }

    /// Human-readable signature including the method name.
    pub fn named_signature(&self) -> String {
        format!(
            "{} {}({})",
            self.return_type,
            self.name,
            self.parameters.join(", ")
        )
    }

    /// Content fingerprint: digest of the normalized text with all
    /// whitespace removed. Equal fingerprints mean the methods are
    /// syntactically identical after normalization.
    pub fn fingerprint(&self) -> Vec<u8> {
        let condensed: String = self
            .normalized_text
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        blake3::hash(condensed.as_bytes()).as_bytes().to_vec()
    }

    /// Render the method as a self-contained single-type unit.
    ///
    /// The wrapper embeds provenance as comments and rewrites the method
    /// name so that every emitted unit exposes [`ENTRY_POINT`].
    pub fn entry_unit(&self, class_name: &str) -> String {
        let mut lines = Vec::new();
        lines.push("import java.util.*;".to_string());
        lines.push(format!("public class {class_name} {{"));
        lines.push(String::new());

        if let Some(repo) = &self.repository {
            lines.push(format!("    // repository: {repo}"));
        }
        if let Some(rev) = &self.revision {
            lines.push(format!("    // revision: {rev}"));
        }
        lines.push(format!("    // path: {}", self.path));
        lines.push(format!(
            "    // lines: {} to {}",
            self.start_line, self.end_line
        ));
        if let Some(link) = self.permalink() {
            lines.push(format!("    // permalink: {link}"));
        }

        let call_site = format!("{}(", self.name);
        let entry_site = format!("{ENTRY_POINT}(");
        for line in self.raw_text.lines() {
            lines.push(format!("    {}", line.replace(&call_site, &entry_site)));
        }

        lines.push(String::new());
        lines.push("}".to_string());
        lines.join("\n")
    }

    /// Best-effort web permalink to the method's source lines, derived by
    /// rewriting the remote URL. Only meaningful for git-backed corpora.
    pub fn permalink(&self) -> Option<String> {
        let repo = self.repository.as_deref()?;
        let rev = self.revision.as_deref()?;
        // ":" must be rewritten before the scheme is prepended
        let https = repo
            .replace(':', "/")
            .replace("git@", "https://")
            .replace(".git", "");
        Some(format!(
            "{https}/blob/{rev}/{}#L{}-L{}",
            self.path, self.start_line, self.end_line
        ))
    }

    /// Whether the source path identifies test code.
    pub fn is_test(&self) -> bool {
        let lower = self.path.to_lowercase();
        if lower.ends_with("test.java") || lower.ends_with("tests.java") {
            return true;
        }
        lower
            .split('/')
            .any(|s| s == "test" || s == "tests" || s == "testdata")
    }

    /// Whether the source path identifies sample or demonstration code.
    pub fn is_toy(&self) -> bool {
        const TOY_SEGMENTS: [&str; 8] = [
            "example", "examples", "sample", "samples", "demo", "demos", "toy", "toys",
        ];
        self.path
            .to_lowercase()
            .split('/')
            .any(|s| TOY_SEGMENTS.contains(&s))
    }
}
