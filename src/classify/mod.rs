//! Signature grouping and candidate unit emission.
//!
//! Reads every distinct structural signature from the store, filters out
//! trivial signatures and trivial method bodies, and emits one directory
//! per surviving group containing one self-contained compilable unit per
//! surviving method.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::cluster::toolchain::{UNIT_CLASS, UNIT_FILE};
use crate::core::{Error, Result};
use crate::store::MethodStore;

/// Longest group directory name emitted; signatures are truncated past it.
const MAX_DIR_NAME: usize = 255;

/// The classifier. Holds the store by reference and owns the output root.
pub struct Classifier<'a> {
    store: &'a MethodStore,
    output: PathBuf,
}

impl<'a> Classifier<'a> {
    pub fn new(store: &'a MethodStore, output: impl Into<PathBuf>) -> Self {
        Self {
            store,
            output: output.into(),
        }
    }

    /// Emit one directory per surviving method group. Returns the number
    /// of emitted groups.
    pub fn classify(&self) -> Result<usize> {
        if self.output.exists() && !self.output.is_dir() {
            return Err(Error::config(format!(
                "output path already exists not as a directory: {}",
                self.output.display()
            )));
        }
        if !self.output.exists() {
            std::fs::create_dir_all(&self.output)?;
        }

        let mut index = 0i64;
        for signature in self.store.signatures()? {
            // methods without a return value or without parameters carry
            // no input/output contract worth comparing
            if signature.starts_with("void(") || signature.ends_with("()") {
                continue;
            }

            let methods: Vec<_> = self
                .store
                .methods_for_signature(&signature)?
                .into_iter()
                .filter(|m| m.statements > 1)
                .filter(|m| m.branches > 0)
                .collect();
            if methods.len() < 2 {
                continue;
            }

            index += 1;
            let dir = self.output.join(group_dir_name(index, &signature));

            // regeneration is destructive, not additive
            if dir.exists() {
                std::fs::remove_dir_all(&dir)?;
            }
            std::fs::create_dir(&dir)?;

            for method in &methods {
                let unit_dir = dir.join(method.id.to_string());
                std::fs::create_dir(&unit_dir)?;
                std::fs::write(unit_dir.join(UNIT_FILE), method.entry_unit(UNIT_CLASS))?;
            }

            debug!(index, %signature, members = methods.len(), "group emitted");
        }

        info!(groups = index, "classification finished");
        Ok(index as usize)
    }

    /// The output root this classifier writes to.
    pub fn output(&self) -> &Path {
        &self.output
    }
}

/// Filesystem-safe group directory name: index, dot, signature with all
/// whitespace removed, truncated to a bounded length.
fn group_dir_name(index: i64, signature: &str) -> String {
    let sanitized: String = signature.chars().filter(|c| !c.is_whitespace()).collect();
    let mut name = format!("{index}.{sanitized}");
    if name.len() > MAX_DIR_NAME {
        let mut cut = MAX_DIR_NAME;
        while !name.is_char_boundary(cut) {
            cut -= 1;
        }
        name.truncate(cut);
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ExtractedMethod, UNASSIGNED_ID};

    fn method(
        path: &str,
        return_type: &str,
        params: &[&str],
        statements: u32,
        branches: u32,
    ) -> ExtractedMethod {
        ExtractedMethod {
            return_type: return_type.to_string(),
            name: "f".to_string(),
            raw_text: format!("{return_type} f(int x) {{ if (x > 0) {{ x++; }} return x; }}"),
            normalized_text: format!("normalized {path}"),
            statements,
            branches,
            path: path.to_string(),
            start_line: 1,
            end_line: 3,
            repository: None,
            revision: None,
            parameters: params.iter().map(|p| p.to_string()).collect(),
            id: UNASSIGNED_ID,
        }
    }

    #[test]
    fn test_classify_emits_groups_with_units() {
        let temp = tempfile::tempdir().unwrap();
        let store = MethodStore::open_in_memory().unwrap();
        store
            .add_methods(&[
                method("A.java", "int", &["int"], 3, 1),
                method("B.java", "int", &["int"], 4, 2),
            ])
            .unwrap();

        let output = temp.path().join("out");
        let classifier = Classifier::new(&store, &output);
        let groups = classifier.classify().unwrap();
        assert_eq!(groups, 1);

        let group_dir = output.join("1.int(int)");
        assert!(group_dir.is_dir());
        let ids: Vec<_> = std::fs::read_dir(&group_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(ids.len(), 2);

        let unit = std::fs::read_to_string(group_dir.join(&ids[0]).join(UNIT_FILE)).unwrap();
        assert!(unit.contains("public class Target {"));
        assert!(unit.contains("__target__("));
    }

    #[test]
    fn test_classify_skips_trivial_signatures() {
        let temp = tempfile::tempdir().unwrap();
        let store = MethodStore::open_in_memory().unwrap();
        store
            .add_methods(&[
                // void return
                method("A.java", "void", &["int"], 3, 1),
                method("B.java", "void", &["int"], 3, 1),
                // no parameters
                method("C.java", "int", &[], 3, 1),
                method("D.java", "int", &[], 3, 1),
            ])
            .unwrap();

        let output = temp.path().join("out");
        let groups = Classifier::new(&store, &output).classify().unwrap();
        assert_eq!(groups, 0);
        assert_eq!(std::fs::read_dir(&output).unwrap().count(), 0);
    }

    #[test]
    fn test_classify_filters_trivial_bodies() {
        let temp = tempfile::tempdir().unwrap();
        let store = MethodStore::open_in_memory().unwrap();
        store
            .add_methods(&[
                method("A.java", "int", &["int"], 3, 1),
                // single statement
                method("B.java", "int", &["int"], 1, 1),
                // no branching
                method("C.java", "int", &["int"], 3, 0),
            ])
            .unwrap();

        // only one non-trivial member remains, so no group is emitted
        let output = temp.path().join("out");
        let groups = Classifier::new(&store, &output).classify().unwrap();
        assert_eq!(groups, 0);
    }

    #[test]
    fn test_classify_regeneration_is_destructive() {
        let temp = tempfile::tempdir().unwrap();
        let store = MethodStore::open_in_memory().unwrap();
        store
            .add_methods(&[
                method("A.java", "int", &["int"], 3, 1),
                method("B.java", "int", &["int"], 4, 2),
            ])
            .unwrap();

        let output = temp.path().join("out");
        let classifier = Classifier::new(&store, &output);
        classifier.classify().unwrap();

        let stale = output.join("1.int(int)").join("stale");
        std::fs::create_dir(&stale).unwrap();
        classifier.classify().unwrap();
        assert!(!stale.exists());
    }

    #[test]
    fn test_classify_rejects_file_at_output_path() {
        let temp = tempfile::tempdir().unwrap();
        let store = MethodStore::open_in_memory().unwrap();
        let output = temp.path().join("out");
        std::fs::write(&output, "not a directory").unwrap();

        let result = Classifier::new(&store, &output).classify();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_group_dir_name_sanitized_and_bounded() {
        assert_eq!(
            group_dir_name(3, "int(Set<Integer>, int)"),
            "3.int(Set<Integer>,int)"
        );
        let long = format!("int({})", "List<Integer>,".repeat(40));
        let name = group_dir_name(1, &long);
        assert!(name.len() <= MAX_DIR_NAME);
        assert!(name.starts_with("1.int(List<Integer>"));
    }
}
