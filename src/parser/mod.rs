//! Tree-sitter based Java parser.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tree_sitter::{Parser as TsParser, Tree};

use crate::core::{Error, Result};

/// Thread-safe Java parser.
pub struct JavaParser {
    /// Cached parser instance; tree-sitter parsers are stateful.
    parser: Mutex<TsParser>,
}

impl Default for JavaParser {
    fn default() -> Self {
        Self::new()
    }
}

impl JavaParser {
    /// Create a new parser configured for Java.
    pub fn new() -> Self {
        let mut parser = TsParser::new();
        parser
            .set_language(&tree_sitter_java::LANGUAGE.into())
            .expect("Java grammar should be valid");
        Self {
            parser: Mutex::new(parser),
        }
    }

    /// Parse a translation unit.
    pub fn parse(&self, content: &[u8], path: &Path) -> Result<ParseTree> {
        let tree = {
            let mut parser = self.parser.lock();
            parser.parse(content, None).ok_or_else(|| Error::Parse {
                path: path.to_path_buf(),
                message: "failed to parse file".to_string(),
            })?
        };

        Ok(ParseTree {
            tree,
            source: content.to_vec(),
            path: path.to_path_buf(),
        })
    }
}

/// Result of parsing a Java source file.
pub struct ParseTree {
    /// The parsed syntax tree.
    pub tree: Tree,
    /// Original source content.
    pub source: Vec<u8>,
    /// File path.
    pub path: PathBuf,
}

impl ParseTree {
    /// Get the root node of the tree.
    pub fn root_node(&self) -> tree_sitter::Node<'_> {
        self.tree.root_node()
    }

    /// Get text for a node.
    pub fn node_text(&self, node: &tree_sitter::Node<'_>) -> &str {
        node.utf8_text(&self.source).unwrap_or("")
    }

    /// Whether the tree contains any syntax problem. Files with problems
    /// contribute zero methods rather than being partially processed.
    pub fn has_problems(&self) -> bool {
        self.tree.root_node().has_error()
    }
}
