//! Method extraction from a source corpus.

mod scan;
mod whitelist;

pub use scan::{count_methods, extract_methods, Origin};
pub use whitelist::{is_permitted, JAVA_LANG_CLASSES, JAVA_UTIL_CLASSES};

use std::path::Path;

use rayon::prelude::*;
use tracing::debug;
use walkdir::WalkDir;

use crate::core::{ExtractedMethod, Result};
use crate::parser::JavaParser;

/// Outcome of mining one corpus snapshot.
#[derive(Debug, Default)]
pub struct ExtractionReport {
    /// Eligible methods, in file order.
    pub methods: Vec<ExtractedMethod>,
    /// Number of files scanned.
    pub files: usize,
    /// Files skipped because their tree had syntax problems.
    pub skipped_files: usize,
    /// Every method declaration seen, eligible or not.
    pub total_methods: usize,
}

impl ExtractionReport {
    fn merge(mut self, other: Self) -> Self {
        self.methods.extend(other.methods);
        self.files += other.files;
        self.skipped_files += other.skipped_files;
        self.total_methods += other.total_methods;
        self
    }
}

/// Mine `(path, content)` pairs produced by a source provider.
///
/// Files are parsed in parallel; a file whose tree reports any syntax
/// problem contributes zero methods.
pub fn mine_texts(
    files: &[(String, Vec<u8>)],
    repository: Option<&str>,
    revision: Option<&str>,
) -> ExtractionReport {
    files
        .par_iter()
        .map_init(JavaParser::new, |parser, (path, content)| {
            let mut report = ExtractionReport {
                files: 1,
                ..Default::default()
            };
            match parser.parse(content, Path::new(path)) {
                Ok(tree) => {
                    if tree.has_problems() {
                        debug!(path = %path, "skipping file with syntax problems");
                        report.skipped_files = 1;
                    } else {
                        report.total_methods = count_methods(&tree);
                        report.methods = extract_methods(
                            &tree,
                            Origin {
                                path,
                                repository,
                                revision,
                            },
                        );
                    }
                }
                Err(err) => {
                    debug!(path = %path, %err, "skipping unparsable file");
                    report.skipped_files = 1;
                }
            }
            report
        })
        .reduce(ExtractionReport::default, ExtractionReport::merge)
}

/// Mine a single file or a directory subtree, filtered to `.java`.
pub fn mine_path(root: &Path) -> Result<ExtractionReport> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("java") {
            continue;
        }
        files.push((path.display().to_string(), std::fs::read(path)?));
    }
    Ok(mine_texts(&files, None, None))
}
