//! Java language level of the subject corpus.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Java language level used when compiling emitted candidate units.
///
/// The subject sources are parsed with tree-sitter, which needs no
/// per-version options; the dialect only selects the `--release` flag
/// passed to the external compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum JavaDialect {
    #[value(name = "8", alias = "1.8")]
    Java8,
    #[value(name = "11")]
    Java11,
    #[value(name = "17")]
    Java17,
    #[value(name = "21")]
    Java21,
}

impl Default for JavaDialect {
    fn default() -> Self {
        Self::Java17
    }
}

impl JavaDialect {
    /// The value handed to `javac --release`.
    pub fn release(&self) -> &'static str {
        match self {
            Self::Java8 => "8",
            Self::Java11 => "11",
            Self::Java17 => "17",
            Self::Java21 => "21",
        }
    }
}

impl std::fmt::Display for JavaDialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.release())
    }
}
