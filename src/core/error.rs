//! Error types for the equimine library.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using equimine's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while mining a corpus.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Candidate store failure. Fatal: the run cannot continue without
    /// a working store.
    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),

    /// Configuration error. Fatal before any work starts.
    #[error("configuration error: {0}")]
    Config(String),

    /// Git operation error.
    #[error("git error: {0}")]
    Git(String),

    /// Parse error from tree-sitter.
    #[error("parse error in {path}: {message}")]
    Parse { path: PathBuf, message: String },

    /// External toolchain failure (javac, test generator, test runner)
    /// that is not attributable to a single candidate.
    #[error("toolchain error: {0}")]
    Toolchain(String),

    /// TOML parsing error.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Create a new config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a new git error.
    pub fn git(message: impl Into<String>) -> Self {
        Self::Git(message.into())
    }

    /// Create a new toolchain error.
    pub fn toolchain(message: impl Into<String>) -> Self {
        Self::Toolchain(message.into())
    }
}
