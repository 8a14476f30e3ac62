//! Configuration loading and management.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cluster::Toolchain;
use crate::core::{Error, JavaDialect, Result};

/// Main configuration structure.
///
/// Values come from an optional TOML file; command-line options override
/// individual fields on top of it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// External toolchain locations.
    pub toolchain: ToolchainConfig,
    /// Worker pool and timeout limits.
    pub limits: LimitsConfig,
}

/// External toolchain locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainConfig {
    /// Test generator jar.
    pub evosuite_jar: PathBuf,
    /// Generator runtime jar for the suite classpath.
    pub evosuite_runtime_jar: PathBuf,
    /// JUnit 4 jar.
    pub junit_jar: PathBuf,
    /// Hamcrest core jar.
    pub hamcrest_jar: PathBuf,
    /// JAVA_HOME override for all child processes.
    pub java_home: Option<PathBuf>,
    /// Java language level of the subject corpus.
    pub dialect: JavaDialect,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            evosuite_jar: PathBuf::from("lib/evosuite-1.2.0.jar"),
            evosuite_runtime_jar: PathBuf::from("lib/evosuite-standalone-runtime-1.2.0.jar"),
            junit_jar: PathBuf::from("lib/junit-4.13.2.jar"),
            hamcrest_jar: PathBuf::from("lib/hamcrest-core-1.3.jar"),
            java_home: None,
            dialect: JavaDialect::default(),
        }
    }
}

/// Worker pool and timeout limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Worker count; 0 means the available hardware parallelism.
    pub jobs: usize,
    /// Minimum generated-test count for cross-testing eligibility.
    pub min_tests: i64,
    /// Per-child-process ceiling in seconds.
    pub process_timeout_secs: u64,
    /// Per-group pool-drain ceiling in seconds.
    pub drain_timeout_secs: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            jobs: 0,
            min_tests: 1,
            process_timeout_secs: 300,
            drain_timeout_secs: 600,
        }
    }
}

impl Config {
    /// Load configuration from an explicit file path.
    ///
    /// Errors if the file does not exist. Use this for explicit
    /// `--config` flags.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::config(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }

    /// Load configuration from a directory, looking for `equimine.toml`.
    /// A missing file is silently skipped (defaults are used).
    pub fn load_default(dir: impl AsRef<Path>) -> Result<Self> {
        let path = dir.as_ref().join("equimine.toml");
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Build the toolchain description this configuration names.
    pub fn toolchain(&self) -> Toolchain {
        Toolchain {
            evosuite_jar: self.toolchain.evosuite_jar.clone(),
            evosuite_runtime_jar: self.toolchain.evosuite_runtime_jar.clone(),
            junit_jar: self.toolchain.junit_jar.clone(),
            hamcrest_jar: self.toolchain.hamcrest_jar.clone(),
            java_home: self.toolchain.java_home.clone(),
            dialect: self.toolchain.dialect,
            process_timeout: Duration::from_secs(self.limits.process_timeout_secs),
        }
    }
}
