//! External toolchain: compiler, test generator, test runner.
//!
//! Every collaborator is a black-box child process; each invocation is
//! awaited under a timeout and reports only its exit outcome, with the
//! combined output relayed to the log.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use crate::core::JavaDialect;

/// File name of the emitted candidate unit.
pub const UNIT_FILE: &str = "Target.java";
/// Class name every candidate unit declares.
pub const UNIT_CLASS: &str = "Target";
/// Test suite class the generator derives from the unit class.
pub const SUITE_CLASS: &str = "Target_ESTest";
/// Test suite source file name.
pub const SUITE_FILE: &str = "Target_ESTest.java";
/// Scaffolding source file name.
pub const SCAFFOLD_FILE: &str = "Target_ESTest_scaffolding.java";

/// Outcome of one child-process invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecOutcome {
    /// Exit status 0.
    Success,
    /// Non-zero exit status. An expected negative, not an error.
    Failed,
    /// The per-process ceiling elapsed; the child was killed.
    Timeout,
    /// The process could not be spawned or awaited.
    Error,
}

impl ExecOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Paths and limits for the external collaborators.
#[derive(Debug, Clone)]
pub struct Toolchain {
    /// EvoSuite generator jar.
    pub evosuite_jar: PathBuf,
    /// EvoSuite standalone runtime jar (suite compile/run classpath).
    pub evosuite_runtime_jar: PathBuf,
    /// JUnit 4 jar.
    pub junit_jar: PathBuf,
    /// Hamcrest core jar.
    pub hamcrest_jar: PathBuf,
    /// Overrides both the JAVA_HOME environment of children and the
    /// java/javac binaries used.
    pub java_home: Option<PathBuf>,
    /// Language level for `javac --release`.
    pub dialect: JavaDialect,
    /// Upper bound on each child process.
    pub process_timeout: Duration,
}

impl Default for Toolchain {
    fn default() -> Self {
        Self {
            evosuite_jar: PathBuf::from("lib/evosuite-1.2.0.jar"),
            evosuite_runtime_jar: PathBuf::from("lib/evosuite-standalone-runtime-1.2.0.jar"),
            junit_jar: PathBuf::from("lib/junit-4.13.2.jar"),
            hamcrest_jar: PathBuf::from("lib/hamcrest-core-1.3.jar"),
            java_home: None,
            dialect: JavaDialect::default(),
            process_timeout: Duration::from_secs(300),
        }
    }
}

impl Toolchain {
    /// Compile a candidate unit in isolation.
    pub async fn compile_unit(&self, unit_dir: &Path) -> ExecOutcome {
        let source = unit_dir.join(UNIT_FILE);
        let mut cmd = self.command("javac");
        cmd.arg("--release")
            .arg(self.dialect.release())
            .arg(&source);
        self.exec(cmd, "compile unit").await
    }

    /// Ask the generator to synthesize a suite for a compiled unit.
    pub async fn generate_suite(&self, unit_dir: &Path, test_dir: &Path) -> ExecOutcome {
        let mut cmd = self.command("java");
        cmd.arg("-jar")
            .arg(&self.evosuite_jar)
            .arg("-class")
            .arg(UNIT_CLASS)
            .arg("-projectCP")
            .arg(unit_dir)
            .arg(format!("-Dtest_dir={}", test_dir.display()));
        self.exec(cmd, "generate suite").await
    }

    /// Compile a generated suite against the auxiliary classpath.
    pub async fn compile_suite(&self, unit_dir: &Path, test_dir: &Path) -> ExecOutcome {
        let mut cmd = self.command("javac");
        cmd.arg("--release")
            .arg(self.dialect.release())
            .arg(test_dir.join(SUITE_FILE))
            .arg(test_dir.join(SCAFFOLD_FILE))
            .env("CLASSPATH", self.classpath(unit_dir, test_dir));
        self.exec(cmd, "compile suite").await
    }

    /// Run a compiled suite against a compiled unit. The unit directory
    /// decides which candidate the suite exercises.
    pub async fn run_suite(&self, unit_dir: &Path, test_dir: &Path) -> ExecOutcome {
        let mut cmd = self.command("java");
        cmd.arg("org.junit.runner.JUnitCore")
            .arg(SUITE_CLASS)
            .env("CLASSPATH", self.classpath(unit_dir, test_dir));
        self.exec(cmd, "run suite").await
    }

    /// Classpath for compiling and running generated suites: the unit,
    /// the suite, and the fixed auxiliary jars.
    pub fn classpath(&self, unit_dir: &Path, test_dir: &Path) -> OsString {
        std::env::join_paths([
            unit_dir,
            test_dir,
            self.evosuite_runtime_jar.as_path(),
            self.junit_jar.as_path(),
            self.hamcrest_jar.as_path(),
        ])
        .expect("classpath entries contain no separator")
    }

    fn command(&self, tool: &str) -> Command {
        let program = match &self.java_home {
            Some(home) => home.join("bin").join(tool).into_os_string(),
            None => OsString::from(tool),
        };
        let mut cmd = Command::new(program);
        if let Some(home) = &self.java_home {
            cmd.env("JAVA_HOME", home);
        }
        cmd
    }

    async fn exec(&self, mut cmd: Command, what: &str) -> ExecOutcome {
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        match timeout(self.process_timeout, cmd.output()).await {
            Ok(Ok(output)) => {
                let combined = [&output.stdout[..], &output.stderr[..]].concat();
                debug!(
                    what,
                    status = ?output.status.code(),
                    output = %String::from_utf8_lossy(&combined),
                    "child process finished"
                );
                if output.status.success() {
                    ExecOutcome::Success
                } else {
                    ExecOutcome::Failed
                }
            }
            Ok(Err(err)) => {
                debug!(what, %err, "child process could not run");
                ExecOutcome::Error
            }
            Err(_) => {
                debug!(what, "child process exceeded its ceiling");
                ExecOutcome::Timeout
            }
        }
    }
}

/// Number of test methods in a generated suite source.
pub fn count_tests(suite_source: &[u8]) -> i64 {
    let text = String::from_utf8_lossy(suite_source);
    text.matches("@Test").count() as i64
}
