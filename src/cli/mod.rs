//! CLI implementation using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::core::JavaDialect;

/// Equimine - mines behaviorally equivalent Java methods.
#[derive(Parser)]
#[command(name = "equimine")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the candidate store database
    #[arg(short, long)]
    pub database: PathBuf,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Number of parallel workers (default: number of CPUs)
    #[arg(short = 'j', long)]
    pub jobs: Option<usize>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Register eligible methods from a corpus into the store
    #[command(alias = "register")]
    Extract(ExtractArgs),

    /// Group stored methods by signature and emit candidate units
    Classify(ClassifyArgs),

    /// Compile candidates and generate their test suites
    #[command(alias = "gen")]
    Generate(GenerateArgs),

    /// Compile, generate, cross-test and persist equivalence groups
    Cluster(ClusterArgs),
}

#[derive(Args)]
pub struct ExtractArgs {
    /// Source file or directory subtree to mine
    #[arg(short, long, conflicts_with = "repository")]
    pub source: Option<PathBuf>,

    /// Git repository root; the HEAD snapshot is mined
    #[arg(short, long)]
    pub repository: Option<PathBuf>,
}

#[derive(Args)]
pub struct ClassifyArgs {
    /// Directory the candidate units are emitted into
    #[arg(short, long)]
    pub output: PathBuf,
}

#[derive(Args)]
pub struct GenerateArgs {
    /// Directory holding the emitted candidate units
    #[arg(short, long)]
    pub output: PathBuf,

    /// Inclusive lower bound on the group index to process
    #[arg(long, default_value_t = 0)]
    pub lower_bound: i64,

    /// Inclusive upper bound on the group index to process
    #[arg(long, default_value_t = i64::MAX, hide_default_value = true)]
    pub upper_bound: i64,

    #[command(flatten)]
    pub toolchain: ToolchainArgs,
}

#[derive(Args)]
pub struct ClusterArgs {
    /// Directory holding the emitted candidate units
    #[arg(short, long)]
    pub output: PathBuf,

    /// Inclusive lower bound on the group index to process
    #[arg(long, default_value_t = 0)]
    pub lower_bound: i64,

    /// Inclusive upper bound on the group index to process
    #[arg(long, default_value_t = i64::MAX, hide_default_value = true)]
    pub upper_bound: i64,

    /// Minimum generated-test count for a candidate to be cross-tested
    #[arg(long)]
    pub min_tests: Option<i64>,

    /// Starting offset for assigned equivalence-group ids
    #[arg(long, default_value_t = 0)]
    pub group_offset: i64,

    #[command(flatten)]
    pub toolchain: ToolchainArgs,
}

/// Overrides for the external toolchain configuration.
#[derive(Args)]
pub struct ToolchainArgs {
    /// Test generator jar
    #[arg(long)]
    pub evosuite_jar: Option<PathBuf>,

    /// Generator runtime jar used on the suite classpath
    #[arg(long)]
    pub evosuite_runtime_jar: Option<PathBuf>,

    /// JUnit 4 jar
    #[arg(long)]
    pub junit_jar: Option<PathBuf>,

    /// Hamcrest core jar
    #[arg(long)]
    pub hamcrest_jar: Option<PathBuf>,

    /// JAVA_HOME override for all child processes
    #[arg(long)]
    pub java_home: Option<PathBuf>,

    /// Java language level of the subject corpus
    #[arg(long)]
    pub dialect: Option<JavaDialect>,

    /// Per-child-process ceiling in seconds
    #[arg(long)]
    pub process_timeout_secs: Option<u64>,

    /// Per-group pool-drain ceiling in seconds
    #[arg(long)]
    pub drain_timeout_secs: Option<u64>,
}
