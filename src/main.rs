//! Equimine CLI - mining behaviorally equivalent Java methods.

use std::path::Path;
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use equimine::classify::Classifier;
use equimine::cli::{Cli, ClusterArgs, Command, ExtractArgs, GenerateArgs, ToolchainArgs};
use equimine::cluster::{ClusterEngine, EngineConfig, RunSummary, Toolchain};
use equimine::config::Config;
use equimine::core::Error;
use equimine::extract::{mine_path, mine_texts, ExtractionReport};
use equimine::git::GitSource;
use equimine::store::MethodStore;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> equimine::Result<()> {
    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load_default(Path::new("."))?,
    };

    let started = Instant::now();
    let store = MethodStore::open(&cli.database)?;

    match &cli.command {
        Command::Extract(args) => run_extract(&store, args)?,
        Command::Classify(args) => {
            let groups = Classifier::new(&store, &args.output).classify()?;
            println!("target methods have been classified into {groups} groups.");
        }
        Command::Generate(args) => run_generate(&store, &config, &cli, args)?,
        Command::Cluster(args) => run_cluster(&store, &config, &cli, args)?,
    }

    info!(elapsed = ?started.elapsed(), "finished");
    Ok(())
}

fn run_extract(store: &MethodStore, args: &ExtractArgs) -> equimine::Result<()> {
    let report: ExtractionReport = match (&args.source, &args.repository) {
        (None, None) => {
            return Err(Error::config(
                "either --source or --repository must be specified",
            ));
        }
        (Some(source), None) => mine_path(source)?,
        (None, Some(repository)) => {
            let git = GitSource::open(repository)?;
            let revision = git.head_revision()?;
            let remote = git.remote_url();
            let blobs = git.java_blobs()?;
            mine_texts(&blobs, remote.as_deref(), Some(revision.as_str()))
        }
        (Some(_), Some(_)) => unreachable!("clap rejects the combination"),
    };

    let mut kept = Vec::new();
    let mut tests = 0usize;
    let mut toys = 0usize;
    for method in report.methods {
        if method.is_test() {
            tests += 1;
        } else if method.is_toy() {
            toys += 1;
        } else {
            kept.push(method);
        }
    }

    let outcome = store.add_methods(&kept)?;
    println!(
        "files: {} (skipped: {}), methods seen: {}",
        report.files, report.skipped_files, report.total_methods
    );
    println!("tests: {tests}");
    println!("toys: {toys}");
    println!(
        "registered: {} (duplicates: {})",
        outcome.inserted, outcome.duplicates
    );
    Ok(())
}

fn run_generate(
    store: &MethodStore,
    config: &Config,
    cli: &Cli,
    args: &GenerateArgs,
) -> equimine::Result<()> {
    println!("target lower bound is set to {}", args.lower_bound);
    println!("target upper bound is set to {}", args.upper_bound);

    let toolchain = merge_toolchain(config, &args.toolchain);
    let engine_config = EngineConfig {
        jobs: cli.jobs.unwrap_or(config.limits.jobs),
        lower_bound: args.lower_bound,
        upper_bound: args.upper_bound,
        drain_timeout: drain_timeout(config, &args.toolchain),
        ..EngineConfig::default()
    };

    let engine = ClusterEngine::new(store, toolchain, engine_config);
    let summary = engine.generate(&args.output)?;
    print_summary(&summary, false);
    Ok(())
}

fn run_cluster(
    store: &MethodStore,
    config: &Config,
    cli: &Cli,
    args: &ClusterArgs,
) -> equimine::Result<()> {
    println!("target lower bound is set to {}", args.lower_bound);
    println!("target upper bound is set to {}", args.upper_bound);

    let toolchain = merge_toolchain(config, &args.toolchain);
    let engine_config = EngineConfig {
        jobs: cli.jobs.unwrap_or(config.limits.jobs),
        min_tests: args.min_tests.unwrap_or(config.limits.min_tests),
        lower_bound: args.lower_bound,
        upper_bound: args.upper_bound,
        group_offset: args.group_offset,
        drain_timeout: drain_timeout(config, &args.toolchain),
    };

    let engine = ClusterEngine::new(store, toolchain, engine_config);
    let summary = engine.cluster(&args.output)?;
    print_summary(&summary, true);
    Ok(())
}

/// Command-line toolchain overrides win over the configuration file.
fn merge_toolchain(config: &Config, args: &ToolchainArgs) -> Toolchain {
    let mut toolchain = config.toolchain();
    if let Some(path) = &args.evosuite_jar {
        toolchain.evosuite_jar = path.clone();
    }
    if let Some(path) = &args.evosuite_runtime_jar {
        toolchain.evosuite_runtime_jar = path.clone();
    }
    if let Some(path) = &args.junit_jar {
        toolchain.junit_jar = path.clone();
    }
    if let Some(path) = &args.hamcrest_jar {
        toolchain.hamcrest_jar = path.clone();
    }
    if let Some(path) = &args.java_home {
        toolchain.java_home = Some(path.clone());
    }
    if let Some(dialect) = args.dialect {
        toolchain.dialect = dialect;
    }
    if let Some(secs) = args.process_timeout_secs {
        toolchain.process_timeout = std::time::Duration::from_secs(secs);
    }
    toolchain
}

fn drain_timeout(config: &Config, args: &ToolchainArgs) -> std::time::Duration {
    std::time::Duration::from_secs(
        args.drain_timeout_secs
            .unwrap_or(config.limits.drain_timeout_secs),
    )
}

fn print_summary(summary: &RunSummary, clustered: bool) {
    println!(
        "groups processed: {}, candidates prepared: {}, excluded: {}",
        summary.groups, summary.candidates_prepared, summary.candidates_excluded
    );
    if clustered {
        println!(
            "pairs recorded: {}, equivalence groups: {}",
            summary.pairs_recorded, summary.equivalence_groups
        );
    }
}
