// Copyright 2024-2026 kubectl-mtb Contributors
// SPDX-License-Identifier: Apache-2.0

//! `kubectl-mtb` entry point.
//!
//! ## Subcommands
//!
//! - `kubectl-mtb get benchmarks` - list the catalog for the selection
//! - `kubectl-mtb test benchmarks` - run the selection against the cluster
//! - `kubectl-mtb config show` - print effective configuration
//!
//! ## Exit codes
//!
//! - `0` every selected benchmark passed or was skipped
//! - `1` at least one benchmark failed or errored
//! - `2` bad arguments, or an explicit category matched nothing
//! - `3` the cluster client could not be configured

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use mtb_core::catalog;
use mtb_core::cli::{
    self, config_cmd, render_catalog, render_report, validate_resource, CliError, OutputFormat,
};
use mtb_core::config::{self as mtb_config, EnvConfig};
use mtb_core::probe::{ClusterProbe, InMemoryCluster, KubeApiProbe};
use mtb_core::shutdown::{ShutdownCoordinator, ShutdownResult};
use mtb_core::telemetry;
use mtb_core::{ExecutionEngine, SelectionCriteria, Suite};

#[derive(Parser)]
#[command(
    name = "kubectl-mtb",
    version,
    about = "Multi-tenancy benchmarks for Kubernetes clusters",
    after_help = "EXIT CODES:\n    0  all selected benchmarks passed or were skipped\n    \
                  1  a benchmark failed or errored\n    \
                  2  configuration error\n    \
                  3  cluster client error"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Highest profile level to include (default: MTB_PROFILE_LEVEL or 3)
    #[arg(short = 'p', long, global = true)]
    profile_level: Option<u8>,

    /// Only include benchmarks of this category (name or tag)
    #[arg(short = 'c', long, global = true)]
    category: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// List benchmarks matching the selection
    Get {
        /// Resource to list (benchmarks)
        resource: Vec<String>,
    },

    /// Run benchmarks matching the selection
    Test(TestArgs),

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Args)]
struct TestArgs {
    /// Resource to test (benchmarks)
    resource: Vec<String>,

    /// Report format: text or json
    #[arg(short = 'o', long, default_value = "text")]
    output: OutputFormat,

    /// Run against an in-memory cluster instead of the API server
    #[arg(long)]
    simulate: bool,

    /// Benchmarks in flight at once (overrides MTB_CONCURRENCY)
    #[arg(long)]
    concurrency: Option<usize>,

    /// Per-benchmark timeout in seconds (overrides MTB_BENCHMARK_TIMEOUT)
    #[arg(long)]
    timeout: Option<u64>,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print effective configuration as KEY=value lines
    Show,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let env = mtb_config::load();

    if let Err(e) = telemetry::init_logging(&env.log) {
        eprintln!("Logging disabled: {}", e);
    }
    telemetry::init_metrics();

    let outcome = match &cli.command {
        Command::Get { resource } => run_get(&cli, resource, &env),
        Command::Test(args) => run_test(&cli, args, env).await,
        Command::Config { action: ConfigAction::Show } => {
            config_cmd::run_show();
            Ok(cli::EXIT_SUCCESS)
        }
    };

    match outcome {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(e.exit_code())
        }
    }
}

fn criteria(cli: &Cli, env: &EnvConfig) -> Result<SelectionCriteria, CliError> {
    let level = cli.profile_level.unwrap_or(env.profile_level);
    Ok(SelectionCriteria::new(level, cli.category.as_deref())?)
}

fn run_get(cli: &Cli, resource: &[String], env: &EnvConfig) -> Result<u8, CliError> {
    validate_resource(resource)?;
    let criteria = criteria(cli, env)?;
    let registry = catalog::builtin_registry()?;
    let selection = mtb_core::selector::select(registry.all(), &criteria);
    if let (true, Some(category)) = (selection.is_empty(), &criteria.category) {
        return Err(CliError::EmptySelection(category.clone()));
    }
    print!("{}", render_catalog(&selection));
    Ok(cli::EXIT_SUCCESS)
}

async fn run_test(cli: &Cli, args: &TestArgs, env: EnvConfig) -> Result<u8, CliError> {
    validate_resource(&args.resource)?;
    let criteria = criteria(cli, &env)?;
    let registry = Arc::new(catalog::builtin_registry()?);

    let mut engine_config = env.engine.clone();
    if let Some(n) = args.concurrency {
        engine_config.concurrency = n.max(1);
    }
    if let Some(secs) = args.timeout {
        engine_config.benchmark_timeout = Duration::from_secs(secs.max(1));
    }
    let cleanup_grace = engine_config.cleanup_grace;

    let probe: Arc<dyn ClusterProbe> = if args.simulate {
        Arc::new(InMemoryCluster::secure())
    } else {
        Arc::new(KubeApiProbe::new(env.cluster_credentials()?)?)
    };

    let shutdown = ShutdownCoordinator::new();
    let engine = ExecutionEngine::new(probe, engine_config).with_shutdown(shutdown.clone());
    let suite = Suite::new(registry, engine);

    if let (true, Some(category)) = (suite.select(&criteria).is_empty(), &criteria.category) {
        return Err(CliError::EmptySelection(category.clone()));
    }

    // Ctrl+C stops new benchmarks and cancels in-flight ones; the engine
    // still gives each of them the cleanup grace period.
    let cancel = CancellationToken::new();
    let signal_task = {
        let cancel = cancel.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("Interrupt received, cleaning up...");
                shutdown.begin_drain();
                cancel.cancel();
            }
        })
    };

    let report = suite.run_with_cancel(&criteria, cancel).await;
    signal_task.abort();

    match shutdown.initiate(cleanup_grace).await {
        ShutdownResult::Complete => {}
        ShutdownResult::Timeout { remaining } => {
            eprintln!("Cleanup grace expired, {} benchmarks abandoned", remaining);
        }
    }

    println!("{}", render_report(&report, args.output)?);
    Ok(cli::exit_code(&report))
}
