use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use retime_core::config::{config_path, data_dir, initialize_data_dir, AppConfig};
use retime_core::executor::{execution_context, SequentialExecutor};
use retime_core::graph::PipelineGraph;
use retime_core::logging::{self, FileSinkPlan, LoggingInitOptions};
use retime_core::node::ProgressCallback;
use retime_core::registry::build_default_registry;

#[derive(Parser)]
#[command(name = "retime", about = "Temporal resampling workflows for frame batches")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(
        short = 'v',
        long = "verbose",
        action = ArgAction::Count,
        global = true,
        help = "Increase log verbosity (-v: debug, -vv: trace)"
    )]
    verbose: u8,

    #[arg(
        long = "log-filter",
        value_name = "FILTER",
        global = true,
        help = "Explicit tracing filter (overrides RUST_LOG and -v)"
    )]
    log_filter: Option<String>,

    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a workflow JSON file
    Run(RunArgs),
    /// List registered node types
    Nodes,
}

#[derive(Args)]
struct RunArgs {
    #[arg(help = "Path to workflow JSON file")]
    workflow: PathBuf,
}

pub async fn run_from_env() -> Result<()> {
    let cli = Cli::parse();
    let resolved_data_dir = data_dir(cli.data_dir.as_deref());

    init_logging(
        Some(resolved_data_dir.as_path()),
        cli.verbose,
        cli.log_filter.as_deref(),
    );

    match cli.command {
        Commands::Run(run) => run_workflow(run.workflow, &resolved_data_dir).await,
        Commands::Nodes => {
            let registry = build_default_registry();
            for node_type in registry.list_node_types() {
                println!("{node_type}");
            }
            Ok(())
        }
    }
}

async fn run_workflow(workflow_path: PathBuf, data_dir: &Path) -> Result<()> {
    initialize_data_dir(data_dir)?;
    let config = AppConfig::load_from_path(&config_path(data_dir))?;

    let raw = std::fs::read_to_string(&workflow_path)
        .with_context(|| format!("failed to read workflow: {}", workflow_path.display()))?;
    let mut graph: PipelineGraph = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse workflow: {}", workflow_path.display()))?;

    let injected = graph.inject_default_param(
        "TemporalResample",
        "batch_size",
        serde_json::json!(config.performance.default_batch_size as i64),
    );
    if injected > 0 {
        info!(
            batch_size = config.performance.default_batch_size,
            nodes = injected,
            "applied configured batch size"
        );
    }

    let registry = build_default_registry();

    let (cancel_tx, cancel_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling at the next chunk boundary");
            let _ = cancel_tx.send(true);
        }
    });

    let last_percent = Arc::new(AtomicU64::new(u64::MAX));
    let progress: ProgressCallback = Box::new(move |done, total| {
        if total == 0 {
            return;
        }
        let percent = done * 100 / total;
        if last_percent.swap(percent, Ordering::Relaxed) != percent {
            info!(done, total, percent, "resample progress");
        }
    });

    info!(workflow = %workflow_path.display(), nodes = graph.node_count(), "running workflow");

    // The executor is synchronous; keep it off the async runtime's core.
    let outputs = tokio::task::spawn_blocking(move || {
        SequentialExecutor::execute_with_context(
            &graph,
            &registry,
            execution_context(Some(cancel_rx), Some(progress)),
        )
    })
    .await
    .context("workflow task panicked")??;

    info!(nodes = outputs.len(), "workflow completed");
    Ok(())
}

fn init_logging(data_dir: Option<&Path>, verbose: u8, cli_log_filter: Option<&str>) {
    let options = LoggingInitOptions {
        data_dir: data_dir.map(Path::to_path_buf),
        verbose,
        cli_log_filter: cli_log_filter.map(ToString::to_string),
        rust_log_env: std::env::var("RUST_LOG").ok(),
        ..Default::default()
    };
    let plan = logging::compose_logging_init_plan(&options);

    match plan.file_sink {
        FileSinkPlan::Ready(ready) => {
            let console_filter = parse_env_filter_with_fallback(&plan.filter, "console");
            let file_filter = parse_env_filter_with_fallback(&plan.filter, "file");

            let subscriber = tracing_subscriber::registry()
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_filter(console_filter),
                )
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(ready.appender)
                        .with_filter(file_filter),
                );

            if let Err(error) = tracing::subscriber::set_global_default(subscriber) {
                eprintln!(
                    "Failed to initialize tracing subscriber: {error}. Continuing without structured tracing."
                );
            }
        }
        FileSinkPlan::Fallback(fallback) => {
            let console_filter = parse_env_filter_with_fallback(&plan.filter, "console");
            let subscriber = tracing_subscriber::registry().with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_filter(console_filter),
            );

            if let Err(error) = tracing::subscriber::set_global_default(subscriber) {
                eprintln!(
                    "Failed to initialize tracing subscriber: {error}. Continuing without structured tracing."
                );
                return;
            }

            let attempted_log_dir = fallback
                .attempted_log_dir
                .as_ref()
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "<none>".to_string());
            warn!(
                attempted_log_dir = %attempted_log_dir,
                reason = %fallback.reason,
                "Persistent file logging unavailable; continuing with console-only logging"
            );
        }
    }
}

fn parse_env_filter_with_fallback(filter: &str, which: &str) -> EnvFilter {
    EnvFilter::try_new(filter).unwrap_or_else(|error| {
        eprintln!(
            "Warning: invalid {which} log filter '{filter}' ({error}); falling back to '{}'",
            logging::DEFAULT_LOG_FILTER
        );
        EnvFilter::new(logging::DEFAULT_LOG_FILTER)
    })
}
