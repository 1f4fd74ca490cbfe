//! `ledger-ingest`: stream ledger events as JSON lines.
//!
//! # Architecture Overview
//!
//! ```text
//!   live node ──┐                      ┌─────────────┐
//!   (JSON-RPC)  ├─▶ EventIngestor ───▶ │ JSON lines  │──▶ stdout
//! archive node ─┘   dedup / filter     └─────────────┘
//!
//!   config.toml ──▶ ConfigWatcher ──▶ filter hot reload
//!   SIGINT/SIGTERM ──▶ stop() ──▶ summary on stderr
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use ledger_ingest::config::loader::load_config;
use ledger_ingest::config::watcher::{spawn_filter_reloader, ConfigWatcher};
use ledger_ingest::ingest::BoxError;
use ledger_ingest::lifecycle::spawn_stop_on_signal;
use ledger_ingest::observability::{logging, metrics};
use ledger_ingest::{
    ArchiveRange, ContractEvent, EventIngestor, IngestResult, IngestionRange, IngestorConfig,
    RunSummary,
};

#[derive(Parser)]
#[command(name = "ledger-ingest")]
#[command(about = "Stream contract events from a ledger node", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Live node endpoint; overrides the config file.
    #[arg(long)]
    live_url: Option<String>,

    /// Archive node endpoint; overrides the config file.
    #[arg(long)]
    archive_url: Option<String>,

    /// Reload event filters when the config file changes.
    #[arg(long, requires = "config")]
    watch_config: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Follow the live node only
    Live {
        #[arg(long)]
        start: Option<u32>,
        #[arg(long)]
        stop: Option<u32>,
    },
    /// Replay an inclusive ledger range from the archive node
    Archive {
        #[arg(long)]
        start: u32,
        #[arg(long)]
        stop: u32,
    },
    /// Backfill from the archive as needed, then follow live
    Run {
        #[arg(long)]
        start: Option<u32>,
        #[arg(long)]
        stop: Option<u32>,
    },
    /// Print the health and retention window of the configured nodes
    Health,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => IngestorConfig::default(),
    };
    if let Some(url) = cli.live_url {
        config.engine.live_url = url;
    }
    if let Some(url) = cli.archive_url {
        config.engine.archive_url = Some(url);
    }

    logging::init_logging(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "ledger-ingest starting");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                metrics::init_metrics(addr);
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let engine = Arc::new(EventIngestor::new(config.engine)?);

    // Keeps the watcher alive for the duration of the run.
    let _watcher = match (&cli.config, cli.watch_config) {
        (Some(path), true) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            spawn_filter_reloader(engine.clone(), updates);
            Some(watcher.run()?)
        }
        _ => None,
    };

    spawn_stop_on_signal(engine.clone());

    match cli.command {
        Commands::Live { start, stop } => {
            let summary = engine.start_live(print_event, range(start, stop)).await;
            report(summary)?;
        }
        Commands::Archive { start, stop } => {
            let summary = engine
                .start_archive(print_event, ArchiveRange::new(start, stop))
                .await;
            report(summary)?;
        }
        Commands::Run { start, stop } => {
            let summary = engine.start(print_event, range(start, stop)).await;
            report(summary)?;
        }
        Commands::Health => {
            let live = engine.health().await?;
            println!("{}", health_json("live", engine.config().live_url.as_str(), &live));
            if engine.has_archive_source() {
                let archive = engine.archive_health().await?;
                let endpoint = engine.config().archive_url.as_deref().unwrap_or_default();
                println!("{}", health_json("archive", endpoint, &archive));
            }
        }
    }

    Ok(())
}

fn range(start: Option<u32>, stop: Option<u32>) -> IngestionRange {
    IngestionRange {
        start_ledger: start,
        stop_ledger: stop,
    }
}

async fn print_event(event: ContractEvent) -> Result<(), BoxError> {
    let line = serde_json::to_string(&event)?;
    println!("{}", line);
    Ok(())
}

fn report(result: IngestResult<RunSummary>) -> IngestResult<()> {
    let summary = result?;
    tracing::info!(
        run_id = %summary.run_id,
        outcome = summary.outcome.as_str(),
        events_delivered = summary.events_delivered,
        resume_ledger = summary.resume_ledger,
        "Run summary"
    );
    eprintln!(
        "{} after {} events; resume from ledger {}",
        summary.outcome.as_str(),
        summary.events_delivered,
        summary.resume_ledger
    );
    Ok(())
}

fn health_json(
    role: &str,
    endpoint: &str,
    health: &ledger_ingest::source::SourceHealth,
) -> serde_json::Value {
    serde_json::json!({
        "source": role,
        "endpoint": endpoint,
        "healthy": health.healthy,
        "oldestLedger": health.oldest_ledger,
        "latestLedger": health.latest_ledger,
        "retentionWindow": health.retention_window,
    })
}
