//! Stickerio Simulation Server
//!
//! Runs the simulation engine headless: commands arrive on stdin as JSON
//! lines (`{"name": "create_city", "payload": {...}}`), are persisted to the
//! event log and applied by the worker task.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use stickerio_core::worker::{self, WorkerSettings};
use stickerio_core::{
    ingress, Engine, EventLog, GameConfig, InMemoryEventLog, InMemoryReadModel, JsonlEventLog,
};
use stickerio_events::EventKind;

/// Command line arguments for the simulation server
#[derive(Parser, Debug)]
#[command(name = "stickerio-sim")]
#[command(about = "Event-sourced simulation engine for stickerio")]
struct Args {
    /// Game balance TOML file (built-in defaults when omitted)
    #[arg(long)]
    config: Option<PathBuf>,

    /// JSONL event log (kept in memory when omitted)
    #[arg(long)]
    event_log: Option<PathBuf>,

    /// Seconds between full resyncs
    #[arg(long, env = "RESYNC", default_value_t = 10)]
    resync_secs: u64,

    /// Capacity of the ingress queue
    #[arg(long, env = "QUEUE_CAPACITY", default_value_t = 256)]
    queue_capacity: usize,

    /// Random seed for combat and foraging
    #[arg(long, env = "SIM_SEED", default_value_t = 42)]
    seed: u64,

    /// Milliseconds between schedule sweeps
    #[arg(long, default_value_t = 500)]
    sweep_ms: u64,

    /// Print the default game config as TOML and exit
    #[arg(long)]
    print_default_config: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if args.print_default_config {
        println!("{}", GameConfig::default().to_toml()?);
        return Ok(());
    }

    let config = match &args.config {
        Some(path) => GameConfig::from_file(path)?,
        None => GameConfig::default(),
    };
    info!(
        resources = config.resources.len(),
        units = config.units.len(),
        buildings = config.buildings.len(),
        "game config loaded"
    );

    let log: Arc<dyn EventLog> = match &args.event_log {
        Some(path) => Arc::new(JsonlEventLog::open(path)?),
        None => {
            warn!("no --event-log given, events are kept in memory only");
            Arc::new(InMemoryEventLog::new())
        }
    };
    let view = Arc::new(InMemoryReadModel::new());
    let engine = Arc::new(Engine::new(
        Arc::new(config),
        args.seed,
        log.clone(),
        view.clone(),
    ));

    let (commands, receiver) = ingress::channel(log, args.queue_capacity);
    let (stop, shutdown) = watch::channel(false);
    let settings = WorkerSettings {
        resync_interval: Duration::from_secs(args.resync_secs.max(1)),
        sweep_interval: Duration::from_millis(args.sweep_ms.max(1)),
    };
    let handle = tokio::spawn(worker::run_worker(
        engine.clone(),
        receiver,
        settings,
        worker::system_clock,
        shutdown,
    ));

    info!(seed = args.seed, queue_capacity = args.queue_capacity, "reading commands from stdin");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    info!("end of input");
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                let kind: EventKind = match serde_json::from_str(&line) {
                    Ok(kind) => kind,
                    Err(e) => {
                        warn!(error = %e, "ignoring malformed command");
                        continue;
                    }
                };
                match commands.submit_command(kind, worker::system_clock()) {
                    Ok(receipt) => {
                        println!("{}", serde_json::json!({
                            "event_id": receipt.event_id,
                            "due_epoch": receipt.due_epoch,
                            "submission": format!("{:?}", receipt.submission),
                        }));
                    }
                    Err(e) => error!(error = %e, "command rejected"),
                }
            }
        }
    }

    // Let the worker pick up what is already queued
    tokio::time::sleep(settings.sweep_interval).await;
    let _ = stop.send(true);
    handle.await?;

    let snapshot = engine.snapshot()?;
    info!(
        cities = snapshot.cities.len(),
        movements = snapshot.movements.len(),
        view_cities = view.city_count(),
        "simulation stopped"
    );
    Ok(())
}
