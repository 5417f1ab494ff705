//! Bumpers Watch Binary
//!
//! Runs the Bumpers monitor over a JSONL event log written by a guarded
//! agent in another process and reports alerts through `tracing`.
//!
//! ## Usage
//!
//! ```bash
//! # Watch the newest log in ./logs, alerting above 30% failures
//! bumpers-watch --events logs --failure-threshold 0.3
//!
//! # Alert when delete_file is blocked 3 times in 10 minutes
//! bumpers-watch --events logs/run.jsonl --watch-action delete_file --block-count 3 --window 600
//!
//! # One evaluation pass, alerts as JSON on stdout
//! bumpers-watch --events logs --config bumpers.json --once
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use bumpers_core::{BumpersConfig, EventLog, FileEventLog, Monitor, TracingAlertHandler};
use bumpers_watch::{resolve_event_log, MonitorOverrides, WatchError, WatchResult};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "bumpers-watch")]
#[command(about = "Watch a Bumpers event log and raise alerts")]
#[command(version)]
struct Args {
    /// Event log file, or a directory holding bumpers_*.jsonl logs
    #[arg(short, long, default_value = "logs")]
    events: PathBuf,

    /// JSON config file (the monitor section is used)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seconds between checks
    #[arg(short, long)]
    interval: Option<u64>,

    /// Seconds of history queried on each check
    #[arg(long)]
    lookback: Option<u64>,

    /// Alert when the validation failure rate exceeds this (0.0 - 1.0)
    #[arg(short = 't', long)]
    failure_threshold: Option<f64>,

    /// Window in seconds for the failure rate and watched actions
    #[arg(short, long)]
    window: Option<u64>,

    /// Alert when this action is blocked repeatedly (repeatable)
    #[arg(short = 'a', long = "watch-action")]
    watch_actions: Vec<String>,

    /// Blocks of a watched action that trigger an alert
    #[arg(long, default_value_t = 3)]
    block_count: usize,

    /// Run a single check, print alerts as JSON and exit
    #[arg(long)]
    once: bool,
}

impl Args {
    fn overrides(&self) -> MonitorOverrides {
        MonitorOverrides {
            interval_secs: self.interval,
            lookback_secs: self.lookback,
            failure_threshold: self.failure_threshold,
            window_secs: self.window,
            watched_actions: self.watch_actions.clone(),
            block_count: self.block_count,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Logs go to stderr so --once output stays clean on stdout
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bumpers_watch=info,bumpers_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Starting Bumpers Watch v{}", env!("CARGO_PKG_VERSION"));

    match run(Args::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::from(u8::try_from(e.exit_code()).unwrap_or(1))
        }
    }
}

async fn run(args: Args) -> WatchResult<()> {
    let config = match &args.config {
        Some(path) => BumpersConfig::from_json_file(path)?,
        None => BumpersConfig::default(),
    }
    .with_env_overrides()?;
    let monitor_config = args.overrides().apply(config.monitor);

    let path = resolve_event_log(&args.events)?;
    let log: Arc<dyn EventLog> = Arc::new(FileEventLog::open_existing(&path)?);
    tracing::info!(log = %path.display(), "Watching event log");

    let mut monitor = Monitor::from_config(&monitor_config, log)?.with_handler(TracingAlertHandler);
    if monitor.conditions().is_empty() {
        tracing::warn!("No alert conditions configured; pass --failure-threshold or --watch-action");
    }

    if args.once {
        let alerts = monitor.tick()?;
        println!("{}", serde_json::to_string_pretty(&alerts)?);
        return Ok(());
    }

    let handle = monitor.spawn_async();
    tracing::info!(
        interval_secs = monitor_config.check_interval_secs,
        "Monitor running, press Ctrl-C to stop"
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");

    let monitor = handle.shutdown().await.map_err(WatchError::from)?;
    let fired = monitor
        .conditions()
        .iter()
        .filter(|c| c.last_fired().is_some())
        .count();
    tracing::info!(conditions_fired = fired, "Monitor stopped");
    Ok(())
}
