use anyhow::{Context, Result};
use clap::Parser;
use std::fs::OpenOptions;
use std::io;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use hopwatch::cli::Args;
use hopwatch::config::Config;
use hopwatch::export::{export_csv, generate_report, write_round_reports};
use hopwatch::monitor::{Monitor, MonitorHandle, MonitorLoop, Snapshot, StopReason};
use hopwatch::prefs::Prefs;
use hopwatch::source::{SourceStats, run_source, sample_channel};
use hopwatch::tui::{Theme, run_tui};

/// Environment variable holding the log filter directives
const LOG_ENV: &str = "HOPWATCH_LOG";

fn main() -> Result<()> {
    let args = Args::parse();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    init_logging(&args)?;

    let runtime = tokio::runtime::Runtime::new()?;
    let result = runtime.block_on(run(args));
    // A pending stdin read would otherwise hold shutdown open indefinitely.
    runtime.shutdown_timeout(Duration::from_millis(200));
    result
}

/// TUI mode owns the terminal, so logs go to `--log-file` or nowhere.
fn init_logging(args: &Args) -> Result<()> {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));

    if let Some(ref path) = args.log_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file: {}", path.display()))?;
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .try_init();
    } else if args.is_batch_mode() || args.no_tui {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .try_init();
    } else {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::sink)
            .try_init();
    }
    Ok(())
}

async fn run(args: Args) -> Result<()> {
    let prefs = Prefs::load();
    let config = Config::from_args(&args, &prefs);

    if let Some(ref path) = config.input
        && !path.is_file()
    {
        anyhow::bail!("Sample file not found: {}", path.display());
    }

    // Cancellation token for graceful shutdown
    let cancel = CancellationToken::new();

    // Setup Ctrl+C handler
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        cancel_clone.cancel();
    });

    let (tx, rx) = sample_channel();
    let source_task = {
        let input = config.input.clone();
        let cancel = cancel.clone();
        let pace = config.pace;
        tokio::spawn(async move { run_source(input.as_deref(), tx, cancel, pace).await })
    };

    let (mut monitor_loop, handle) =
        MonitorLoop::new(Monitor::new(&config), rx, cancel.clone());
    // Only a reader that drains it may subscribe: the loop waits on a full queue.
    let rounds = (args.no_tui && !args.is_batch_mode()).then(|| monitor_loop.subscribe_rounds());
    let monitor_task = tokio::spawn(monitor_loop.run());

    tracing::info!(target_label = %config.target, max_hops = config.max_hops, "starting");

    // Run in appropriate mode
    if args.is_batch_mode() {
        run_batch_mode(&args, source_task, monitor_task).await
    } else if let Some(rounds) = rounds {
        drop(handle);
        run_streaming_mode(rounds, source_task, monitor_task).await
    } else {
        run_interactive_mode(&config, handle, cancel, source_task, monitor_task).await
    }
}

/// Consume the whole stream, then print one report or CSV dump
async fn run_batch_mode(
    args: &Args,
    source_task: JoinHandle<Result<SourceStats>>,
    monitor_task: JoinHandle<(StopReason, Monitor)>,
) -> Result<()> {
    let stats = source_task.await??;
    let (reason, monitor) = monitor_task.await?;
    tracing::info!(sent = stats.sent, skipped = stats.skipped, ?reason, "stream finished");

    let stdout = io::stdout();
    if args.csv {
        export_csv(monitor.display(), stdout.lock())?;
    } else {
        generate_report(monitor.display(), stdout.lock())?;
    }
    Ok(())
}

/// Print the hop table every time the destination answers a round
async fn run_streaming_mode(
    rounds: mpsc::Receiver<Snapshot>,
    source_task: JoinHandle<Result<SourceStats>>,
    monitor_task: JoinHandle<(StopReason, Monitor)>,
) -> Result<()> {
    let printed = write_round_reports(rounds, io::stdout()).await?;

    let (reason, monitor) = monitor_task.await?;
    // A stream without a final-hop sample never printed anything
    if printed == 0 {
        generate_report(monitor.display(), io::stdout())?;
    }

    let stats = source_task.await??;
    tracing::info!(sent = stats.sent, skipped = stats.skipped, ?reason, "stream finished");
    Ok(())
}

async fn run_interactive_mode(
    config: &Config,
    handle: MonitorHandle,
    cancel: CancellationToken,
    source_task: JoinHandle<Result<SourceStats>>,
    monitor_task: JoinHandle<(StopReason, Monitor)>,
) -> Result<()> {
    let theme = Theme::by_name(&config.theme);

    let outcome = run_tui(handle, cancel, config.view, theme).await?;

    // Save preferences (best effort, don't fail on save error)
    let mut prefs = Prefs::load();
    prefs.theme = Some(outcome.theme);
    prefs.view = Some(outcome.view);
    if let Err(e) = prefs.save() {
        tracing::warn!(error = %e, "failed to save preferences");
    }

    // Quit and Ctrl+C have both fired the token by now.
    let (reason, _) = monitor_task.await?;
    match source_task.await? {
        Ok(stats) => {
            tracing::info!(sent = stats.sent, skipped = stats.skipped, ?reason, "stream finished")
        }
        Err(e) => tracing::warn!(error = %e, "sample source failed"),
    }
    Ok(())
}
