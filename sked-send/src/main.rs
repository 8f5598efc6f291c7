//! sked-send - Dispatcher daemon for scheduled publishing
//!
//! Scans the post queue on a fixed interval, claims due posts and publishes
//! them through the platform adapters with a bounded worker pool.

use anyhow::Context;
use clap::Parser;
use libskedcast::logging::{LogFormat, LoggingConfig};
use libskedcast::{Config, Dispatcher, SkedcastError, SkedcastService};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, Duration, Instant};
use tracing::{error, info, warn};

const SHUTDOWN_CHECK: Duration = Duration::from_millis(250);

#[derive(Parser, Debug)]
#[command(name = "sked-send")]
#[command(version)]
#[command(about = "Dispatcher daemon for scheduled publishing")]
#[command(long_about = "\
sked-send - Dispatcher daemon for scheduled publishing

DESCRIPTION:
    sked-send watches the Skedcast queue and publishes posts to Facebook,
    Instagram and YouTube once they are due.

    Every scan selects ready posts and scheduled posts whose time has
    passed, claims each one atomically, and publishes it on a bounded
    worker pool. A post is never attempted twice at the same time, even
    with several daemons sharing one database. Failed posts stay failed
    until an operator runs `sked-queue retry`.

    On startup, posts left mid-publish by a previous run are marked
    failed, since their remote state is unknown.

USAGE:
    # Run in foreground (logs to stderr)
    sked-send

    # Scan every 30 seconds with 8 workers
    sked-send --poll-interval 30 --workers 8

    # JSON logs for a log collector
    sked-send --log-format json

SIGNALS:
    SIGTERM, SIGINT - Graceful shutdown (in-flight posts finish first)

CONFIGURATION:
    Configuration file: ~/.config/skedcast/config.toml

    [scheduler]
    poll_interval_secs = 10
    workers = 4
    batch_size = 50

    Override with environment variables:
        SKEDCAST_CONFIG          - Path to config file
        SKEDCAST_DB_PATH         - Path to database file
        SKEDCAST_VAULT_IDENTITY  - age identity sealing stored tokens
        SKEDCAST_LOG_FORMAT      - text, json or pretty
        SKEDCAST_LOG_LEVEL       - tracing filter, e.g. debug

EXIT CODES:
    0 - Clean shutdown
    1 - Runtime error
    2 - Configuration error
")]
struct Cli {
    /// Seconds between due-post scans (overrides config)
    #[arg(long, value_name = "SECONDS")]
    poll_interval: Option<u64>,

    /// Size of the publish worker pool (overrides config)
    #[arg(long, value_name = "N")]
    workers: Option<usize>,

    /// Log output format: text, json or pretty
    #[arg(long, value_name = "FORMAT")]
    log_format: Option<LogFormat>,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Scan once, wait for started posts, and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    LoggingConfig::from_env(cli.log_format, cli.verbose).init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        let code = e
            .downcast_ref::<SkedcastError>()
            .map_or(1, SkedcastError::exit_code);
        std::process::exit(code);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load()?;
    if let Some(secs) = cli.poll_interval {
        config.scheduler.poll_interval_secs = secs;
    }
    if let Some(workers) = cli.workers {
        config.scheduler.workers = workers;
    }
    config.validate()?;

    let poll_interval = config.scheduler.poll_interval();
    let service = SkedcastService::from_config(config).await?;
    let mut dispatcher = service.dispatcher();

    info!(
        poll_interval_secs = poll_interval.as_secs(),
        workers = service.config().scheduler.workers,
        "sked-send starting"
    );

    let recovered = dispatcher.recover_interrupted().await?;
    if recovered > 0 {
        warn!(count = recovered, "Marked interrupted publish attempts as failed");
    }

    if cli.once {
        let report = dispatcher.run_once().await?;
        info!(
            due = report.due,
            claimed = report.claimed,
            unreadable = report.unreadable,
            "Processed due posts once, exiting"
        );
        return Ok(());
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    setup_signal_handlers(shutdown.clone())?;

    run_daemon_loop(&mut dispatcher, poll_interval, &shutdown).await;

    info!(in_flight = dispatcher.in_flight(), "Waiting for in-flight posts");
    dispatcher.drain().await;
    info!("sked-send stopped");
    Ok(())
}

/// Set up signal handlers for graceful shutdown
fn setup_signal_handlers(shutdown: Arc<AtomicBool>) -> anyhow::Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals =
        Signals::new([SIGINT, SIGTERM]).context("Failed to install signal handlers")?;

    std::thread::spawn(move || {
        if signals.forever().next().is_some() {
            info!("Received shutdown signal, stopping gracefully");
            shutdown.store(true, Ordering::Relaxed);
        }
    });

    Ok(())
}

async fn run_daemon_loop(dispatcher: &mut Dispatcher, poll_interval: Duration, shutdown: &AtomicBool) {
    while !shutdown.load(Ordering::Relaxed) {
        match dispatcher.tick().await {
            Ok(report) if report.claimed > 0 || report.lost > 0 || report.unreadable > 0 => {
                info!(
                    due = report.due,
                    claimed = report.claimed,
                    lost = report.lost,
                    unreadable = report.unreadable,
                    in_flight = dispatcher.in_flight(),
                    "Scan complete"
                );
            }
            Ok(_) => {}
            Err(e) => error!(error = %e, "Due-post scan failed"),
        }

        let deadline = Instant::now() + poll_interval;
        while Instant::now() < deadline && !shutdown.load(Ordering::Relaxed) {
            sleep(SHUTDOWN_CHECK.min(deadline - Instant::now())).await;
        }
    }
}
