//! herakles-metrics-agent - version 0.1.0
//!
//! Host metrics agent with tracing logging.
//! This is the main entry point that wires collectors into the manager,
//! drives the reporting tick and handles subcommands.

mod cli;
mod commands;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::signal;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, level_filters::LevelFilter, warn};

use cli::{Args, CollectorName, Commands, LogLevel};
use commands::{command_config, command_probe};
use herakles_metrics_agent::collectors::build_collectors;
use herakles_metrics_agent::config::{load_config, render_config, validate_config, Config};
use herakles_metrics_agent::{LinuxPlatform, LogReporter, Manager, Platform, Reporter};

/// Time collector tasks get to exit after shutdown is signalled.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Initializes tracing logging subsystem with configured log level.
fn setup_logging(args: &Args) -> anyhow::Result<()> {
    let log_level = match args.log_level {
        LogLevel::Off => LevelFilter::OFF,
        LogLevel::Error => LevelFilter::ERROR,
        LogLevel::Warn => LevelFilter::WARN,
        LogLevel::Info => LevelFilter::INFO,
        LogLevel::Debug => LevelFilter::DEBUG,
        LogLevel::Trace => LevelFilter::TRACE,
    };

    // stdout is reserved for probe/config output
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    info!("Logging initialized with level: {:?}", args.log_level);
    Ok(())
}

/// Resolves effective config (CLI > file > defaults).
fn resolve_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    let collection = &mut config.collection;
    if let Some(interval) = args.interval {
        collection.interval = interval;
    }
    if let Some(batch_size) = args.batch_size {
        collection.batch_size = batch_size;
    }
    for name in &args.enable {
        match name {
            CollectorName::Cpu => collection.collectors.cpu.enabled = true,
            CollectorName::Memory => collection.collectors.memory.enabled = true,
            CollectorName::Disk => collection.collectors.disk.enabled = true,
        }
    }

    Ok(config)
}

/// Helper function to load and validate configuration.
/// Exits the process with error code 1 if validation fails.
fn load_validated_config(args: &Args) -> anyhow::Result<Config> {
    let config = resolve_config(args)?;
    if let Err(e) = validate_config(&config) {
        eprintln!("❌ Configuration invalid: {}", e);
        std::process::exit(1);
    }
    Ok(config)
}

/// Drains the manager every `period` and hands the points to `reporter`.
async fn report_loop<R: Reporter>(
    manager: Arc<Manager>,
    reporter: R,
    period: Duration,
    ctx: CancellationToken,
) {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = ctx.cancelled() => break,
            _ = ticker.tick() => reporter.report(&manager.get_metrics()),
        }
    }
}

/// Resolves once SIGINT, SIGTERM or SIGHUP is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = unix_signal(signal::unix::SignalKind::terminate(), "SIGTERM");
    #[cfg(unix)]
    let hangup = unix_signal(signal::unix::SignalKind::hangup(), "SIGHUP");

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();
    #[cfg(not(unix))]
    let hangup = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C), shutting down gracefully...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        }
        _ = hangup => {
            info!("Received SIGHUP, shutting down gracefully...");
        }
    }
}

/// Resolves once `kind` is delivered; never resolves if the handler cannot be installed.
#[cfg(unix)]
async fn unix_signal(kind: signal::unix::SignalKind, name: &str) {
    match signal::unix::signal(kind) {
        Ok(mut sig) => {
            sig.recv().await;
        }
        Err(e) => {
            error!("Failed to install {} handler: {}", name, e);
            std::future::pending::<()>().await;
        }
    }
}

/// Runs the collectors until a shutdown signal arrives.
async fn run_agent(config: Config) -> anyhow::Result<()> {
    let collection = &config.collection;
    let manager = Arc::new(Manager::new(collection)?);

    let platform: Arc<dyn Platform> = Arc::new(LinuxPlatform::new());
    for (name, collector) in build_collectors(collection, platform) {
        manager.register_collector(name, collector)?;
    }

    let ctx = CancellationToken::new();
    manager
        .start(&ctx)
        .context("No collectors enabled (use --enable or the config file)")?;

    let reporter = LogReporter::new(manager.batch_size());
    let reporting = tokio::spawn(report_loop(
        manager.clone(),
        reporter.clone(),
        collection.interval,
        ctx.clone(),
    ));

    info!(
        "herakles-metrics-agent running {} collector(s), reporting every {}",
        manager.len(),
        humantime::format_duration(collection.interval)
    );

    shutdown_signal().await;
    ctx.cancel();

    if let Err(e) = manager.stop() {
        warn!("{}", e);
    }

    match time::timeout(SHUTDOWN_GRACE, manager.wait()).await {
        Ok(Ok(())) => info!("All collector tasks finished"),
        Ok(Err(e)) => error!("{}", e),
        Err(_) => warn!(
            "Collector tasks did not finish within {:?}, exiting anyway",
            SHUTDOWN_GRACE
        ),
    }

    if let Err(e) = reporting.await {
        error!("Reporting task failed: {}", e);
    }

    // final drain
    reporter.report(&manager.get_metrics());

    info!("herakles-metrics-agent stopped gracefully");
    Ok(())
}

/// Main application entry point.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Early config resolution for show/check modes
    if args.show_config || args.check_config {
        let config = resolve_config(&args)?;

        if args.check_config {
            if let Err(e) = validate_config(&config) {
                eprintln!("❌ Configuration invalid: {}", e);
                std::process::exit(1);
            }
            println!("✅ Configuration is valid");
            return Ok(());
        }

        print!("{}", render_config(&config, args.config_format)?);
        return Ok(());
    }

    if let Some(command) = &args.command {
        return match command {
            Commands::Config {
                output,
                format,
                commented,
            } => command_config(output.clone(), *format, *commented),

            Commands::Probe { collector } => {
                let config = load_validated_config(&args)?;
                setup_logging(&args)?;
                command_probe(&config.collection, *collector)
            }
        };
    }

    let config = load_validated_config(&args)?;
    setup_logging(&args)?;

    info!("Starting herakles-metrics-agent");
    run_agent(config).await
}
