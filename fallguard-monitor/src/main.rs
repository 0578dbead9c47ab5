//! fallguard-monitor - fall confirmation service
//!
//! `serve` runs the HTTP API; `replay` drives the same core from a JSON-lines
//! script with virtual timestamps and prints one report per line.

use std::fs::File;
use std::io::{BufReader, Write};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fallguard_common::config::TomlConfig;
use fallguard_common::events::EventBus;
use fallguard_monitor::confirm::CoordinatorSettings;
use fallguard_monitor::notify::{Channels, DispatchWorker, NotificationDispatcher};
use fallguard_monitor::{build_router, replay, AppState, FallMonitor};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "fallguard-monitor")]
#[command(about = "Fall detection confirmation and caregiver notification service")]
#[command(version)]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long, env = "FALLGUARD_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// HTTP port (overrides the config file)
    #[arg(short, long, env = "FALLGUARD_PORT", global = true)]
    port: Option<u16>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Replay a JSON-lines script of frames and decisions
    Replay {
        /// Script file
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (config, source) =
        TomlConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    // RUST_LOG wins over the configured level
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                let level = &config.logging.level;
                format!("fallguard_monitor={level},fallguard_common={level},tower_http=info")
                    .into()
            }),
        )
        // stderr keeps stdout free for replay reports
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!(
        "Starting fallguard-monitor v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE"),
    );
    match source.path() {
        Some(path) => info!("Configuration: {}", path.display()),
        None => warn!("No config file found, using compiled defaults"),
    }

    let settings = CoordinatorSettings::from_config(&config.detection)
        .context("Invalid detection settings")?;
    info!(
        confirmation_secs = settings.confirmation_duration.as_secs_f64(),
        fall_aspect_ratio = settings.heuristic.ratio(),
        cooldown_secs = settings.alert_cooldown.as_secs_f64(),
        grace_secs = settings.absence_grace.as_secs_f64(),
        "Detection settings"
    );

    let notifications = &config.notifications;
    let channels =
        Channels::from_config(notifications).context("Failed to initialize notification provider")?;
    info!(
        provider = channels.messaging.name(),
        caregivers = notifications.caregivers.len(),
        "Notification provider ready"
    );
    if notifications.caregivers.is_empty() {
        warn!("No caregivers configured, emergency calls will be skipped");
    }
    if notifications.alert_recipient.is_none() {
        warn!("No alert recipient configured, alert messages will be skipped");
    }

    let dispatcher = Arc::new(NotificationDispatcher::new(
        channels.messaging,
        channels.voice,
        notifications.alert_recipient.clone(),
        notifications.caregivers.clone(),
    ));
    let (monitor, worker) = FallMonitor::spawn(
        settings,
        dispatcher,
        EventBus::default(),
        notifications.dispatch_queue_capacity,
    );
    let monitor = Arc::new(monitor);

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let port = args.port.unwrap_or(config.port);
            serve(monitor, worker, &config.bind_address, port).await
        }
        Command::Replay { file } => run_replay(monitor, worker, file).await,
    }
}

async fn serve(
    monitor: Arc<FallMonitor>,
    worker: DispatchWorker,
    bind_address: &str,
    port: u16,
) -> Result<()> {
    let app = build_router(AppState::new(monitor));

    let addr: SocketAddr = format!("{}:{}", bind_address, port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", bind_address, port))?;

    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Router (and with it the last monitor reference) is gone; drain the queue
    worker.shutdown().await;
    info!("Server shutdown complete");
    Ok(())
}

async fn run_replay(monitor: Arc<FallMonitor>, worker: DispatchWorker, file: PathBuf) -> Result<()> {
    let reader = BufReader::new(
        File::open(&file).with_context(|| format!("Failed to open {}", file.display()))?,
    );
    let records = replay::parse_script(reader)
        .with_context(|| format!("Failed to parse {}", file.display()))?;
    info!(records = records.len(), "Replaying {}", file.display());

    let mut stdout = std::io::stdout();
    replay::run_replay(&monitor, records, &mut stdout)
        .await
        .context("Replay failed")?;
    stdout.flush().context("Failed to flush output")?;

    drop(monitor);
    worker.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
