//! Outbox Daemon - Watch folder to server file pusher
//!
//! This binary runs as a long-lived service and handles:
//! - Watching one folder for newly created entries
//! - Evicting arrivals while the folder is over its size limit
//! - Pushing in-limit files to the server with resume and heartbeat
//! - Graceful shutdown on SIGTERM/SIGINT
//!
//! # Architecture
//!
//! The daemon loads the flat key/value configuration, installs logging,
//! creates the watch folder and starts the [`WatchService`] consumer loop.
//! The loop is controlled by a `CancellationToken` that is triggered on
//! receipt of SIGTERM or SIGINT.

mod logging;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use outbox_core::config::{Config, ConfigStore, LoggingConfig};
use outbox_core::ports::IFileSender;
use outbox_sync::{RetentionEnforcer, WatchService};
use outbox_transfer::TransferService;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

// ============================================================================
// Command line
// ============================================================================

#[derive(Debug, Parser)]
#[command(name = "outboxd", version, about = "Push new files from a watch folder to a server")]
struct Cli {
    /// Configuration file (flat YAML key/value pairs)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Load and validate the configuration, print it resolved, then exit
    #[arg(long)]
    check: bool,

    /// Emit console logs as JSON
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(Config::default_path)
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Loads, builds and validates the configuration at `path`
fn load_config(path: &std::path::Path) -> Result<Config> {
    let store = ConfigStore::load(path)
        .with_context(|| format!("Failed to read configuration: {}", path.display()))?;
    let config = Config::from_store(&store).context("Invalid configuration")?;

    let errors = config.validate();
    if !errors.is_empty() {
        let details: Vec<String> = errors.iter().map(ToString::to_string).collect();
        bail!("Invalid configuration:\n  {}", details.join("\n  "));
    }
    Ok(config)
}

// ============================================================================
// Daemon
// ============================================================================

/// Owns the configuration and the shutdown token of the running service
struct Daemon {
    config: Config,
    shutdown: CancellationToken,
}

impl Daemon {
    fn new(config: Config, shutdown: CancellationToken) -> Self {
        Self { config, shutdown }
    }

    /// Starts the watch service and waits for the shutdown token
    async fn run(self) -> Result<()> {
        let folder = &self.config.watch.folder;
        tokio::fs::create_dir_all(folder)
            .await
            .with_context(|| format!("Failed to create watch folder: {}", folder.display()))?;

        info!(
            folder = %folder.display(),
            size_limit_bytes = self.config.retention.size_limit_bytes,
            server = %self.config.transfer.server_ip,
            file_port = self.config.transfer.file_port,
            ping_port = self.config.transfer.ping_port,
            restart_policy = ?self.config.watch.restart_policy,
            "Starting watch service"
        );

        let enforcer = RetentionEnforcer::from_config(&self.config);
        let sender: Arc<dyn IFileSender> = Arc::new(TransferService::from_config(&self.config));
        let mut service = WatchService::new(&self.config, enforcer, sender);
        service.start().context("Failed to start folder watcher")?;

        let handle = service.spawn(self.shutdown.clone());
        self.shutdown.cancelled().await;

        info!("Waiting for in-flight work to finish");
        handle.await.context("Dispatcher task failed")?;
        Ok(())
    }
}

// ============================================================================
// Graceful shutdown signal handler
// ============================================================================

/// Waits for SIGTERM or SIGINT and triggers the cancellation token
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }

    token.cancel();
}

// ============================================================================
// Main entry point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config_path();

    let config = match load_config(&config_path) {
        Ok(config) => config,
        Err(err) => {
            if !cli.check {
                // Console-only so the failure itself is logged
                let _ = logging::init(&LoggingConfig::default(), cli.json);
                let message = format!("{err:#}");
                error!(error = %message, "Cannot start outboxd");
            }
            return Err(err);
        }
    };

    if cli.check {
        println!("# Configuration OK: {}", config_path.display());
        print!("{}", config.to_yaml()?);
        return Ok(());
    }

    logging::init(&config.logging, cli.json)?;
    info!(config_path = %config_path.display(), "Outbox daemon starting (outboxd)");

    let shutdown_token = CancellationToken::new();

    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        shutdown_signal(signal_token).await;
    });

    let result = Daemon::new(config, shutdown_token).run().await;

    match &result {
        Ok(()) => info!("Outbox daemon shut down gracefully"),
        Err(e) => error!(error = %e, "Outbox daemon exiting with error"),
    }

    result
}

// ============================================================================
// Tests
// ============================================================================
