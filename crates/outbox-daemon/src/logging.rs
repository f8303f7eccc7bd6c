//! Tracing subscriber setup
//!
//! Console output always goes to stdout. When `log_file` is configured a
//! second layer appends to that file through a `Mutex<File>`, so lines from
//! the dispatcher, transfer and heartbeat tasks never interleave.
//! `RUST_LOG` overrides the configured level.

use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use outbox_core::config::LoggingConfig;
use tracing::warn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Installs the global subscriber
///
/// A log file that cannot be opened is reported once on the console and
/// logging continues console-only.
pub fn init(config: &LoggingConfig, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let console: BoxedLayer = if json {
        fmt::layer().json().with_target(true).boxed()
    } else {
        fmt::layer().with_target(true).boxed()
    };
    let mut layers = vec![console];

    let mut open_failure = None;
    if let Some(path) = &config.file {
        match open_append(path) {
            Ok(file) => layers.push(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(true)
                    .with_writer(Mutex::new(file))
                    .boxed(),
            ),
            Err(err) => open_failure = Some((path.clone(), err)),
        }
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .map_err(|e| anyhow!("Failed to install tracing subscriber: {e}"))?;

    if let Some((path, err)) = open_failure {
        warn!(
            path = %path.display(),
            error = %err,
            "Cannot open log file, logging to console only"
        );
    }
    Ok(())
}

fn open_append(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    OpenOptions::new().create(true).append(true).open(path)
}
