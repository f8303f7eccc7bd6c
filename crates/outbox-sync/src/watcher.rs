//! Filesystem-create notifications for the watch folder
//!
//! Provides a [`FolderWatcher`] that wraps the `notify` crate and pushes the
//! path of every newly created entry into the dispatcher's pending queue.
//!
//! ## Architecture
//!
//! ```text
//! inotify / kqueue / ReadDirectoryChangesW
//!       │
//!       ▼
//!  FolderWatcher  ──→  mpsc::unbounded_channel  ──→  WatchService consumer loop
//! ```
//!
//! The notify callback only performs a non-blocking `send`; classification
//! and all filesystem I/O happen later, on the consumer side.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

// ============================================================================
// FolderWatcher
// ============================================================================

/// Delivers create notifications for a single folder into a queue
///
/// The watcher is non-recursive: only entries appearing directly in the
/// watch folder are reported, files and directories alike. Dropping the
/// watcher (or calling [`stop`](FolderWatcher::stop)) halts delivery; paths
/// already queued stay queued.
///
/// ## Usage
///
/// ```ignore
/// let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
/// let watcher = FolderWatcher::start(Path::new("/srv/outbox"), tx)?;
/// // rx.try_recv() to get created paths
/// watcher.stop();
/// ```
pub struct FolderWatcher {
    /// The underlying notify watcher instance
    watcher: RecommendedWatcher,
    /// The folder being watched
    folder: PathBuf,
}

impl FolderWatcher {
    /// Creates a notifier for `folder` and starts delivering create events
    ///
    /// # Errors
    /// Returns an error if the OS watcher cannot be created or the folder
    /// cannot be watched (missing folder, insufficient permissions, watch
    /// limit reached)
    pub fn start(folder: &Path, queue: mpsc::UnboundedSender<PathBuf>) -> Result<Self> {
        let mut watcher = RecommendedWatcher::new(
            move |res: std::result::Result<notify::Event, notify::Error>| match res {
                Ok(event) => {
                    for path in created_paths(&event) {
                        if queue.send(path).is_err() {
                            warn!("Failed to enqueue created path (queue closed)");
                        }
                    }
                }
                Err(err) => {
                    error!(error = %err, "Folder watcher error");
                }
            },
            notify::Config::default(),
        )
        .context("Failed to create folder watcher")?;

        watcher
            .watch(folder, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch folder: {}", folder.display()))?;

        info!(folder = %folder.display(), "Folder watcher started");

        Ok(Self {
            watcher,
            folder: folder.to_path_buf(),
        })
    }

    /// Stops delivering notifications and releases the OS watch
    pub fn stop(mut self) {
        if let Err(err) = self.watcher.unwatch(&self.folder) {
            // The folder may already be gone; dropping the watcher still
            // releases the OS resources.
            debug!(folder = %self.folder.display(), error = %err, "Unwatch failed");
        }
        info!(folder = %self.folder.display(), "Folder watcher stopped");
    }
}

impl std::fmt::Debug for FolderWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FolderWatcher")
            .field("folder", &self.folder)
            .finish()
    }
}

// ============================================================================
// Event mapping - notify::Event → created paths
// ============================================================================

/// Extracts the created paths from a `notify::Event`
///
/// Only `Create(*)` events are reported; every other kind yields nothing.
fn created_paths(event: &notify::Event) -> Vec<PathBuf> {
    match &event.kind {
        EventKind::Create(_) => {
            for path in &event.paths {
                debug!(path = %path.display(), "Mapped Create event");
            }
            event.paths.clone()
        }
        _ => {
            debug!(kind = ?event.kind, "Ignoring event kind");
            Vec::new()
        }
    }
}

// ============================================================================
// File stability check
// ============================================================================

/// Checks if a file is stable (not currently being written to)
///
/// Reads the file size twice, separated by `check_interval`. If the size is
/// the same both times, the file is considered stable.
///
/// # Returns
/// `true` if the file size is constant across both reads, `false` if it
/// changed or if the file could not be read.
pub async fn is_file_stable(path: &Path, check_interval: Duration) -> bool {
    let size_first = match tokio::fs::metadata(path).await {
        Ok(m) => m.len(),
        Err(err) => {
            warn!(
                path = %path.display(),
                error = %err,
                "Cannot read file metadata for stability check"
            );
            return false;
        }
    };

    tokio::time::sleep(check_interval).await;

    let size_second = match tokio::fs::metadata(path).await {
        Ok(m) => m.len(),
        Err(err) => {
            warn!(
                path = %path.display(),
                error = %err,
                "Cannot read file metadata on second stability check"
            );
            return false;
        }
    };

    let stable = size_first == size_second;
    debug!(
        path = %path.display(),
        size_first,
        size_second,
        stable,
        "File stability check"
    );
    stable
}

// ============================================================================
// Unit tests
// ============================================================================
