//! Watch queue dispatcher
//!
//! Turns create notifications into serialized work: one FIFO queue, one
//! sequential consumer, and a routing decision made for every dequeued path.
//!
//! ## Architecture
//!
//! ```text
//!  FolderWatcher ──send──→ [ PendingQueue (unbounded, FIFO) ]
//!                                    │ try_recv (single consumer)
//!                                    ▼
//!                              Dispatcher::dispatch
//!                   ┌────────────────┼─────────────────┐
//!                   ▼                ▼                 ▼
//!              directory       file over limit   file within limit
//!            delete_folder      delete_file        IFileSender
//!                   └────────────────┴─────────────────┘
//!                                    ▼
//!                    RestartPolicy → FolderWatcher restart
//! ```
//!
//! ## Restart policy
//!
//! With [`RestartPolicy::Always`] the notifier is recreated after every
//! handled event except a failed send. [`RestartPolicy::OnFailure`] only
//! recreates it after a failed delete or a failed send.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use outbox_core::config::{Config, RestartPolicy};
use outbox_core::ports::IFileSender;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::retention::RetentionEnforcer;
use crate::watcher::{is_file_stable, FolderWatcher};

// ============================================================================
// DispatchSettings
// ============================================================================

/// Tunables for the consumer loop and routing decisions
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    /// Fixed pause after every loop iteration
    pub idle_delay: Duration,
    pub restart_policy: RestartPolicy,
    /// Retry ceiling handed to every delete
    pub delete_retries: u32,
    /// Wait before the first recursive delete attempt
    pub folder_delete_delay: Duration,
    /// When set, files whose size changes within this window are re-queued
    pub stability_check: Option<Duration>,
}

impl DispatchSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            idle_delay: config.watch.idle_delay(),
            restart_policy: config.watch.restart_policy,
            delete_retries: config.retention.delete_retries,
            folder_delete_delay: config.retention.folder_delete_delay(),
            stability_check: config.watch.stability_check(),
        }
    }
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

// ============================================================================
// DispatchOutcome
// ============================================================================

/// What happened to a single dequeued path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// File handed to the sender and confirmed sent
    Sent,
    /// File handed to the sender but the send failed; the item is abandoned
    SendFailed,
    /// File arrived while the folder was over its limit and was evicted
    Evicted { deleted: bool },
    /// A directory appeared in the watch folder and was purged
    Purged { deleted: bool },
    /// The path no longer existed when it was dequeued
    Vanished,
    /// File was still growing and went back to the tail of the queue
    Unstable,
}

impl DispatchOutcome {
    /// Returns true if the operation for this path did not succeed
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::SendFailed | Self::Evicted { deleted: false } | Self::Purged { deleted: false }
        )
    }

    /// Returns true if the notifier should be recreated after this outcome
    pub fn should_restart(&self, policy: RestartPolicy) -> bool {
        match (policy, self) {
            (_, Self::Vanished | Self::Unstable) => false,
            (RestartPolicy::Always, Self::SendFailed) => false,
            (RestartPolicy::Always, _) => true,
            (RestartPolicy::OnFailure, outcome) => outcome.is_failure(),
        }
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Classifies a path at dispatch time and routes it to retention or transfer
pub struct Dispatcher {
    settings: DispatchSettings,
    enforcer: RetentionEnforcer,
    sender: Arc<dyn IFileSender>,
    /// Producer handle used to re-queue unstable files
    requeue: mpsc::UnboundedSender<PathBuf>,
}

impl Dispatcher {
    pub fn new(
        settings: DispatchSettings,
        enforcer: RetentionEnforcer,
        sender: Arc<dyn IFileSender>,
        requeue: mpsc::UnboundedSender<PathBuf>,
    ) -> Self {
        Self {
            settings,
            enforcer,
            sender,
            requeue,
        }
    }

    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    /// Dispatches one path and reports what happened
    ///
    /// The entry is classified against the current disk state, so a path
    /// queued as a file but replaced by a directory is purged, and a path
    /// that disappeared in the meantime is dropped.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn dispatch(&self, path: &Path) -> DispatchOutcome {
        let metadata = match tokio::fs::metadata(path).await {
            Ok(metadata) => metadata,
            Err(_) => {
                debug!("Path vanished before dispatch");
                return DispatchOutcome::Vanished;
            }
        };

        if metadata.is_dir() {
            return self.handle_directory(path).await;
        }
        if metadata.is_file() {
            return self.handle_file(path).await;
        }

        debug!("Path is neither file nor directory, dropping");
        DispatchOutcome::Vanished
    }

    async fn handle_directory(&self, path: &Path) -> DispatchOutcome {
        info!("Directory in watch folder, purging");
        let deleted = self
            .enforcer
            .delete_folder(
                path,
                self.settings.delete_retries,
                self.settings.folder_delete_delay,
            )
            .await;
        if !deleted {
            warn!("Failed to purge directory");
        }
        DispatchOutcome::Purged { deleted }
    }

    async fn handle_file(&self, path: &Path) -> DispatchOutcome {
        if let Some(interval) = self.settings.stability_check {
            if !is_file_stable(path, interval).await {
                if !path.exists() {
                    return DispatchOutcome::Vanished;
                }
                debug!("File still being written, re-queueing");
                if self.requeue.send(path.to_path_buf()).is_err() {
                    warn!("Failed to re-queue unstable file (queue closed)");
                }
                return DispatchOutcome::Unstable;
            }
        }

        if self.enforcer.is_over_limit().await {
            info!(
                limit = self.enforcer.policy().size_limit_bytes(),
                "Watch folder over size limit, evicting new arrival"
            );
            let deleted = self
                .enforcer
                .delete_file(path, self.settings.delete_retries)
                .await;
            if deleted {
                info!("Evicted file");
            } else {
                warn!("Failed to evict file");
            }
            return DispatchOutcome::Evicted { deleted };
        }

        if self.sender.send_file(path).await {
            info!("File sent");
            DispatchOutcome::Sent
        } else {
            error!("File could not be sent, abandoning");
            DispatchOutcome::SendFailed
        }
    }
}

// ============================================================================
// WatchService
// ============================================================================

/// Owns the notifier, the pending queue and the consumer loop
///
/// ## Usage
///
/// ```ignore
/// let mut service = WatchService::new(&config, enforcer, sender);
/// service.start()?;
/// let shutdown = CancellationToken::new();
/// let handle = service.spawn(shutdown.clone());
/// // ...
/// shutdown.cancel();
/// handle.await?;
/// ```
pub struct WatchService {
    folder: PathBuf,
    dispatcher: Dispatcher,
    queue_tx: mpsc::UnboundedSender<PathBuf>,
    queue_rx: mpsc::UnboundedReceiver<PathBuf>,
    watcher: Option<FolderWatcher>,
    restarts: u64,
}

impl WatchService {
    /// Creates a stopped service for the configured watch folder
    pub fn new(config: &Config, enforcer: RetentionEnforcer, sender: Arc<dyn IFileSender>) -> Self {
        Self::with_settings(
            config.watch.folder.clone(),
            DispatchSettings::from_config(config),
            enforcer,
            sender,
        )
    }

    pub fn with_settings(
        folder: PathBuf,
        settings: DispatchSettings,
        enforcer: RetentionEnforcer,
        sender: Arc<dyn IFileSender>,
    ) -> Self {
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let dispatcher = Dispatcher::new(settings, enforcer, sender, queue_tx.clone());
        Self {
            folder,
            dispatcher,
            queue_tx,
            queue_rx,
            watcher: None,
            restarts: 0,
        }
    }

    /// Begins delivering create notifications into the queue
    ///
    /// Calling `start` on a running service is a no-op.
    pub fn start(&mut self) -> Result<()> {
        if self.watcher.is_some() {
            return Ok(());
        }
        self.watcher = Some(FolderWatcher::start(&self.folder, self.queue_tx.clone())?);
        Ok(())
    }

    /// Halts notification delivery; queued paths stay queued
    pub fn stop(&mut self) {
        if let Some(watcher) = self.watcher.take() {
            watcher.stop();
        }
    }

    /// Stops, recreates and starts the notifier
    pub fn restart(&mut self) -> Result<()> {
        self.stop();
        self.start()?;
        self.restarts += 1;
        debug!(restarts = self.restarts, "Notifier restarted");
        Ok(())
    }

    pub fn is_watching(&self) -> bool {
        self.watcher.is_some()
    }

    /// Number of successful notifier restarts so far
    pub fn restart_count(&self) -> u64 {
        self.restarts
    }

    /// Appends a path to the tail of the queue
    pub fn enqueue(&self, path: PathBuf) {
        // The receiver lives in `self`, so the send cannot fail here.
        let _ = self.queue_tx.send(path);
    }

    /// Returns a producer handle for the pending queue
    pub fn queue_sender(&self) -> mpsc::UnboundedSender<PathBuf> {
        self.queue_tx.clone()
    }

    /// Dispatches the path at the queue head, applying the restart policy
    pub async fn dispatch(&mut self, path: &Path) -> DispatchOutcome {
        let outcome = self.dispatcher.dispatch(path).await;
        if outcome.should_restart(self.dispatcher.settings().restart_policy) {
            if let Err(err) = self.restart() {
                error!(error = %err, "Failed to restart notifier");
            }
        }
        outcome
    }

    /// Non-blocking dequeue of one path and its dispatch
    ///
    /// Returns `None` when the queue is empty.
    pub async fn process_next(&mut self) -> Option<DispatchOutcome> {
        let path = self.queue_rx.try_recv().ok()?;
        Some(self.dispatch(&path).await)
    }

    /// Runs the consumer loop until `shutdown` is cancelled
    ///
    /// Cancellation is observed between items; an in-flight delete or send
    /// always runs to completion.
    pub async fn run(mut self, shutdown: CancellationToken) {
        let idle_delay = self.dispatcher.settings().idle_delay;
        info!(folder = %self.folder.display(), "Dispatcher loop started");

        while !shutdown.is_cancelled() {
            if let Some(outcome) = self.process_next().await {
                debug!(?outcome, "Dispatched queued path");
            }

            tokio::select! {
                _ = tokio::time::sleep(idle_delay) => {}
                _ = shutdown.cancelled() => break,
            }
        }

        self.stop();
        info!(restarts = self.restarts, "Dispatcher loop stopped");
    }

    /// Spawns [`run`](WatchService::run) onto the runtime
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}

// ============================================================================
// Unit tests
// ============================================================================
