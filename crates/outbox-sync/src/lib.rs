//! Outbox Sync - Watch folder dispatching and retention enforcement
//!
//! Provides:
//! - Filesystem-create notifications for the watch folder
//! - A single ordered work queue with one sequential consumer
//! - Size-limit enforcement with bounded, backed-off deletes
//!
//! ## Modules
//!
//! - [`watcher`] - `notify` wrapper that feeds created paths into the queue
//! - [`retention`] - Folder size checks and busy-tolerant deletes
//! - [`dispatcher`] - Classification, routing and the consumer loop

pub mod dispatcher;
pub mod retention;
pub mod watcher;

use std::path::PathBuf;

use thiserror::Error;

pub use dispatcher::{DispatchOutcome, DispatchSettings, Dispatcher, WatchService};
pub use retention::{RetentionEnforcer, RetentionPolicy};
pub use watcher::FolderWatcher;

/// Errors that can occur during watch folder operations
#[derive(Debug, Error)]
pub enum SyncError {
    /// An I/O error occurred during file operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// A file or folder stayed locked by another process
    #[error("File locked: {0}")]
    FileLocked(PathBuf),

    /// Insufficient filesystem permissions
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The specified path does not exist
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),
}
