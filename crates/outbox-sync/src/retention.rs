//! Retention enforcement for the watch folder
//!
//! The [`RetentionEnforcer`] answers one question, "is the watch folder over
//! its size limit right now?", and performs the deletes the dispatcher asks
//! for. Deletes that fail because the OS still holds the entry open are
//! retried with exponential backoff, bounded by a [`RetryBudget`].
//!
//! ## Design Decisions
//!
//! - **No caching**: the folder size is recomputed on every call so it always
//!   reflects the current disk state.
//! - **Busy detection**: `WouldBlock`, `EBUSY`, `ETXTBSY` and `ENOTEMPTY` on
//!   Unix, sharing/lock violations and `ERROR_DIR_NOT_EMPTY` on Windows.
//! - **Boolean outcomes**: every delete reports success as a `bool` and logs
//!   the reason for a failure; nothing is propagated to the dispatcher.

use std::future::Future;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::time::Duration;

use outbox_core::config::Config;
use outbox_core::retry::RetryBudget;
use tracing::{debug, error, info, instrument, warn};
use walkdir::WalkDir;

use crate::SyncError;

// ============================================================================
// RetentionPolicy
// ============================================================================

/// Immutable pair of watch folder and size limit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionPolicy {
    folder: PathBuf,
    size_limit_bytes: u64,
}

impl RetentionPolicy {
    pub fn new(folder: impl Into<PathBuf>, size_limit_bytes: u64) -> Self {
        Self {
            folder: folder.into(),
            size_limit_bytes,
        }
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn size_limit_bytes(&self) -> u64 {
        self.size_limit_bytes
    }
}

// ============================================================================
// RetentionEnforcer
// ============================================================================

/// Computes the watch folder size and deletes entries with bounded retries
#[derive(Debug, Clone)]
pub struct RetentionEnforcer {
    policy: RetentionPolicy,
    /// First backoff delay for busy deletes; doubles on every retry
    base_delay: Duration,
}

impl RetentionEnforcer {
    pub fn new(policy: RetentionPolicy, base_delay: Duration) -> Self {
        Self { policy, base_delay }
    }

    /// Builds an enforcer for the configured watch folder and limit.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            RetentionPolicy::new(&config.watch.folder, config.retention.size_limit_bytes),
            config.retention.delete_base_delay(),
        )
    }

    pub fn policy(&self) -> &RetentionPolicy {
        &self.policy
    }

    /// Sum of all file lengths recursively under the watch folder
    ///
    /// Entries that disappear while the walk is in progress are skipped.
    ///
    /// # Errors
    /// Returns [`SyncError::PathNotFound`] if the watch folder itself is missing
    pub async fn folder_size(&self) -> Result<u64, SyncError> {
        let folder = self.policy.folder.clone();
        tokio::task::spawn_blocking(move || compute_folder_size(&folder))
            .await
            .map_err(|e| SyncError::IoError(io::Error::other(e)))?
    }

    /// Returns true if the folder currently holds more than the size limit
    ///
    /// A folder whose size cannot be computed is reported as within the
    /// limit, so an unreadable folder never causes an eviction.
    pub async fn is_over_limit(&self) -> bool {
        match self.folder_size().await {
            Ok(size) => {
                let over = size > self.policy.size_limit_bytes;
                debug!(
                    size,
                    limit = self.policy.size_limit_bytes,
                    over,
                    "Checked watch folder size"
                );
                over
            }
            Err(err) => {
                warn!(
                    folder = %self.policy.folder.display(),
                    error = %err,
                    "Cannot compute watch folder size"
                );
                false
            }
        }
    }

    /// Deletes a single file, retrying while the file is busy
    ///
    /// # Returns
    /// `true` only on confirmed deletion; `false` if the file does not exist,
    /// the retry budget was exhausted, or an unexpected error occurred
    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn delete_file(&self, path: &Path, max_retries: u32) -> bool {
        if !path.is_file() {
            debug!("No file to delete");
            return false;
        }

        let budget = RetryBudget::new(max_retries, self.base_delay);
        match retry_while_busy(path, budget, || tokio::fs::remove_file(path)).await {
            Ok(retries) => {
                info!(retries, "File deleted");
                true
            }
            Err(SyncError::PathNotFound(_)) => {
                debug!("File vanished before it could be deleted");
                false
            }
            Err(SyncError::FileLocked(_)) => {
                warn!(max_retries, "File still busy, giving up on delete");
                false
            }
            Err(err) => {
                error!(error = %err, "Unexpected error while deleting file");
                false
            }
        }
    }

    /// Recursively deletes a folder, retrying while it is busy
    ///
    /// Waits `inter_delete_delay` before the first attempt so that whoever
    /// created the folder has a chance to release it.
    ///
    /// # Returns
    /// Whether the folder is confirmed absent afterwards. A folder that is
    /// already absent returns `true` without waiting or retrying.
    #[instrument(skip(self, inter_delete_delay), fields(path = %path.display()))]
    pub async fn delete_folder(
        &self,
        path: &Path,
        max_retries: u32,
        inter_delete_delay: Duration,
    ) -> bool {
        if !path.exists() {
            debug!("Folder already absent");
            return true;
        }

        tokio::time::sleep(inter_delete_delay).await;

        let budget = RetryBudget::new(max_retries, self.base_delay);
        let remove = move || async move {
            match tokio::fs::remove_dir_all(path).await {
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                other => other,
            }
        };

        match retry_while_busy(path, budget, remove).await {
            Ok(retries) => info!(retries, "Folder deleted"),
            Err(SyncError::FileLocked(_)) => {
                warn!(max_retries, "Folder still busy, giving up on delete")
            }
            Err(err) => error!(error = %err, "Unexpected error while deleting folder"),
        }

        let absent = !path.exists();
        if !absent {
            warn!("Folder still present after delete");
        }
        absent
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn compute_folder_size(folder: &Path) -> Result<u64, SyncError> {
    if !folder.is_dir() {
        return Err(SyncError::PathNotFound(folder.to_path_buf()));
    }

    let mut total = 0u64;
    for entry in WalkDir::new(folder) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                // Deleted mid-walk
                debug!(error = %err, "Skipping unreadable entry");
                continue;
            }
        };
        if entry.file_type().is_file() {
            match entry.metadata() {
                Ok(metadata) => total = total.saturating_add(metadata.len()),
                Err(err) => debug!(error = %err, "Skipping entry without metadata"),
            }
        }
    }
    Ok(total)
}

/// Returns true for errors raised while the OS still holds the entry open
pub fn is_busy(err: &io::Error) -> bool {
    if err.kind() == ErrorKind::WouldBlock {
        return true;
    }

    match err.raw_os_error() {
        #[cfg(unix)]
        Some(code) => matches!(code, libc::EBUSY | libc::ETXTBSY | libc::ENOTEMPTY),
        // ERROR_SHARING_VIOLATION, ERROR_LOCK_VIOLATION, ERROR_DIR_NOT_EMPTY
        #[cfg(windows)]
        Some(code) => matches!(code, 32 | 33 | 145),
        _ => false,
    }
}

/// Runs `op` until it succeeds, retrying busy failures within `budget`
///
/// The retry counter lives in this call only. Backoff before retry `n` is
/// `budget.delay_for(n)`.
///
/// # Returns
/// The number of retries that were needed on success
///
/// # Errors
/// - [`SyncError::FileLocked`] once the budget is exhausted
/// - [`SyncError::PathNotFound`] / [`SyncError::PermissionDenied`] / [`SyncError::IoError`]
///   immediately for any non-busy failure
pub(crate) async fn retry_while_busy<F, Fut>(
    path: &Path,
    budget: RetryBudget,
    mut op: F,
) -> Result<u32, SyncError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<()>>,
{
    let mut retries = 0u32;

    loop {
        match op().await {
            Ok(()) => return Ok(retries),
            Err(err) if is_busy(&err) => {
                retries += 1;
                if !budget.allows(retries) {
                    return Err(SyncError::FileLocked(path.to_path_buf()));
                }
                let delay = budget.delay_for(retries);
                warn!(
                    path = %path.display(),
                    retry = retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Entry busy, backing off"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(SyncError::PathNotFound(path.to_path_buf()))
            }
            Err(err) if err.kind() == ErrorKind::PermissionDenied => {
                return Err(SyncError::PermissionDenied(path.to_path_buf()))
            }
            Err(err) => return Err(SyncError::IoError(err)),
        }
    }
}

// ============================================================================
// Unit tests
// ============================================================================
