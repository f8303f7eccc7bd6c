//! File sender port (driven/secondary port)
//!
//! The dispatcher hands every in-limit file to an [`IFileSender`] and only
//! observes the final outcome. How the bytes travel (connection handling,
//! resume, heartbeats, retries) is entirely the adapter's concern.

use std::path::Path;

/// Port trait for pushing a single file to the remote server
///
/// ## Implementation Notes
///
/// - `send_file` drives the file from "not yet sent" to "confirmed sent or
///   permanently failed" and never panics across this boundary.
/// - Each call is an independent transfer session; implementations must not
///   carry state from one call into the next.
#[async_trait::async_trait]
pub trait IFileSender: Send + Sync {
    /// Sends the file at `path`
    ///
    /// # Returns
    /// `true` once the server holds the complete file, `false` when every
    /// attempt allowed by the retry budget has failed
    async fn send_file(&self, path: &Path) -> bool;
}
