//! Resumable transfer client
//!
//! A [`TransferClient`] drives one file from "not yet sent" to "confirmed
//! sent or permanently failed". Each attempt opens a fresh connection pair,
//! runs the heartbeat next to the data stream and tears both down when the
//! attempt ends, however it ends.
//!
//! ## Attempt sequence
//!
//! 1. Open data + heartbeat connections, spawn the heartbeat
//! 2. Send `FileName:<name>;Size:<size>;\n`, flush
//! 3. Wait the settle delay, read the 8-byte resume offset
//! 4. Offset equals size: already complete
//! 5. Otherwise seek to the offset and stream the rest chunk by chunk,
//!    checking after every chunk that the pair is still current
//! 6. Cleanup: stop the heartbeat, close the pair
//!
//! A failed attempt is retried after `retry_delay`, up to `max_attempts`.

use std::future::Future;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use outbox_core::config::Config;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::heartbeat::{Heartbeat, HeartbeatSettings};
use crate::link::{ConnectionPair, Endpoints, Link};
use crate::protocol::{encode_header, read_offset};
use crate::TransferError;

// ============================================================================
// TransferSettings
// ============================================================================

/// Everything a transfer attempt needs to know about the server
#[derive(Debug, Clone)]
pub struct TransferSettings {
    pub endpoints: Endpoints,
    pub chunk_size: usize,
    pub settle_delay: Duration,
    pub response_timeout: Duration,
    pub connect_timeout: Duration,
    pub max_attempts: u32,
    pub retry_delay: Duration,
    pub heartbeat: HeartbeatSettings,
}

impl TransferSettings {
    pub fn from_config(config: &Config) -> Self {
        let transfer = &config.transfer;
        Self {
            endpoints: Endpoints::from_config(transfer),
            chunk_size: transfer.chunk_size,
            settle_delay: transfer.settle_delay(),
            response_timeout: transfer.response_timeout(),
            connect_timeout: transfer.connect_timeout(),
            max_attempts: transfer.max_attempts,
            retry_delay: transfer.retry_delay(),
            heartbeat: HeartbeatSettings::from_config(&config.heartbeat),
        }
    }
}

// ============================================================================
// TransferSession
// ============================================================================

/// Result of sending one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferSession {
    pub path: PathBuf,
    /// Local size, fixed when the session starts
    pub size: u64,
    /// Bytes the server reported holding in the last attempt
    pub server_offset: u64,
    /// Bytes streamed in the last attempt
    pub bytes_streamed: u64,
    /// Attempts used, including the successful one
    pub attempts: u32,
    pub sent: bool,
}

// ============================================================================
// TransferClient
// ============================================================================

/// Sends a single file to the server with resume and retry
pub struct TransferClient {
    path: PathBuf,
    settings: TransferSettings,
}

impl TransferClient {
    pub fn new(path: impl Into<PathBuf>, config: &Config) -> Self {
        Self::with_settings(path, TransferSettings::from_config(config))
    }

    pub fn with_settings(path: impl Into<PathBuf>, settings: TransferSettings) -> Self {
        Self {
            path: path.into(),
            settings,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sends the file and reports whether the server confirmed it
    pub async fn send(&self) -> bool {
        match self.send_session().await {
            Ok(session) => session.sent,
            Err(err) => {
                error!(path = %self.path.display(), error = %err, "Transfer failed");
                false
            }
        }
    }

    /// Sends the file and returns the session details
    ///
    /// # Errors
    /// Returns [`TransferError::Exhausted`] carrying the last attempt's error
    /// once `max_attempts` attempts failed, or an I/O error when the local
    /// file cannot be inspected
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub async fn send_session(&self) -> Result<TransferSession, TransferError> {
        let size = tokio::fs::metadata(&self.path).await?.len();
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                TransferError::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "path has no file name",
                ))
            })?;

        let mut session = TransferSession {
            path: self.path.clone(),
            size,
            server_offset: 0,
            bytes_streamed: 0,
            attempts: 0,
            sent: false,
        };

        let max_attempts = self.settings.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            session.attempts = attempt;
            match self.attempt(&name, &mut session).await {
                Ok(()) => {
                    info!(
                        attempt,
                        size,
                        offset = session.server_offset,
                        streamed = session.bytes_streamed,
                        "File sent"
                    );
                    return Ok(session);
                }
                Err(err) => {
                    warn!(attempt, max_attempts, error = %err, "Transfer attempt failed");
                    last_error = Some(err);
                    if attempt < max_attempts {
                        tokio::time::sleep(self.settings.retry_delay).await;
                    }
                }
            }
        }

        Err(TransferError::Exhausted {
            attempts: max_attempts,
            last: Box::new(last_error.unwrap_or(TransferError::ConnectionLost)),
        })
    }

    /// One connect-through-transfer attempt with guaranteed cleanup
    async fn attempt(&self, name: &str, session: &mut TransferSession) -> Result<(), TransferError> {
        let link = Arc::new(Link::open(self.settings.endpoints, self.settings.connect_timeout).await?);
        let heartbeat = Heartbeat::spawn(
            link.clone(),
            self.settings.heartbeat.clone(),
            CancellationToken::new(),
        );

        let pair = link.current().await;
        let result = self.transfer(&link, &pair, name, session).await;

        heartbeat.stop().await;
        link.close().await;
        debug!(reconnects = link.reconnect_count(), "Attempt cleaned up");
        result
    }

    async fn transfer(
        &self,
        link: &Link,
        pair: &Arc<ConnectionPair>,
        name: &str,
        session: &mut TransferSession,
    ) -> Result<(), TransferError> {
        let size = session.size;
        session.bytes_streamed = 0;

        let mut data = pair.data().await;
        until_closed(pair, data.write_all(&encode_header(name, size))).await?;
        until_closed(pair, data.flush()).await?;

        tokio::time::sleep(self.settings.settle_delay).await;

        let timeout = self.settings.response_timeout;
        let offset = until_closed(pair, async {
            tokio::time::timeout(timeout, read_offset(&mut *data))
                .await
                .map_err(|_| TransferError::Timeout(timeout))?
        })
        .await?;
        session.server_offset = offset;
        debug!(offset, size, "Server resume offset");

        if offset == size {
            info!("Server already holds the complete file");
            session.sent = true;
            return Ok(());
        }
        if offset > size {
            return Err(TransferError::OffsetBeyondEnd { offset, size });
        }

        let mut file = tokio::fs::File::open(&self.path).await?;
        file.seek(SeekFrom::Start(offset)).await?;

        let mut buf = vec![0u8; self.settings.chunk_size.max(1)];
        let mut remaining = size - offset;
        while remaining > 0 {
            let want = buf.len().min(usize::try_from(remaining).unwrap_or(usize::MAX));
            let n = file.read(&mut buf[..want]).await?;
            if n == 0 {
                return Err(TransferError::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "file shrank during transfer",
                )));
            }

            until_closed(pair, data.write_all(&buf[..n])).await?;
            until_closed(pair, data.flush()).await?;
            session.bytes_streamed += n as u64;
            remaining -= n as u64;

            if !link.is_current(pair).await {
                return Err(TransferError::ConnectionLost);
            }
        }

        until_closed(pair, data.shutdown()).await?;
        session.sent = true;
        Ok(())
    }
}

/// Runs a data-socket operation, aborting it once the pair is closed
///
/// A write blocked on a server that stopped reading only returns through
/// this path.
async fn until_closed<T, E, F>(pair: &ConnectionPair, op: F) -> Result<T, TransferError>
where
    F: Future<Output = Result<T, E>>,
    E: Into<TransferError>,
{
    tokio::select! {
        biased;
        _ = pair.closed().cancelled() => Err(TransferError::ConnectionLost),
        result = op => result.map_err(Into::into),
    }
}
