//! Heartbeat loop and reconnect procedure
//!
//! Runs next to a transfer attempt for as long as the attempt holds its
//! [`Link`]. Every tick writes [`PING_TOKEN`] on the heartbeat connection
//! and waits for a pong. A timeout, a wrong answer or a dead pair triggers
//! the reconnect procedure:
//!
//! 1. Close both connections of the current pair
//! 2. Up to `reconnect_retries` times: open data then heartbeat connection,
//!    install the new pair, sleeping `reconnect_delay` between tries
//! 3. On success start a fresh ping loop bound to the new pair; otherwise
//!    stop
//!
//! The heartbeat never cancels the transfer task. Closing a pair fires its
//! `closed` token, which aborts whatever data operation is blocked on it
//! with `ConnectionLost`.

use std::sync::Arc;
use std::time::Duration;

use outbox_core::config::HeartbeatConfig;
use tokio::io::AsyncWriteExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::link::{ConnectionPair, Link};
use crate::protocol::{is_pong, read_response, PING_TOKEN};
use crate::TransferError;

/// Timing and retry settings of the heartbeat loop
#[derive(Debug, Clone)]
pub struct HeartbeatSettings {
    pub interval: Duration,
    pub pong_timeout: Duration,
    pub reconnect_retries: u32,
    pub reconnect_delay: Duration,
}

impl HeartbeatSettings {
    pub fn from_config(config: &HeartbeatConfig) -> Self {
        Self {
            interval: config.interval(),
            pong_timeout: config.pong_timeout(),
            reconnect_retries: config.reconnect_retries,
            reconnect_delay: config.reconnect_delay(),
        }
    }
}

impl Default for HeartbeatSettings {
    fn default() -> Self {
        Self::from_config(&HeartbeatConfig::default())
    }
}

/// Handle to a running heartbeat task
#[derive(Debug)]
pub struct Heartbeat {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl Heartbeat {
    /// Spawns the heartbeat for `link`; it runs until `cancel` fires
    pub fn spawn(link: Arc<Link>, settings: HeartbeatSettings, cancel: CancellationToken) -> Self {
        let handle = tokio::spawn(supervise(link, settings, cancel.clone()));
        Self { cancel, handle }
    }

    /// Returns true once the heartbeat has stopped on its own or been cancelled
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Cancels the heartbeat and waits for it to finish
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(err) = self.handle.await {
            warn!(error = %err, "Heartbeat task ended abnormally");
        }
    }
}

/// Runs one ping loop per connection pair until cancelled or out of retries
async fn supervise(link: Arc<Link>, settings: HeartbeatSettings, cancel: CancellationToken) {
    loop {
        let pair = link.current().await;
        debug!(pair = pair.id(), "Heartbeat loop started");

        let failure = tokio::select! {
            _ = cancel.cancelled() => return,
            failure = ping_loop(&pair, &settings) => failure,
        };

        warn!(pair = pair.id(), error = %failure, "Heartbeat lost, reconnecting");
        pair.close().await;

        if !reconnect(&link, &settings, &cancel).await {
            if !cancel.is_cancelled() {
                error!(
                    retries = settings.reconnect_retries,
                    "Reconnect attempts exhausted, heartbeat stopped"
                );
            }
            return;
        }
    }
}

/// Pings until the first failed tick and returns its error
async fn ping_loop(pair: &ConnectionPair, settings: &HeartbeatSettings) -> TransferError {
    loop {
        if let Err(err) = tick(pair, settings.pong_timeout).await {
            return err;
        }
        tokio::time::sleep(settings.interval).await;
    }
}

async fn tick(pair: &ConnectionPair, pong_timeout: Duration) -> Result<(), TransferError> {
    if !pair.is_alive() {
        return Err(TransferError::ConnectionLost);
    }

    let mut ping = pair.ping().await;
    let exchange = async {
        ping.write_all(PING_TOKEN).await?;
        ping.flush().await?;
        read_response(&mut *ping).await
    };
    let response = tokio::time::timeout(pong_timeout, exchange)
        .await
        .map_err(|_| TransferError::Timeout(pong_timeout))??;

    if !is_pong(&response) {
        return Err(TransferError::UnexpectedPong(
            String::from_utf8_lossy(&response).into_owned(),
        ));
    }
    Ok(())
}

/// Replaces the link's pair, at most `reconnect_retries` tries
async fn reconnect(link: &Link, settings: &HeartbeatSettings, cancel: &CancellationToken) -> bool {
    for attempt in 1..=settings.reconnect_retries {
        if cancel.is_cancelled() {
            return false;
        }

        match link.replace().await {
            Ok(pair) => {
                info!(pair = pair.id(), attempt, "Reconnected");
                return true;
            }
            Err(err) => warn!(attempt, error = %err, "Reconnect attempt failed"),
        }

        if attempt < settings.reconnect_retries {
            tokio::select! {
                _ = cancel.cancelled() => return false,
                _ = tokio::time::sleep(settings.reconnect_delay) => {}
            }
        }
    }
    false
}
