//! Data and heartbeat connections, replaced as a unit
//!
//! A [`ConnectionPair`] bundles the data connection and the heartbeat
//! connection of one session generation. The [`Link`] holds the current
//! pair; a reconnect builds a complete new pair first and only then swaps
//! it in, so neither loop can ever observe a half-replaced pair.
//!
//! ## Ownership
//!
//! ```text
//!        Link { current: Arc<ConnectionPair> }
//!          ▲                         ▲
//!   data loop (holds data lock)   heartbeat (holds ping lock per tick)
//! ```

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use outbox_core::config::TransferConfig;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::TransferError;

// ============================================================================
// Endpoints
// ============================================================================

/// Fixed server addresses for the two connections
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoints {
    pub data: SocketAddr,
    pub ping: SocketAddr,
}

impl Endpoints {
    pub fn from_config(config: &TransferConfig) -> Self {
        Self {
            data: SocketAddr::new(config.server_ip, config.file_port),
            ping: SocketAddr::new(config.server_ip, config.ping_port),
        }
    }
}

// ============================================================================
// ConnectionPair
// ============================================================================

/// One generation of data + heartbeat connections
#[derive(Debug)]
pub struct ConnectionPair {
    id: u64,
    data: Mutex<TcpStream>,
    ping: Mutex<TcpStream>,
    alive: AtomicBool,
    /// Fired when the pair is marked dead; wakes operations blocked on a socket
    closed: CancellationToken,
}

impl ConnectionPair {
    /// Opens the data connection, then the heartbeat connection
    pub async fn connect(
        id: u64,
        endpoints: Endpoints,
        connect_timeout: Duration,
    ) -> Result<Self, TransferError> {
        let data = connect_one(endpoints.data, connect_timeout).await?;
        let ping = connect_one(endpoints.ping, connect_timeout).await?;
        debug!(pair = id, "Connection pair established");
        Ok(Self {
            id,
            data: Mutex::new(data),
            ping: Mutex::new(ping),
            alive: AtomicBool::new(true),
            closed: CancellationToken::new(),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    pub fn mark_dead(&self) {
        self.alive.store(false, Ordering::SeqCst);
        self.closed.cancel();
    }

    /// Token cancelled once the pair is dead
    pub fn closed(&self) -> &CancellationToken {
        &self.closed
    }

    /// Exclusive access to the data connection
    pub async fn data(&self) -> MutexGuard<'_, TcpStream> {
        self.data.lock().await
    }

    /// Exclusive access to the heartbeat connection
    pub async fn ping(&self) -> MutexGuard<'_, TcpStream> {
        self.ping.lock().await
    }

    /// Marks the pair dead and shuts both connections down
    ///
    /// A data connection locked by an in-progress transfer is released by
    /// that transfer: every data-socket operation races against
    /// [`closed`](ConnectionPair::closed) and aborts when it fires.
    pub async fn close(&self) {
        self.mark_dead();
        let _ = self.ping.lock().await.shutdown().await;
        if let Ok(mut data) = self.data.try_lock() {
            let _ = data.shutdown().await;
        }
        debug!(pair = self.id, "Connection pair closed");
    }
}

async fn connect_one(addr: SocketAddr, timeout: Duration) -> Result<TcpStream, TransferError> {
    match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => {
            let _ = stream.set_nodelay(true);
            Ok(stream)
        }
        Ok(Err(source)) => Err(TransferError::Connect { addr, source }),
        Err(_) => Err(TransferError::Timeout(timeout)),
    }
}

// ============================================================================
// Link
// ============================================================================

/// Slot holding the current connection pair of one transfer attempt
#[derive(Debug)]
pub struct Link {
    endpoints: Endpoints,
    connect_timeout: Duration,
    current: Mutex<Arc<ConnectionPair>>,
    next_id: AtomicU64,
    reconnects: AtomicU32,
}

impl Link {
    /// Opens the first connection pair
    pub async fn open(endpoints: Endpoints, connect_timeout: Duration) -> Result<Self, TransferError> {
        let pair = ConnectionPair::connect(0, endpoints, connect_timeout).await?;
        Ok(Self {
            endpoints,
            connect_timeout,
            current: Mutex::new(Arc::new(pair)),
            next_id: AtomicU64::new(1),
            reconnects: AtomicU32::new(0),
        })
    }

    pub async fn current(&self) -> Arc<ConnectionPair> {
        self.current.lock().await.clone()
    }

    /// Returns true if `pair` is still installed and alive
    pub async fn is_current(&self, pair: &Arc<ConnectionPair>) -> bool {
        pair.is_alive() && Arc::ptr_eq(&*self.current.lock().await, pair)
    }

    /// Builds a fresh pair and installs it in place of the current one
    ///
    /// The old pair is not touched; callers close it before replacing.
    pub async fn replace(&self) -> Result<Arc<ConnectionPair>, TransferError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let pair = Arc::new(ConnectionPair::connect(id, self.endpoints, self.connect_timeout).await?);

        let previous = std::mem::replace(&mut *self.current.lock().await, pair.clone());
        previous.mark_dead();
        let reconnects = self.reconnects.fetch_add(1, Ordering::SeqCst) + 1;
        info!(pair = id, reconnects, "Connection pair replaced");
        Ok(pair)
    }

    /// Number of successful replacements so far
    pub fn reconnect_count(&self) -> u32 {
        self.reconnects.load(Ordering::SeqCst)
    }

    /// Closes the current pair
    pub async fn close(&self) {
        self.current().await.close().await;
    }
}
