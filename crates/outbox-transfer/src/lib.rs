//! Outbox Transfer - Resumable file transfer over TCP
//!
//! Provides:
//! - The metadata header / resume offset wire protocol
//! - A data + heartbeat connection pair with atomic replacement
//! - A heartbeat loop that reconnects both connections on a lost pong
//! - A transfer client with bounded attempt-level retries
//!
//! ## Modules
//!
//! - [`protocol`] - Header encoding, offset decoding, ping/pong tokens
//! - [`link`] - Connection pair and the shared current-pair slot
//! - [`heartbeat`] - Ping loop and reconnect procedure
//! - [`client`] - One file, many attempts, one boolean outcome
//! - [`service`] - [`IFileSender`](outbox_core::ports::IFileSender) adapter

pub mod client;
pub mod heartbeat;
pub mod link;
pub mod protocol;
pub mod service;

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

pub use client::{TransferClient, TransferSession};
pub use service::TransferService;

/// Errors that can occur during a single transfer attempt
#[derive(Debug, Error)]
pub enum TransferError {
    /// A TCP connection could not be established
    #[error("Failed to connect to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// The server closed the data connection before sending all 8 offset bytes
    #[error("Short resume offset: got {got} of 8 bytes")]
    ShortOffset {
        /// Number of bytes received before EOF
        got: usize,
    },

    /// The server reported holding more bytes than the local file has
    #[error("Server offset {offset} exceeds local file size {size}")]
    OffsetBeyondEnd { offset: u64, size: u64 },

    /// The heartbeat answered with something other than a pong
    #[error("Unexpected heartbeat response: {0:?}")]
    UnexpectedPong(String),

    /// The connection pair was closed or replaced mid-transfer
    #[error("Connection lost")]
    ConnectionLost,

    /// An operation did not complete within its deadline
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// An I/O error occurred on a socket or the local file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Every attempt failed
    #[error("Transfer failed after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        /// Error of the final attempt
        last: Box<TransferError>,
    },
}
