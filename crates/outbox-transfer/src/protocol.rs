//! Wire protocol for the data and heartbeat connections
//!
//! Data connection, client to server:
//!
//! ```text
//! FileName:<name>;Size:<decimal bytes>;\n
//! ```
//!
//! The server answers with exactly 8 bytes, a big-endian `u64` holding the
//! number of bytes it already has for `<name>`. The client then streams the
//! remainder as raw bytes and closes its write side.
//!
//! Heartbeat connection: the client writes [`PING_TOKEN`]; the server answers
//! with `PONG`, optionally followed by a line terminator.

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::TransferError;

/// Fixed 5-byte ping token
pub const PING_TOKEN: &[u8; 5] = b"PING\n";

/// Expected heartbeat answer, compared after trimming whitespace
pub const PONG_TOKEN: &str = "PONG";

/// Width of the resume offset
pub const OFFSET_LEN: usize = 8;

/// Builds the metadata header for a file
pub fn encode_header(name: &str, size: u64) -> Vec<u8> {
    format!("FileName:{name};Size:{size};\n").into_bytes()
}

/// Reads the server's resume offset
///
/// # Errors
/// - [`TransferError::ShortOffset`] if the stream ends before 8 bytes arrived
/// - [`TransferError::Io`] on a read failure
pub async fn read_offset<R>(reader: &mut R) -> Result<u64, TransferError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; OFFSET_LEN];
    let mut got = 0;
    while got < OFFSET_LEN {
        let n = reader.read(&mut buf[got..]).await?;
        if n == 0 {
            return Err(TransferError::ShortOffset { got });
        }
        got += n;
    }
    Ok(u64::from_be_bytes(buf))
}

/// Longest heartbeat answer accepted before giving up on finding a pong
const MAX_RESPONSE_LEN: usize = 64;

/// Reads one heartbeat answer
///
/// Leading whitespace (such as the terminator of the previous answer) is
/// skipped. The answer is complete at the first `\n` or once it holds as
/// many bytes as [`PONG_TOKEN`], whichever comes first, so a pong split
/// across segments is still recognised.
///
/// # Errors
/// - [`TransferError::ConnectionLost`] if the stream ends first
/// - [`TransferError::Io`] on a read failure
pub async fn read_response<R>(reader: &mut R) -> Result<Vec<u8>, TransferError>
where
    R: AsyncRead + Unpin,
{
    let mut response = Vec::new();
    let mut buf = [0u8; 16];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Err(TransferError::ConnectionLost);
        }
        response.extend_from_slice(&buf[..n]);

        if let Some(start) = response.iter().position(|b| !b.is_ascii_whitespace()) {
            let content = &response[start..];
            if let Some(end) = content.iter().position(|b| *b == b'\n') {
                return Ok(content[..end].to_vec());
            }
            if content.len() >= PONG_TOKEN.len() {
                return Ok(content.to_vec());
            }
        }
        if response.len() >= MAX_RESPONSE_LEN {
            return Ok(response);
        }
    }
}

/// Returns true if `response` is a pong
pub fn is_pong(response: &[u8]) -> bool {
    std::str::from_utf8(response)
        .map(|text| text.trim() == PONG_TOKEN)
        .unwrap_or(false)
}
