//! Fake transfer server for integration tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use outbox_transfer::client::TransferSettings;
use outbox_transfer::heartbeat::HeartbeatSettings;
use outbox_transfer::link::Endpoints;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

/// What the data port answers after reading the header
#[derive(Debug, Clone)]
pub enum OffsetReply {
    /// A well-formed big-endian offset
    Offset(u64),
    /// Raw bytes followed by closing the connection
    Truncated(Vec<u8>),
    /// Answers with the length of the stored prefix; the first connection
    /// stores `cut_after` body bytes and drops, later ones read to the end
    Resume { cut_after: usize },
}

#[derive(Debug, Clone)]
pub struct Behavior {
    pub reply: OffsetReply,
    /// Pause before answering the header
    pub reply_delay: Duration,
    /// Whether the ping port answers with PONG
    pub pong: bool,
    /// Whether the data port reads the body; otherwise the stream is held
    /// open unread
    pub read_body: bool,
}

impl Behavior {
    pub fn offset(offset: u64) -> Self {
        Self {
            reply: OffsetReply::Offset(offset),
            reply_delay: Duration::ZERO,
            pong: true,
            read_body: true,
        }
    }

    pub fn resume(cut_after: usize) -> Self {
        Self {
            reply: OffsetReply::Resume { cut_after },
            ..Self::offset(0)
        }
    }
}

/// Observations recorded by the fake server
#[derive(Default)]
pub struct Recorded {
    pub headers: Mutex<Vec<String>>,
    /// Bytes received after the header, one entry per finished data connection
    pub bodies: Mutex<Vec<Vec<u8>>>,
    /// Prefix kept from an interrupted upload
    pub stored: Mutex<Vec<u8>>,
    pub data_connections: AtomicUsize,
    pub ping_connections: AtomicUsize,
}

impl Recorded {
    pub fn headers(&self) -> Vec<String> {
        self.headers.lock().unwrap().clone()
    }

    pub fn bodies(&self) -> Vec<Vec<u8>> {
        self.bodies.lock().unwrap().clone()
    }

    pub fn stored(&self) -> Vec<u8> {
        self.stored.lock().unwrap().clone()
    }

    /// Waits until `count` bodies have been recorded
    pub async fn wait_for_bodies(&self, count: usize) -> Vec<Vec<u8>> {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let bodies = self.bodies();
                if bodies.len() >= count {
                    return bodies;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("server received data within timeout")
    }
}

pub struct FakeServer {
    pub endpoints: Endpoints,
    pub recorded: Arc<Recorded>,
}

impl FakeServer {
    pub async fn start(behavior: Behavior) -> Self {
        let data = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let ping = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoints = Endpoints {
            data: data.local_addr().unwrap(),
            ping: ping.local_addr().unwrap(),
        };
        let recorded = Arc::new(Recorded::default());

        {
            let recorded = recorded.clone();
            let behavior = behavior.clone();
            tokio::spawn(async move {
                while let Ok((stream, _)) = data.accept().await {
                    recorded.data_connections.fetch_add(1, Ordering::SeqCst);
                    tokio::spawn(serve_data(stream, behavior.clone(), recorded.clone()));
                }
            });
        }

        {
            let recorded = recorded.clone();
            tokio::spawn(async move {
                let mut silent = Vec::new();
                while let Ok((stream, _)) = ping.accept().await {
                    recorded.ping_connections.fetch_add(1, Ordering::SeqCst);
                    if behavior.pong {
                        tokio::spawn(serve_ping(stream));
                    } else {
                        silent.push(stream);
                    }
                }
            });
        }

        Self {
            endpoints,
            recorded,
        }
    }

    /// Settings with short timeouts for this server
    pub fn settings(&self) -> TransferSettings {
        TransferSettings {
            endpoints: self.endpoints,
            chunk_size: 512,
            settle_delay: Duration::from_millis(10),
            response_timeout: Duration::from_secs(2),
            connect_timeout: Duration::from_secs(1),
            max_attempts: 1,
            retry_delay: Duration::from_millis(10),
            heartbeat: HeartbeatSettings {
                interval: Duration::from_millis(50),
                pong_timeout: Duration::from_millis(500),
                reconnect_retries: 3,
                reconnect_delay: Duration::from_millis(10),
            },
        }
    }
}

async fn serve_data(stream: TcpStream, behavior: Behavior, recorded: Arc<Recorded>) {
    let mut reader = BufReader::new(stream);
    let mut header = String::new();
    match reader.read_line(&mut header).await {
        Ok(0) | Err(_) => return,
        Ok(_) => {}
    }
    recorded
        .headers
        .lock()
        .unwrap()
        .push(header.trim_end().to_string());

    tokio::time::sleep(behavior.reply_delay).await;

    match behavior.reply {
        OffsetReply::Offset(offset) => {
            if reader.get_mut().write_all(&offset.to_be_bytes()).await.is_err() {
                return;
            }
        }
        OffsetReply::Truncated(bytes) => {
            let _ = reader.get_mut().write_all(&bytes).await;
            return;
        }
        OffsetReply::Resume { cut_after } => {
            let held = recorded.stored.lock().unwrap().len();
            if reader.get_mut().write_all(&(held as u64).to_be_bytes()).await.is_err() {
                return;
            }
            if held == 0 {
                let mut prefix = vec![0u8; cut_after];
                if reader.read_exact(&mut prefix).await.is_ok() {
                    *recorded.stored.lock().unwrap() = prefix;
                }
                return;
            }
        }
    }

    if !behavior.read_body {
        let _held_open = reader;
        std::future::pending::<()>().await;
        return;
    }

    let mut body = Vec::new();
    let _ = reader.read_to_end(&mut body).await;
    recorded.bodies.lock().unwrap().push(body);
}

async fn serve_ping(mut stream: TcpStream) {
    let mut buf = [0u8; 5];
    while stream.read_exact(&mut buf).await.is_ok() {
        if &buf != b"PING\n" || stream.write_all(b"PONG\n").await.is_err() {
            break;
        }
    }
}

/// Deterministic, non-repeating-looking file content
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}
