//! Header, resume offset and streaming behavior

use std::sync::atomic::Ordering;
use std::time::Duration;

use outbox_core::ports::IFileSender;
use outbox_transfer::client::TransferClient;
use outbox_transfer::{TransferError, TransferService};
use tempfile::TempDir;

use crate::common::{self, Behavior, FakeServer, OffsetReply};

fn source(dir: &TempDir, name: &str, len: usize) -> (std::path::PathBuf, Vec<u8>) {
    let bytes = common::pattern(len);
    let path = dir.path().join(name);
    std::fs::write(&path, &bytes).unwrap();
    (path, bytes)
}

#[tokio::test]
async fn test_fresh_file_is_streamed_completely() {
    let dir = TempDir::new().unwrap();
    let (path, bytes) = source(&dir, "report.csv", 500);
    let server = FakeServer::start(Behavior::offset(0)).await;

    let session = TransferClient::with_settings(&path, server.settings())
        .send_session()
        .await
        .unwrap();

    assert!(session.sent);
    assert_eq!(session.size, 500);
    assert_eq!(session.server_offset, 0);
    assert_eq!(session.bytes_streamed, 500);
    assert_eq!(session.attempts, 1);

    assert_eq!(server.recorded.headers(), vec!["FileName:report.csv;Size:500;"]);
    let bodies = server.recorded.wait_for_bodies(1).await;
    assert_eq!(bodies[0], bytes);
}

#[tokio::test]
async fn test_transfer_resumes_from_server_offset() {
    let dir = TempDir::new().unwrap();
    let (path, bytes) = source(&dir, "video.bin", 3000);
    let server = FakeServer::start(Behavior::offset(1200)).await;

    let session = TransferClient::with_settings(&path, server.settings())
        .send_session()
        .await
        .unwrap();

    assert!(session.sent);
    assert_eq!(session.server_offset, 1200);
    assert_eq!(session.bytes_streamed, 3000 - 1200);

    let bodies = server.recorded.wait_for_bodies(1).await;
    assert_eq!(bodies[0], bytes[1200..]);

    let mut reassembled = bytes[..1200].to_vec();
    reassembled.extend_from_slice(&bodies[0]);
    assert_eq!(reassembled, bytes);
}

#[tokio::test]
async fn test_complete_file_streams_nothing() {
    let dir = TempDir::new().unwrap();
    let (path, _) = source(&dir, "done.bin", 700);
    let server = FakeServer::start(Behavior::offset(700)).await;

    let session = TransferClient::with_settings(&path, server.settings())
        .send_session()
        .await
        .unwrap();

    assert!(session.sent);
    assert_eq!(session.bytes_streamed, 0);
    let bodies = server.recorded.wait_for_bodies(1).await;
    assert!(bodies[0].is_empty());
}

#[tokio::test]
async fn test_short_offset_fails_every_attempt() {
    let dir = TempDir::new().unwrap();
    let (path, _) = source(&dir, "a.bin", 100);
    let server = FakeServer::start(Behavior {
        reply: OffsetReply::Truncated(vec![0, 0, 0]),
        ..Behavior::offset(0)
    })
    .await;

    let mut settings = server.settings();
    settings.max_attempts = 2;

    match TransferClient::with_settings(&path, settings).send_session().await {
        Err(TransferError::Exhausted { attempts, last }) => {
            assert_eq!(attempts, 2);
            assert!(matches!(*last, TransferError::ShortOffset { got: 3 }));
        }
        other => panic!("expected Exhausted, got {other:?}"),
    }
    assert_eq!(server.recorded.headers().len(), 2);
}

#[tokio::test]
async fn test_offset_beyond_end_is_a_protocol_violation() {
    let dir = TempDir::new().unwrap();
    let (path, _) = source(&dir, "small.bin", 10);
    let server = FakeServer::start(Behavior::offset(11)).await;

    match TransferClient::with_settings(&path, server.settings()).send_session().await {
        Err(TransferError::Exhausted { last, .. }) => {
            assert!(matches!(*last, TransferError::OffsetBeyondEnd { offset: 11, size: 10 }));
        }
        other => panic!("expected Exhausted, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unreachable_server_exhausts_attempts() {
    let dir = TempDir::new().unwrap();
    let (path, _) = source(&dir, "a.bin", 10);
    let server = FakeServer::start(Behavior::offset(0)).await;
    let mut settings = server.settings();
    drop(server);

    // Point at a port nothing listens on
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    settings.endpoints.data = listener.local_addr().unwrap();
    drop(listener);
    settings.max_attempts = 3;

    let started = tokio::time::Instant::now();
    match TransferClient::with_settings(&path, settings).send_session().await {
        Err(TransferError::Exhausted { attempts, last }) => {
            assert_eq!(attempts, 3);
            assert!(matches!(*last, TransferError::Connect { .. }));
        }
        other => panic!("expected Exhausted, got {other:?}"),
    }
    // Two inter-attempt delays
    assert!(started.elapsed() >= Duration::from_millis(20));
}

#[tokio::test]
async fn test_service_sends_through_port() {
    let dir = TempDir::new().unwrap();
    let (path, bytes) = source(&dir, "port.bin", 2048);
    let server = FakeServer::start(Behavior::offset(0)).await;

    let service = TransferService::new(server.settings());
    assert!(service.send_file(&path).await);

    let bodies = server.recorded.wait_for_bodies(1).await;
    assert_eq!(bodies[0], bytes);
}

#[tokio::test]
async fn test_interrupted_upload_resumes_on_next_attempt() {
    let dir = TempDir::new().unwrap();
    let (path, bytes) = source(&dir, "archive.tar", 32 << 20);
    let cut = 4096;
    let server = FakeServer::start(Behavior::resume(cut)).await;
    let mut settings = server.settings();
    settings.chunk_size = 64 * 1024;
    settings.max_attempts = 2;

    let session = TransferClient::with_settings(&path, settings)
        .send_session()
        .await
        .unwrap();

    assert!(session.sent);
    assert_eq!(session.attempts, 2);
    assert_eq!(session.server_offset, cut as u64);
    assert_eq!(session.bytes_streamed, bytes.len() as u64 - cut as u64);

    let bodies = server.recorded.wait_for_bodies(1).await;
    let mut reassembled = server.recorded.stored();
    assert_eq!(reassembled.len(), cut);
    reassembled.extend_from_slice(&bodies[0]);
    assert!(reassembled == bytes, "stored prefix plus resumed body equals the source");
    assert_eq!(server.recorded.data_connections.load(Ordering::SeqCst), 2);
}
