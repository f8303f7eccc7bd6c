//! Routing of single queued paths: vanish, evict, send, purge, order

use std::time::Duration;

use outbox_core::config::RestartPolicy;
use outbox_sync::{DispatchOutcome, Dispatcher};
use tempfile::TempDir;
use tokio::sync::mpsc;

use crate::common::{self, RecordingSender};

#[tokio::test]
async fn test_vanished_path_is_dropped_without_restart() {
    let dir = TempDir::new().unwrap();
    let sender = RecordingSender::succeeding();
    let mut service = common::service(
        dir.path(),
        1000,
        common::fast_settings(RestartPolicy::Always),
        sender.clone(),
    );

    let path = common::write_file(dir.path(), "gone.txt", 10);
    service.enqueue(path.clone());
    std::fs::remove_file(&path).unwrap();

    assert_eq!(service.process_next().await, Some(DispatchOutcome::Vanished));
    assert!(sender.calls().is_empty());
    assert_eq!(service.restart_count(), 0);
}

#[tokio::test]
async fn test_empty_queue_yields_nothing() {
    let dir = TempDir::new().unwrap();
    let mut service = common::service(
        dir.path(),
        1000,
        common::fast_settings(RestartPolicy::Always),
        RecordingSender::succeeding(),
    );
    assert_eq!(service.process_next().await, None);
}

#[tokio::test]
async fn test_arrival_over_limit_is_evicted_not_sent() {
    let dir = TempDir::new().unwrap();
    common::write_file(dir.path(), "resident.bin", 900);
    let sender = RecordingSender::succeeding();
    let mut service = common::service(
        dir.path(),
        1000,
        common::fast_settings(RestartPolicy::Always),
        sender.clone(),
    );

    let arrival = common::write_file(dir.path(), "arrival.bin", 200);
    service.enqueue(arrival.clone());

    assert_eq!(
        service.process_next().await,
        Some(DispatchOutcome::Evicted { deleted: true })
    );
    assert!(!arrival.exists());
    assert!(dir.path().join("resident.bin").exists());
    assert!(sender.calls().is_empty());
    assert_eq!(service.restart_count(), 1);
}

#[tokio::test]
async fn test_arrival_within_limit_is_sent_once() {
    let dir = TempDir::new().unwrap();
    let sender = RecordingSender::succeeding();
    let mut service = common::service(
        dir.path(),
        1000,
        common::fast_settings(RestartPolicy::Always),
        sender.clone(),
    );

    let arrival = common::write_file(dir.path(), "report.csv", 500);
    service.enqueue(arrival.clone());

    assert_eq!(service.process_next().await, Some(DispatchOutcome::Sent));
    assert_eq!(sender.calls(), vec![arrival.clone()]);
    assert!(arrival.exists());
    assert_eq!(service.restart_count(), 1);
    assert!(service.is_watching());
}

#[tokio::test]
async fn test_failed_send_is_abandoned_without_restart() {
    let dir = TempDir::new().unwrap();
    let sender = RecordingSender::failing();
    let mut service = common::service(
        dir.path(),
        1000,
        common::fast_settings(RestartPolicy::Always),
        sender.clone(),
    );

    service.enqueue(common::write_file(dir.path(), "a.txt", 5));

    assert_eq!(service.process_next().await, Some(DispatchOutcome::SendFailed));
    assert_eq!(sender.calls().len(), 1);
    assert_eq!(service.restart_count(), 0);
    assert_eq!(service.process_next().await, None);
}

#[tokio::test]
async fn test_failed_send_restarts_under_on_failure_policy() {
    let dir = TempDir::new().unwrap();
    let mut service = common::service(
        dir.path(),
        1000,
        common::fast_settings(RestartPolicy::OnFailure),
        RecordingSender::failing(),
    );

    service.enqueue(common::write_file(dir.path(), "a.txt", 5));

    assert_eq!(service.process_next().await, Some(DispatchOutcome::SendFailed));
    assert_eq!(service.restart_count(), 1);
}

#[tokio::test]
async fn test_directory_is_purged_and_notifier_restarted() {
    let dir = TempDir::new().unwrap();
    let folder = dir.path().join("tmp123");
    std::fs::create_dir_all(folder.join("nested")).unwrap();
    std::fs::write(folder.join("nested").join("inner.txt"), b"data").unwrap();

    let sender = RecordingSender::succeeding();
    let mut service = common::service(
        dir.path(),
        1000,
        common::fast_settings(RestartPolicy::Always),
        sender.clone(),
    );
    service.enqueue(folder.clone());

    assert_eq!(
        service.process_next().await,
        Some(DispatchOutcome::Purged { deleted: true })
    );
    assert!(!folder.exists());
    assert!(sender.calls().is_empty());
    assert_eq!(service.restart_count(), 1);
}

#[tokio::test]
async fn test_queue_is_processed_in_arrival_order() {
    let dir = TempDir::new().unwrap();
    let sender = RecordingSender::succeeding();
    let mut service = common::service(
        dir.path(),
        10_000,
        common::fast_settings(RestartPolicy::OnFailure),
        sender.clone(),
    );

    let paths: Vec<_> = ["first", "second", "third"]
        .iter()
        .map(|name| common::write_file(dir.path(), name, 16))
        .collect();
    for path in &paths {
        service.enqueue(path.clone());
    }

    while service.process_next().await.is_some() {}

    assert_eq!(sender.calls(), paths);
    assert_eq!(service.restart_count(), 0);
}

#[tokio::test]
async fn test_growing_file_is_requeued_at_tail() {
    let dir = TempDir::new().unwrap();
    let sender = RecordingSender::succeeding();
    let mut settings = common::fast_settings(RestartPolicy::Always);
    settings.stability_check = Some(Duration::from_millis(300));

    let (tx, mut rx) = mpsc::unbounded_channel();
    let dispatcher = Dispatcher::new(
        settings,
        common::enforcer(dir.path(), 10_000),
        sender.clone(),
        tx,
    );

    let path = common::write_file(dir.path(), "growing.log", 10);
    let writer_path = path.clone();
    let writer = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        std::fs::write(&writer_path, vec![b'y'; 20]).unwrap();
    });

    assert_eq!(dispatcher.dispatch(&path).await, DispatchOutcome::Unstable);
    writer.await.unwrap();

    assert_eq!(rx.try_recv().unwrap(), path);
    assert!(sender.calls().is_empty());

    assert_eq!(dispatcher.dispatch(&path).await, DispatchOutcome::Sent);
    assert_eq!(sender.calls(), vec![path]);
}

#[test]
fn test_dispatcher_is_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Dispatcher>();
}
