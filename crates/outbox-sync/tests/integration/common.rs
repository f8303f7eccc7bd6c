//! Shared test helpers for dispatcher integration tests

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use outbox_core::config::RestartPolicy;
use outbox_core::ports::IFileSender;
use outbox_sync::{DispatchSettings, RetentionEnforcer, RetentionPolicy, WatchService};

/// Fake sender that records every path it is asked to send
pub struct RecordingSender {
    calls: Mutex<Vec<PathBuf>>,
    succeed: AtomicBool,
}

impl RecordingSender {
    pub fn succeeding() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            succeed: AtomicBool::new(true),
        })
    }

    pub fn failing() -> Arc<Self> {
        let sender = Self::succeeding();
        sender.succeed.store(false, Ordering::SeqCst);
        sender
    }

    pub fn calls(&self) -> Vec<PathBuf> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl IFileSender for RecordingSender {
    async fn send_file(&self, path: &Path) -> bool {
        self.calls.lock().unwrap().push(path.to_path_buf());
        self.succeed.load(Ordering::SeqCst)
    }
}

/// Settings with short delays so tests stay fast
pub fn fast_settings(policy: RestartPolicy) -> DispatchSettings {
    DispatchSettings {
        idle_delay: Duration::from_millis(10),
        restart_policy: policy,
        delete_retries: 3,
        folder_delete_delay: Duration::from_millis(10),
        stability_check: None,
    }
}

pub fn enforcer(folder: &Path, limit: u64) -> RetentionEnforcer {
    RetentionEnforcer::new(
        RetentionPolicy::new(folder, limit),
        Duration::from_millis(10),
    )
}

pub fn service(
    folder: &Path,
    limit: u64,
    settings: DispatchSettings,
    sender: Arc<RecordingSender>,
) -> WatchService {
    WatchService::with_settings(folder.to_path_buf(), settings, enforcer(folder, limit), sender)
}

/// Writes `size` bytes into `folder/name` and returns the full path
pub fn write_file(folder: &Path, name: &str, size: usize) -> PathBuf {
    let path = folder.join(name);
    std::fs::write(&path, vec![b'x'; size]).unwrap();
    path
}
