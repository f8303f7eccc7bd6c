//! [`IFileSender`] adapter over [`TransferClient`]

use std::path::Path;

use outbox_core::config::Config;
use outbox_core::ports::IFileSender;

use crate::client::{TransferClient, TransferSettings};

/// Creates a new [`TransferClient`] for every file it is asked to send
#[derive(Debug, Clone)]
pub struct TransferService {
    settings: TransferSettings,
}

impl TransferService {
    pub fn new(settings: TransferSettings) -> Self {
        Self { settings }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(TransferSettings::from_config(config))
    }

    pub fn settings(&self) -> &TransferSettings {
        &self.settings
    }
}

#[async_trait::async_trait]
impl IFileSender for TransferService {
    async fn send_file(&self, path: &Path) -> bool {
        TransferClient::with_settings(path, self.settings.clone())
            .send()
            .await
    }
}
