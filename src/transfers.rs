//! Transfer tracking driven by backend push events

use crate::error::AppResult;
use crate::sftp::{
    paths, BackendEvent, DirectorySizeCompleted, SftpBackend, TransferCancelled, TransferFinished, TransferKind,
    TransferProgress,
};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Grace period before a completed record disappears when auto-clear is on
pub const AUTO_CLEAR_DELAY: Duration = Duration::from_secs(2);

const MAX_NOTICES: usize = 50;

/// Narrow view of the tab engine that a finished upload needs
#[async_trait]
pub trait TabReloader: Send + Sync {
    /// Reload every tab whose current path equals `path`
    async fn reload_tabs_matching_path(&self, path: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    Active,
    Cancelled,
    Completed,
}

/// Client-side mirror of one backend transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRecord {
    pub transfer_id: String,
    pub connection_id: String,
    pub path: String,
    pub transferred: u64,
    pub total: u64,
    #[serde(rename = "type")]
    pub kind: TransferKind,
    pub status: TransferStatus,
}

impl TransferRecord {
    /// Completion ratio in `[0, 1]`; zero when the total is unknown
    pub fn progress(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.transferred as f64 / self.total as f64).min(1.0)
        }
    }
}

/// User-facing notifications raised while tracking
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferNotice {
    Started { transfer_id: String },
    Cancelled { transfer_id: String },
    Completed { transfer_id: String, file_name: String },
}

pub struct TransferTracker {
    backend: Arc<dyn SftpBackend>,
    reloader: Arc<dyn TabReloader>,
    records: Arc<RwLock<Vec<TransferRecord>>>,
    directory_sizes: DashMap<String, DirectorySizeCompleted>,
    notices: RwLock<VecDeque<TransferNotice>>,
    auto_clear_success: RwLock<bool>,
}

impl TransferTracker {
    pub fn new(backend: Arc<dyn SftpBackend>, reloader: Arc<dyn TabReloader>, auto_clear_success: bool) -> Self {
        Self {
            backend,
            reloader,
            records: Arc::new(RwLock::new(Vec::new())),
            directory_sizes: DashMap::new(),
            notices: RwLock::new(VecDeque::new()),
            auto_clear_success: RwLock::new(auto_clear_success),
        }
    }

    pub fn set_auto_clear_success(&self, enabled: bool) {
        *self.auto_clear_success.write() = enabled;
    }

    /// Consume events until every sender is dropped
    pub async fn run(&self, mut rx: mpsc::Receiver<BackendEvent>) {
        while let Some(event) = rx.recv().await {
            self.handle_event(event).await;
        }
        tracing::debug!("Backend event channel closed");
    }

    pub async fn handle_event(&self, event: BackendEvent) {
        match event {
            BackendEvent::UploadProgress(progress) | BackendEvent::DownloadProgress(progress) => {
                self.on_progress(progress)
            }
            BackendEvent::TransferCancelled(cancelled) => self.on_cancelled(cancelled),
            BackendEvent::TransferFinished(finished) => self.on_finished(finished).await,
            BackendEvent::DirectorySizeCompleted(done) => self.on_directory_size(done),
        }
    }

    /// Upsert keyed by transfer id
    fn on_progress(&self, progress: TransferProgress) {
        let created = {
            let mut records = self.records.write();
            match records.iter_mut().find(|r| r.transfer_id == progress.transfer_id) {
                Some(record) => {
                    record.transferred = progress.transferred;
                    record.total = progress.total;
                    record.path = progress.path;
                    record.connection_id = progress.connection_id;
                    false
                }
                None => {
                    records.push(TransferRecord {
                        transfer_id: progress.transfer_id.clone(),
                        connection_id: progress.connection_id,
                        path: progress.path,
                        transferred: progress.transferred,
                        total: progress.total,
                        kind: progress.kind,
                        status: TransferStatus::Active,
                    });
                    true
                }
            }
        };

        if created {
            tracing::info!("Tracking {:?} transfer {}", progress.kind, progress.transfer_id);
            self.notify(TransferNotice::Started {
                transfer_id: progress.transfer_id,
            });
        }
    }

    fn on_cancelled(&self, cancelled: TransferCancelled) {
        self.set_status(&cancelled.transfer_id, TransferStatus::Cancelled);
        tracing::info!("Transfer {} cancelled", cancelled.transfer_id);
        self.notify(TransferNotice::Cancelled {
            transfer_id: cancelled.transfer_id,
        });
    }

    async fn on_finished(&self, finished: TransferFinished) {
        self.set_status(&finished.transfer_id, TransferStatus::Completed);
        tracing::info!("Transfer {} finished: {}", finished.transfer_id, finished.path);

        if *self.auto_clear_success.read() {
            let records = Arc::clone(&self.records);
            let transfer_id = finished.transfer_id.clone();
            tokio::spawn(async move {
                tokio::time::sleep(AUTO_CLEAR_DELAY).await;
                records.write().retain(|r| r.transfer_id != transfer_id);
            });
        }

        if finished.kind == TransferKind::Download {
            return;
        }

        if let Some(file_name) = paths::last_segment(&finished.path) {
            self.notify(TransferNotice::Completed {
                transfer_id: finished.transfer_id.clone(),
                file_name: file_name.to_string(),
            });
        }

        let directory = paths::parent_path(&finished.path);
        self.reloader.reload_tabs_matching_path(&directory).await;
    }

    fn on_directory_size(&self, done: DirectorySizeCompleted) {
        if done.success {
            tracing::debug!("Size of {} is {:?}", done.path, done.size);
        } else {
            tracing::warn!("Size of {} failed: {:?}", done.path, done.error);
        }
        self.directory_sizes.insert(done.operation_id.clone(), done);
    }

    fn set_status(&self, transfer_id: &str, status: TransferStatus) {
        let mut records = self.records.write();
        match records.iter_mut().find(|r| r.transfer_id == transfer_id) {
            Some(record) => record.status = status,
            None => tracing::debug!("Status {:?} for untracked transfer {}", status, transfer_id),
        }
    }

    fn notify(&self, notice: TransferNotice) {
        let mut notices = self.notices.write();
        notices.push_back(notice);
        while notices.len() > MAX_NOTICES {
            notices.pop_front();
        }
    }

    /// Ask the backend to stop a transfer. The record only changes when the
    /// cancellation event comes back.
    pub async fn cancel(&self, transfer_id: &str) -> AppResult<()> {
        self.backend.cancel_transfer(transfer_id).await
    }

    pub fn remove(&self, transfer_id: &str) {
        self.records.write().retain(|r| r.transfer_id != transfer_id);
    }

    pub fn processes(&self) -> Vec<TransferRecord> {
        self.records.read().clone()
    }

    pub fn get(&self, transfer_id: &str) -> Option<TransferRecord> {
        self.records
            .read()
            .iter()
            .find(|r| r.transfer_id == transfer_id)
            .cloned()
    }

    /// Number of transfers still running, for the badge
    pub fn active_count(&self) -> usize {
        self.records
            .read()
            .iter()
            .filter(|r| r.status == TransferStatus::Active)
            .count()
    }

    pub fn drain_notices(&self) -> Vec<TransferNotice> {
        self.notices.write().drain(..).collect()
    }

    pub fn directory_size(&self, operation_id: &str) -> Option<DirectorySizeCompleted> {
        self.directory_sizes.get(operation_id).map(|d| d.value().clone())
    }

    pub fn take_directory_size(&self, operation_id: &str) -> Option<DirectorySizeCompleted> {
        self.directory_sizes.remove(operation_id).map(|(_, d)| d)
    }
}
