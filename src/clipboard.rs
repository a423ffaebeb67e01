//! Copy/cut queue and paste orchestration

use crate::error::{AppError, AppResult};
use crate::logging::sanitize;
use crate::session::SessionManager;
use crate::sftp::{paths, FileItem};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Oldest items are evicted past this many
pub const MAX_CLIPBOARD_ITEMS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClipboardAction {
    Copy,
    Cut,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClipboardStatus {
    #[default]
    Pending,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipboardItem {
    pub id: String,
    pub file: FileItem,
    pub session_id: String,
    pub action: ClipboardAction,
    #[serde(default)]
    pub status: ClipboardStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// On-disk shape of `clipboard.json`
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ClipboardFile {
    #[serde(default)]
    pub items: Vec<ClipboardItem>,
}

/// Per-item outcome counts of one paste
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PasteSummary {
    pub succeeded: usize,
    pub failed: usize,
}

/// Destination of `file` pasted into `dir`
pub fn destination_path(dir: &str, file: &FileItem) -> String {
    let name = if file.name.is_empty() {
        paths::base_name(&file.path)
    } else {
        file.name.as_str()
    };
    paths::join(dir, name)
}

pub struct Clipboard {
    sessions: Arc<SessionManager>,
    items: RwLock<Vec<ClipboardItem>>,
}

impl Clipboard {
    pub fn new(sessions: Arc<SessionManager>, file: ClipboardFile) -> Self {
        let mut items = file.items;
        if items.len() > MAX_CLIPBOARD_ITEMS {
            items.drain(..items.len() - MAX_CLIPBOARD_ITEMS);
        }
        Self {
            sessions,
            items: RwLock::new(items),
        }
    }

    pub fn export(&self) -> ClipboardFile {
        ClipboardFile {
            items: self.items.read().clone(),
        }
    }

    /// Queue a file and return the item id
    pub fn add_item(&self, file: FileItem, session_id: &str, action: ClipboardAction) -> String {
        let id = Uuid::new_v4().to_string();
        let mut items = self.items.write();
        items.push(ClipboardItem {
            id: id.clone(),
            file,
            session_id: session_id.to_string(),
            action,
            status: ClipboardStatus::Pending,
            error: None,
        });
        if items.len() > MAX_CLIPBOARD_ITEMS {
            let evicted = items.remove(0);
            tracing::debug!("Clipboard full, evicted {}", evicted.id);
        }
        id
    }

    pub fn copy(&self, file: FileItem, session_id: &str) -> String {
        self.add_item(file, session_id, ClipboardAction::Copy)
    }

    pub fn cut(&self, file: FileItem, session_id: &str) -> String {
        self.add_item(file, session_id, ClipboardAction::Cut)
    }

    pub fn remove_item(&self, id: &str) -> bool {
        let mut items = self.items.write();
        let before = items.len();
        items.retain(|i| i.id != id);
        items.len() != before
    }

    pub fn clear(&self) {
        self.items.write().clear();
    }

    pub fn clear_session(&self, session_id: &str) {
        self.items.write().retain(|i| i.session_id != session_id);
    }

    pub fn items(&self) -> Vec<ClipboardItem> {
        self.items.read().clone()
    }

    pub fn items_for_session(&self, session_id: &str) -> Vec<ClipboardItem> {
        self.items
            .read()
            .iter()
            .filter(|i| i.session_id == session_id)
            .cloned()
            .collect()
    }

    /// Pending action queued for a path, so views can dim cut entries
    pub fn action_for(&self, session_id: &str, path: &str) -> Option<ClipboardAction> {
        self.items
            .read()
            .iter()
            .rev()
            .find(|i| i.session_id == session_id && i.file.path == path && i.status == ClipboardStatus::Pending)
            .map(|i| i.action)
    }

    /// Paste every pending item of `session_id` into `path`.
    ///
    /// Items run one after another and each gets its own terminal status; a
    /// failure never stops the batch. Items stay queued afterwards.
    pub async fn paste(&self, session_id: &str, path: &str) -> AppResult<PasteSummary> {
        let connection_id = self
            .sessions
            .connection_id(session_id)
            .ok_or_else(|| AppError::NoActiveConnection(session_id.to_string()))?;

        let pending: Vec<ClipboardItem> = self
            .items
            .read()
            .iter()
            .filter(|i| i.session_id == session_id && i.status == ClipboardStatus::Pending)
            .cloned()
            .collect();

        let backend = self.sessions.backend();
        let mut summary = PasteSummary::default();

        for item in pending {
            let destination = destination_path(path, &item.file);
            let result = match item.action {
                ClipboardAction::Cut => backend.move_item(&connection_id, &item.file.path, &destination).await,
                ClipboardAction::Copy => {
                    backend
                        .copy_item(&connection_id, &item.file.path, &destination, item.file.is_directory)
                        .await
                }
            };

            let (status, error) = match result {
                Ok(()) => {
                    summary.succeeded += 1;
                    tracing::debug!("{:?} {} -> {}", item.action, item.file.path, destination);
                    (ClipboardStatus::Success, None)
                }
                Err(e) => {
                    summary.failed += 1;
                    tracing::warn!("Paste of {} failed: {}", item.file.path, e);
                    (ClipboardStatus::Error, Some(sanitize(&e.to_string())))
                }
            };

            {
                let mut items = self.items.write();
                if let Some(queued) = items.iter_mut().find(|i| i.id == item.id) {
                    queued.status = status;
                    queued.error = error;
                }
            }
        }

        tracing::info!(
            "Pasted into {}: {} succeeded, {} failed",
            path,
            summary.succeeded,
            summary.failed
        );
        Ok(summary)
    }
}
