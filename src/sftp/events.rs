use serde::{Deserialize, Serialize};

/// Direction of a tracked transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferKind {
    Upload,
    Download,
    Copy,
}

/// Periodic progress for an upload or download
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferProgress {
    pub connection_id: String,
    pub path: String,
    pub transferred: u64,
    pub total: u64,
    pub transfer_id: String,
    #[serde(rename = "type")]
    pub kind: TransferKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferCancelled {
    pub transfer_id: String,
    #[serde(rename = "type")]
    pub kind: TransferKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferFinished {
    pub transfer_id: String,
    #[serde(rename = "type")]
    pub kind: TransferKind,
    pub path: String,
}

/// Result of a `fetch_directory_size` call, correlated by operation id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectorySizeCompleted {
    pub operation_id: String,
    pub path: String,
    pub success: bool,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Events pushed by the backend outside any request/response pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum BackendEvent {
    UploadProgress(TransferProgress),
    DownloadProgress(TransferProgress),
    TransferCancelled(TransferCancelled),
    #[serde(rename = "process_finished")]
    TransferFinished(TransferFinished),
    DirectorySizeCompleted(DirectorySizeCompleted),
}
