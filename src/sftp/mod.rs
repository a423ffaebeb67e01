//! Remote execution backend contract
//!
//! The SFTP engine itself lives behind an opaque request/response bridge. This
//! module only describes what the client core needs from it: connection
//! lifecycle, listing and CRUD, transfers, and the push events it emits.

pub mod events;
pub mod paths;

#[cfg(test)]
pub(crate) mod mock;

pub use events::*;

use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A remote directory entry as reported by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileItem {
    pub name: String,
    pub path: String,
    pub is_directory: bool,
    pub size: u64,
    /// Unix timestamp (seconds)
    pub modified: u64,
    pub permissions: String,
}

/// Connection parameters handed to the backend, with secrets in clear text.
/// Only built transiently for a connect call, never stored.
#[derive(Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: Option<String>,
    pub private_key_path: Option<String>,
    pub passphrase: Option<String>,
}

impl std::fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("private_key_path", &self.private_key_path)
            .field("passphrase", &self.passphrase.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Operations the remote backend exposes to the client core.
///
/// Transfers and directory-size queries are fire-and-forget: the call returns
/// an id right away and the outcome arrives later as a [`BackendEvent`].
#[async_trait]
pub trait SftpBackend: Send + Sync {
    /// Open a connection and return its backend-issued id
    async fn connect(&self, config: &ConnectionConfig) -> AppResult<String>;

    async fn disconnect(&self, connection_id: &str) -> AppResult<()>;

    async fn list_directory(&self, connection_id: &str, path: &str) -> AppResult<Vec<FileItem>>;

    async fn create_directory(&self, connection_id: &str, path: &str) -> AppResult<()>;

    async fn delete_item(&self, connection_id: &str, path: &str, is_directory: bool) -> AppResult<()>;

    async fn rename_item(&self, connection_id: &str, old_path: &str, new_path: &str) -> AppResult<()>;

    async fn delete_directory_recursive(&self, connection_id: &str, path: &str) -> AppResult<()>;

    /// Start a download and return its transfer id
    async fn download_file(
        &self,
        connection_id: &str,
        remote_path: &str,
        local_path: &str,
    ) -> AppResult<String>;

    /// Start an upload and return its transfer id
    async fn upload_file(
        &self,
        connection_id: &str,
        local_path: &str,
        remote_path: &str,
    ) -> AppResult<String>;

    async fn cancel_transfer(&self, transfer_id: &str) -> AppResult<()>;

    async fn move_item(&self, connection_id: &str, source_path: &str, dest_path: &str) -> AppResult<()>;

    async fn copy_item(
        &self,
        connection_id: &str,
        source_path: &str,
        dest_path: &str,
        is_directory: bool,
    ) -> AppResult<()>;

    /// Start a recursive size computation and return its operation id
    async fn fetch_directory_size(&self, connection_id: &str, path: &str) -> AppResult<String>;

    async fn cancel_directory_size(&self, operation_id: &str) -> AppResult<()>;
}

/// Backend used when no bridge is attached. Every remote call is refused, so
/// the persisted catalogues can be inspected without a live host.
#[derive(Debug, Default)]
pub struct OfflineBackend;

impl OfflineBackend {
    fn refuse<T>(&self) -> AppResult<T> {
        Err(AppError::Connection("No remote backend attached".to_string()))
    }
}

#[async_trait]
impl SftpBackend for OfflineBackend {
    async fn connect(&self, _config: &ConnectionConfig) -> AppResult<String> {
        self.refuse()
    }

    async fn disconnect(&self, _connection_id: &str) -> AppResult<()> {
        self.refuse()
    }

    async fn list_directory(&self, _connection_id: &str, _path: &str) -> AppResult<Vec<FileItem>> {
        self.refuse()
    }

    async fn create_directory(&self, _connection_id: &str, _path: &str) -> AppResult<()> {
        self.refuse()
    }

    async fn delete_item(&self, _connection_id: &str, _path: &str, _is_directory: bool) -> AppResult<()> {
        self.refuse()
    }

    async fn rename_item(&self, _connection_id: &str, _old_path: &str, _new_path: &str) -> AppResult<()> {
        self.refuse()
    }

    async fn delete_directory_recursive(&self, _connection_id: &str, _path: &str) -> AppResult<()> {
        self.refuse()
    }

    async fn download_file(
        &self,
        _connection_id: &str,
        _remote_path: &str,
        _local_path: &str,
    ) -> AppResult<String> {
        self.refuse()
    }

    async fn upload_file(
        &self,
        _connection_id: &str,
        _local_path: &str,
        _remote_path: &str,
    ) -> AppResult<String> {
        self.refuse()
    }

    async fn cancel_transfer(&self, _transfer_id: &str) -> AppResult<()> {
        self.refuse()
    }

    async fn move_item(&self, _connection_id: &str, _source_path: &str, _dest_path: &str) -> AppResult<()> {
        self.refuse()
    }

    async fn copy_item(
        &self,
        _connection_id: &str,
        _source_path: &str,
        _dest_path: &str,
        _is_directory: bool,
    ) -> AppResult<()> {
        self.refuse()
    }

    async fn fetch_directory_size(&self, _connection_id: &str, _path: &str) -> AppResult<String> {
        self.refuse()
    }

    async fn cancel_directory_size(&self, _operation_id: &str) -> AppResult<()> {
        self.refuse()
    }
}
