//! Scriptable in-memory backend for unit tests

use super::{ConnectionConfig, FileItem, SftpBackend};
use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Default)]
pub struct MockBackend {
    listings: Mutex<HashMap<String, Vec<FileItem>>>,
    failing_lists: Mutex<HashSet<String>>,
    failing_sources: Mutex<HashSet<String>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    connect_gate: Mutex<Option<Arc<Notify>>>,
    calls: Mutex<Vec<String>>,
    last_config: Mutex<Option<ConnectionConfig>>,
    fail_connect: Mutex<bool>,
    fail_disconnect: Mutex<bool>,
    fail_mutations: Mutex<bool>,
    counter: AtomicU64,
}

pub fn file(path: &str, is_directory: bool) -> FileItem {
    FileItem {
        name: super::paths::base_name(path).to_string(),
        path: path.to_string(),
        is_directory,
        size: if is_directory { 0 } else { 42 },
        modified: 1_700_000_000,
        permissions: if is_directory { "drwxr-xr-x" } else { "-rw-r--r--" }.to_string(),
    }
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_listing(&self, path: &str, files: Vec<FileItem>) {
        self.listings.lock().insert(path.to_string(), files);
    }

    pub fn fail_listing(&self, path: &str) {
        self.failing_lists.lock().insert(path.to_string());
    }

    pub fn fail_source(&self, path: &str) {
        self.failing_sources.lock().insert(path.to_string());
    }

    pub fn set_fail_connect(&self, fail: bool) {
        *self.fail_connect.lock() = fail;
    }

    pub fn set_fail_disconnect(&self, fail: bool) {
        *self.fail_disconnect.lock() = fail;
    }

    pub fn set_fail_mutations(&self, fail: bool) {
        *self.fail_mutations.lock() = fail;
    }

    /// Hold every listing of `path` until the returned handle is notified
    pub fn gate_listing(&self, path: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates.lock().insert(path.to_string(), gate.clone());
        gate
    }

    /// Hold every connect until the returned handle is notified
    pub fn gate_connect(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.connect_gate.lock() = Some(gate.clone());
        gate
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.starts_with(prefix)).count()
    }

    pub fn last_config(&self) -> Option<ConnectionConfig> {
        self.last_config.lock().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().push(call);
    }

    fn next_id(&self, prefix: &str) -> String {
        format!("{}-{}", prefix, self.counter.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn mutation_result(&self, what: &str) -> AppResult<()> {
        if *self.fail_mutations.lock() {
            Err(AppError::Sftp(format!("{} refused", what)))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SftpBackend for MockBackend {
    async fn connect(&self, config: &ConnectionConfig) -> AppResult<String> {
        self.record(format!("connect {}@{}:{}", config.username, config.host, config.port));
        *self.last_config.lock() = Some(config.clone());
        let gate = self.connect_gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        tokio::task::yield_now().await;
        if *self.fail_connect.lock() {
            return Err(AppError::Connection("Authentication failed".to_string()));
        }
        Ok(self.next_id("conn"))
    }

    async fn disconnect(&self, connection_id: &str) -> AppResult<()> {
        self.record(format!("disconnect {}", connection_id));
        if *self.fail_disconnect.lock() {
            return Err(AppError::Connection("socket already closed".to_string()));
        }
        Ok(())
    }

    async fn list_directory(&self, connection_id: &str, path: &str) -> AppResult<Vec<FileItem>> {
        self.record(format!("list {} {}", connection_id, path));
        let gate = self.gates.lock().get(path).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.failing_lists.lock().contains(path) {
            return Err(AppError::Sftp("Permission denied".to_string()));
        }
        Ok(self.listings.lock().get(path).cloned().unwrap_or_default())
    }

    async fn create_directory(&self, connection_id: &str, path: &str) -> AppResult<()> {
        self.record(format!("mkdir {} {}", connection_id, path));
        self.mutation_result("mkdir")
    }

    async fn delete_item(&self, connection_id: &str, path: &str, is_directory: bool) -> AppResult<()> {
        self.record(format!("delete {} {} {}", connection_id, path, is_directory));
        self.mutation_result("delete")
    }

    async fn rename_item(&self, connection_id: &str, old_path: &str, new_path: &str) -> AppResult<()> {
        self.record(format!("rename {} {} {}", connection_id, old_path, new_path));
        self.mutation_result("rename")
    }

    async fn delete_directory_recursive(&self, connection_id: &str, path: &str) -> AppResult<()> {
        self.record(format!("rmtree {} {}", connection_id, path));
        self.mutation_result("rmtree")
    }

    async fn download_file(
        &self,
        connection_id: &str,
        remote_path: &str,
        local_path: &str,
    ) -> AppResult<String> {
        self.record(format!("download {} {} {}", connection_id, remote_path, local_path));
        self.mutation_result("download")?;
        Ok(self.next_id("transfer"))
    }

    async fn upload_file(
        &self,
        connection_id: &str,
        local_path: &str,
        remote_path: &str,
    ) -> AppResult<String> {
        self.record(format!("upload {} {} {}", connection_id, local_path, remote_path));
        self.mutation_result("upload")?;
        Ok(self.next_id("transfer"))
    }

    async fn cancel_transfer(&self, transfer_id: &str) -> AppResult<()> {
        self.record(format!("cancel {}", transfer_id));
        Ok(())
    }

    async fn move_item(&self, connection_id: &str, source_path: &str, dest_path: &str) -> AppResult<()> {
        self.record(format!("move {} {} {}", connection_id, source_path, dest_path));
        if self.failing_sources.lock().contains(source_path) {
            return Err(AppError::Sftp(format!("cannot move {}", source_path)));
        }
        Ok(())
    }

    async fn copy_item(
        &self,
        connection_id: &str,
        source_path: &str,
        dest_path: &str,
        is_directory: bool,
    ) -> AppResult<()> {
        self.record(format!("copy {} {} {} {}", connection_id, source_path, dest_path, is_directory));
        if self.failing_sources.lock().contains(source_path) {
            return Err(AppError::Sftp(format!("cannot copy {}", source_path)));
        }
        Ok(())
    }

    async fn fetch_directory_size(&self, connection_id: &str, path: &str) -> AppResult<String> {
        self.record(format!("size {} {}", connection_id, path));
        Ok(self.next_id("op"))
    }

    async fn cancel_directory_size(&self, operation_id: &str) -> AppResult<()> {
        self.record(format!("cancel-size {}", operation_id));
        Ok(())
    }
}
