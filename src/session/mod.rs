pub mod model;

pub use model::*;

use crate::error::{AppError, AppResult};
use crate::keychain::CredentialCodec;
use crate::logging::sanitize;
use crate::sftp::{paths, ConnectionConfig, FileItem, SftpBackend};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// On-disk shape of `sessions.toml`
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SessionsFile {
    #[serde(default)]
    pub sessions: Vec<Session>,
}

/// Outcome of the synchronous half of a connect attempt
enum ConnectGate {
    Proceed(ConnectionConfig),
    AlreadyConnected,
    Rejected,
}

/// Owns the session catalogue and the live connection handles
pub struct SessionManager {
    backend: Arc<dyn SftpBackend>,
    codec: CredentialCodec,
    sessions: RwLock<Vec<Session>>,
    connections: DashMap<String, ConnectionHandle>,
    selected_session_id: RwLock<Option<String>>,
    last_error: RwLock<Option<String>>,
}

impl SessionManager {
    pub fn new(backend: Arc<dyn SftpBackend>, codec: CredentialCodec, sessions: Vec<Session>) -> Self {
        let sessions = sessions
            .into_iter()
            .map(|mut s| {
                s.status = SessionStatus::Disconnected;
                s
            })
            .collect();

        Self {
            backend,
            codec,
            sessions: RwLock::new(sessions),
            connections: DashMap::new(),
            selected_session_id: RwLock::new(None),
            last_error: RwLock::new(None),
        }
    }

    pub fn backend(&self) -> &Arc<dyn SftpBackend> {
        &self.backend
    }

    /// Catalogue snapshot for persistence
    pub fn export_sessions(&self) -> SessionsFile {
        SessionsFile {
            sessions: self.sessions.read().clone(),
        }
    }

    // ---- catalogue ----

    /// Add a session and return its id. Secrets are sealed before insert.
    pub fn add_session(&self, new: NewSession) -> AppResult<String> {
        if let Err(e) = validate(&new.name, &new.host, new.port, &new.username) {
            self.set_error(e.to_string());
            return Err(e);
        }
        if self.find_duplicate(&new.host, new.port, &new.username, None).is_some() {
            let e = AppError::DuplicateSession(format!(
                "A session for {}@{}:{} already exists",
                new.username, new.host, new.port
            ));
            self.set_error(e.to_string());
            return Err(e);
        }

        let password = self.codec.seal(new.password.as_deref())?;
        let passphrase = self.codec.seal(new.passphrase.as_deref())?;
        let now = chrono::Utc::now().timestamp();
        let id = Uuid::new_v4().to_string();

        let session = Session {
            id: id.clone(),
            name: new.name,
            host: new.host,
            port: new.port,
            username: new.username,
            password,
            private_key_path: new.private_key_path.filter(|p| !p.is_empty()),
            passphrase,
            created_at: now,
            updated_at: now,
            last_used_at: None,
            status: SessionStatus::Disconnected,
            notes: new.notes,
            tags: new.tags,
            is_favorite: new.is_favorite,
            color_label: new.color_label,
            icon: new.icon,
        };

        // Re-check under the write lock so two racing adds cannot both land
        let mut sessions = self.sessions.write();
        if sessions
            .iter()
            .any(|s| s.same_endpoint(&session.host, session.port, &session.username))
        {
            drop(sessions);
            let e = AppError::DuplicateSession(format!(
                "A session for {}@{}:{} already exists",
                session.username, session.host, session.port
            ));
            self.set_error(e.to_string());
            return Err(e);
        }
        sessions.push(session);
        drop(sessions);

        tracing::info!("Added session {}", id);
        Ok(id)
    }

    /// Replace the mutable fields of a session, keeping its timestamps
    pub fn update_session(&self, update: SessionUpdate) -> AppResult<String> {
        if self.get_session(&update.id).is_none() {
            return Err(AppError::SessionNotFound(update.id));
        }
        if let Err(e) = validate(&update.name, &update.host, update.port, &update.username) {
            self.set_error(e.to_string());
            return Err(e);
        }
        if self
            .find_duplicate(&update.host, update.port, &update.username, Some(update.id.as_str()))
            .is_some()
        {
            let e = AppError::DuplicateSession(format!(
                "A session for {}@{}:{} already exists",
                update.username, update.host, update.port
            ));
            self.set_error(e.to_string());
            return Err(e);
        }

        let password = self.reseal(update.password.as_deref())?;
        let passphrase = self.reseal(update.passphrase.as_deref())?;

        let mut sessions = self.sessions.write();
        let session = sessions
            .iter_mut()
            .find(|s| s.id == update.id)
            .ok_or_else(|| AppError::SessionNotFound(update.id.clone()))?;

        session.name = update.name;
        session.host = update.host;
        session.port = update.port;
        session.username = update.username;
        session.private_key_path = update.private_key_path.filter(|p| !p.is_empty());
        session.notes = update.notes;
        session.tags = update.tags;
        session.color_label = update.color_label;
        session.icon = update.icon;
        if let Some(password) = password {
            session.password = password;
        }
        if let Some(passphrase) = passphrase {
            session.passphrase = passphrase;
        }
        session.updated_at = chrono::Utc::now().timestamp();

        tracing::info!("Updated session {}", update.id);
        Ok(update.id)
    }

    /// `None` keeps the stored secret, `Some(None)` clears it
    fn reseal(&self, secret: Option<&str>) -> AppResult<Option<Option<String>>> {
        match secret {
            None => Ok(None),
            Some(s) => Ok(Some(self.codec.seal(Some(s))?)),
        }
    }

    /// Remove a session, disconnecting it first when a handle is live
    pub async fn delete_session(&self, session_id: &str) -> AppResult<()> {
        if self.get_session(session_id).is_none() {
            return Err(AppError::SessionNotFound(session_id.to_string()));
        }

        if self.connections.contains_key(session_id) {
            self.disconnect_session(session_id).await;
        }

        self.sessions.write().retain(|s| s.id != session_id);
        self.connections.remove(session_id);
        {
            let mut selected = self.selected_session_id.write();
            if selected.as_deref() == Some(session_id) {
                *selected = None;
            }
        }

        tracing::info!("Deleted session {}", session_id);
        Ok(())
    }

    pub fn toggle_favorite(&self, session_id: &str) -> AppResult<bool> {
        let mut sessions = self.sessions.write();
        let session = sessions
            .iter_mut()
            .find(|s| s.id == session_id)
            .ok_or_else(|| AppError::SessionNotFound(session_id.to_string()))?;
        session.is_favorite = !session.is_favorite;
        session.updated_at = chrono::Utc::now().timestamp();
        Ok(session.is_favorite)
    }

    pub fn select_session(&self, session_id: Option<&str>) {
        *self.selected_session_id.write() = session_id.map(str::to_string);
    }

    pub fn selected_session_id(&self) -> Option<String> {
        self.selected_session_id.read().clone()
    }

    pub fn get_session(&self, session_id: &str) -> Option<Session> {
        self.sessions.read().iter().find(|s| s.id == session_id).cloned()
    }

    pub fn list_sessions(&self) -> Vec<Session> {
        self.sessions.read().clone()
    }

    pub fn connected_sessions(&self) -> Vec<Session> {
        self.filter_sessions(|s| s.is_connected())
    }

    pub fn favorite_sessions(&self) -> Vec<Session> {
        self.filter_sessions(|s| s.is_favorite)
    }

    pub fn sessions_by_tag(&self, tag: &str) -> Vec<Session> {
        self.filter_sessions(|s| s.tags.iter().any(|t| t == tag))
    }

    /// Case-insensitive search over name, host, username, notes and tags
    pub fn search_sessions(&self, query: &str) -> Vec<Session> {
        if query.trim().is_empty() {
            return self.list_sessions();
        }
        self.filter_sessions(|s| s.matches(query))
    }

    fn filter_sessions(&self, predicate: impl Fn(&Session) -> bool) -> Vec<Session> {
        self.sessions
            .read()
            .iter()
            .filter(|s| predicate(s))
            .cloned()
            .collect()
    }

    pub fn status(&self, session_id: &str) -> Option<SessionStatus> {
        self.sessions
            .read()
            .iter()
            .find(|s| s.id == session_id)
            .map(|s| s.status)
    }

    pub fn connection_id(&self, session_id: &str) -> Option<String> {
        self.connections
            .get(session_id)
            .map(|h| h.connection_id.clone())
    }

    /// Snapshot of the live handle for a session
    pub fn connection_state(&self, session_id: &str) -> Option<ConnectionHandle> {
        self.connections.get(session_id).map(|h| h.value().clone())
    }

    pub fn error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    pub fn clear_error(&self) {
        *self.last_error.write() = None;
    }

    fn set_error(&self, message: impl AsRef<str>) {
        *self.last_error.write() = Some(sanitize(message.as_ref()));
    }

    fn find_duplicate(&self, host: &str, port: u16, username: &str, exclude: Option<&str>) -> Option<String> {
        self.sessions
            .read()
            .iter()
            .find(|s| s.same_endpoint(host, port, username) && Some(s.id.as_str()) != exclude)
            .map(|s| s.id.clone())
    }

    fn set_status(&self, session_id: &str, status: SessionStatus) {
        if let Some(session) = self.sessions.write().iter_mut().find(|s| s.id == session_id) {
            session.status = status;
        }
    }

    // ---- connection lifecycle ----

    /// Mark the session as connecting and build its clear-text config.
    /// Runs entirely under the catalogue lock so a racing attempt sees `Connecting`.
    fn begin_connect(&self, session_id: &str) -> ConnectGate {
        let mut sessions = self.sessions.write();
        let Some(session) = sessions.iter_mut().find(|s| s.id == session_id) else {
            self.set_error(format!("Session {} not found", session_id));
            return ConnectGate::Rejected;
        };

        match session.status {
            SessionStatus::Connecting => {
                tracing::debug!("Session {} is already connecting", session_id);
                return ConnectGate::Rejected;
            }
            SessionStatus::Connected if self.connections.contains_key(session_id) => {
                return ConnectGate::AlreadyConnected;
            }
            _ => {}
        }

        let secrets = self
            .codec
            .open(session.password.as_deref())
            .and_then(|password| Ok((password, self.codec.open(session.passphrase.as_deref())?)));
        let (password, passphrase) = match secrets {
            Ok(secrets) => secrets,
            Err(e) => {
                session.status = SessionStatus::Disconnected;
                drop(sessions);
                tracing::error!("Could not open stored credentials for {}: {}", session_id, e);
                self.set_error(format!("Connection failed: {}", e));
                return ConnectGate::Rejected;
            }
        };

        session.status = SessionStatus::Connecting;
        ConnectGate::Proceed(ConnectionConfig {
            host: session.host.clone(),
            port: session.port,
            username: session.username.clone(),
            password,
            private_key_path: session.private_key_path.clone(),
            passphrase,
        })
    }

    /// Connect a session and list its root. Returns whether the session ended up connected.
    pub async fn connect_to_session(&self, session_id: &str) -> bool {
        let config = match self.begin_connect(session_id) {
            ConnectGate::Proceed(config) => config,
            ConnectGate::AlreadyConnected => return true,
            ConnectGate::Rejected => return false,
        };

        self.clear_error();
        tracing::info!(
            "Connecting session {} to {}@{}:{}",
            session_id,
            config.username,
            config.host,
            config.port
        );

        let connection_id = match self.backend.connect(&config).await {
            Ok(id) => id,
            Err(e) => {
                tracing::error!("Connect failed for session {}: {}", session_id, e);
                self.set_status(session_id, SessionStatus::Disconnected);
                self.set_error(format!("Connection failed: {}", e));
                return false;
            }
        };

        // The session may have been deleted while the connect was in flight
        let still_present = {
            let mut sessions = self.sessions.write();
            match sessions.iter_mut().find(|s| s.id == session_id) {
                Some(session) => {
                    session.status = SessionStatus::Connected;
                    session.last_used_at = Some(chrono::Utc::now().timestamp());
                    true
                }
                None => false,
            }
        };
        if !still_present {
            tracing::warn!("Session {} vanished during connect, closing {}", session_id, connection_id);
            if let Err(e) = self.backend.disconnect(&connection_id).await {
                tracing::warn!("Failed to close orphaned connection {}: {}", connection_id, e);
            }
            return false;
        }

        self.connections
            .insert(session_id.to_string(), ConnectionHandle::new(connection_id.clone()));
        tracing::info!("Session {} connected as {}", session_id, connection_id);

        if let Err(e) = self.load_directory(session_id, paths::ROOT).await {
            tracing::warn!("Initial listing failed for session {}: {}", session_id, e);
        }
        true
    }

    /// Close a session's connection. Local state converges even when the backend call fails.
    pub async fn disconnect_session(&self, session_id: &str) {
        let Some((_, handle)) = self.connections.remove(session_id) else {
            if self.status(session_id) == Some(SessionStatus::Connected) {
                self.set_status(session_id, SessionStatus::Disconnected);
            }
            return;
        };

        if let Err(e) = self.backend.disconnect(&handle.connection_id).await {
            tracing::warn!("Backend disconnect failed for session {}: {}", session_id, e);
            self.set_error(format!("Disconnect failed: {}", e));
        }

        self.set_status(session_id, SessionStatus::Disconnected);
        tracing::info!("Disconnected session {}", session_id);
    }

    pub async fn disconnect_all_sessions(&self) {
        let ids: Vec<String> = self.sessions.read().iter().map(|s| s.id.clone()).collect();
        for id in &ids {
            self.disconnect_session(id).await;
        }
        for session in self.sessions.write().iter_mut() {
            session.status = SessionStatus::Disconnected;
        }
        *self.selected_session_id.write() = None;
    }

    /// Drop every live handle, including ones whose session is gone
    pub async fn clear_all_connections(&self) {
        let ids: Vec<String> = self.connections.iter().map(|e| e.key().clone()).collect();
        for id in &ids {
            self.disconnect_session(id).await;
        }
    }

    // ---- file operations ----

    fn require_connection(&self, session_id: &str) -> AppResult<String> {
        self.connection_id(session_id)
            .ok_or_else(|| AppError::NoActiveConnection(session_id.to_string()))
    }

    /// List `path` into the session's connection handle.
    ///
    /// A backend failure is recorded on the handle and does not fail the call;
    /// only a missing connection does.
    pub async fn load_directory(&self, session_id: &str, path: &str) -> AppResult<()> {
        let connection_id = self.require_connection(session_id)?;
        if let Some(mut handle) = self.connections.get_mut(session_id) {
            handle.is_loading = true;
            handle.error = None;
        }

        let result = self.backend.list_directory(&connection_id, path).await;

        if let Some(mut handle) = self.connections.get_mut(session_id) {
            handle.is_loading = false;
            match result {
                Ok(files) => {
                    tracing::debug!("Listed {} entries in {} for {}", files.len(), path, session_id);
                    handle.files = files;
                    handle.current_path = path.to_string();
                }
                Err(e) => {
                    tracing::warn!("Listing {} failed for {}: {}", path, session_id, e);
                    handle.files = Vec::new();
                    handle.error = Some(sanitize(&format!("Failed to load directory: {}", e)));
                }
            }
        }
        Ok(())
    }

    /// Raw listing for callers that keep their own cache (tabs)
    pub(crate) async fn list_directory(&self, session_id: &str, path: &str) -> AppResult<Vec<FileItem>> {
        let connection_id = self.require_connection(session_id)?;
        self.backend.list_directory(&connection_id, path).await
    }

    pub async fn download_file(&self, session_id: &str, remote_path: &str, local_path: &str) -> AppResult<String> {
        let connection_id = self.require_connection(session_id)?;
        match self.backend.download_file(&connection_id, remote_path, local_path).await {
            Ok(transfer_id) => {
                tracing::info!("Download {} started: {} -> {}", transfer_id, remote_path, local_path);
                Ok(transfer_id)
            }
            Err(e) => Err(self.record_operation_error(session_id, "Download failed", e)),
        }
    }

    pub async fn upload_file(&self, session_id: &str, local_path: &str, remote_path: &str) -> AppResult<String> {
        let connection_id = self.require_connection(session_id)?;
        let result = self.backend.upload_file(&connection_id, local_path, remote_path).await;
        self.refresh(session_id).await;
        match result {
            Ok(transfer_id) => {
                tracing::info!("Upload {} started: {} -> {}", transfer_id, local_path, remote_path);
                Ok(transfer_id)
            }
            Err(e) => Err(self.record_operation_error(session_id, "Upload failed", e)),
        }
    }

    pub async fn create_directory(&self, session_id: &str, path: &str) -> AppResult<()> {
        let connection_id = self.require_connection(session_id)?;
        let result = self.backend.create_directory(&connection_id, path).await;
        self.finish_mutation(session_id, "Failed to create directory", result).await
    }

    pub async fn delete_item(&self, session_id: &str, path: &str, is_directory: bool) -> AppResult<()> {
        let connection_id = self.require_connection(session_id)?;
        let result = self.backend.delete_item(&connection_id, path, is_directory).await;
        self.finish_mutation(session_id, "Failed to delete item", result).await
    }

    pub async fn rename_item(&self, session_id: &str, old_path: &str, new_path: &str) -> AppResult<()> {
        let connection_id = self.require_connection(session_id)?;
        let result = self.backend.rename_item(&connection_id, old_path, new_path).await;
        self.finish_mutation(session_id, "Failed to rename item", result).await
    }

    pub async fn delete_directory_recursive(&self, session_id: &str, path: &str) -> AppResult<()> {
        let connection_id = self.require_connection(session_id)?;
        let result = self.backend.delete_directory_recursive(&connection_id, path).await;
        self.finish_mutation(session_id, "Failed to delete directory", result).await
    }

    /// Start a size computation; the result arrives as a push event for the returned id
    pub async fn fetch_directory_size(&self, session_id: &str, path: &str) -> AppResult<String> {
        let connection_id = self.require_connection(session_id)?;
        let operation_id = self
            .backend
            .fetch_directory_size(&connection_id, path)
            .await
            .map_err(|e| self.record_operation_error(session_id, "Failed to compute size", e))?;
        tracing::debug!("Directory size {} requested for {}", operation_id, path);
        Ok(operation_id)
    }

    pub async fn cancel_directory_size(&self, operation_id: &str) -> AppResult<()> {
        self.backend.cancel_directory_size(operation_id).await
    }

    async fn finish_mutation(&self, session_id: &str, context: &str, result: AppResult<()>) -> AppResult<()> {
        self.refresh(session_id).await;
        result.map_err(|e| self.record_operation_error(session_id, context, e))
    }

    /// Re-list the handle's current path
    async fn refresh(&self, session_id: &str) {
        let path = self.connections.get(session_id).map(|h| h.current_path.clone());
        if let Some(path) = path {
            if let Err(e) = self.load_directory(session_id, &path).await {
                tracing::debug!("Refresh skipped for {}: {}", session_id, e);
            }
        }
    }

    fn record_operation_error(&self, session_id: &str, context: &str, err: AppError) -> AppError {
        let message = sanitize(&format!("{}: {}", context, err));
        tracing::warn!("Session {}: {}", session_id, message);
        if let Some(mut handle) = self.connections.get_mut(session_id) {
            handle.error = Some(message.clone());
        }
        match err {
            AppError::Sftp(_) => AppError::Sftp(message),
            other => other,
        }
    }
}

fn validate(name: &str, host: &str, port: u16, username: &str) -> AppResult<()> {
    if name.trim().is_empty() {
        return Err(AppError::Validation("Session name cannot be empty".to_string()));
    }
    if host.trim().is_empty() {
        return Err(AppError::Validation("Host cannot be empty".to_string()));
    }
    if username.trim().is_empty() {
        return Err(AppError::Validation("Username cannot be empty".to_string()));
    }
    if port == 0 {
        return Err(AppError::Validation("Port must be between 1 and 65535".to_string()));
    }
    Ok(())
}
