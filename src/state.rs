use crate::bookmarks::{BookmarkStore, BookmarksFile};
use crate::clipboard::{Clipboard, ClipboardFile, PasteSummary};
use crate::config::AppSettings;
use crate::error::AppResult;
use crate::keychain::CredentialCodec;
use crate::session::{SessionManager, SessionUpdate, SessionsFile};
use crate::sftp::{BackendEvent, SftpBackend};
use crate::storage::{self, BOOKMARKS_FILE, CLIPBOARD_FILE, SESSIONS_FILE, TABS_FILE};
use crate::tabs::{TabManager, TabsFile};
use crate::transfers::TransferTracker;
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Global application state
pub struct AppState {
    config_dir: PathBuf,
    pub settings: Arc<RwLock<AppSettings>>,
    pub sessions: Arc<SessionManager>,
    pub tabs: Arc<TabManager>,
    pub clipboard: Arc<Clipboard>,
    pub transfers: Arc<TransferTracker>,
    pub bookmarks: Arc<RwLock<BookmarkStore>>,
}

impl AppState {
    /// Load settings and every persisted catalogue from `config_dir`
    pub fn load(config_dir: &Path, backend: Arc<dyn SftpBackend>, codec: CredentialCodec) -> AppResult<Self> {
        std::fs::create_dir_all(config_dir)?;

        let settings = AppSettings::load(config_dir)?;
        let sessions_file: SessionsFile =
            storage::read_toml(&config_dir.join(SESSIONS_FILE))?.unwrap_or_default();
        let bookmarks_file: BookmarksFile =
            storage::read_toml(&config_dir.join(BOOKMARKS_FILE))?.unwrap_or_default();
        let tabs_file: TabsFile = storage::read_json(&config_dir.join(TABS_FILE))?.unwrap_or_default();
        let clipboard_file: ClipboardFile =
            storage::read_json(&config_dir.join(CLIPBOARD_FILE))?.unwrap_or_default();

        let sessions = Arc::new(SessionManager::new(backend.clone(), codec, sessions_file.sessions));
        let tabs = Arc::new(TabManager::new(sessions.clone(), tabs_file));
        let clipboard = Arc::new(Clipboard::new(sessions.clone(), clipboard_file));
        let transfers = Arc::new(TransferTracker::new(
            backend,
            tabs.clone(),
            settings.transfers.auto_clear_success,
        ));

        tracing::info!(
            "Loaded {} sessions, {} tabs, {} bookmarks from {:?}",
            sessions.list_sessions().len(),
            tabs.tabs().len(),
            bookmarks_file.bookmarks.len(),
            config_dir
        );

        Ok(Self {
            config_dir: config_dir.to_path_buf(),
            settings: Arc::new(RwLock::new(settings)),
            sessions,
            tabs,
            clipboard,
            transfers,
            bookmarks: Arc::new(RwLock::new(BookmarkStore::new(bookmarks_file))),
        })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Write settings and all catalogues back to disk
    pub fn save(&self) -> AppResult<()> {
        self.settings.read().save(&self.config_dir)?;
        storage::write_toml(&self.config_dir.join(SESSIONS_FILE), &self.sessions.export_sessions())?;
        storage::write_toml(&self.config_dir.join(BOOKMARKS_FILE), &self.bookmarks.read().export())?;
        storage::write_json(&self.config_dir.join(TABS_FILE), &self.tabs.export_tabs())?;
        storage::write_json(&self.config_dir.join(CLIPBOARD_FILE), &self.clipboard.export())?;
        tracing::debug!("Saved application state to {:?}", self.config_dir);
        Ok(())
    }

    /// Feed backend push events to the transfer tracker until the channel closes
    pub fn spawn_event_pump(&self, rx: mpsc::Receiver<BackendEvent>) -> JoinHandle<()> {
        let transfers = Arc::clone(&self.transfers);
        tokio::spawn(async move { transfers.run(rx).await })
    }

    /// Update a session and refresh the titles of tabs showing it
    pub fn update_session(&self, update: SessionUpdate) -> AppResult<String> {
        let id = self.sessions.update_session(update)?;
        self.tabs.retitle_session_tabs(&id);
        Ok(id)
    }

    /// Delete a session along with its queued clipboard items. Tabs keep their
    /// reference and report the missing session on their next navigation.
    pub async fn delete_session(&self, session_id: &str) -> AppResult<()> {
        self.sessions.delete_session(session_id).await?;
        self.clipboard.clear_session(session_id);
        Ok(())
    }

    /// Paste the session's pending clipboard items and refresh that session's
    /// tabs showing the target
    pub async fn paste(&self, session_id: &str, path: &str) -> AppResult<PasteSummary> {
        let summary = self.clipboard.paste(session_id, path).await?;
        self.tabs.reload_session_tabs_matching_path(session_id, path).await;
        Ok(summary)
    }

    pub fn set_auto_clear_success(&self, enabled: bool) -> AppResult<()> {
        self.settings.write().transfers.auto_clear_success = enabled;
        self.transfers.set_auto_clear_success(enabled);
        self.settings.read().save(&self.config_dir)
    }
}
