pub mod model;

pub use model::*;

use crate::error::{AppError, AppResult};
use crate::logging::sanitize;
use crate::session::{SessionManager, SessionStatus};
use crate::sftp::{paths, FileItem};
use crate::transfers::TabReloader;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Default)]
struct TabsState {
    tabs: Vec<Tab>,
    active_tab_id: Option<String>,
}

impl TabsState {
    fn tab_mut(&mut self, tab_id: &str) -> Option<&mut Tab> {
        self.tabs.iter_mut().find(|t| t.id == tab_id)
    }

    fn position(&self, tab_id: &str) -> Option<usize> {
        self.tabs.iter().position(|t| t.id == tab_id)
    }

    fn reindex(&mut self) {
        for (index, tab) in self.tabs.iter_mut().enumerate() {
            tab.index = index;
        }
    }

    fn next_index(&self) -> usize {
        self.tabs.len()
    }
}

/// Owns every tab and drives navigation through the session manager
pub struct TabManager {
    sessions: Arc<SessionManager>,
    state: RwLock<TabsState>,
}

impl TabManager {
    /// Build from a persisted catalogue. Transient fields are reset and an
    /// empty catalogue gets the home tab.
    pub fn new(sessions: Arc<SessionManager>, file: TabsFile) -> Self {
        let manager = Self {
            sessions,
            state: RwLock::new(TabsState::default()),
        };
        manager.restore_tabs(file.tabs);
        manager
    }

    pub fn restore_tabs(&self, tabs: Vec<Tab>) {
        let mut state = self.state.write();
        state.tabs = tabs
            .into_iter()
            .map(|mut tab| {
                tab.is_loading = false;
                tab.error = None;
                tab.active_transfers.clear();
                tab.load_token = 0;
                if tab.history.is_empty() {
                    tab.history = vec![tab.file_path.clone()];
                }
                tab.history_index = tab.history_index.min(tab.history.len() - 1);
                tab
            })
            .collect();
        if state.tabs.is_empty() {
            state.tabs.push(Tab::home());
        }
        state.reindex();
        state.active_tab_id = state.tabs.first().map(|t| t.id.clone());
        tracing::debug!("Restored {} tabs", state.tabs.len());
    }

    pub fn export_tabs(&self) -> TabsFile {
        let state = self.state.read();
        TabsFile {
            tabs: state
                .tabs
                .iter()
                .cloned()
                .map(|mut tab| {
                    tab.is_loading = false;
                    tab.error = None;
                    tab.active_transfers.clear();
                    tab
                })
                .collect(),
            active_tab_id: state.active_tab_id.clone(),
        }
    }

    fn with_tab<R>(&self, tab_id: &str, f: impl FnOnce(&mut Tab) -> R) -> AppResult<R> {
        let mut state = self.state.write();
        let tab = state
            .tab_mut(tab_id)
            .ok_or_else(|| AppError::TabNotFound(tab_id.to_string()))?;
        let result = f(tab);
        tab.touch();
        Ok(result)
    }

    fn session_name(&self, session_id: Option<&str>) -> Option<String> {
        session_id
            .and_then(|id| self.sessions.get_session(id))
            .map(|s| s.name)
    }

    fn set_tab_error(&self, tab_id: &str, message: &str) {
        let mut state = self.state.write();
        if let Some(tab) = state.tab_mut(tab_id) {
            tab.error = Some(sanitize(message));
        }
    }

    // ---- tab management ----

    /// Open a tab and make it active. Does not load anything.
    pub fn create_tab(&self, session_id: Option<&str>, path: Option<&str>, tab_type: TabType) -> String {
        let id = Uuid::new_v4().to_string();
        let path = path.unwrap_or(paths::ROOT);
        let title = self
            .session_name(session_id)
            .unwrap_or_else(|| "New Tab".to_string());

        let mut state = self.state.write();
        let mut tab = Tab::new(id.clone(), state.next_index(), session_id.map(str::to_string), path, tab_type);
        tab.title = title;
        state.tabs.push(tab);
        state.active_tab_id = Some(id.clone());

        tracing::debug!("Created tab {} at {}", id, path);
        id
    }

    /// Close an unpinned tab. The tab now at the same position becomes active.
    pub fn close_tab(&self, tab_id: &str) -> bool {
        let mut state = self.state.write();
        let Some(index) = state.position(tab_id) else {
            return false;
        };
        if state.tabs[index].is_pinned {
            return false;
        }

        state.tabs.remove(index);
        state.reindex();
        if state.active_tab_id.as_deref() == Some(tab_id) {
            let next = match state.tabs.len() {
                0 => None,
                len => Some(state.tabs[index.min(len - 1)].id.clone()),
            };
            state.active_tab_id = next;
        }
        true
    }

    /// Close everything except pinned tabs
    pub fn close_all_tabs(&self) {
        let mut state = self.state.write();
        state.tabs.retain(|t| t.is_pinned);
        state.reindex();
        state.active_tab_id = state.tabs.first().map(|t| t.id.clone());
    }

    pub fn close_other_tabs(&self, keep_tab_id: &str) -> AppResult<()> {
        let mut state = self.state.write();
        if state.position(keep_tab_id).is_none() {
            return Err(AppError::TabNotFound(keep_tab_id.to_string()));
        }
        state.tabs.retain(|t| t.id == keep_tab_id || t.is_pinned);
        state.reindex();
        state.active_tab_id = Some(keep_tab_id.to_string());
        Ok(())
    }

    /// Close unpinned tabs to the right of `from_tab_id`
    pub fn close_tabs_to_right(&self, from_tab_id: &str) -> AppResult<()> {
        let mut state = self.state.write();
        let from = state
            .position(from_tab_id)
            .ok_or_else(|| AppError::TabNotFound(from_tab_id.to_string()))?;

        let mut position = 0;
        state.tabs.retain(|t| {
            let keep = position <= from || t.is_pinned;
            position += 1;
            keep
        });
        state.reindex();

        let active_survives = state
            .active_tab_id
            .as_deref()
            .map_or(false, |id| state.tabs.iter().any(|t| t.id == id));
        if !active_survives {
            state.active_tab_id = Some(from_tab_id.to_string());
        }
        Ok(())
    }

    /// Copy a tab to the end of the bar and activate the copy
    pub fn duplicate_tab(&self, tab_id: &str) -> AppResult<String> {
        let mut state = self.state.write();
        let mut copy = state
            .tabs
            .iter()
            .find(|t| t.id == tab_id)
            .cloned()
            .ok_or_else(|| AppError::TabNotFound(tab_id.to_string()))?;

        let id = Uuid::new_v4().to_string();
        copy.id = id.clone();
        copy.index = state.next_index();
        copy.title = format!("{} (Copy)", copy.title);
        copy.is_pinned = false;
        copy.is_loading = false;
        copy.active_transfers.clear();
        copy.load_token = 0;
        copy.touch();

        state.tabs.push(copy);
        state.active_tab_id = Some(id.clone());
        Ok(id)
    }

    pub fn set_active_tab(&self, tab_id: &str) -> AppResult<()> {
        let mut state = self.state.write();
        let tab = state
            .tab_mut(tab_id)
            .ok_or_else(|| AppError::TabNotFound(tab_id.to_string()))?;
        tab.touch();
        state.active_tab_id = Some(tab_id.to_string());
        Ok(())
    }

    /// Move a tab to `new_index` (clamped) and renumber
    pub fn move_tab(&self, tab_id: &str, new_index: usize) -> AppResult<()> {
        let mut state = self.state.write();
        let from = state
            .position(tab_id)
            .ok_or_else(|| AppError::TabNotFound(tab_id.to_string()))?;
        let tab = state.tabs.remove(from);
        let to = new_index.min(state.tabs.len());
        state.tabs.insert(to, tab);
        state.reindex();
        Ok(())
    }

    pub fn pin_tab(&self, tab_id: &str) -> AppResult<()> {
        self.with_tab(tab_id, |tab| tab.is_pinned = true)
    }

    pub fn unpin_tab(&self, tab_id: &str) -> AppResult<()> {
        self.with_tab(tab_id, |tab| tab.is_pinned = false)
    }

    pub fn toggle_pin(&self, tab_id: &str) -> AppResult<bool> {
        self.with_tab(tab_id, |tab| {
            tab.is_pinned = !tab.is_pinned;
            tab.is_pinned
        })
    }

    // ---- properties ----

    pub fn set_title(&self, tab_id: &str, title: &str) -> AppResult<()> {
        self.with_tab(tab_id, |tab| tab.title = title.to_string())
    }

    pub fn set_view_mode(&self, tab_id: &str, mode: ViewMode) -> AppResult<()> {
        self.with_tab(tab_id, |tab| tab.view_mode = mode)
    }

    pub fn set_sorting(&self, tab_id: &str, sort_by: SortBy, sort_order: SortOrder) -> AppResult<()> {
        self.with_tab(tab_id, |tab| {
            tab.sort_by = sort_by;
            tab.sort_order = sort_order;
        })
    }

    pub fn set_filter(&self, tab_id: &str, query: &str) -> AppResult<()> {
        self.with_tab(tab_id, |tab| tab.filter_query = query.to_string())
    }

    pub fn set_scroll_position(&self, tab_id: &str, position: u32) -> AppResult<()> {
        self.with_tab(tab_id, |tab| tab.scroll_position = position)
    }

    pub fn set_files(&self, tab_id: &str, files: Vec<FileItem>) -> AppResult<()> {
        self.with_tab(tab_id, |tab| tab.files = files)
    }

    // ---- navigation ----

    /// Point a tab at `path` and load it, connecting the session first if needed.
    ///
    /// Returns whether a listing was stored. Every failure lands on the tab's
    /// error slot; nothing here is propagated.
    pub async fn navigate_to_path(&self, tab_id: &str, session_id: Option<&str>, path: &str) -> bool {
        let resolved = {
            let mut state = self.state.write();
            let Some(tab) = state.tab_mut(tab_id) else {
                tracing::warn!("Navigation to {} requested for unknown tab {}", path, tab_id);
                return false;
            };

            let resolved = session_id.map(str::to_string).or_else(|| tab.session_id.clone());
            if tab.file_path != path {
                tab.push_history(path);
            }
            tab.file_path = path.to_string();
            tab.reset_view();
            tab.session_id = resolved.clone();
            tab.touch();
            resolved
        };
        self.retitle(tab_id);

        let Some(session_id) = resolved else {
            tracing::warn!("Tab {} has no session to navigate with", tab_id);
            self.set_tab_error(tab_id, "No session selected for this tab");
            return false;
        };

        match self.sessions.status(&session_id) {
            None => {
                self.set_tab_error(tab_id, &format!("Session {} no longer exists", session_id));
                return false;
            }
            Some(SessionStatus::Connected) if self.sessions.connection_id(&session_id).is_some() => {}
            Some(_) => {
                if !self.sessions.connect_to_session(&session_id).await {
                    let message = self
                        .sessions
                        .error()
                        .unwrap_or_else(|| "Connection failed".to_string());
                    tracing::warn!("Tab {} could not connect session {}", tab_id, session_id);
                    self.set_tab_error(tab_id, &message);
                    return false;
                }
            }
        }

        self.load_directory(tab_id, &session_id).await
    }

    /// List the tab's current path. Returns whether a fresh listing was stored.
    ///
    /// Only the newest request per tab may write back; an older response is
    /// dropped and leaves the loading flag to the request that superseded it.
    pub async fn load_directory(&self, tab_id: &str, session_id: &str) -> bool {
        if self.sessions.connection_id(session_id).is_none() {
            tracing::debug!("No connection for session {}, skipping load of tab {}", session_id, tab_id);
            return false;
        }

        let (path, token) = {
            let mut state = self.state.write();
            let Some(tab) = state.tab_mut(tab_id) else {
                return false;
            };
            tab.load_token += 1;
            tab.is_loading = true;
            tab.error = None;
            (tab.file_path.clone(), tab.load_token)
        };

        let result = self.sessions.list_directory(session_id, &path).await;

        let mut state = self.state.write();
        let Some(tab) = state.tab_mut(tab_id) else {
            return false;
        };
        if tab.load_token != token {
            tracing::debug!("Discarding stale listing of {} for tab {}", path, tab_id);
            return false;
        }

        tab.is_loading = false;
        tab.reset_view();
        tab.touch();
        match result {
            Ok(files) => {
                tracing::debug!("Tab {} loaded {} entries from {}", tab_id, files.len(), path);
                tab.files = files;
                tab.error = None;
                true
            }
            Err(e) => {
                tracing::warn!("Tab {} failed to load {}: {}", tab_id, path, e);
                tab.files = Vec::new();
                tab.error = Some(sanitize(&format!("Failed to load directory: {}", e)));
                false
            }
        }
    }

    pub async fn go_back(&self, tab_id: &str) -> bool {
        self.step(tab_id, false).await
    }

    pub async fn go_forward(&self, tab_id: &str) -> bool {
        self.step(tab_id, true).await
    }

    async fn step(&self, tab_id: &str, forward: bool) -> bool {
        let moved = self
            .with_tab(tab_id, |tab| {
                let moved = tab.step_history(forward);
                if moved {
                    tab.reset_view();
                }
                moved
            })
            .unwrap_or(false);
        if !moved {
            return false;
        }
        self.reload(tab_id).await
    }

    /// Go to the parent directory. Does not touch the history stack.
    pub async fn go_up(&self, tab_id: &str) -> bool {
        let changed = self.with_tab(tab_id, |tab| {
            tab.file_path = paths::parent_path(&tab.file_path);
            tab.reset_view();
        });
        if changed.is_err() {
            return false;
        }
        self.reload(tab_id).await
    }

    async fn reload(&self, tab_id: &str) -> bool {
        self.retitle(tab_id);
        let session_id = self.get_tab(tab_id).and_then(|t| t.session_id);
        match session_id {
            Some(session_id) => self.load_directory(tab_id, &session_id).await,
            None => false,
        }
    }

    fn retitle(&self, tab_id: &str) {
        let Some(tab) = self.get_tab(tab_id) else {
            return;
        };
        let title = tab_title(&tab.file_path, self.session_name(tab.session_id.as_deref()).as_deref());
        let mut state = self.state.write();
        if let Some(tab) = state.tab_mut(tab_id) {
            tab.title = title;
        }
    }

    pub fn can_go_back(&self, tab_id: &str) -> bool {
        self.get_tab(tab_id).map_or(false, |t| t.can_go_back())
    }

    pub fn can_go_forward(&self, tab_id: &str) -> bool {
        self.get_tab(tab_id).map_or(false, |t| t.can_go_forward())
    }

    // ---- selection ----

    /// Plain click: select only `path`, unless it is already part of the selection
    pub fn select_file(&self, tab_id: &str, path: &str) -> AppResult<()> {
        self.with_tab(tab_id, |tab| {
            if !tab.selected_files.iter().any(|p| p == path) {
                tab.selected_files = vec![path.to_string()];
            }
        })
    }

    pub fn toggle_file_selection(&self, tab_id: &str, path: &str) -> AppResult<()> {
        self.with_tab(tab_id, |tab| {
            if tab.selected_files.iter().any(|p| p == path) {
                tab.selected_files.retain(|p| p != path);
            } else {
                tab.selected_files.push(path.to_string());
            }
        })
    }

    pub fn add_file_to_selection(&self, tab_id: &str, path: &str) -> AppResult<()> {
        self.with_tab(tab_id, |tab| tab.select(path))
    }

    pub fn add_files_to_selection(&self, tab_id: &str, paths: &[String]) -> AppResult<()> {
        self.with_tab(tab_id, |tab| {
            for path in paths {
                tab.select(path);
            }
        })
    }

    pub fn remove_file_from_selection(&self, tab_id: &str, path: &str) -> AppResult<()> {
        self.with_tab(tab_id, |tab| tab.selected_files.retain(|p| p != path))
    }

    /// Select every entry of the current listing
    pub fn select_all_files(&self, tab_id: &str) -> AppResult<()> {
        self.with_tab(tab_id, |tab| {
            tab.selected_files = tab.files.iter().map(|f| f.path.clone()).collect();
        })
    }

    /// Shift-click: add the listing range between the last selected entry and
    /// `path`. Nothing changes when either end is not in the listing.
    pub fn select_range(&self, tab_id: &str, path: &str) -> AppResult<()> {
        self.with_tab(tab_id, |tab| {
            if let Some(range) = tab.range_to(path) {
                for p in &range {
                    tab.select(p);
                }
            }
        })
    }

    pub fn clear_selection(&self, tab_id: &str) -> AppResult<()> {
        self.with_tab(tab_id, |tab| tab.selected_files.clear())
    }

    // ---- transfers ----

    pub fn add_transfer(&self, tab_id: &str, transfer_id: &str) -> AppResult<()> {
        self.with_tab(tab_id, |tab| {
            if !tab.active_transfers.iter().any(|t| t == transfer_id) {
                tab.active_transfers.push(transfer_id.to_string());
            }
        })
    }

    pub fn remove_transfer(&self, tab_id: &str, transfer_id: &str) -> AppResult<()> {
        self.with_tab(tab_id, |tab| tab.active_transfers.retain(|t| t != transfer_id))
    }

    // ---- queries ----

    pub fn get_tab(&self, tab_id: &str) -> Option<Tab> {
        self.state.read().tabs.iter().find(|t| t.id == tab_id).cloned()
    }

    pub fn tabs(&self) -> Vec<Tab> {
        self.state.read().tabs.clone()
    }

    pub fn active_tab_id(&self) -> Option<String> {
        self.state.read().active_tab_id.clone()
    }

    pub fn active_tab(&self) -> Option<Tab> {
        let state = self.state.read();
        let id = state.active_tab_id.as_deref()?;
        state.tabs.iter().find(|t| t.id == id).cloned()
    }

    pub fn tabs_by_session(&self, session_id: &str) -> Vec<Tab> {
        self.state
            .read()
            .tabs
            .iter()
            .filter(|t| t.session_id.as_deref() == Some(session_id))
            .cloned()
            .collect()
    }

    pub fn pinned_tabs(&self) -> Vec<Tab> {
        self.state.read().tabs.iter().filter(|t| t.is_pinned).cloned().collect()
    }

    // ---- session coupling ----

    /// Close every unpinned tab bound to a session
    pub fn close_session_tabs(&self, session_id: &str) {
        let ids: Vec<String> = self
            .tabs_by_session(session_id)
            .into_iter()
            .filter(|t| !t.is_pinned)
            .map(|t| t.id)
            .collect();
        for id in &ids {
            self.close_tab(id);
        }
    }

    /// Recompute titles after a session rename
    /// Refresh the tabs of one session that show `path`. Never connects;
    /// tabs of a session without a live connection are left alone.
    pub async fn reload_session_tabs_matching_path(&self, session_id: &str, path: &str) {
        let targets: Vec<String> = self
            .state
            .read()
            .tabs
            .iter()
            .filter(|t| t.session_id.as_deref() == Some(session_id) && paths::is_same_path(&t.file_path, path))
            .map(|t| t.id.clone())
            .collect();

        for tab_id in targets {
            tracing::debug!("Reloading tab {} of session {} after change in {}", tab_id, session_id, path);
            self.load_directory(&tab_id, session_id).await;
        }
    }

    pub fn retitle_session_tabs(&self, session_id: &str) {
        let name = self.session_name(Some(session_id));
        let mut state = self.state.write();
        for tab in state
            .tabs
            .iter_mut()
            .filter(|t| t.session_id.as_deref() == Some(session_id))
        {
            tab.title = tab_title(&tab.file_path, name.as_deref());
        }
    }
}

#[async_trait]
impl TabReloader for TabManager {
    async fn reload_tabs_matching_path(&self, path: &str) {
        let targets: Vec<(String, String, String)> = self
            .state
            .read()
            .tabs
            .iter()
            .filter(|t| paths::is_same_path(&t.file_path, path))
            .filter_map(|t| Some((t.id.clone(), t.session_id.clone()?, t.file_path.clone())))
            .collect();

        // Navigate to the tab's own spelling of the path so history is untouched
        for (tab_id, session_id, current) in targets {
            tracing::debug!("Reloading tab {} after change in {}", tab_id, path);
            self.navigate_to_path(&tab_id, Some(session_id.as_str()), &current).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::tests::{codec, new_session};
    use crate::sftp::mock::{file, MockBackend};

    struct Fixture {
        backend: Arc<MockBackend>,
        sessions: Arc<SessionManager>,
        tabs: TabManager,
        session_id: String,
    }

    fn fixture() -> Fixture {
        let backend = MockBackend::new();
        let sessions = Arc::new(SessionManager::new(backend.clone(), codec(), Vec::new()));
        let session_id = sessions.add_session(new_session("prod", "prod.example.com")).unwrap();
        let tabs = TabManager::new(sessions.clone(), TabsFile::default());
        Fixture {
            backend,
            sessions,
            tabs,
            session_id,
        }
    }

    fn listing(dir: &str, names: &[&str]) -> Vec<FileItem> {
        names.iter().map(|n| file(&paths::join(dir, n), false)).collect()
    }

    #[test]
    fn test_empty_catalogue_gets_home_tab() {
        let f = fixture();
        let tabs = f.tabs.tabs();
        assert_eq!(tabs.len(), 1);
        assert_eq!(tabs[0].id, HOME_TAB_ID);
        assert_eq!(f.tabs.active_tab_id().as_deref(), Some(HOME_TAB_ID));
    }

    #[tokio::test]
    async fn test_navigate_connects_then_loads() {
        let f = fixture();
        f.backend.set_listing("/", listing("/", &["a.txt"]));
        f.backend.set_listing("/var/log", listing("/var/log", &["syslog", "auth.log"]));
        let tab = f.tabs.create_tab(Some(f.session_id.as_str()), None, TabType::Browser);

        assert!(f.tabs.navigate_to_path(&tab, None, "/").await);
        let t = f.tabs.get_tab(&tab).unwrap();
        assert_eq!(t.title, "prod");
        assert_eq!(t.files.len(), 1);
        assert_eq!(f.sessions.status(&f.session_id), Some(SessionStatus::Connected));

        assert!(f.tabs.navigate_to_path(&tab, None, "/var/log").await);
        let t = f.tabs.get_tab(&tab).unwrap();
        assert_eq!(t.title, "log - prod");
        assert_eq!(t.files.len(), 2);
        assert!(!t.is_loading);
        assert!(t.can_go_back());
        assert!(!t.can_go_forward());
        assert_eq!(f.backend.count_calls("connect"), 1);
    }

    #[tokio::test]
    async fn test_navigate_resets_selection_even_on_failure() {
        let f = fixture();
        f.backend.set_listing("/", listing("/", &["a", "b"]));
        f.backend.fail_listing("/secret");
        let tab = f.tabs.create_tab(Some(f.session_id.as_str()), None, TabType::Browser);
        assert!(f.tabs.navigate_to_path(&tab, None, "/").await);

        f.tabs.select_file(&tab, "/a").unwrap();
        f.tabs.set_scroll_position(&tab, 240).unwrap();

        assert!(!f.tabs.navigate_to_path(&tab, None, "/secret").await);
        let t = f.tabs.get_tab(&tab).unwrap();
        assert!(t.selected_files.is_empty());
        assert_eq!(t.scroll_position, 0);
        assert!(t.files.is_empty());
        assert!(t.error.unwrap().contains("Permission denied"));
        assert!(!t.is_loading);
    }

    #[tokio::test]
    async fn test_navigate_without_session_reports_error() {
        let f = fixture();
        assert!(!f.tabs.navigate_to_path(HOME_TAB_ID, None, "/etc").await);
        let t = f.tabs.get_tab(HOME_TAB_ID).unwrap();
        assert!(t.error.is_some());
        assert_eq!(t.file_path, "/etc");
        assert!(f.backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_connect_failure_leaves_tab_consistent() {
        let f = fixture();
        f.backend.set_fail_connect(true);
        let tab = f.tabs.create_tab(Some(f.session_id.as_str()), None, TabType::Browser);

        assert!(!f.tabs.navigate_to_path(&tab, None, "/home").await);
        let t = f.tabs.get_tab(&tab).unwrap();
        assert!(!t.is_loading);
        assert!(t.error.unwrap().contains("Authentication failed"));
        assert_eq!(f.sessions.status(&f.session_id), Some(SessionStatus::Disconnected));
    }

    #[tokio::test]
    async fn test_back_forward_and_up() {
        let f = fixture();
        let tab = f.tabs.create_tab(Some(f.session_id.as_str()), None, TabType::Browser);
        f.tabs.navigate_to_path(&tab, None, "/a").await;
        f.tabs.navigate_to_path(&tab, None, "/a/b").await;
        f.tabs.navigate_to_path(&tab, None, "/a/b/c").await;

        assert!(f.tabs.go_back(&tab).await);
        assert_eq!(f.tabs.get_tab(&tab).unwrap().file_path, "/a/b");
        assert!(f.tabs.can_go_forward(&tab));
        assert!(f.tabs.go_forward(&tab).await);
        assert_eq!(f.tabs.get_tab(&tab).unwrap().file_path, "/a/b/c");
        assert!(!f.tabs.go_forward(&tab).await);

        let history_len = f.tabs.get_tab(&tab).unwrap().history.len();
        f.tabs.go_up(&tab).await;
        let t = f.tabs.get_tab(&tab).unwrap();
        assert_eq!(t.file_path, "/a/b");
        assert_eq!(t.title, "b - prod");
        assert_eq!(t.history.len(), history_len);

        f.tabs.go_up(&tab).await;
        f.tabs.go_up(&tab).await;
        assert_eq!(f.tabs.get_tab(&tab).unwrap().file_path, "/");
        f.tabs.go_up(&tab).await;
        assert_eq!(f.tabs.get_tab(&tab).unwrap().file_path, "/");
    }

    #[tokio::test]
    async fn test_stale_listing_is_discarded() {
        let f = fixture();
        f.backend.set_listing("/slow", listing("/slow", &["old"]));
        f.backend.set_listing("/fast", listing("/fast", &["new"]));
        let tab = f.tabs.create_tab(Some(f.session_id.as_str()), None, TabType::Browser);
        assert!(f.tabs.navigate_to_path(&tab, None, "/").await);

        let gate = f.backend.gate_listing("/slow");
        let slow = f.tabs.navigate_to_path(&tab, None, "/slow");
        let fast = async {
            tokio::task::yield_now().await;
            let loaded = f.tabs.navigate_to_path(&tab, None, "/fast").await;
            gate.notify_one();
            loaded
        };
        let (slow_loaded, fast_loaded) = tokio::join!(slow, fast);

        assert!(!slow_loaded);
        assert!(fast_loaded);
        let t = f.tabs.get_tab(&tab).unwrap();
        assert_eq!(t.file_path, "/fast");
        assert_eq!(t.files[0].name, "new");
        assert!(!t.is_loading);
    }

    #[test]
    fn test_close_tab_activates_same_position() {
        let f = fixture();
        let a = f.tabs.create_tab(None, None, TabType::Browser);
        let b = f.tabs.create_tab(None, None, TabType::Browser);
        let c = f.tabs.create_tab(None, None, TabType::Browser);

        f.tabs.set_active_tab(&b).unwrap();
        assert!(f.tabs.close_tab(&b));
        assert_eq!(f.tabs.active_tab_id(), Some(c.clone()));
        let indexes: Vec<usize> = f.tabs.tabs().iter().map(|t| t.index).collect();
        assert_eq!(indexes, vec![0, 1, 2]);

        // Closing the last tab clamps to the new end
        f.tabs.set_active_tab(&c).unwrap();
        assert!(f.tabs.close_tab(&c));
        assert_eq!(f.tabs.active_tab_id(), Some(a.clone()));

        f.tabs.pin_tab(&a).unwrap();
        assert!(!f.tabs.close_tab(&a));
        assert!(f.tabs.get_tab(&a).is_some());
    }

    #[test]
    fn test_bulk_close_keeps_pinned() {
        let f = fixture();
        let a = f.tabs.create_tab(None, None, TabType::Browser);
        let b = f.tabs.create_tab(None, None, TabType::Browser);
        let c = f.tabs.create_tab(None, None, TabType::Browser);
        let d = f.tabs.create_tab(None, None, TabType::Browser);
        f.tabs.pin_tab(&d).unwrap();
        f.tabs.set_active_tab(&c).unwrap();

        f.tabs.close_tabs_to_right(&b).unwrap();
        let ids: Vec<String> = f.tabs.tabs().into_iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![HOME_TAB_ID.to_string(), a.clone(), b.clone(), d.clone()]);
        assert_eq!(f.tabs.active_tab_id(), Some(b.clone()));
        assert!(f.tabs.get_tab(&c).is_none());

        f.tabs.close_other_tabs(&a).unwrap();
        assert_eq!(f.tabs.tabs().len(), 2);

        f.tabs.close_all_tabs();
        assert_eq!(f.tabs.tabs().len(), 1);
        assert_eq!(f.tabs.active_tab_id(), Some(d));
    }

    #[test]
    fn test_duplicate_and_move() {
        let f = fixture();
        let a = f.tabs.create_tab(Some(f.session_id.as_str()), Some("/srv"), TabType::Browser);
        let copy = f.tabs.duplicate_tab(&a).unwrap();

        let t = f.tabs.get_tab(&copy).unwrap();
        assert_eq!(t.title, "prod (Copy)");
        assert_eq!(t.file_path, "/srv");
        assert_eq!(f.tabs.active_tab_id(), Some(copy.clone()));

        f.tabs.move_tab(&copy, 0).unwrap();
        assert_eq!(f.tabs.tabs()[0].id, copy);
        f.tabs.move_tab(&copy, 99).unwrap();
        assert_eq!(f.tabs.tabs().last().unwrap().id, copy);
        assert!(matches!(f.tabs.duplicate_tab("nope"), Err(AppError::TabNotFound(_))));
    }

    #[test]
    fn test_selection_operations() {
        let f = fixture();
        let tab = f.tabs.create_tab(None, None, TabType::Browser);
        f.tabs.set_files(&tab, listing("/", &["a", "b", "c", "d", "e"])).unwrap();

        f.tabs.select_file(&tab, "/b").unwrap();
        f.tabs.select_range(&tab, "/d").unwrap();
        assert_eq!(f.tabs.get_tab(&tab).unwrap().selected_files, vec!["/b", "/c", "/d"]);

        // Clicking an already selected entry keeps the selection
        f.tabs.select_file(&tab, "/c").unwrap();
        assert_eq!(f.tabs.get_tab(&tab).unwrap().selected_files.len(), 3);

        f.tabs.toggle_file_selection(&tab, "/c").unwrap();
        f.tabs.add_file_to_selection(&tab, "/b").unwrap();
        assert_eq!(f.tabs.get_tab(&tab).unwrap().selected_files, vec!["/b", "/d"]);

        // Range runs backwards from the last selected entry
        f.tabs.select_range(&tab, "/a").unwrap();
        assert_eq!(
            f.tabs.get_tab(&tab).unwrap().selected_files,
            vec!["/b", "/d", "/a", "/c"]
        );

        f.tabs.select_range(&tab, "/missing").unwrap();
        assert_eq!(f.tabs.get_tab(&tab).unwrap().selected_files.len(), 4);

        f.tabs.select_all_files(&tab).unwrap();
        assert_eq!(f.tabs.get_tab(&tab).unwrap().selected_files.len(), 5);
        f.tabs.clear_selection(&tab).unwrap();
        assert!(f.tabs.get_tab(&tab).unwrap().selected_files.is_empty());
    }

    #[test]
    fn test_restore_resets_transient_fields() {
        let f = fixture();
        let tab = f.tabs.create_tab(Some(f.session_id.as_str()), Some("/srv"), TabType::Browser);
        f.tabs.add_transfer(&tab, "t1").unwrap();
        f.tabs.add_transfer(&tab, "t1").unwrap();
        assert_eq!(f.tabs.get_tab(&tab).unwrap().active_transfers.len(), 1);

        let mut exported = f.tabs.export_tabs();
        exported.tabs[1].is_loading = true;
        exported.tabs[1].error = Some("boom".into());
        let json = serde_json::to_string(&exported).unwrap();

        let restored = TabManager::new(f.sessions.clone(), serde_json::from_str(&json).unwrap());
        let t = restored.get_tab(&tab).unwrap();
        assert!(!t.is_loading);
        assert!(t.error.is_none());
        assert!(t.active_transfers.is_empty());
        assert_eq!(t.session_id.as_deref(), Some(f.session_id.as_str()));
        assert_eq!(restored.active_tab_id().as_deref(), Some(HOME_TAB_ID));
    }

    #[test]
    fn test_session_rename_retitles_tabs() {
        let f = fixture();
        let tab = f.tabs.create_tab(Some(f.session_id.as_str()), Some("/srv"), TabType::Browser);
        let mut t = f.tabs.get_tab(&tab).unwrap();
        assert_eq!(t.title, "prod");

        let session = f.sessions.get_session(&f.session_id).unwrap();
        f.sessions
            .update_session(crate::session::SessionUpdate {
                id: session.id.clone(),
                name: "production".into(),
                host: session.host.clone(),
                port: session.port,
                username: session.username.clone(),
                ..Default::default()
            })
            .unwrap();
        f.tabs.retitle_session_tabs(&f.session_id);
        t = f.tabs.get_tab(&tab).unwrap();
        assert_eq!(t.title, "srv - production");

        f.tabs.close_session_tabs(&f.session_id);
        assert!(f.tabs.get_tab(&tab).is_none());
    }

    #[tokio::test]
    async fn test_reload_matching_tabs() {
        let f = fixture();
        let up = f.tabs.create_tab(Some(f.session_id.as_str()), None, TabType::Browser);
        let other = f.tabs.create_tab(Some(f.session_id.as_str()), None, TabType::Browser);
        f.tabs.navigate_to_path(&up, None, "/uploads").await;
        f.tabs.navigate_to_path(&other, None, "/var").await;

        f.backend.set_listing("/uploads", listing("/uploads", &["new.bin"]));
        f.tabs.reload_tabs_matching_path("/uploads/").await;

        assert_eq!(f.tabs.get_tab(&up).unwrap().files.len(), 1);
        assert!(f.tabs.get_tab(&other).unwrap().files.is_empty());
        assert_eq!(f.tabs.get_tab(&up).unwrap().history.len(), 2);
    }

    #[tokio::test]
    async fn test_reload_matching_tabs_skips_tabs_without_session() {
        let f = fixture();
        let tab = f.tabs.create_tab(Some(f.session_id.as_str()), None, TabType::Browser);
        assert!(f.tabs.navigate_to_path(&tab, None, "/").await);

        f.tabs.reload_tabs_matching_path("/").await;

        let home = f.tabs.get_tab(HOME_TAB_ID).unwrap();
        assert!(home.session_id.is_none());
        assert!(home.error.is_none());
        assert!(f.tabs.get_tab(&tab).unwrap().error.is_none());
    }

    #[tokio::test]
    async fn test_session_scoped_reload_leaves_other_sessions_alone() {
        let f = fixture();
        let other_id = f.sessions.add_session(new_session("stage", "stage.example.com")).unwrap();
        let mine = f.tabs.create_tab(Some(f.session_id.as_str()), None, TabType::Browser);
        let theirs = f.tabs.create_tab(Some(other_id.as_str()), Some("/dest"), TabType::Browser);
        assert!(f.tabs.navigate_to_path(&mine, None, "/dest").await);

        f.backend.set_listing("/dest", listing("/dest", &["a.txt"]));
        f.tabs.reload_session_tabs_matching_path(&f.session_id, "/dest/").await;

        assert_eq!(f.tabs.get_tab(&mine).unwrap().files.len(), 1);
        assert!(f.tabs.get_tab(&theirs).unwrap().files.is_empty());
        assert_eq!(f.sessions.status(&other_id), Some(SessionStatus::Disconnected));
        assert_eq!(f.backend.count_calls("connect"), 1);
    }
}
