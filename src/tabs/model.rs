use crate::sftp::{paths, FileItem};
use serde::{Deserialize, Serialize};

pub const HOME_TAB_ID: &str = "home-tab";

/// Oldest history entries are dropped past this length
pub const MAX_HISTORY: usize = 50;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TabType {
    #[default]
    Browser,
    Editor,
    Terminal,
    Settings,
}

impl TabType {
    fn icon(self) -> &'static str {
        match self {
            TabType::Browser => "folder",
            TabType::Editor => "file-text",
            TabType::Terminal | TabType::Settings => "terminal",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    List,
    Grid,
    Detailed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    #[default]
    Name,
    Size,
    Modified,
    Type,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// One navigable view over a session's filesystem.
///
/// The tab refers to its session by id only. Reads of the session always go
/// through the session manager, so renames and status changes are seen by
/// every tab without copying.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tab {
    pub id: String,
    pub index: usize,
    #[serde(default)]
    pub session_id: Option<String>,
    pub file_path: String,
    pub title: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub is_pinned: bool,
    #[serde(default)]
    pub is_loading: bool,
    #[serde(rename = "type", default)]
    pub tab_type: TabType,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub files: Vec<FileItem>,
    pub history: Vec<String>,
    pub history_index: usize,
    #[serde(default)]
    pub last_activity: i64,
    #[serde(default)]
    pub selected_files: Vec<String>,
    #[serde(default)]
    pub view_mode: ViewMode,
    #[serde(default)]
    pub sort_by: SortBy,
    #[serde(default)]
    pub sort_order: SortOrder,
    #[serde(default)]
    pub filter_query: String,
    #[serde(default)]
    pub scroll_position: u32,
    #[serde(default)]
    pub active_transfers: Vec<String>,
    /// Bumped on every listing request; a response carrying an older token is stale
    #[serde(skip)]
    pub(crate) load_token: u64,
}

impl Tab {
    pub fn new(id: String, index: usize, session_id: Option<String>, path: &str, tab_type: TabType) -> Self {
        Self {
            id,
            index,
            session_id,
            file_path: path.to_string(),
            title: "New Tab".to_string(),
            icon: Some(tab_type.icon().to_string()),
            is_pinned: false,
            is_loading: false,
            tab_type,
            error: None,
            files: Vec::new(),
            history: vec![path.to_string()],
            history_index: 0,
            last_activity: chrono::Utc::now().timestamp(),
            selected_files: Vec::new(),
            view_mode: ViewMode::default(),
            sort_by: SortBy::default(),
            sort_order: SortOrder::default(),
            filter_query: String::new(),
            scroll_position: 0,
            active_transfers: Vec::new(),
            load_token: 0,
        }
    }

    pub fn home() -> Self {
        let mut tab = Self::new(HOME_TAB_ID.to_string(), 0, None, paths::ROOT, TabType::Browser);
        tab.title = tab_title(paths::ROOT, None);
        tab
    }

    /// Append `path` after the cursor, dropping forward entries
    pub(crate) fn push_history(&mut self, path: &str) {
        self.history.truncate(self.history_index + 1);
        self.history.push(path.to_string());
        if self.history.len() > MAX_HISTORY {
            let excess = self.history.len() - MAX_HISTORY;
            self.history.drain(..excess);
        }
        self.history_index = self.history.len() - 1;
    }

    /// Move the history cursor; `false` when the move would leave the stack
    pub(crate) fn step_history(&mut self, forward: bool) -> bool {
        let target = if forward {
            self.history_index + 1
        } else if self.history_index > 0 {
            self.history_index - 1
        } else {
            return false;
        };
        match self.history.get(target) {
            Some(path) => {
                self.file_path = path.clone();
                self.history_index = target;
                true
            }
            None => false,
        }
    }

    pub fn can_go_back(&self) -> bool {
        self.history_index > 0
    }

    pub fn can_go_forward(&self) -> bool {
        self.history_index + 1 < self.history.len()
    }

    pub(crate) fn reset_view(&mut self) {
        self.selected_files.clear();
        self.scroll_position = 0;
    }

    pub(crate) fn touch(&mut self) {
        self.last_activity = chrono::Utc::now().timestamp();
    }

    pub(crate) fn select(&mut self, path: &str) {
        if !self.selected_files.iter().any(|p| p == path) {
            self.selected_files.push(path.to_string());
        }
    }

    /// Inclusive listing range between the last selected entry and `path`
    pub(crate) fn range_to(&self, path: &str) -> Option<Vec<String>> {
        let anchor = self.selected_files.last()?;
        let from = self.files.iter().position(|f| &f.path == anchor)?;
        let to = self.files.iter().position(|f| f.path == path)?;
        let (start, end) = if from <= to { (from, to) } else { (to, from) };
        Some(self.files[start..=end].iter().map(|f| f.path.clone()).collect())
    }
}

/// Title shown for a tab at `path`: `"<last segment> - <session>"`, or just
/// the session name at the root.
pub fn tab_title(path: &str, session_name: Option<&str>) -> String {
    match (paths::last_segment(path), session_name) {
        (Some(segment), Some(session)) => format!("{} - {}", segment, session),
        (Some(segment), None) => segment.to_string(),
        (None, Some(session)) if !session.is_empty() => session.to_string(),
        (None, _) => "Untitled".to_string(),
    }
}

/// On-disk shape of `tabs.json`
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct TabsFile {
    #[serde(default)]
    pub tabs: Vec<Tab>,
    #[serde(default)]
    pub active_tab_id: Option<String>,
}
