use crate::error::AppResult;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default)]
    pub transfers: TransferSettings,
    #[serde(default)]
    pub ui: UiSettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransferSettings {
    /// Drop completed transfers from the panel after a short grace period
    #[serde(default)]
    pub auto_clear_success: bool,
    #[serde(default)]
    pub download_path: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListViewSize {
    Compact,
    #[default]
    Comfortable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiSettings {
    #[serde(default)]
    pub list_view_size: ListViewSize,
    #[serde(default = "default_true")]
    pub show_clipboard: bool,
    #[serde(default = "default_true")]
    pub show_bookmarks: bool,
    #[serde(default = "default_true")]
    pub highlight_bookmarks: bool,
    #[serde(default = "default_true")]
    pub priority_bookmarks: bool,
}

fn default_true() -> bool {
    true
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            list_view_size: ListViewSize::default(),
            show_clipboard: true,
            show_bookmarks: true,
            highlight_bookmarks: true,
            priority_bookmarks: true,
        }
    }
}

impl AppSettings {
    pub fn load(config_dir: &Path) -> AppResult<Self> {
        let config_path = config_dir.join("config.toml");
        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: AppSettings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            let settings = AppSettings::default();
            settings.save(config_dir)?;
            Ok(settings)
        }
    }

    pub fn save(&self, config_dir: &Path) -> AppResult<()> {
        crate::storage::write_toml(&config_dir.join("config.toml"), self)
    }
}
