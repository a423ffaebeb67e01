//! On-disk persistence for the catalogues that survive a restart.
//!
//! User-editable catalogues (settings, sessions, bookmarks) are TOML, machine
//! state (tabs, clipboard) is JSON. Every write goes to a temp file first and
//! is renamed into place, so a crash never leaves a half-written catalogue.

use crate::error::AppResult;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::Path;

pub const SESSIONS_FILE: &str = "sessions.toml";
pub const BOOKMARKS_FILE: &str = "bookmarks.toml";
pub const TABS_FILE: &str = "tabs.json";
pub const CLIPBOARD_FILE: &str = "clipboard.json";

/// Read a TOML file, returning `None` when it does not exist yet
pub fn read_toml<T: DeserializeOwned>(path: &Path) -> AppResult<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    Ok(Some(toml::from_str(&content)?))
}

pub fn write_toml<T: Serialize>(path: &Path, value: &T) -> AppResult<()> {
    let content = toml::to_string_pretty(value)?;
    write_atomic(path, content.as_bytes())
}

/// Read a JSON file, returning `None` when it does not exist yet
pub fn read_json<T: DeserializeOwned>(path: &Path) -> AppResult<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&content)?))
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> AppResult<()> {
    let content = serde_json::to_string_pretty(value)?;
    write_atomic(path, content.as_bytes())
}

fn write_atomic(path: &Path, data: &[u8]) -> AppResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, data)?;

    // Sessions carry sealed secrets, keep every catalogue private
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = fs::Permissions::from_mode(0o600);
        let _ = fs::set_permissions(&temp_path, perms);
    }

    fs::rename(&temp_path, path)?;
    tracing::debug!("Wrote {} bytes to {:?}", data.len(), path);
    Ok(())
}
