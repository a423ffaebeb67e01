use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Named shortcut to a path on one session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: String,
    pub name: String,
    pub session_id: String,
    pub path: String,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Partial update; `None` leaves a field unchanged
#[derive(Debug, Clone, Default)]
pub struct BookmarkUpdate {
    pub name: Option<String>,
    pub path: Option<String>,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub description: Option<String>,
}

/// Bookmark file format
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookmarksFile {
    #[serde(default)]
    pub bookmarks: Vec<Bookmark>,
}

/// Bookmark catalogue, kept in insertion order
#[derive(Debug, Default)]
pub struct BookmarkStore {
    bookmarks: Vec<Bookmark>,
}

impl BookmarkStore {
    pub fn new(file: BookmarksFile) -> Self {
        Self {
            bookmarks: file.bookmarks,
        }
    }

    pub fn export(&self) -> BookmarksFile {
        BookmarksFile {
            bookmarks: self.bookmarks.clone(),
        }
    }

    pub fn add_bookmark(&mut self, name: &str, path: &str, session_id: &str) -> AppResult<String> {
        if name.trim().is_empty() {
            return Err(AppError::Validation("Bookmark name cannot be empty".to_string()));
        }
        if path.trim().is_empty() {
            return Err(AppError::Validation("Bookmark path cannot be empty".to_string()));
        }

        let now = chrono::Utc::now().timestamp();
        let id = Uuid::new_v4().to_string();
        self.bookmarks.push(Bookmark {
            id: id.clone(),
            name: name.to_string(),
            session_id: session_id.to_string(),
            path: path.to_string(),
            created_at: now,
            updated_at: now,
            icon: None,
            color: None,
            description: None,
        });
        Ok(id)
    }

    pub fn remove_bookmark(&mut self, id: &str) -> AppResult<()> {
        let before = self.bookmarks.len();
        self.bookmarks.retain(|b| b.id != id);
        if self.bookmarks.len() == before {
            return Err(AppError::BookmarkNotFound(id.to_string()));
        }
        Ok(())
    }

    pub fn update_bookmark(&mut self, id: &str, update: BookmarkUpdate) -> AppResult<()> {
        let bookmark = self
            .bookmarks
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or_else(|| AppError::BookmarkNotFound(id.to_string()))?;

        if let Some(name) = update.name {
            if name.trim().is_empty() {
                return Err(AppError::Validation("Bookmark name cannot be empty".to_string()));
            }
            bookmark.name = name;
        }
        if let Some(path) = update.path {
            bookmark.path = path;
        }
        if update.icon.is_some() {
            bookmark.icon = update.icon;
        }
        if update.color.is_some() {
            bookmark.color = update.color;
        }
        if update.description.is_some() {
            bookmark.description = update.description;
        }
        bookmark.updated_at = chrono::Utc::now().timestamp();
        Ok(())
    }

    pub fn bookmarks(&self) -> Vec<Bookmark> {
        self.bookmarks.clone()
    }

    pub fn bookmarks_for_session(&self, session_id: &str) -> Vec<Bookmark> {
        self.bookmarks
            .iter()
            .filter(|b| b.session_id == session_id)
            .cloned()
            .collect()
    }

    /// Whether `path` on `session_id` is bookmarked
    pub fn is_bookmarked(&self, session_id: &str, path: &str) -> bool {
        self.bookmarks
            .iter()
            .any(|b| b.session_id == session_id && crate::sftp::paths::is_same_path(&b.path, path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_filter_by_session() {
        let mut store = BookmarkStore::default();
        store.add_bookmark("Logs", "/var/log", "s1").unwrap();
        store.add_bookmark("Home", "/home/alice", "s2").unwrap();

        assert_eq!(store.bookmarks().len(), 2);
        assert_eq!(store.bookmarks_for_session("s1")[0].name, "Logs");
        assert!(store.is_bookmarked("s1", "/var/log/"));
        assert!(!store.is_bookmarked("s2", "/var/log"));
    }

    #[test]
    fn test_validation() {
        let mut store = BookmarkStore::default();
        assert!(matches!(
            store.add_bookmark(" ", "/x", "s1"),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(store.add_bookmark("x", "", "s1"), Err(AppError::Validation(_))));
        assert!(store.bookmarks().is_empty());
    }

    #[test]
    fn test_partial_update() {
        let mut store = BookmarkStore::default();
        let id = store.add_bookmark("Logs", "/var/log", "s1").unwrap();

        store
            .update_bookmark(
                &id,
                BookmarkUpdate {
                    color: Some("red".into()),
                    ..Default::default()
                },
            )
            .unwrap();

        let b = &store.bookmarks()[0];
        assert_eq!(b.name, "Logs");
        assert_eq!(b.color.as_deref(), Some("red"));
        assert!(b.updated_at >= b.created_at);
        assert!(matches!(
            store.update_bookmark("missing", BookmarkUpdate::default()),
            Err(AppError::BookmarkNotFound(_))
        ));
    }

    #[test]
    fn test_remove() {
        let mut store = BookmarkStore::default();
        let id = store.add_bookmark("Logs", "/var/log", "s1").unwrap();
        store.remove_bookmark(&id).unwrap();
        assert!(store.remove_bookmark(&id).is_err());
    }

    #[test]
    fn test_toml_roundtrip_keeps_optional_fields_out() {
        let mut store = BookmarkStore::default();
        store.add_bookmark("Logs", "/var/log", "s1").unwrap();
        let text = toml::to_string_pretty(&store.export()).unwrap();
        assert!(text.contains("[[bookmarks]]"));
        assert!(!text.contains("description"));
        let parsed: BookmarksFile = toml::from_str(&text).unwrap();
        assert_eq!(parsed.bookmarks, store.bookmarks());
    }
}
