use crate::sftp::FileItem;
use serde::{Deserialize, Serialize};

/// Connection lifecycle of a configured session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// A configured remote endpoint.
///
/// `password` and `passphrase` hold sealed values produced by
/// [`CredentialCodec`](crate::keychain::CredentialCodec), never clear text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub name: String,
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passphrase: Option<String>,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<i64>,
    /// Live state, always `Disconnected` after a restart
    #[serde(skip)]
    pub status: SessionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_favorite: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

fn default_port() -> u16 {
    22
}

impl Session {
    pub fn is_connected(&self) -> bool {
        self.status == SessionStatus::Connected
    }

    /// Whether this session points at the same account as the given triple
    pub fn same_endpoint(&self, host: &str, port: u16, username: &str) -> bool {
        self.host == host && self.port == port && self.username == username
    }

    fn matches_query(&self, query: &str) -> bool {
        self.name.to_lowercase().contains(query)
            || self.host.to_lowercase().contains(query)
            || self.username.to_lowercase().contains(query)
            || self
                .notes
                .as_ref()
                .map_or(false, |n| n.to_lowercase().contains(query))
            || self.tags.iter().any(|t| t.to_lowercase().contains(query))
    }

    pub(crate) fn matches(&self, query: &str) -> bool {
        self.matches_query(&query.to_lowercase())
    }
}

/// Input for a new session; secrets are given in clear text and sealed on insert
#[derive(Debug, Clone, Default)]
pub struct NewSession {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: Option<String>,
    pub private_key_path: Option<String>,
    pub passphrase: Option<String>,
    pub notes: Option<String>,
    pub tags: Vec<String>,
    pub is_favorite: bool,
    pub color_label: Option<String>,
    pub icon: Option<String>,
}

/// Replacement for the mutable fields of an existing session.
///
/// For `password` and `passphrase`, `None` keeps the stored secret and
/// `Some("")` clears it. Every other field is replaced as given.
#[derive(Debug, Clone, Default)]
pub struct SessionUpdate {
    pub id: String,
    pub name: String,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: Option<String>,
    pub private_key_path: Option<String>,
    pub passphrase: Option<String>,
    pub notes: Option<String>,
    pub tags: Vec<String>,
    pub color_label: Option<String>,
    pub icon: Option<String>,
}

/// Runtime binding between a session and a backend connection. Never persisted.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    pub connection_id: String,
    pub current_path: String,
    pub files: Vec<FileItem>,
    pub is_loading: bool,
    pub error: Option<String>,
    pub connected_at: i64,
}

impl ConnectionHandle {
    pub fn new(connection_id: String) -> Self {
        Self {
            connection_id,
            current_path: crate::sftp::paths::ROOT.to_string(),
            files: Vec::new(),
            is_loading: false,
            error: None,
            connected_at: chrono::Utc::now().timestamp(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session {
            id: "s1".into(),
            name: "Build box".into(),
            host: "build.example.com".into(),
            port: 22,
            username: "ci".into(),
            password: None,
            private_key_path: None,
            passphrase: None,
            created_at: 0,
            updated_at: 0,
            last_used_at: None,
            status: SessionStatus::Connected,
            notes: Some("Nightly runners".into()),
            tags: vec!["Prod".into()],
            is_favorite: false,
            color_label: None,
            icon: None,
        }
    }

    #[test]
    fn test_status_is_not_persisted() {
        let json = serde_json::to_string(&session()).unwrap();
        assert!(!json.contains("status"));
        let restored: Session = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.status, SessionStatus::Disconnected);
    }

    #[test]
    fn test_query_matches_notes_and_tags() {
        let s = session();
        assert!(s.matches("NIGHTLY"));
        assert!(s.matches("prod"));
        assert!(s.matches("example"));
        assert!(!s.matches("staging"));
    }
}
