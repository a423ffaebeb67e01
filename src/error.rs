use serde::Serialize;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("SFTP error: {0}")]
    Sftp(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Credential error: {0}")]
    Credential(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Session already exists: {0}")]
    DuplicateSession(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Tab not found: {0}")]
    TabNotFound(String),

    #[error("Bookmark not found: {0}")]
    BookmarkNotFound(String),

    #[error("No active connection for session {0}")]
    NoActiveConnection(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl AppError {
    /// Errors raised because the caller asked for a remote operation without a
    /// live connection. These point at a state-sync bug in the caller.
    pub fn is_precondition(&self) -> bool {
        matches!(self, AppError::NoActiveConnection(_))
    }
}

/// Serializable error for the UI bridge
#[derive(Serialize)]
pub struct SerializableError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl From<&AppError> for SerializableError {
    fn from(err: &AppError) -> Self {
        let (code, message, details) = match err {
            AppError::Sftp(msg) => ("SFTP_ERROR", msg.clone(), None),
            AppError::Connection(msg) => ("CONNECTION_ERROR", msg.clone(), None),
            AppError::Credential(msg) => (
                "CREDENTIAL_ERROR",
                "Stored credentials could not be read".to_string(),
                Some(msg.clone()),
            ),
            AppError::Config(msg) => ("CONFIG_ERROR", msg.clone(), None),
            AppError::Io(e) => ("IO_ERROR", e.to_string(), None),
            AppError::Serialization(msg) => ("SERIALIZATION_ERROR", msg.clone(), None),
            AppError::Validation(msg) => ("VALIDATION_ERROR", msg.clone(), None),
            AppError::DuplicateSession(msg) => ("DUPLICATE_SESSION", msg.clone(), None),
            AppError::SessionNotFound(id) => ("SESSION_NOT_FOUND", format!("Session {} not found", id), None),
            AppError::TabNotFound(id) => ("TAB_NOT_FOUND", format!("Tab {} not found", id), None),
            AppError::BookmarkNotFound(id) => ("BOOKMARK_NOT_FOUND", format!("Bookmark {} not found", id), None),
            AppError::NoActiveConnection(id) => (
                "NO_ACTIVE_CONNECTION",
                format!("Session {} is not connected", id),
                None,
            ),
            AppError::Unknown(msg) => ("UNKNOWN_ERROR", msg.clone(), None),
        };

        SerializableError {
            code: code.to_string(),
            message,
            details,
        }
    }
}

// Serialize through SerializableError so the UI gets a stable code
impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        SerializableError::from(self).serialize(serializer)
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for AppError {
    fn from(err: toml::ser::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<keyring::Error> for AppError {
    fn from(err: keyring::Error) -> Self {
        AppError::Credential(err.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Unknown(err.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;
