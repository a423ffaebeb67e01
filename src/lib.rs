//! Client core of a multi-session remote file browser.
//!
//! Sessions, tabs, the clipboard and transfer tracking all talk to the remote
//! side through one [`sftp::SftpBackend`] and agree on session ids.

pub mod bookmarks;
pub mod clipboard;
pub mod config;
pub mod error;
pub mod keychain;
pub mod logging;
pub mod session;
pub mod sftp;
pub mod state;
pub mod storage;
pub mod tabs;
pub mod transfers;

pub use error::{AppError, AppResult};
pub use state::AppState;
