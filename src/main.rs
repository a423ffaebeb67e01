use anyhow::Context;
use fileman_core::config::get_config_dir;
use fileman_core::keychain::CredentialCodec;
use fileman_core::logging::init_tracing;
use fileman_core::sftp::OfflineBackend;
use fileman_core::AppState;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config_dir = get_config_dir().context("Failed to resolve config directory")?;
    let codec = CredentialCodec::load_or_create(&config_dir).context("Failed to load credential key")?;
    let state = AppState::load(&config_dir, Arc::new(OfflineBackend), codec)
        .context("Failed to load application state")?;

    tracing::info!("fileman config dir: {:?}", state.config_dir());

    let sessions = state.sessions.list_sessions();
    println!("Sessions ({}):", sessions.len());
    for session in &sessions {
        let favorite = if session.is_favorite { " *" } else { "" };
        println!(
            "  {}{}  {}@{}:{}",
            session.name, favorite, session.username, session.host, session.port
        );
    }

    let tabs = state.tabs.tabs();
    println!("Tabs ({}):", tabs.len());
    for tab in &tabs {
        let pinned = if tab.is_pinned { " [pinned]" } else { "" };
        println!("  {}{}  {}", tab.title, pinned, tab.file_path);
    }

    let bookmarks = state.bookmarks.read().bookmarks();
    println!("Bookmarks ({}):", bookmarks.len());
    for bookmark in &bookmarks {
        let session = state
            .sessions
            .get_session(&bookmark.session_id)
            .map(|s| s.name)
            .unwrap_or_else(|| "<deleted session>".to_string());
        println!("  {}  {}:{}", bookmark.name, session, bookmark.path);
    }

    let clipboard = state.clipboard.items();
    println!("Clipboard ({}):", clipboard.len());
    for item in &clipboard {
        println!("  {:?} {} ({:?})", item.action, item.file.path, item.status);
    }

    Ok(())
}
