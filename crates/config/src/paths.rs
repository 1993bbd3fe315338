//! Filesystem locations

use std::path::{Path, PathBuf};

/// Data directory (~/.stepwise)
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".stepwise"))
        .unwrap_or_else(|| PathBuf::from(".stepwise"))
}

/// Config file location
pub fn config_path() -> PathBuf {
    data_dir().join("config.json")
}

/// Default workspace location
pub fn workspace_path() -> PathBuf {
    data_dir().join("workspace")
}

/// Conversation thread checkpoints
pub fn threads_dir() -> PathBuf {
    data_dir().join("threads")
}

/// Ensure directory exists
pub async fn ensure_dir(path: &Path) -> std::io::Result<()> {
    tokio::fs::create_dir_all(path).await
}

/// Expand a leading `~` to the home directory
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    } else if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

/// Sanitize a key for use as a file name
pub fn safe_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            _ => c,
        })
        .collect()
}
