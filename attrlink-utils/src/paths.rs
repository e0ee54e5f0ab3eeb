//! Path utilities for attrlink
//!
//! XDG Base Directory locations for worker configuration and logs.

use std::path::PathBuf;

use directories::ProjectDirs;

/// Application identifier for XDG directories
const APP_NAME: &str = "attrlink";

fn project_dirs() -> Option<ProjectDirs> {
    let dirs = ProjectDirs::from("", "", APP_NAME);
    if dirs.is_none() {
        tracing::warn!("No home directory found, falling back to relative paths");
    }
    dirs
}

/// Get the configuration directory
///
/// Location: `$XDG_CONFIG_HOME/attrlink` or `~/.config/attrlink`
pub fn config_dir() -> PathBuf {
    project_dirs()
        .map(|p| p.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".").join(APP_NAME))
}

/// Get the worker configuration file path
///
/// Location: `$XDG_CONFIG_HOME/attrlink/config.toml`
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

/// Get the log directory
///
/// Location: `$XDG_STATE_HOME/attrlink/logs` or `~/.local/state/attrlink/logs`
pub fn log_dir() -> PathBuf {
    project_dirs()
        .and_then(|p| p.state_dir().map(|d| d.to_path_buf()))
        .unwrap_or_else(|| PathBuf::from(".").join(APP_NAME))
        .join("logs")
}
