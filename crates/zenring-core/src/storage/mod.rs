mod config;
mod preferences;

pub use config::{Config, TomlPreferenceStore};
pub use preferences::{Language, MemoryStore, PreferenceStore, Preferences};

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns `~/.config/zenring[-dev]/` based on ZENRING_ENV.
///
/// Set ZENRING_ENV=dev to use the development data directory.
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("ZENRING_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("zenring-dev")
    } else {
        base_dir.join("zenring")
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DirUnavailable(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
