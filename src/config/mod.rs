pub mod auth;
pub mod settings;

pub use auth::{CredentialStore, Credentials};
pub use settings::{BitbucketConfig, Settings};

use crate::errors::{BbsError, Result};
use std::fs;
use std::path::PathBuf;

/// Environment variable overriding the configuration directory.
///
/// Useful for automation runs that must not touch the invoking user's home.
pub const ENV_CONFIG_DIR: &str = "BBSCTL_CONFIG_DIR";

/// Get the bbsctl configuration directory (~/.bbsctl/, or `BBSCTL_CONFIG_DIR`)
pub fn get_config_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_CONFIG_DIR) {
        return Ok(PathBuf::from(dir));
    }

    let home_dir =
        dirs::home_dir().ok_or_else(|| BbsError::config("Could not find home directory"))?;
    Ok(home_dir.join(".bbsctl"))
}

/// Path of the settings file inside the configuration directory
pub fn settings_path() -> Result<PathBuf> {
    Ok(get_config_dir()?.join("config.json"))
}

/// Ensure the configuration directory exists
pub fn ensure_config_dir() -> Result<PathBuf> {
    let config_dir = get_config_dir()?;
    if !config_dir.exists() {
        fs::create_dir_all(&config_dir).map_err(|e| {
            BbsError::config(format!("Failed to create config directory: {}", e))
        })?;
    }
    Ok(config_dir)
}

/// Load settings from the default location
pub fn load_settings() -> Result<Settings> {
    Settings::load_from_file(&settings_path()?)
}
