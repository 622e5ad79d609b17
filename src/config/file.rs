//! TOML configuration file loading
//!
//! Supports `~/.config/joke-meter/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct JokeMeterConfigFile {
    /// Twitch chat and account settings
    #[serde(default)]
    pub twitch: TwitchFileConfig,

    /// Helix API settings
    #[serde(default)]
    pub helix: HelixFileConfig,

    /// Runtime settings
    #[serde(default)]
    pub server: ServerFileConfig,
}

/// Twitch chat and account configuration
#[derive(Debug, Default, Deserialize)]
pub struct TwitchFileConfig {
    pub bot_username: Option<String>,
    pub oauth_token: Option<String>,
    pub channel: Option<String>,

    /// Override for the chat WebSocket endpoint
    pub chat_url: Option<String>,

    pub user_login: Option<String>,
    pub user_id: Option<String>,
}

/// Helix API configuration
#[derive(Debug, Default, Deserialize)]
pub struct HelixFileConfig {
    pub client_id: Option<String>,
    pub access_token: Option<String>,

    /// Override for the Helix base URL
    pub base_url: Option<String>,
}

/// Runtime configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    /// Seconds between stream metadata polls
    pub poll_interval_secs: Option<u64>,

    /// Directory holding the database
    pub data_dir: Option<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `JokeMeterConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> JokeMeterConfigFile {
    config_file_path().map_or_else(JokeMeterConfigFile::default, |path| {
        load_config_file_from(&path)
    })
}

/// Load a TOML config file from an explicit path
pub fn load_config_file_from(path: &Path) -> JokeMeterConfigFile {
    if !path.exists() {
        return JokeMeterConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                JokeMeterConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            JokeMeterConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/joke-meter/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("joke-meter").join("config.toml"))
}
