//! Configuration management for the joke meter

pub mod file;

use std::path::PathBuf;
use std::time::Duration;

use crate::channels::TwitchChatConfig;
use crate::integrations::HELIX_BASE_URL;
use crate::lifecycle::DEFAULT_POLL_INTERVAL;
use crate::{Error, Result};

use self::file::JokeMeterConfigFile;

/// Joke meter configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Twitch chat and account settings
    pub twitch: TwitchConfig,

    /// Helix API settings
    pub helix: HelixConfig,

    /// Period between stream metadata polls
    pub poll_interval: Duration,

    /// Path to data directory (database)
    pub data_dir: PathBuf,
}

/// Twitch chat and account configuration
#[derive(Debug, Clone, Default)]
pub struct TwitchConfig {
    /// Account the chat connection logs in as
    pub bot_username: Option<String>,

    /// Chat OAuth token
    pub oauth_token: Option<String>,

    /// Channel to join
    pub channel: Option<String>,

    /// Chat WebSocket endpoint override
    pub chat_url: Option<String>,

    /// Broadcaster login used for stream lookups
    pub user_login: Option<String>,

    /// Broadcaster user ID used for video lookups
    pub user_id: Option<String>,
}

/// Helix API configuration
#[derive(Debug, Clone)]
pub struct HelixConfig {
    /// Application client ID
    pub client_id: Option<String>,

    /// App or user access token
    pub access_token: Option<String>,

    /// API base URL
    pub base_url: String,
}

impl Config {
    /// Load configuration from the environment and the config file
    ///
    /// Priority: env var > TOML file > default. `data_dir` overrides both when given.
    ///
    /// # Errors
    ///
    /// Returns error if the data directory cannot be created
    pub fn load(data_dir: Option<PathBuf>) -> Result<Self> {
        let fc = file::load_config_file();
        let mut config = Self::from_sources(|key| std::env::var(key).ok(), fc);

        if let Some(dir) = data_dir {
            config.data_dir = dir;
        }
        std::fs::create_dir_all(&config.data_dir)?;

        Ok(config)
    }

    /// Merge an environment lookup over a parsed config file
    pub fn from_sources<F>(env: F, fc: JokeMeterConfigFile) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let twitch = TwitchConfig {
            bot_username: var("TWITCH_BOT_USERNAME").or(fc.twitch.bot_username),
            oauth_token: var("TWITCH_OAUTH_TOKEN").or(fc.twitch.oauth_token),
            channel: var("TWITCH_CHANNEL").or(fc.twitch.channel),
            chat_url: var("TWITCH_CHAT_URL").or(fc.twitch.chat_url),
            user_login: var("TWITCH_USER_LOGIN").or(fc.twitch.user_login),
            user_id: var("TWITCH_USER_ID").or(fc.twitch.user_id),
        };

        let helix = HelixConfig {
            client_id: var("TWITCH_CLIENT_ID").or(fc.helix.client_id),
            access_token: var("TWITCH_ACCESS_TOKEN").or(fc.helix.access_token),
            base_url: var("HELIX_BASE_URL")
                .or(fc.helix.base_url)
                .unwrap_or_else(|| HELIX_BASE_URL.to_string()),
        };

        let poll_interval = var("JOKE_METER_POLL_INTERVAL")
            .and_then(|v| v.parse::<u64>().ok())
            .or(fc.server.poll_interval_secs)
            .filter(|secs| *secs > 0)
            .map_or(DEFAULT_POLL_INTERVAL, Duration::from_secs);

        let data_dir = var("JOKE_METER_DATA_DIR")
            .or(fc.server.data_dir)
            .map_or_else(default_data_dir, PathBuf::from);

        Self {
            twitch,
            helix,
            poll_interval,
            data_dir,
        }
    }

    /// Check that every credential the daemon needs is present
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` naming the missing settings
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("TWITCH_BOT_USERNAME", &self.twitch.bot_username),
            ("TWITCH_OAUTH_TOKEN", &self.twitch.oauth_token),
            ("TWITCH_CHANNEL", &self.twitch.channel),
            ("TWITCH_USER_LOGIN", &self.twitch.user_login),
            ("TWITCH_USER_ID", &self.twitch.user_id),
            ("TWITCH_CLIENT_ID", &self.helix.client_id),
            ("TWITCH_ACCESS_TOKEN", &self.helix.access_token),
        ];

        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, value)| value.is_none())
            .map(|(key, _)| *key)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::Config(format!("missing settings: {}", missing.join(", "))))
        }
    }

    /// Chat connection settings
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if chat credentials are missing
    pub fn chat(&self) -> Result<TwitchChatConfig> {
        match (&self.twitch.bot_username, &self.twitch.oauth_token, &self.twitch.channel) {
            (Some(bot), Some(token), Some(channel)) => {
                let mut chat = TwitchChatConfig::new(bot.clone(), token.clone(), channel.clone());
                if let Some(url) = &self.twitch.chat_url {
                    chat.url.clone_from(url);
                }
                Ok(chat)
            }
            _ => Err(Error::Config("Twitch chat credentials not configured".to_string())),
        }
    }

    /// Path to the `SQLite` database
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("joke-meter.db")
    }
}

/// Default data directory: platform data dir joined with `joke-meter`
#[must_use]
pub fn default_data_dir() -> PathBuf {
    directories::BaseDirs::new()
        .map_or_else(|| PathBuf::from("."), |d| d.data_dir().join("joke-meter"))
}
