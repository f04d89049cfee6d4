//! Bot configuration from the environment

use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No bot token: set DRILL_BOT_TOKEN or create {}", .0.display())]
    MissingToken(PathBuf),
    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Runtime settings
#[derive(Clone)]
pub struct BotConfig {
    /// Subscriptions, verb lists and the token file live here
    pub data_dir: PathBuf,
    pub token: String,
    /// Inactivity limit applied to every dialogue
    pub conversation_timeout: Option<Duration>,
    pub poll_timeout: Duration,
}

impl std::fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotConfig")
            .field("data_dir", &self.data_dir)
            .field("token", &"<redacted>")
            .field("conversation_timeout", &self.conversation_timeout)
            .field("poll_timeout", &self.poll_timeout)
            .finish()
    }
}

impl BotConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any variable source
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let data_dir = var("DRILL_DATA_DIR").map_or_else(
            || {
                let home = var("HOME").unwrap_or_else(|| "/tmp".to_string());
                PathBuf::from(home).join(".local/share/daily-language-bot")
            },
            PathBuf::from,
        );

        let token = match var("DRILL_BOT_TOKEN").filter(|t| !t.trim().is_empty()) {
            Some(token) => token.trim().to_string(),
            None => read_token(&data_dir)?,
        };

        let conversation_timeout = var("DRILL_CONVERSATION_TIMEOUT_SECS")
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|&secs| secs > 0)
            .map(Duration::from_secs);

        let poll_timeout = var("DRILL_POLL_TIMEOUT_SECS")
            .and_then(|s| s.parse::<u64>().ok())
            .map_or(DEFAULT_POLL_TIMEOUT, Duration::from_secs);

        Ok(Self {
            data_dir,
            token,
            conversation_timeout,
            poll_timeout,
        })
    }
}

fn read_token(data_dir: &Path) -> Result<String, ConfigError> {
    let path = data_dir.join("token");
    match std::fs::read_to_string(&path) {
        Ok(raw) if !raw.trim().is_empty() => Ok(raw.trim().to_string()),
        Ok(_) => Err(ConfigError::MissingToken(path)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ConfigError::MissingToken(path)),
        Err(source) => Err(ConfigError::Io { path, source }),
    }
}
