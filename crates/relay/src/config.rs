use std::fmt;
use std::path::Path;
use std::time::Duration;

use url::Url;

use crate::{Error, Result};

pub const DEFAULT_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_PATH: &str = "/";
pub const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";

const ROUTE_META_CHARS: [char; 4] = [':', '*', '{', '}'];

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub webhook: WebhookConfig,
    pub telegram: TelegramConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: String,
    /// Root path the alerting platform posts to.
    pub path: String,
}

#[derive(Clone)]
pub struct WebhookConfig {
    pub token: String,
}

#[derive(Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    /// Destinations exactly as split from `TG_CHAT_IDS`.
    pub chat_ids: Vec<String>,
    pub api_url: String,
    pub timeout: Option<Duration>,
}

// Secrets never end up in logs.
impl fmt::Debug for WebhookConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebhookConfig")
            .field("token", &"<redacted>")
            .finish()
    }
}

impl fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &"<redacted>")
            .field("chat_ids", &self.chat_ids)
            .field("api_url", &self.api_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load environment variables from .env file if it exists
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`Config::load`] but reads a specific dotenv file, which must exist.
    pub fn load_with_env_file(path: &Path) -> Result<Self> {
        dotenvy::from_path(path).map_err(|e| {
            Error::Config(format!("failed to read env file {}: {}", path.display(), e))
        })?;
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key/value source. `load` passes the process
    /// environment; tests pass a map.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<String> {
            match lookup(key) {
                Some(value) if !value.is_empty() => Ok(value),
                _ => Err(Error::Config(format!("{} must be set", key))),
            }
        };

        let path = lookup("WEBHOOK_PATH").unwrap_or_else(|| DEFAULT_PATH.to_string());
        if !path.starts_with('/') {
            return Err(Error::Config(format!(
                "WEBHOOK_PATH must start with '/', got {:?}",
                path
            )));
        }
        // The path is routed literally; these would be read as captures or wildcards.
        if path.contains(&ROUTE_META_CHARS[..]) {
            return Err(Error::Config(format!(
                "WEBHOOK_PATH must not contain any of {:?}, got {:?}",
                ROUTE_META_CHARS, path
            )));
        }

        let api_url = lookup("TELEGRAM_API_URL")
            .unwrap_or_else(|| DEFAULT_TELEGRAM_API_URL.to_string());
        Url::parse(&api_url)
            .map_err(|e| Error::Config(format!("TELEGRAM_API_URL is not a valid URL: {}", e)))?;

        let timeout = match lookup("TG_REQUEST_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw.parse().map_err(|_| {
                    Error::Config(format!(
                        "TG_REQUEST_TIMEOUT_SECS must be a whole number of seconds, got {:?}",
                        raw
                    ))
                })?;
                Some(Duration::from_secs(secs))
            }
            None => None,
        };

        let config = Config {
            server: ServerConfig {
                addr: lookup("SERVER_ADDR").unwrap_or_else(|| DEFAULT_ADDR.to_string()),
                path,
            },
            webhook: WebhookConfig {
                token: required("WEBHOOK_TOKEN")?,
            },
            telegram: TelegramConfig {
                bot_token: required("BOT_TOKEN")?,
                chat_ids: split_chat_ids(&required("TG_CHAT_IDS")?),
                api_url: api_url.trim_end_matches('/').to_string(),
                timeout,
            },
        };

        if config.telegram.timeout.is_none() {
            tracing::debug!("TG_REQUEST_TIMEOUT_SECS is not set; outbound calls are unbounded");
        }

        Ok(config)
    }
}

/// Plain split on `,`. Entries are parsed per delivery, so a malformed one only fails
/// its own destination.
pub fn split_chat_ids(raw: &str) -> Vec<String> {
    raw.split(',').map(str::to_string).collect()
}
