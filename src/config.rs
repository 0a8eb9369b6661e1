//! Configuration management for the annotation client

use std::env;
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_API_URL: &str = "http://localhost:5001/api";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_HIGHLIGHT_COLOR: &str = "#FFFF00";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api: ApiConfig,
    /// Color used when a highlight is saved without an explicit one
    pub highlight_color: String,
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL of the note/highlight service, without trailing slash
    pub base_url: String,
    /// Bearer credential sent with every request
    pub token: Option<String>,
    pub timeout_secs: u64,
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            api: ApiConfig {
                base_url: DEFAULT_API_URL.to_string(),
                token: None,
                timeout_secs: DEFAULT_TIMEOUT_SECS,
            },
            highlight_color: DEFAULT_HIGHLIGHT_COLOR.to_string(),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        match Self::from_env_lossy() {
            (_, Some(err)) => Err(err),
            (config, None) => Ok(config),
        }
    }

    /// Like [`ClientConfig::from_env`], but a bad value falls back to its
    /// own default and the other keys are kept
    pub fn from_env_lossy() -> (Self, Option<ConfigError>) {
        let (timeout_secs, problem) = match parse_timeout(env::var("BIBLE_API_TIMEOUT_SECS").ok()) {
            Ok(secs) => (secs, None),
            Err(err) => (DEFAULT_TIMEOUT_SECS, Some(err)),
        };

        let config = ClientConfig {
            api: ApiConfig {
                base_url: normalize_base_url(
                    &env::var("BIBLE_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
                ),
                token: env::var("BIBLE_API_TOKEN").ok().filter(|t| !t.trim().is_empty()),
                timeout_secs,
            },
            highlight_color: env::var("BIBLE_HIGHLIGHT_COLOR")
                .unwrap_or_else(|_| DEFAULT_HIGHLIGHT_COLOR.to_string()),
        };
        (config, problem)
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.api.base_url = normalize_base_url(base_url);
        self
    }

    pub fn with_token(mut self, token: &str) -> Self {
        self.api.token = Some(token.to_string());
        self
    }
}

/// Timeout in whole seconds; unset means the default, zero is rejected
fn parse_timeout(raw: Option<String>) -> Result<u64, ConfigError> {
    let Some(raw) = raw else {
        return Ok(DEFAULT_TIMEOUT_SECS);
    };
    raw.trim()
        .parse()
        .ok()
        .filter(|secs| *secs > 0)
        .ok_or(ConfigError::InvalidValue {
            key: "BIBLE_API_TIMEOUT_SECS",
            value: raw,
        })
}

fn normalize_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}
