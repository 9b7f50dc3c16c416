//! Client configuration, loaded from the environment.

use std::env;
use std::path::PathBuf;

use chrono::Duration;

use crate::error::{Error, Result};

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_TOKEN_PATH: &str = ".coop/token.json";
pub const DEFAULT_SESSION_TTL_SECS: i64 = 24 * 60 * 60;

#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL every API path is appended to (`API_BASE_URL`).
    pub api_base_url: String,
    /// Where the bearer token is persisted (`COOP_TOKEN_PATH`).
    pub token_path: PathBuf,
    /// Token lifetime when the server does not state one
    /// (`COOP_SESSION_TTL_SECS`).
    pub session_ttl: Duration,
    /// Default tracing filter (`COOP_LOG_LEVEL`).
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            token_path: PathBuf::from(DEFAULT_TOKEN_PATH),
            session_ttl: Duration::seconds(DEFAULT_SESSION_TTL_SECS),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Read the process environment, after loading `.env` if present.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; unset keys take their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let api_base_url = lookup("API_BASE_URL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(defaults.api_base_url);
        if !(api_base_url.starts_with("http://") || api_base_url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "API_BASE_URL must start with http:// or https://, got {api_base_url}"
            )));
        }

        let token_path = lookup("COOP_TOKEN_PATH")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.token_path);

        let session_ttl = match lookup("COOP_SESSION_TTL_SECS") {
            Some(raw) => {
                let secs: i64 = raw.trim().parse().map_err(|_| {
                    Error::Config(format!("COOP_SESSION_TTL_SECS must be an integer, got {raw}"))
                })?;
                if secs <= 0 {
                    return Err(Error::Config(
                        "COOP_SESSION_TTL_SECS must be positive".to_string(),
                    ));
                }
                Duration::seconds(secs)
            }
            None => defaults.session_ttl,
        };

        let log_level = lookup("COOP_LOG_LEVEL").unwrap_or(defaults.log_level);

        Ok(Self {
            api_base_url,
            token_path,
            session_ttl,
            log_level,
        })
    }
}
