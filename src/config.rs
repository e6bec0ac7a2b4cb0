use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::constants::{DEFAULT_API_BASE_URL, DEFAULT_PAGE_SIZE, SEARCH_DEBOUNCE, TOTAL_POSTS};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
    #[error("failed to parse {name} as integer: {source}")]
    ParseInt {
        name: String,
        #[source]
        source: std::num::ParseIntError,
    },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Remote API
    pub api_base_url: String,
    pub http_timeout: Duration,

    // Database
    pub database_path: PathBuf,

    // Pagination
    pub page_size: usize,
    pub total_posts: usize,

    // Search
    pub search_debounce: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            // Remote API
            api_base_url: env_or_default("API_BASE_URL", DEFAULT_API_BASE_URL),
            http_timeout: Duration::from_secs(parse_env_u64("HTTP_TIMEOUT_SECS", 30)?),

            // Database
            database_path: PathBuf::from(env_or_default(
                "DATABASE_PATH",
                "./data/feedsync.sqlite",
            )),

            // Pagination
            page_size: parse_env_usize("PAGE_SIZE", DEFAULT_PAGE_SIZE)?,
            total_posts: parse_env_usize("TOTAL_POSTS", TOTAL_POSTS)?,

            // Search
            search_debounce: Duration::from_millis(parse_env_u64(
                "SEARCH_DEBOUNCE_MS",
                SEARCH_DEBOUNCE.as_millis() as u64,
            )?),
        })
    }

    /// Configuration with built-in defaults and no environment lookups.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:9/".to_string(),
            http_timeout: Duration::from_secs(5),
            database_path: PathBuf::from("./test.sqlite"),
            page_size: DEFAULT_PAGE_SIZE,
            total_posts: TOTAL_POSTS,
            search_debounce: SEARCH_DEBOUNCE,
        }
    }

    /// Validate that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 {
            return Err(ConfigError::InvalidValue {
                name: "PAGE_SIZE".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.api_base_url.is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "API_BASE_URL".to_string(),
                message: "cannot be empty".to_string(),
            });
        }
        if let Err(e) = url::Url::parse(&self.api_base_url) {
            return Err(ConfigError::InvalidValue {
                name: "API_BASE_URL".to_string(),
                message: e.to_string(),
            });
        }
        Ok(())
    }
}

fn env_or_default(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_usize(name: &str, default: usize) -> Result<usize, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}
