use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::constants::{
    DEFAULT_COMMENT_PAGE_SIZE, DEFAULT_COMMENT_PREVIEW_SIZE, DEFAULT_HTTP_TIMEOUT_SECS,
    DEFAULT_PAGE_SIZE, DEFAULT_SEARCH_DEBOUNCE_MS, DEFAULT_SEARCH_LIMIT,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
    #[error("failed to parse {name} as integer: {source}")]
    ParseInt {
        name: String,
        #[source]
        source: std::num::ParseIntError,
    },
}

/// Client configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Backend
    pub api_url: String,
    pub http_timeout: Duration,

    // Feed
    pub page_size: usize,
    pub comment_page_size: usize,
    pub comment_preview_size: usize,

    // Search
    pub search_debounce: Duration,
    pub search_limit: usize,

    // Session
    pub session_file: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            api_url: required_env("MEME_API_URL")?,
            http_timeout: Duration::from_secs(parse_env_u64(
                "HTTP_TIMEOUT_SECS",
                DEFAULT_HTTP_TIMEOUT_SECS,
            )?),

            page_size: parse_env_usize("FEED_PAGE_SIZE", DEFAULT_PAGE_SIZE)?,
            comment_page_size: parse_env_usize("COMMENT_PAGE_SIZE", DEFAULT_COMMENT_PAGE_SIZE)?,
            comment_preview_size: parse_env_usize(
                "COMMENT_PREVIEW_SIZE",
                DEFAULT_COMMENT_PREVIEW_SIZE,
            )?,

            search_debounce: Duration::from_millis(parse_env_u64(
                "SEARCH_DEBOUNCE_MS",
                DEFAULT_SEARCH_DEBOUNCE_MS,
            )?),
            search_limit: parse_env_usize("SEARCH_LIMIT", DEFAULT_SEARCH_LIMIT)?,

            session_file: optional_env("SESSION_FILE").map(PathBuf::from),
        })
    }

    /// Configuration pointing at `api_url` with every other field defaulted.
    #[must_use]
    pub fn with_api_url(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            page_size: DEFAULT_PAGE_SIZE,
            comment_page_size: DEFAULT_COMMENT_PAGE_SIZE,
            comment_preview_size: DEFAULT_COMMENT_PREVIEW_SIZE,
            search_debounce: Duration::from_millis(DEFAULT_SEARCH_DEBOUNCE_MS),
            search_limit: DEFAULT_SEARCH_LIMIT,
            session_file: None,
        }
    }

    /// Validate that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match url::Url::parse(&self.api_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => {
                return Err(ConfigError::InvalidValue {
                    name: "MEME_API_URL".to_string(),
                    message: format!("unsupported scheme '{}'", url.scheme()),
                });
            }
            Err(e) => {
                return Err(ConfigError::InvalidValue {
                    name: "MEME_API_URL".to_string(),
                    message: e.to_string(),
                });
            }
        }
        for (name, value) in [
            ("FEED_PAGE_SIZE", self.page_size),
            ("COMMENT_PAGE_SIZE", self.comment_page_size),
            ("COMMENT_PREVIEW_SIZE", self.comment_preview_size),
            ("SEARCH_LIMIT", self.search_limit),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    name: name.to_string(),
                    message: "must be at least 1".to_string(),
                });
            }
        }
        Ok(())
    }
}

fn required_env(name: &str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::MissingEnvVar(name.to_string()))
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
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
