use crate::proxy::ProxyError;
use thiserror::Error;

/// Movie cache proxy application error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Invalid configuration value for {field}: {reason}")]
    InvalidSetting { field: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Proxy error: {0}")]
    Proxy(#[from] ProxyError),

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    #[error("Unexpected response from {url}: {status}")]
    UnexpectedStatus { url: String, status: u16 },
}

impl Error {
    pub fn invalid_setting(field: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidSetting {
            field: field.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
