use crate::proxy::types::*;
use crate::{Error, Result};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub use config::ConfigError;

/// Prefix of environment variable overrides, e.g. `MOVIE_CACHE_PROXY__APPLICATION__PORT`
pub const ENV_PREFIX: &str = "MOVIE_CACHE_PROXY";

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub cache: CacheSettings,
    pub upstream: UpstreamSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
    pub environment: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheSettings {
    pub directory: PathBuf,
    pub max_entry_bytes: usize,
    pub coalesce_in_flight: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UpstreamSettings {
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSettings {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

impl Settings {
    pub fn new() -> std::result::Result<Self, ConfigError> {
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        Self::defaults(&environment)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{environment}")).required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Builder holding only the built-in defaults
    pub fn defaults(
        environment: &str,
    ) -> std::result::Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            .set_default("application.host", "0.0.0.0")?
            .set_default("application.port", DEFAULT_PORT)?
            .set_default("application.environment", environment)?
            .set_default("cache.directory", DEFAULT_CACHE_DIRECTORY)?
            .set_default("cache.max_entry_bytes", 10 * 1024 * 1024)?
            .set_default("cache.coalesce_in_flight", true)?
            .set_default("upstream.request_timeout_secs", 30)?
            .set_default("upstream.connect_timeout_secs", 10)?
            .set_default("upstream.max_retries", 0)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")
    }

    /// Address the server listens on
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.application.host, self.application.port)
    }

    /// Validated proxy configuration for the given credential mode
    pub fn proxy_config(&self, mode: CredentialMode) -> Result<ProxyConfig> {
        let max_cache_entry_size = ResponseSizeLimit::try_new(self.cache.max_entry_bytes)
            .map_err(|e| Error::invalid_setting("cache.max_entry_bytes", e))?;

        Ok(ProxyConfig {
            mode,
            origins: UpstreamOrigins::default(),
            request_timeout: Duration::from_secs(self.upstream.request_timeout_secs),
            connect_timeout: Duration::from_secs(self.upstream.connect_timeout_secs),
            max_retries: RetryCount::new(self.upstream.max_retries),
            max_cache_entry_size,
            coalesce_in_flight: self.cache.coalesce_in_flight,
        })
    }
}
