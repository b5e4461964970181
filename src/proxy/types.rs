//! Type definitions for the proxy module

use crate::proxy::url_resolver::{API_ORIGIN, IMAGE_ORIGIN};
use nutype::nutype;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

// ========== Size and Retry Types ==========

/// Maximum size of a single response body kept in the cache, in bytes
#[nutype(
    derive(Clone, Copy, Debug, Display, PartialEq, Deserialize, Serialize, TryFrom, AsRef),
    validate(predicate = |size: &usize| *size > 0)
)]
pub struct ResponseSizeLimit(usize);

/// How many times a failed upstream connection is retried
#[nutype(derive(Clone, Copy, Debug, Display, PartialEq, Deserialize, Serialize, From, AsRef))]
pub struct RetryCount(u32);

// ========== URL and Credential Types ==========

/// Fully rewritten upstream URL. Also the cache key.
#[nutype(
    derive(Clone, Debug, Display, Hash, PartialEq, Eq, Deserialize, Serialize, TryFrom, AsRef),
    validate(predicate = |s: &str| s.starts_with("http://") || s.starts_with("https://"))
)]
pub struct UpstreamUrl(String);

/// TMDB API key
#[nutype(
    derive(Clone, PartialEq, Eq, TryFrom, AsRef),
    validate(predicate = |s: &str| !s.is_empty())
)]
pub struct ApiKey(String);

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

// ========== Constants ==========

/// Cache lifetime when an API key is configured
pub const AUTHENTICATED_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Cache lifetime in cache-only mode (five years)
pub const CACHE_ONLY_CACHE_TTL: Duration = Duration::from_secs(5 * 365 * 24 * 60 * 60);

/// Default listening port
pub const DEFAULT_PORT: u16 = 1337;

/// Default cache directory, relative to the working directory
pub const DEFAULT_CACHE_DIRECTORY: &str = "cache";

/// Whether upstream calls are possible at all.
///
/// Decided once at startup from the command line and never changed afterwards.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum CredentialMode {
    /// Cache misses are fetched from TMDB with this key
    Authenticated(ApiKey),
    /// Only cached content can be served
    #[default]
    CacheOnly,
}

impl CredentialMode {
    pub fn from_api_key(api_key: Option<ApiKey>) -> Self {
        match api_key {
            Some(key) => Self::Authenticated(key),
            None => Self::CacheOnly,
        }
    }

    pub fn api_key(&self) -> Option<&ApiKey> {
        match self {
            Self::Authenticated(key) => Some(key),
            Self::CacheOnly => None,
        }
    }

    /// Freshness window applied to every cache entry
    pub fn cache_ttl(&self) -> Duration {
        match self {
            Self::Authenticated(_) => AUTHENTICATED_CACHE_TTL,
            Self::CacheOnly => CACHE_ONLY_CACHE_TTL,
        }
    }
}

/// The two upstream origins requests are rewritten to
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpstreamOrigins {
    /// Metadata API origin, including the `/3` version prefix
    pub api: String,
    /// Image CDN origin, including the `w154` size segment
    pub image: String,
}

impl Default for UpstreamOrigins {
    fn default() -> Self {
        Self {
            api: API_ORIGIN.to_string(),
            image: IMAGE_ORIGIN.to_string(),
        }
    }
}

/// Proxy configuration
#[derive(Clone, Debug)]
pub struct ProxyConfig {
    /// Credential and the caching policy derived from it
    pub mode: CredentialMode,
    /// Where requests are rewritten to
    pub origins: UpstreamOrigins,
    /// Upper bound for a whole upstream exchange
    pub request_timeout: Duration,
    /// Upper bound for establishing an upstream connection
    pub connect_timeout: Duration,
    /// Retries after an upstream transport failure
    pub max_retries: RetryCount,
    /// Responses larger than this are served but not cached
    pub max_cache_entry_size: ResponseSizeLimit,
    /// Share one upstream fetch between concurrent requests for the same URL
    pub coalesce_in_flight: bool,
}

impl ProxyConfig {
    pub fn cache_ttl(&self) -> Duration {
        self.mode.cache_ttl()
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            mode: CredentialMode::CacheOnly,
            origins: UpstreamOrigins::default(),
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            max_retries: RetryCount::new(0),
            max_cache_entry_size: ResponseSizeLimit::try_new(10 * 1024 * 1024)
                .expect("10MB is valid"), // 10MB
            coalesce_in_flight: true,
        }
    }
}

/// Errors that can occur in the proxy
#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("Upstream request timeout after {0:?}")]
    RequestTimeout(Duration),

    #[error("Upstream transport error: {0}")]
    UpstreamTransport(#[from] reqwest::Error),

    #[error("Invalid upstream URL: {0}")]
    InvalidUpstreamUrl(String),

}

/// Result type for proxy operations
pub type ProxyResult<T> = Result<T, ProxyError>;
