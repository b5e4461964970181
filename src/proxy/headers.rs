//! HTTP header constants and routing markers for the proxy service
//!
//! This module centralizes the header names, query parameters and path
//! markers used throughout the proxy service to ensure consistency.

/// Header name for request ID used for tracing and correlation
pub const X_REQUEST_ID: &str = "x-request-id";

/// Header reporting how the gateway produced a response
pub const X_CACHE: &str = "x-cache";

/// Standard header re-exports for convenience
pub use ::http::header::CONTENT_TYPE;

/// Query parameters the proxy owns
pub mod params {
    /// Upstream credential parameter
    pub const API_KEY: &str = "api_key";

    /// Locale parameter, always forced
    pub const LANGUAGE: &str = "language";

    /// Locale every API request is pinned to
    pub const LOCALE: &str = "fr-FR";
}

/// Raw-URL markers used by request classification
pub mod paths {
    /// Prefix of the comments record collection
    pub const COMMENTS: &str = "/comments";

    /// Browser favicon request
    pub const FAVICON: &str = "/favicon.ico";

    /// Suffix of image CDN paths
    pub const IMAGE_SUFFIX: &str = ".jpg";
}

/// Values of the `x-cache` header
pub mod cache_status {
    pub const HIT: &str = "HIT";
    pub const MISS: &str = "MISS";
    pub const UNAVAILABLE: &str = "UNAVAILABLE";
}
