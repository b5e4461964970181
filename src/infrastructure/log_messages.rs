//! Log message constants
//!
//! Messages shared between the library and the binaries live here so that
//! the same event is always worded the same way.

/// Application startup and lifecycle messages
pub mod application {
    pub const STARTING: &str = "Starting movie cache proxy";
    pub const LISTENING: &str = "Proxy listening";
    pub const SHUTDOWN_SIGNAL: &str = "Shutdown signal received, draining connections";
    pub const STOPPED: &str = "Proxy stopped";
}

/// Credential mode announcements
pub mod credentials {
    pub const AUTHENTICATED: &str = "API key provided, cache misses are fetched from TMDB";
    pub const CACHE_ONLY: &str =
        "No API key provided, serving from cache only; uncached content returns 404";
}

/// Cache storage messages
pub mod cache {
    pub const USING_DIRECTORY: &str = "Using cache directory";
    pub const DIRECTORY_UNAVAILABLE: &str = "Failed to create cache directory";
}

/// Warm-up crawler messages
pub mod warmup {
    pub const STARTED: &str = "Cache warm-up started";
    pub const MOVIE: &str = "Warming movie";
    pub const REQUEST: &str = "Warm-up request";
    pub const FINISHED: &str = "Cache warm-up finished";
    pub const FAILED: &str = "Cache warm-up aborted";
}
