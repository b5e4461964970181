//! Movie Cache Proxy - a caching reverse proxy in front of TMDB
//!
//! Requests are rewritten to the TMDB metadata API or image CDN, answered
//! from an on-disk cache when possible and fetched upstream otherwise. Without
//! an API key the proxy serves its cache only, which together with the
//! [`warmup`] crawler lets a front-end run fully offline.

pub mod application;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod proxy;
pub mod warmup;

pub use application::Application;
pub use error::{Error, Result};
