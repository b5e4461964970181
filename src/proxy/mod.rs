//! Caching reverse proxy in front of TMDB
//!
//! Request flow:
//! - Classification and rewriting of the inbound URL (`url_resolver`)
//! - Cache lookup, upstream fetch and body tee (`gateway`, `streaming`)
//! - Comment requests go to an in-memory collection (`comments`)

pub mod cache_store;
pub mod comments;
pub mod error_response;
pub mod gateway;
pub mod headers;
pub mod in_flight;
pub mod middleware;
pub mod middleware_stack;
pub mod no_upstream;
pub mod service;
pub mod streaming;
pub mod test_utils;
pub mod types;
pub mod upstream;
pub mod url_resolver;

#[cfg(test)]
mod tests;

pub use cache_store::{CacheStore, DiskCacheStore};
pub use service::ProxyService;
pub use types::{CredentialMode, ProxyConfig, ProxyError, ProxyResult};
pub use upstream::HttpUpstreamClient;
