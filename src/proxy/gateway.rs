//! Caching fetch gateway
//!
//! Serves a rewritten upstream URL from the cache when a fresh entry exists.
//! Otherwise the response comes from TMDB (API key configured) and is teed
//! into the cache while it streams to the caller, or from the no-upstream
//! responder (cache-only mode), which is never cached.

use crate::proxy::cache_store::{CacheStore, CachedResponse};
use crate::proxy::headers::{cache_status, CONTENT_TYPE, X_CACHE};
use crate::proxy::in_flight::{InFlightGuard, InFlightRegistry, Lease};
use crate::proxy::no_upstream;
use crate::proxy::streaming::{CacheWriter, CachingStream};
use crate::proxy::types::*;
use crate::proxy::upstream::{UpstreamClient, UpstreamResponse};
use axum::body::Body;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use http::{HeaderValue, StatusCode};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// How a response was produced
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheStatus {
    /// Served from a fresh cache entry
    Hit,
    /// Fetched from TMDB
    Miss,
    /// Not cached and no API key configured
    Unavailable,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hit => cache_status::HIT,
            Self::Miss => cache_status::MISS,
            Self::Unavailable => cache_status::UNAVAILABLE,
        }
    }
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response produced by [`CachingGateway::fetch`]
pub struct GatewayResponse {
    pub status: StatusCode,
    pub content_type: Option<HeaderValue>,
    pub cache_status: CacheStatus,
    pub body: Body,
}

impl fmt::Debug for GatewayResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayResponse")
            .field("status", &self.status)
            .field("content_type", &self.content_type)
            .field("cache_status", &self.cache_status)
            .finish_non_exhaustive()
    }
}

impl IntoResponse for GatewayResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(self.body);
        *response.status_mut() = self.status;

        let headers = response.headers_mut();
        if let Some(content_type) = self.content_type {
            headers.insert(CONTENT_TYPE, content_type);
        }
        headers.insert(X_CACHE, HeaderValue::from_static(self.cache_status.as_str()));
        response
    }
}

/// Check cache, fetch upstream, store, stream
#[derive(Clone)]
pub struct CachingGateway {
    config: Arc<ProxyConfig>,
    store: Arc<dyn CacheStore>,
    upstream: Arc<dyn UpstreamClient>,
    in_flight: Arc<InFlightRegistry>,
}

impl CachingGateway {
    pub fn new(
        config: Arc<ProxyConfig>,
        store: Arc<dyn CacheStore>,
        upstream: Arc<dyn UpstreamClient>,
    ) -> Self {
        Self {
            config,
            store,
            upstream,
            in_flight: InFlightRegistry::new(),
        }
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Produce the response for `url`
    pub async fn fetch(&self, url: &UpstreamUrl) -> ProxyResult<GatewayResponse> {
        if let Some(hit) = self.lookup(url).await {
            return Ok(hit);
        }

        let Some(api_key) = self.config.mode.api_key() else {
            return Ok(Self::unavailable(url));
        };

        let guard = if self.config.coalesce_in_flight {
            match self.lead_or_wait(url).await {
                Ok(guard) => guard,
                Err(hit) => return Ok(hit),
            }
        } else {
            None
        };

        info!(upstream_url = %url, "Fetching from upstream");
        let upstream = self.upstream.fetch(url, api_key).await?;
        Ok(self.tee(url, upstream, guard))
    }

    /// Fresh cache entry for `url`, if any. Storage errors count as a miss.
    async fn lookup(&self, url: &UpstreamUrl) -> Option<GatewayResponse> {
        let entry = match self.store.get(url).await {
            Ok(Some(entry)) => entry,
            Ok(None) => return None,
            Err(e) => {
                warn!(upstream_url = %url, error = %e, "Cache read failed, treating as miss");
                return None;
            }
        };

        if !entry.is_fresh(self.config.cache_ttl(), Utc::now()) {
            debug!(upstream_url = %url, stored_at = %entry.stored_at, "Cache entry expired");
            return None;
        }

        match Self::from_entry(entry) {
            Some(response) => {
                debug!(upstream_url = %url, "Cache hit");
                Some(response)
            }
            None => {
                warn!(upstream_url = %url, "Cache entry has an invalid status, ignoring");
                None
            }
        }
    }

    /// Become the fetching request for `url`, or wait for the one in flight.
    ///
    /// Returns the cached response if the request we waited on stored one.
    /// A follower waits at most `request_timeout`, then fetches without a
    /// guard.
    async fn lead_or_wait(
        &self,
        url: &UpstreamUrl,
    ) -> Result<Option<InFlightGuard>, GatewayResponse> {
        loop {
            match self.in_flight.acquire(url) {
                Lease::Leader(guard) => {
                    // A previous leader may have finished between our lookup and acquire
                    if let Some(hit) = self.lookup(url).await {
                        return Err(hit);
                    }
                    return Ok(Some(guard));
                }
                Lease::Follower(waiter) => {
                    debug!(upstream_url = %url, "Waiting for in-flight fetch");
                    let released =
                        tokio::time::timeout(self.config.request_timeout, waiter.wait()).await;
                    if let Some(hit) = self.lookup(url).await {
                        return Err(hit);
                    }
                    if released.is_err() {
                        warn!(upstream_url = %url, "In-flight fetch still running, fetching anyway");
                        return Ok(None);
                    }
                }
            }
        }
    }

    fn tee(
        &self,
        url: &UpstreamUrl,
        upstream: UpstreamResponse,
        guard: Option<InFlightGuard>,
    ) -> GatewayResponse {
        let writer = CacheWriter {
            store: Arc::clone(&self.store),
            key: url.clone(),
            status: upstream.status.as_u16(),
            content_type: upstream
                .content_type
                .as_ref()
                .and_then(|value| value.to_str().ok())
                .map(str::to_string),
            max_size: self.config.max_cache_entry_size,
        };
        let (capture, _writer) = writer.spawn(guard);

        GatewayResponse {
            status: upstream.status,
            content_type: upstream.content_type,
            cache_status: CacheStatus::Miss,
            body: Body::from_stream(CachingStream::new(upstream.body, capture)),
        }
    }

    fn from_entry(entry: CachedResponse) -> Option<GatewayResponse> {
        let status = StatusCode::from_u16(entry.status).ok()?;
        let content_type = entry
            .content_type
            .and_then(|value| HeaderValue::from_str(&value).ok());

        Some(GatewayResponse {
            status,
            content_type,
            cache_status: CacheStatus::Hit,
            body: Body::from(entry.body),
        })
    }

    fn unavailable(url: &UpstreamUrl) -> GatewayResponse {
        let response = no_upstream::not_in_cache(url);
        GatewayResponse {
            status: response.status,
            content_type: response.content_type,
            cache_status: CacheStatus::Unavailable,
            body: Body::from_stream(response.body),
        }
    }
}
