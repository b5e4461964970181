//! Main proxy service implementation
//!
//! The `ProxyService` is the entry point of the caching proxy. Every inbound
//! request goes through the fallback handler, which classifies it and either
//! hands it to the comments store, answers the favicon request, or serves the
//! rewritten TMDB URL through the caching gateway.
//!
//! ## Service Lifecycle
//!
//! ```rust,ignore
//! use movie_cache_proxy::proxy::{ProxyService, ProxyConfig};
//!
//! let service = ProxyService::new(config, store, upstream);
//! let router = service.into_router();
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:1337").await?;
//! axum::serve(listener, router).await?;
//! ```

use crate::proxy::cache_store::CacheStore;
use crate::proxy::comments::{self, CommentStore};
use crate::proxy::error_response::{extract_request_id, ErrorResponseExt};
use crate::proxy::gateway::CachingGateway;
use crate::proxy::upstream::UpstreamClient;
use crate::proxy::url_resolver::{RewriteClassification, UrlResolver};
use crate::proxy::{middleware_stack::ProxyMiddlewareStack, types::*};
use axum::{
    body::Body,
    extract::{Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Router,
};
use std::sync::Arc;
use tower::ServiceExt;
use tracing::{error, info};

/// Caching TMDB proxy plus the comments collection
pub struct ProxyService {
    resolver: UrlResolver,
    gateway: CachingGateway,
    comments: Router,
}

impl ProxyService {
    pub fn new(
        config: ProxyConfig,
        store: Arc<dyn CacheStore>,
        upstream: Arc<dyn UpstreamClient>,
    ) -> Self {
        let resolver = UrlResolver::new(config.origins.clone());
        let gateway = CachingGateway::new(Arc::new(config), store, upstream);

        Self {
            resolver,
            gateway,
            comments: comments::router(CommentStore::new()),
        }
    }

    pub fn config(&self) -> &ProxyConfig {
        self.gateway.config()
    }

    /// Create an Axum router for the proxy service with middleware
    pub fn into_router(self) -> Router {
        self.into_router_with(ProxyMiddlewareStack::new())
    }

    pub fn into_router_with(self, middleware_stack: ProxyMiddlewareStack) -> Router {
        let router = Router::new()
            .fallback(proxy_handler)
            .with_state(Arc::new(self));

        middleware_stack.apply_to_router(router)
    }
}

/// Axum handler for every inbound request
async fn proxy_handler(State(proxy): State<Arc<ProxyService>>, request: Request<Body>) -> Response {
    let request_id = extract_request_id(request.headers());

    let classification = match proxy.resolver.classify(request.uri()) {
        Ok(classification) => classification,
        Err(e) => return error_response(e, request_id),
    };

    let url = match classification {
        RewriteClassification::PassthroughComment => {
            return match proxy.comments.clone().oneshot(request).await {
                Ok(response) => response,
                Err(never) => match never {},
            };
        }
        RewriteClassification::Favicon => return StatusCode::OK.into_response(),
        RewriteClassification::Image(url) | RewriteClassification::ApiResource(url) => url,
    };

    info!(
        request_id = request_id.as_deref().unwrap_or("unknown"),
        path = %request.uri().path(),
        upstream_url = %url,
        "Rewrote request"
    );

    match proxy.gateway.fetch(&url).await {
        Ok(response) => response.into_response(),
        Err(e) => {
            error!(upstream_url = %url, error = %e, "Upstream fetch failed");
            error_response(e, request_id)
        }
    }
}

fn error_response(error: ProxyError, request_id: Option<String>) -> Response {
    let status = error.status_code();
    let mut body = error.to_error_response();
    if let Some(id) = request_id {
        body = body.with_request_id(id);
    }
    body.into_response_with_status(status)
}
