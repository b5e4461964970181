//! Middleware stack builder for clean composition

use crate::proxy::middleware::*;
use axum::{middleware::from_fn, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Builder for composing the proxy middleware stack
#[derive(Clone, Debug)]
pub struct ProxyMiddlewareStack {
    enable_logging: bool,
    enable_cors: bool,
}

impl Default for ProxyMiddlewareStack {
    fn default() -> Self {
        Self {
            enable_logging: true,
            enable_cors: true,
        }
    }
}

impl ProxyMiddlewareStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply the complete middleware stack to a router
    ///
    /// Outer to inner:
    /// 1. CORS (browser clients on any origin, preflight answered here)
    /// 2. Request ID generation/propagation
    /// 3. HTTP tracing span and request logging
    /// 4. Error handling
    pub fn apply_to_router<S>(self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        let mut router = router.layer(from_fn(error_handling_middleware));

        if self.enable_logging {
            router = router
                .layer(from_fn(logging_middleware))
                .layer(TraceLayer::new_for_http());
        }

        router = router.layer(from_fn(request_id_middleware));

        if self.enable_cors {
            router = router.layer(CorsLayer::permissive());
        }

        router
    }

    /// Builder method to disable request logging
    pub fn disable_logging(mut self) -> Self {
        self.enable_logging = false;
        self
    }

    /// Builder method to disable CORS headers
    pub fn disable_cors(mut self) -> Self {
        self.enable_cors = false;
        self
    }
}
