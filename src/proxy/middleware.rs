//! Middleware implementations for the proxy service

use crate::proxy::headers::{X_CACHE, X_REQUEST_ID};
use crate::proxy::types::ProxyError;
use axum::{
    extract::Request,
    http::HeaderValue,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Request ID middleware - ensures every request has a unique ID for tracing
pub async fn request_id_middleware(
    mut request: Request,
    next: Next,
) -> Result<Response, ProxyError> {
    // Keep a caller-supplied ID only if it is a UUID
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|existing| existing.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .and_then(|uuid| HeaderValue::from_str(&uuid.to_string()).ok())
        .unwrap_or_else(new_request_id);

    let request_id_clone = request_id.clone();
    request.headers_mut().insert(X_REQUEST_ID, request_id);

    let mut response = next.run(request).await;
    response.headers_mut().insert(X_REQUEST_ID, request_id_clone);

    Ok(response)
}

fn new_request_id() -> HeaderValue {
    HeaderValue::from_str(&Uuid::now_v7().to_string())
        .unwrap_or_else(|_| HeaderValue::from_static("unknown"))
}

/// Logging middleware - logs request/response details with timing
pub async fn logging_middleware(request: Request, next: Next) -> Result<Response, ProxyError> {
    let start = Instant::now();

    let method = request.method().clone();
    let uri = request.uri().clone();
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    info!(
        request_id = request_id,
        method = %method,
        path = %uri.path(),
        query = uri.query().unwrap_or(""),
        "Incoming request"
    );

    let response = next.run(request).await;
    let duration = start.elapsed();

    info!(
        request_id = request_id,
        method = %method,
        path = %uri.path(),
        status = response.status().as_u16(),
        cache = response
            .headers()
            .get(X_CACHE)
            .and_then(|h| h.to_str().ok())
            .unwrap_or("-"),
        duration_ms = duration.as_millis(),
        "Request completed"
    );

    Ok(response)
}

/// Logs failed requests and makes sure the response carries the request ID
pub async fn error_handling_middleware(request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    match next.run(request).await.into_response() {
        response if response.status().is_success() => response,
        mut response => {
            let status = response.status();
            if status.is_server_error() {
                error!(request_id = request_id, status = status.as_u16(), "Request failed");
            } else {
                warn!(request_id = request_id, status = status.as_u16(), "Request not served");
            }

            if let Ok(header_value) = HeaderValue::from_str(&request_id) {
                response.headers_mut().insert(X_REQUEST_ID, header_value);
            }
            response
        }
    }
}
