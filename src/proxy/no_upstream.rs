//! Stand-in response for cache misses in cache-only mode

use crate::proxy::types::UpstreamUrl;
use crate::proxy::upstream::UpstreamResponse;
use http::{HeaderValue, StatusCode};
use tracing::info;

/// Body of the synthetic response
pub const NOT_IN_CACHE_BODY: &str = "Not in cache!";

/// Status of the synthetic response
pub const NOT_IN_CACHE_STATUS: StatusCode = StatusCode::NOT_FOUND;

/// Response served when `url` is not cached and no API key is configured.
///
/// Never fails and never touches the network. The result must not be cached.
pub fn not_in_cache(url: &UpstreamUrl) -> UpstreamResponse {
    info!(upstream_url = %url, "Content not in cache and no API key provided");

    UpstreamResponse::from_bytes(
        NOT_IN_CACHE_STATUS,
        Some(HeaderValue::from_static("text/plain; charset=utf-8")),
        NOT_IN_CACHE_BODY,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    #[tokio::test]
    async fn test_not_in_cache_response() {
        let url = UpstreamUrl::try_new(
            "http://api.themoviedb.org/3/movie/550?language=fr-FR".to_string(),
        )
        .unwrap();

        let mut response = not_in_cache(&url);
        assert_eq!(response.status, StatusCode::NOT_FOUND);

        let chunk = response.body.next().await.unwrap().unwrap();
        assert_eq!(chunk.as_ref(), NOT_IN_CACHE_BODY.as_bytes());
        assert!(response.body.next().await.is_none());
    }
}
