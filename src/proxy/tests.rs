//! Tests for the proxy module

#[cfg(test)]
mod proxy_service_tests {
    use crate::proxy::cache_store::MemoryCacheStore;
    use crate::proxy::headers::{X_CACHE, X_REQUEST_ID};
    use crate::proxy::no_upstream::NOT_IN_CACHE_BODY;
    use crate::proxy::test_utils::test_helpers::*;
    use crate::proxy::types::*;
    use crate::proxy::upstream::{UpstreamClient, UpstreamResponse};
    use crate::proxy::ProxyService;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::Router;
    use http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use tower::ServiceExt;

    /// Upstream that records every URL it is asked for
    #[derive(Default)]
    struct RecordingUpstream {
        urls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl UpstreamClient for RecordingUpstream {
        async fn fetch(
            &self,
            url: &UpstreamUrl,
            _api_key: &ApiKey,
        ) -> ProxyResult<UpstreamResponse> {
            self.urls.lock().push(url.to_string());
            Ok(UpstreamResponse::from_bytes(StatusCode::OK, None, "{}"))
        }
    }

    fn router(mode: CredentialMode, upstream: Arc<dyn UpstreamClient>) -> Router {
        ProxyService::new(
            test_proxy_config(mode),
            Arc::new(MemoryCacheStore::new()),
            upstream,
        )
        .into_router()
    }

    async fn get(app: &Router, uri: &str) -> (StatusCode, http::HeaderMap, bytes::Bytes) {
        let response = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, headers, body)
    }

    #[tokio::test]
    async fn test_favicon_is_answered_locally() {
        let upstream = Arc::new(ScriptedUpstream::ok("{}"));
        let app = router(test_mode(), upstream.clone());

        let (status, _, body) = get(&app, "/favicon.ico").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.is_empty());
        assert_eq!(upstream.calls(), 0);
    }

    #[tokio::test]
    async fn test_second_request_is_served_from_cache() {
        let upstream = Arc::new(ScriptedUpstream::ok(r#"{"id":550,"title":"Fight Club"}"#));
        let app = router(test_mode(), upstream.clone());

        let (status, headers, first) = get(&app, "/movie/550").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers.get(X_CACHE).unwrap(), "MISS");
        assert!(headers.contains_key(X_REQUEST_ID));

        let (status, headers, second) = get(&app, "/movie/550").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers.get(X_CACHE).unwrap(), "HIT");
        assert_eq!(
            headers.get(http::header::CONTENT_TYPE).unwrap(),
            "application/json;charset=utf-8"
        );
        assert_eq!(first, second);
        assert_eq!(upstream.calls(), 1);
    }

    #[tokio::test]
    async fn test_language_variants_share_a_cache_entry() {
        let upstream = Arc::new(ScriptedUpstream::ok("{}"));
        let app = router(test_mode(), upstream.clone());

        get(&app, "/movie/550?language=en-US").await;
        let (_, headers, _) = get(&app, "/movie/550").await;
        assert_eq!(headers.get(X_CACHE).unwrap(), "HIT");
        assert_eq!(upstream.calls(), 1);
    }

    #[tokio::test]
    async fn test_requests_are_rewritten_before_fetching() {
        let upstream = Arc::new(RecordingUpstream::default());
        let app = router(test_mode(), upstream.clone());

        get(&app, "/search/multi?query=star%20wars&language=en-US").await;
        get(&app, "/kqjL17yufvn9OVLyXYpvtyrFfak.jpg?size=large").await;

        assert_eq!(
            *upstream.urls.lock(),
            vec![
                "http://api.themoviedb.org/3/search/multi?query=star+wars&language=fr-FR"
                    .to_string(),
                "https://image.tmdb.org/t/p/w154/kqjL17yufvn9OVLyXYpvtyrFfak.jpg".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_cache_only_miss_is_not_found() {
        let upstream = Arc::new(ScriptedUpstream::ok("{}"));
        let app = router(CredentialMode::CacheOnly, upstream.clone());

        let (status, headers, body) = get(&app, "/movie/popular").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(headers.get(X_CACHE).unwrap(), "UNAVAILABLE");
        assert_eq!(body.as_ref(), NOT_IN_CACHE_BODY.as_bytes());
        assert_eq!(upstream.calls(), 0);
    }

    #[tokio::test]
    async fn test_upstream_status_is_relayed() {
        let upstream = Arc::new(ScriptedUpstream::with_status(
            StatusCode::UNAUTHORIZED,
            r#"{"status_code":7}"#,
        ));
        let app = router(test_mode(), upstream.clone());

        let (status, _, body) = get(&app, "/movie/550").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body.as_ref(), br#"{"status_code":7}"#);
    }

    #[tokio::test]
    async fn test_upstream_timeout_is_gateway_timeout() {
        let upstream = Arc::new(ScriptedUpstream::failing_first("{}", std::time::Duration::ZERO));
        let app = router(test_mode(), upstream.clone());

        let (status, headers, body) = get(&app, "/movie/550").await;
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert!(headers.contains_key(X_REQUEST_ID));
        let error: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(error["code"], "UPSTREAM_TIMEOUT");
        assert!(error["request_id"].is_string());

        // Nothing was cached, the next request goes upstream again
        let (status, headers, _) = get(&app, "/movie/550").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers.get(X_CACHE).unwrap(), "MISS");
        assert_eq!(upstream.calls(), 2);
    }

    #[tokio::test]
    async fn test_comments_bypass_the_cache() {
        let upstream = Arc::new(ScriptedUpstream::ok("{}"));
        let app = router(CredentialMode::CacheOnly, upstream.clone());

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/comments")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"movieId":550,"text":"Culte"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let (status, headers, body) = get(&app, "/comments?movieId=550").await;
        assert_eq!(status, StatusCode::OK);
        assert!(!headers.contains_key(X_CACHE));
        let comments: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(comments[0]["text"], "Culte");
        assert_eq!(upstream.calls(), 0);
    }

    #[test]
    fn test_service_keeps_config() {
        let service = ProxyService::new(
            test_proxy_config(test_mode()),
            Arc::new(MemoryCacheStore::new()),
            Arc::new(ScriptedUpstream::ok("{}")),
        );
        assert_eq!(
            service.config().cache_ttl(),
            AUTHENTICATED_CACHE_TTL
        );
    }
}

#[cfg(test)]
mod type_tests {
    use crate::proxy::types::*;

    #[test]
    fn test_proxy_config_defaults() {
        let config = ProxyConfig::default();

        assert_eq!(config.mode, CredentialMode::CacheOnly);
        assert_eq!(*config.max_cache_entry_size.as_ref(), 10 * 1024 * 1024);
        assert_eq!(*config.max_retries.as_ref(), 0);
        assert!(config.coalesce_in_flight);
        assert_eq!(config.cache_ttl(), CACHE_ONLY_CACHE_TTL);
    }

    #[test]
    fn test_upstream_url_requires_http_scheme() {
        assert!(UpstreamUrl::try_new("http://api.themoviedb.org/3/movie/550".to_string()).is_ok());
        assert!(UpstreamUrl::try_new("ftp://example.com".to_string()).is_err());
        assert!(UpstreamUrl::try_new(String::new()).is_err());
    }

    #[test]
    fn test_api_key_is_redacted_in_debug() {
        let key = ApiKey::try_new("secret-key".to_string()).unwrap();
        assert!(!format!("{key:?}").contains("secret-key"));
        assert!(ApiKey::try_new(String::new()).is_err());
    }

    #[test]
    fn test_credential_mode_from_key() {
        assert_eq!(CredentialMode::from_api_key(None), CredentialMode::CacheOnly);
        let key = ApiKey::try_new("k".to_string()).unwrap();
        let mode = CredentialMode::from_api_key(Some(key));
        assert!(mode.api_key().is_some());
        assert_eq!(mode.cache_ttl(), AUTHENTICATED_CACHE_TTL);
    }
}
