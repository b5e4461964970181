//! Upstream HTTP client abstraction
//!
//! The gateway talks to TMDB through [`UpstreamClient`] so that tests can
//! count and script upstream calls without a network.

use crate::proxy::headers::{params, CONTENT_TYPE};
use crate::proxy::types::*;
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{stream, Stream, TryStreamExt};
use http::{HeaderValue, StatusCode};
use std::fmt;
use std::pin::Pin;
use std::time::Duration;
use tracing::{debug, warn};

/// Boxed error carried by body streams
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Response body as a stream of chunks
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, BoxError>> + Send>>;

/// Status, content type and streaming body of an upstream response
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub content_type: Option<HeaderValue>,
    pub body: ByteStream,
}

impl UpstreamResponse {
    /// Response whose whole body is already in memory
    pub fn from_bytes(
        status: StatusCode,
        content_type: Option<HeaderValue>,
        body: impl Into<Bytes>,
    ) -> Self {
        let body: Bytes = body.into();
        Self {
            status,
            content_type,
            body: Box::pin(stream::once(async move { Ok::<_, BoxError>(body) })),
        }
    }
}

impl fmt::Debug for UpstreamResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamResponse")
            .field("status", &self.status)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

/// Authenticated access to the upstream origins
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    /// GET `url` with `api_key` attached
    async fn fetch(&self, url: &UpstreamUrl, api_key: &ApiKey) -> ProxyResult<UpstreamResponse>;
}

/// [`UpstreamClient`] backed by `reqwest`
#[derive(Clone, Debug)]
pub struct HttpUpstreamClient {
    client: reqwest::Client,
    request_timeout: Duration,
    max_retries: RetryCount,
}

impl HttpUpstreamClient {
    pub fn new(config: &ProxyConfig) -> ProxyResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client,
            request_timeout: config.request_timeout,
            max_retries: config.max_retries,
        })
    }

    async fn send_once(
        &self,
        url: &UpstreamUrl,
        api_key: &ApiKey,
    ) -> ProxyResult<reqwest::Response> {
        let request = self
            .client
            .get(url.as_ref())
            .query(&[(params::API_KEY, api_key.as_ref())])
            .send();

        match tokio::time::timeout(self.request_timeout, request).await {
            Err(_) => Err(ProxyError::RequestTimeout(self.request_timeout)),
            Ok(Err(e)) if e.is_timeout() => Err(ProxyError::RequestTimeout(self.request_timeout)),
            Ok(result) => result.map_err(|e| ProxyError::from(redact(e))),
        }
    }
}

/// Drop the query from the URL a `reqwest` error reports. It carries the API key.
fn redact(error: reqwest::Error) -> reqwest::Error {
    match error.url().cloned() {
        Some(mut url) => {
            url.set_query(None);
            error.with_url(url)
        }
        None => error,
    }
}

#[async_trait]
impl UpstreamClient for HttpUpstreamClient {
    async fn fetch(&self, url: &UpstreamUrl, api_key: &ApiKey) -> ProxyResult<UpstreamResponse> {
        let max_retries = *self.max_retries.as_ref();
        let mut attempt = 0;

        let response = loop {
            match self.send_once(url, api_key).await {
                Ok(response) => break response,
                Err(ProxyError::UpstreamTransport(e)) if attempt < max_retries => {
                    attempt += 1;
                    warn!(
                        upstream_url = %url,
                        attempt,
                        error = %e,
                        "Upstream transport error, retrying"
                    );
                }
                Err(e) => return Err(e),
            }
        };

        debug!(upstream_url = %url, status = response.status().as_u16(), "Upstream responded");

        Ok(UpstreamResponse {
            status: response.status(),
            content_type: response.headers().get(CONTENT_TYPE).cloned(),
            body: Box::pin(
                response
                    .bytes_stream()
                    .map_err(|e| Box::new(redact(e)) as BoxError),
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use mockito::{Matcher, Server};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn config() -> ProxyConfig {
        ProxyConfig {
            request_timeout: Duration::from_secs(5),
            ..Default::default()
        }
    }

    fn api_key() -> ApiKey {
        ApiKey::try_new("secret-key".to_string()).unwrap()
    }

    async fn collect(mut body: ByteStream) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some(chunk) = body.next().await {
            out.extend_from_slice(&chunk.unwrap());
        }
        out
    }

    #[tokio::test]
    async fn test_fetch_attaches_api_key() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/3/movie/550")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("language".into(), "fr-FR".into()),
                Matcher::UrlEncoded("api_key".into(), "secret-key".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":550}"#)
            .create_async()
            .await;

        let client = HttpUpstreamClient::new(&config()).unwrap();
        let url =
            UpstreamUrl::try_new(format!("{}/3/movie/550?language=fr-FR", server.url())).unwrap();

        let response = client.fetch(&url, &api_key()).await.unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(
            response.content_type.unwrap().to_str().unwrap(),
            "application/json"
        );
        assert_eq!(collect(response.body).await, br#"{"id":550}"#);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_returns_error_statuses() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/3/movie/0")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(r#"{"status_code":34}"#)
            .create_async()
            .await;

        let client = HttpUpstreamClient::new(&config()).unwrap();
        let url = UpstreamUrl::try_new(format!("{}/3/movie/0?language=fr-FR", server.url())).unwrap();

        let response = client.fetch(&url, &api_key()).await.unwrap();
        assert_eq!(response.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_transport_errors_do_not_expose_api_key() {
        use crate::proxy::error_response::ErrorResponseExt;

        let client = HttpUpstreamClient::new(&config()).unwrap();
        // Port 9 (discard) is closed on test hosts
        let url = UpstreamUrl::try_new("http://127.0.0.1:9/3/movie/1?language=fr-FR".to_string())
            .unwrap();
        let key = ApiKey::try_new("TOPSECRETKEY".to_string()).unwrap();

        let err = client.fetch(&url, &key).await.unwrap_err();
        assert!(matches!(err, ProxyError::UpstreamTransport(_)));
        assert!(!err.to_string().contains("TOPSECRETKEY"));

        let body = err.to_error_response();
        assert_eq!(body.code, "CONNECTION_ERROR");
        assert!(!serde_json::to_string(&body).unwrap().contains("TOPSECRETKEY"));
        assert_eq!(body.details.unwrap()["path"], "/3/movie/1");
    }

    /// How the fake origin treats one incoming connection
    #[derive(Clone, Copy)]
    enum Reply {
        HangUp,
        Stall,
        Respond(&'static str),
    }

    /// Plain TCP origin following `script`, one reply per connection.
    /// Returns its base URL and the number of accepted connections.
    async fn scripted_origin(script: Vec<Reply>) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&accepted);

        tokio::spawn(async move {
            for reply in script {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                counter.fetch_add(1, Ordering::SeqCst);
                match reply {
                    Reply::HangUp => drop(socket),
                    Reply::Stall => {
                        tokio::spawn(async move {
                            tokio::time::sleep(Duration::from_secs(30)).await;
                            drop(socket);
                        });
                    }
                    Reply::Respond(body) => {
                        let mut buf = [0u8; 4096];
                        let _ = socket.read(&mut buf).await;
                        let response = format!(
                            "HTTP/1.1 200 OK\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                            body.len()
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                    }
                }
            }
        });

        (format!("http://{addr}"), accepted)
    }

    fn client_with(request_timeout: Duration, max_retries: u32) -> HttpUpstreamClient {
        HttpUpstreamClient::new(&ProxyConfig {
            request_timeout,
            max_retries: RetryCount::new(max_retries),
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_slow_upstream_times_out() {
        let (origin, _) = scripted_origin(vec![Reply::Stall]).await;
        let client = client_with(Duration::from_millis(200), 0);
        let url = UpstreamUrl::try_new(format!("{origin}/3/movie/550")).unwrap();

        let err = client.fetch(&url, &api_key()).await.unwrap_err();
        assert!(matches!(err, ProxyError::RequestTimeout(_)));
    }

    #[tokio::test]
    async fn test_timeouts_are_never_retried() {
        let (origin, accepted) =
            scripted_origin(vec![Reply::Stall, Reply::Respond("late")]).await;
        let client = client_with(Duration::from_millis(200), 2);
        let url = UpstreamUrl::try_new(format!("{origin}/3/movie/550")).unwrap();

        let err = client.fetch(&url, &api_key()).await.unwrap_err();
        assert!(matches!(err, ProxyError::RequestTimeout(_)));
        assert_eq!(accepted.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transport_errors_are_retried() {
        let (origin, accepted) =
            scripted_origin(vec![Reply::HangUp, Reply::Respond("ok")]).await;
        let client = client_with(Duration::from_secs(5), 1);
        let url = UpstreamUrl::try_new(format!("{origin}/3/movie/550")).unwrap();

        let response = client.fetch(&url, &api_key()).await.unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(collect(response.body).await, b"ok");
        assert_eq!(accepted.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_transport_errors_fail_without_retries() {
        let (origin, accepted) =
            scripted_origin(vec![Reply::HangUp, Reply::Respond("ok")]).await;
        let client = client_with(Duration::from_secs(5), 0);
        let url = UpstreamUrl::try_new(format!("{origin}/3/movie/550")).unwrap();

        let err = client.fetch(&url, &api_key()).await.unwrap_err();
        assert!(matches!(err, ProxyError::UpstreamTransport(_)));
        assert_eq!(accepted.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_from_bytes_body() {
        let response =
            UpstreamResponse::from_bytes(StatusCode::OK, None, Bytes::from_static(b"hello"));
        assert_eq!(collect(response.body).await, b"hello");
    }
}
