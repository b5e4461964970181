//! Request classification and upstream URL rewriting
//!
//! Every inbound request is classified from its raw path and query. The
//! checks are plain substring/suffix matches and run in a fixed order, so a
//! path such as `/comments/poster.jpg` is a comment request, never an image.

use crate::proxy::headers::{params, paths};
use crate::proxy::types::*;
use http::Uri;
use url::form_urlencoded;

/// TMDB metadata API origin
pub const API_ORIGIN: &str = "http://api.themoviedb.org/3";

/// TMDB image CDN origin, pinned to the `w154` poster size
pub const IMAGE_ORIGIN: &str = "https://image.tmdb.org/t/p/w154";

/// What the proxy does with an inbound request
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RewriteClassification {
    /// Handled by the comments record store, not rewritten
    PassthroughComment,
    /// Answered with an empty success response
    Favicon,
    /// Served from the image CDN
    Image(UpstreamUrl),
    /// Served from the metadata API with the locale forced
    ApiResource(UpstreamUrl),
}

impl RewriteClassification {
    /// Upstream URL for classifications that reach the gateway
    pub fn upstream_url(&self) -> Option<&UpstreamUrl> {
        match self {
            Self::Image(url) | Self::ApiResource(url) => Some(url),
            Self::PassthroughComment | Self::Favicon => None,
        }
    }
}

/// Rewrites inbound request URLs to upstream URLs
#[derive(Clone, Debug, Default)]
pub struct UrlResolver {
    origins: UpstreamOrigins,
}

impl UrlResolver {
    pub fn new(origins: UpstreamOrigins) -> Self {
        Self { origins }
    }

    /// Classify an inbound request URI
    pub fn classify(&self, uri: &Uri) -> ProxyResult<RewriteClassification> {
        let raw = uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or_else(|| uri.path());
        self.classify_raw(raw)
    }

    /// Classify a raw `path?query` string
    ///
    /// Pure: the same input always yields the same classification and URL.
    pub fn classify_raw(&self, raw: &str) -> ProxyResult<RewriteClassification> {
        if raw.contains(paths::COMMENTS) {
            return Ok(RewriteClassification::PassthroughComment);
        }
        if raw.contains(paths::FAVICON) {
            return Ok(RewriteClassification::Favicon);
        }

        let (path, query) = match raw.split_once('?') {
            Some((path, query)) => (path, query),
            None => (raw, ""),
        };

        if path.ends_with(paths::IMAGE_SUFFIX) {
            let url = format!("{}{}", self.origins.image, path);
            return Self::upstream(url).map(RewriteClassification::Image);
        }

        let url = format!(
            "{}{}?{}",
            self.origins.api,
            path,
            Self::localized_query(query)
        );
        Self::upstream(url).map(RewriteClassification::ApiResource)
    }

    /// Re-encode a query string with `language` forced to the proxy locale.
    ///
    /// An existing `language` keeps its position; duplicates of it are dropped.
    /// Every other parameter is kept in order.
    pub fn localized_query(query: &str) -> String {
        let mut language_set = false;
        let mut serializer = form_urlencoded::Serializer::new(String::new());

        for (name, value) in form_urlencoded::parse(query.as_bytes()) {
            if name == params::LANGUAGE {
                if !language_set {
                    serializer.append_pair(params::LANGUAGE, params::LOCALE);
                    language_set = true;
                }
            } else {
                serializer.append_pair(&name, &value);
            }
        }
        if !language_set {
            serializer.append_pair(params::LANGUAGE, params::LOCALE);
        }

        serializer.finish()
    }

    fn upstream(url: String) -> ProxyResult<UpstreamUrl> {
        UpstreamUrl::try_new(url.clone()).map_err(|e| {
            ProxyError::InvalidUpstreamUrl(format!("Invalid upstream URL '{url}': {e}"))
        })
    }
}
