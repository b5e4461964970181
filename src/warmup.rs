//! Cache warm-up crawler
//!
//! Walks a running proxy the way the front-end would: popular movies, their
//! details, posters, credits and profile pictures, the filmographies of the
//! leading cast, and the search results for every prefix of each title. Every
//! response ends up in the proxy's cache, so the proxy can later run without
//! an API key.
//!
//! Requests are issued one at a time. Any failed request aborts the crawl.

use crate::infrastructure::log_messages;
use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info};

/// Address the proxy listens on by default
pub const DEFAULT_BASE_URL: &str = "http://localhost:1337";

/// Number of cast members whose filmography is crawled per movie
pub const LEADING_CAST: usize = 3;

/// Characters `encodeURI` leaves untouched besides ASCII alphanumerics
const URI_RESERVED: &str = ";,/?:@&=+$-_.!~*'()#";

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct Page<T> {
    #[serde(default)]
    results: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct MovieSummary {
    id: u64,
    #[serde(default)]
    title: String,
}

#[derive(Debug, Deserialize)]
struct MovieDetail {
    poster_path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Credits {
    #[serde(default)]
    cast: Vec<Credit>,
    #[serde(default)]
    crew: Vec<Credit>,
}

#[derive(Debug, Deserialize)]
struct Credit {
    id: u64,
    #[serde(default)]
    name: String,
    profile_path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CastMovie {
    poster_path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    media_type: Option<String>,
    poster_path: Option<String>,
    profile_path: Option<String>,
}

impl SearchResult {
    fn image(&self) -> Option<&str> {
        match self.media_type.as_deref() {
            Some("movie") | Some("person") => self
                .poster_path
                .as_deref()
                .or(self.profile_path.as_deref()),
            _ => None,
        }
    }
}

/// What a crawl fetched
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WarmupReport {
    pub movies: usize,
    pub requests: usize,
    pub images: usize,
}

/// Crawler bound to one proxy instance
#[derive(Debug, Clone)]
pub struct CacheWarmer {
    client: reqwest::Client,
    base_url: String,
}

impl CacheWarmer {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Crawl everything reachable from the popular movies list
    pub async fn run(&self) -> Result<WarmupReport> {
        info!(base_url = %self.base_url, "{}", log_messages::warmup::STARTED);
        let mut report = WarmupReport::default();

        let popular: Page<MovieSummary> = self.get_json("/movie/popular", &mut report).await?;
        for movie in &popular.results {
            self.warm_movie(movie, &mut report).await?;
            report.movies += 1;
        }

        info!(
            movies = report.movies,
            requests = report.requests,
            images = report.images,
            "{}",
            log_messages::warmup::FINISHED
        );
        Ok(report)
    }

    async fn warm_movie(&self, movie: &MovieSummary, report: &mut WarmupReport) -> Result<()> {
        info!(id = movie.id, title = %movie.title, "{}", log_messages::warmup::MOVIE);

        let detail: MovieDetail = self
            .get_json(&format!("/movie/{}", movie.id), report)
            .await?;
        if let Some(poster) = &detail.poster_path {
            self.get_image(poster, report).await?;
        }

        let credits: Credits = self
            .get_json(&format!("/movie/{}/credits", movie.id), report)
            .await?;
        for credit in credits.cast.iter().chain(&credits.crew) {
            if let Some(profile) = &credit.profile_path {
                debug!(name = %credit.name, "Profile image");
                self.get_image(profile, report).await?;
            }
        }

        for member in credits.cast.iter().take(LEADING_CAST) {
            self.get(&format!("/person/{}", member.id), report).await?;

            let movies: Page<CastMovie> = self
                .get_json(&format!("/discover/movie?with_cast={}", member.id), report)
                .await?;
            for poster in movies.results.iter().filter_map(|m| m.poster_path.as_deref()) {
                self.get_image(poster, report).await?;
            }
        }

        for prefix in title_prefixes(&movie.title) {
            let results: Page<SearchResult> = self
                .get_json(&format!("/search/multi?query={}", encode_uri(&prefix)), report)
                .await?;
            for image in results.results.iter().filter_map(SearchResult::image) {
                self.get_image(image, report).await?;
            }
        }

        Ok(())
    }

    async fn get_image(&self, path: &str, report: &mut WarmupReport) -> Result<()> {
        self.get(path, report).await?;
        report.images += 1;
        Ok(())
    }

    async fn get(&self, path: &str, report: &mut WarmupReport) -> Result<()> {
        self.send(path, report).await?.bytes().await?;
        Ok(())
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        report: &mut WarmupReport,
    ) -> Result<T> {
        Ok(self.send(path, report).await?.json().await?)
    }

    async fn send(&self, path: &str, report: &mut WarmupReport) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "{}", log_messages::warmup::REQUEST);

        let response = self.client.get(&url).send().await?;
        report.requests += 1;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::UnexpectedStatus {
                url,
                status: status.as_u16(),
            });
        }
        Ok(response)
    }
}

/// Every non-empty prefix of the lower-cased title, shortest first
pub fn title_prefixes(title: &str) -> Vec<String> {
    let lower = title.to_lowercase();
    lower
        .char_indices()
        .map(|(i, c)| lower[..i + c.len_utf8()].to_string())
        .collect()
}

/// Percent-encode like JavaScript's `encodeURI`
pub fn encode_uri(input: &str) -> String {
    let mut encoded = String::with_capacity(input.len());
    let mut buf = [0u8; 4];
    for c in input.chars() {
        if c.is_ascii_alphanumeric() || URI_RESERVED.contains(c) {
            encoded.push(c);
        } else {
            encoded.push_str(&urlencoding::encode(c.encode_utf8(&mut buf)));
        }
    }
    encoded
}
