//! Durable response cache keyed by upstream URL
//!
//! Entries are written once per complete upstream response and never deleted.
//! Freshness is not stored with the entry; callers compare the entry age with
//! the TTL of the running process, so an entry written while online stays
//! usable for the five-year window of cache-only mode.

use crate::infrastructure::log_messages;
use crate::proxy::types::UpstreamUrl;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Length prefix of the JSON header in a stored record
const HEADER_LEN_BYTES: usize = 4;

/// Errors raised by cache storage backends
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache storage error: {0}")]
    Storage(#[from] cacache::Error),

    #[error("Cache record header error: {0}")]
    Header(#[from] serde_json::Error),

    #[error("Corrupt cache record: {0}")]
    Corrupt(String),
}

/// A stored upstream response
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CachedResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub stored_at: DateTime<Utc>,
    pub body: Bytes,
}

#[derive(Serialize, Deserialize)]
struct RecordHeader {
    status: u16,
    content_type: Option<String>,
    stored_at: DateTime<Utc>,
}

impl CachedResponse {
    /// Capture a response received now
    pub fn new(status: u16, content_type: Option<String>, body: Bytes) -> Self {
        Self {
            status,
            content_type,
            stored_at: Utc::now(),
            body,
        }
    }

    /// Whether the entry is younger than `ttl` at `now`
    pub fn is_fresh(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        let age = now.signed_duration_since(self.stored_at);
        match chrono::Duration::from_std(ttl) {
            Ok(ttl) => age < ttl,
            // A TTL beyond chrono's range never expires
            Err(_) => true,
        }
    }

    /// Serialize as `[header length: u32 BE][JSON header][body]`
    pub fn encode(&self) -> Result<Vec<u8>, CacheError> {
        let header = serde_json::to_vec(&RecordHeader {
            status: self.status,
            content_type: self.content_type.clone(),
            stored_at: self.stored_at,
        })?;
        let header_len = u32::try_from(header.len())
            .map_err(|_| CacheError::Corrupt("record header too large".to_string()))?;

        let mut record = Vec::with_capacity(HEADER_LEN_BYTES + header.len() + self.body.len());
        record.extend_from_slice(&header_len.to_be_bytes());
        record.extend_from_slice(&header);
        record.extend_from_slice(&self.body);
        Ok(record)
    }

    pub fn decode(record: Vec<u8>) -> Result<Self, CacheError> {
        let prefix: [u8; HEADER_LEN_BYTES] = record
            .get(..HEADER_LEN_BYTES)
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or_else(|| CacheError::Corrupt("missing header length".to_string()))?;
        let header_end = HEADER_LEN_BYTES + u32::from_be_bytes(prefix) as usize;
        if header_end > record.len() {
            return Err(CacheError::Corrupt(format!(
                "header length {header_end} exceeds record length {}",
                record.len()
            )));
        }

        let header: RecordHeader = serde_json::from_slice(&record[HEADER_LEN_BYTES..header_end])?;
        let body = Bytes::from(record).slice(header_end..);

        Ok(Self {
            status: header.status,
            content_type: header.content_type,
            stored_at: header.stored_at,
            body,
        })
    }
}

/// Keyed storage of upstream responses
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Entry stored for `key`, fresh or not
    async fn get(&self, key: &UpstreamUrl) -> Result<Option<CachedResponse>, CacheError>;

    /// Store `entry`, replacing any previous entry for `key`
    async fn put(&self, key: &UpstreamUrl, entry: &CachedResponse) -> Result<(), CacheError>;
}

/// Content-addressable on-disk cache.
///
/// `cacache` writes the content before the index line that points to it, so a
/// failed or interrupted write never exposes a partial entry.
#[derive(Debug, Clone)]
pub struct DiskCacheStore {
    cache_dir: PathBuf,
}

impl DiskCacheStore {
    /// Open a cache in `cache_dir`, creating the directory if needed
    pub async fn new(cache_dir: impl AsRef<Path>) -> Self {
        let path = cache_dir.as_ref().to_path_buf();

        if let Err(e) = tokio::fs::create_dir_all(&path).await {
            warn!(
                error = %e,
                path = %path.display(),
                "{}", log_messages::cache::DIRECTORY_UNAVAILABLE
            );
        }

        Self { cache_dir: path }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }
}

#[async_trait]
impl CacheStore for DiskCacheStore {
    async fn get(&self, key: &UpstreamUrl) -> Result<Option<CachedResponse>, CacheError> {
        match cacache::read(&self.cache_dir, key.as_ref()).await {
            Ok(record) => CachedResponse::decode(record).map(Some),
            Err(cacache::Error::EntryNotFound(_, _)) => Ok(None),
            Err(e) => Err(CacheError::Storage(e)),
        }
    }

    async fn put(&self, key: &UpstreamUrl, entry: &CachedResponse) -> Result<(), CacheError> {
        let record = entry.encode()?;
        cacache::write(&self.cache_dir, key.as_ref(), &record).await?;
        debug!(key = %key, size = record.len(), "Cached upstream response");
        Ok(())
    }
}

/// Process-local cache, used when no durable storage is wanted
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: RwLock<HashMap<UpstreamUrl, CachedResponse>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &UpstreamUrl) -> Result<Option<CachedResponse>, CacheError> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn put(&self, key: &UpstreamUrl, entry: &CachedResponse) -> Result<(), CacheError> {
        self.entries.write().insert(key.clone(), entry.clone());
        Ok(())
    }
}
