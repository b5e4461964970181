//! Tee of upstream response bodies into the cache
//!
//! [`CachingStream`] forwards every chunk to the caller and keeps a copy, up
//! to the cache entry limit. When the upstream body ends cleanly the copy is
//! handed to a [`CacheWriter`] task, which stores it. The caller is never
//! slowed down by the cache: an oversized body stops the copy and the rest is
//! still forwarded.
//!
//! A stream that errors or is dropped before its end (caller disconnect)
//! leaves nothing in the cache. Dropping the stream also drops the upstream
//! body, which aborts the upstream request.

use crate::proxy::cache_store::{CacheStore, CachedResponse};
use crate::proxy::in_flight::InFlightGuard;
use crate::proxy::types::*;
use crate::proxy::upstream::{BoxError, ByteStream};
use bytes::{Bytes, BytesMut};
use futures_util::Stream;
use pin_project_lite::pin_project;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Sending side of a capture, owned by the [`CachingStream`]
#[derive(Debug)]
pub struct Capture {
    key: UpstreamUrl,
    max_size: usize,
    body: BytesMut,
    tx: oneshot::Sender<Bytes>,
}

impl Capture {
    /// Copy `chunk`. Returns `false` once the body no longer fits.
    fn push(&mut self, chunk: &Bytes) -> bool {
        if self.body.len() + chunk.len() > self.max_size {
            warn!(
                key = %self.key,
                max_size = self.max_size,
                "Response exceeds cache entry limit, not caching"
            );
            return false;
        }
        self.body.extend_from_slice(chunk);
        true
    }

    /// Hand the complete body to the writer
    fn complete(self) {
        // The writer only goes away if its task was aborted
        let _ = self.tx.send(self.body.freeze());
    }
}

pin_project! {
    /// Body stream that copies chunks for a cache writer while forwarding
    pub struct CachingStream {
        #[pin]
        inner: ByteStream,
        capture: Option<Capture>,
    }
}

impl CachingStream {
    pub fn new(inner: ByteStream, capture: Capture) -> Self {
        Self {
            inner,
            capture: Some(capture),
        }
    }
}

impl Stream for CachingStream {
    type Item = Result<Bytes, BoxError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();

        match this.inner.poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                if let Some(capture) = this.capture.as_mut() {
                    if !capture.push(&chunk) {
                        *this.capture = None;
                    }
                }
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(e))) => {
                // Dropping the capture without completing discards the entry
                *this.capture = None;
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                if let Some(capture) = this.capture.take() {
                    capture.complete();
                }
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// Background task that stores a captured body
pub struct CacheWriter {
    pub store: Arc<dyn CacheStore>,
    pub key: UpstreamUrl,
    pub status: u16,
    pub content_type: Option<String>,
    pub max_size: ResponseSizeLimit,
}

impl CacheWriter {
    /// Start the writer. `guard`, if any, is released after the write.
    pub fn spawn(self, guard: Option<InFlightGuard>) -> (Capture, JoinHandle<bool>) {
        let (tx, rx) = oneshot::channel();
        let capture = Capture {
            key: self.key.clone(),
            max_size: *self.max_size.as_ref(),
            body: BytesMut::new(),
            tx,
        };

        let handle = tokio::spawn(async move {
            let stored = self.run(rx).await;
            drop(guard);
            stored
        });

        (capture, handle)
    }

    async fn run(self, rx: oneshot::Receiver<Bytes>) -> bool {
        let Ok(body) = rx.await else {
            debug!(key = %self.key, "Response body incomplete, discarding cache entry");
            return false;
        };

        let entry = CachedResponse::new(self.status, self.content_type, body);
        match self.store.put(&self.key, &entry).await {
            Ok(()) => true,
            Err(e) => {
                warn!(key = %self.key, error = %e, "Failed to write cache entry");
                false
            }
        }
    }
}
