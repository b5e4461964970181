//! Coalescing of concurrent fetches for the same upstream URL
//!
//! The first request for an uncached URL becomes the leader and holds an
//! [`InFlightGuard`] until its response has been written to the cache (or the
//! write was abandoned). Later requests for the same URL wait for the guard
//! to drop and then look at the cache again.

use crate::proxy::types::UpstreamUrl;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;

/// Outcome of [`InFlightRegistry::acquire`]
#[derive(Debug)]
pub enum Lease {
    /// No fetch was running; the caller must fetch and keep the guard alive
    /// until the cache write is finished
    Leader(InFlightGuard),
    /// Another request is fetching this URL
    Follower(InFlightWaiter),
}

/// URLs currently being fetched
#[derive(Debug, Default)]
pub struct InFlightRegistry {
    entries: Mutex<HashMap<UpstreamUrl, watch::Receiver<()>>>,
}

impl InFlightRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Become the leader for `url`, or wait on the current leader
    pub fn acquire(self: &Arc<Self>, url: &UpstreamUrl) -> Lease {
        let mut entries = self.entries.lock();
        if let Some(receiver) = entries.get(url) {
            return Lease::Follower(InFlightWaiter {
                receiver: receiver.clone(),
            });
        }

        let (sender, receiver) = watch::channel(());
        entries.insert(url.clone(), receiver);
        Lease::Leader(InFlightGuard {
            registry: Arc::clone(self),
            url: url.clone(),
            _sender: sender,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

/// Held by the leader; dropping it releases every waiter
#[derive(Debug)]
pub struct InFlightGuard {
    registry: Arc<InFlightRegistry>,
    url: UpstreamUrl,
    _sender: watch::Sender<()>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.registry.entries.lock().remove(&self.url);
    }
}

/// Held by a follower
#[derive(Debug)]
pub struct InFlightWaiter {
    receiver: watch::Receiver<()>,
}

impl InFlightWaiter {
    /// Resolves once the leader's guard has been dropped
    pub async fn wait(mut self) {
        // Nothing is ever sent, so this only returns when the sender closes
        while self.receiver.changed().await.is_ok() {}
    }
}
