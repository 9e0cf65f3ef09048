//! Cache observability events.
//!
//! Every cache manager publishes key lifecycle events over a broadcast
//! channel. Events are observability only: delivery is lossy for slow
//! subscribers and never affects cache semantics.

use tokio::sync::broadcast;
use tracing::trace;

use offs_block::BlockHash;

/// Default buffered events per subscriber before the oldest are dropped.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Key lifecycle events fired by cache managers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    /// A block was added to the cache.
    KeyAdded(BlockHash),
    /// A block was removed from the cache.
    KeyRemoved(BlockHash),
    /// A block was expired out of the cache.
    KeyExpired(BlockHash),
    /// A block was requested but not present.
    CacheMiss(BlockHash),
}

/// Broadcast fan-out for [`CacheEvent`]s.
#[derive(Debug)]
pub struct CacheEvents {
    sender: broadcast::Sender<CacheEvent>,
}

impl CacheEvents {
    /// Creates an event channel with the given per-subscriber capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribes to future events.
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.sender.subscribe()
    }

    /// Publishes an event. Send failures (no subscribers) are ignored.
    pub fn emit(&self, event: CacheEvent) {
        trace!(?event, "cache event");
        let _ = self.sender.send(event);
    }
}

impl Default for CacheEvents {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}
