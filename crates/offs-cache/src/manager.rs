//! The cache-manager capability surface.
//!
//! This trait abstracts over the storage backend, allowing callers to use an
//! in-memory store for tests and randomizer pools, the disk store for simple
//! nodes, and the checkpointed store for production.

use tokio::sync::broadcast;

use offs_block::{Block, BlockHash};

use crate::error::{CacheError, CacheResult};
use crate::events::CacheEvent;
use crate::transactable::TransactableBlock;

/// Content-addressed block store keyed solely by [`BlockHash`].
///
/// The cache manager owns the canonical persisted copy of every block;
/// in-memory `Block` values are independent copies until `set` is called.
/// Instances are session-scoped and not required to be thread-safe beyond
/// what their internals provide.
pub trait BlockCacheManager: Send + Sync {
    /// Database/directory name for this instance's tree root.
    fn database_name(&self) -> &str;

    /// Returns whether the cache holds the given key.
    fn contains(&self, key: &BlockHash) -> bool;

    /// Retrieves a block, bound to this cache for transactional use.
    ///
    /// Absent keys fail with [`CacheError::NotFound`] — there is no
    /// miss-tolerant default — and fire a `CacheMiss` event.
    fn get(&self, key: &BlockHash) -> CacheResult<TransactableBlock>;

    /// Stores a block. Fails with [`CacheError::AlreadyExists`] if the key is
    /// present: the store is insert-only per key, and overwriting requires an
    /// explicit drop first.
    fn set(&self, block: &Block) -> CacheResult<()>;

    /// Removes a key, returning whether it was present and actually dropped.
    /// `no_check_contains` skips the existence pre-check for performance.
    fn drop_block(&self, key: &BlockHash, no_check_contains: bool) -> CacheResult<bool>;

    /// Subscribes to this cache's key lifecycle events.
    fn subscribe(&self) -> broadcast::Receiver<CacheEvent>;
}

/// Rejects block kinds that must never enter a persistent cache. Backends
/// call this before inserting.
pub fn ensure_persistable(block: &Block) -> CacheResult<()> {
    if block.kind().may_persist() {
        Ok(())
    } else {
        Err(CacheError::NotPersistable {
            kind: block.kind(),
        })
    }
}
