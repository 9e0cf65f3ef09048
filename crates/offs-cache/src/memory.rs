//! In-memory block cache manager.
//!
//! Backed by a concurrent map whose entry API makes the insert-only `set`
//! atomic: there is no separate existence check followed by a write.

use std::sync::{Arc, Weak};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::debug;

use offs_block::{Block, BlockHash, RootBlock};

use crate::error::{CacheError, CacheResult};
use crate::events::{CacheEvent, CacheEvents};
use crate::manager::{ensure_persistable, BlockCacheManager};
use crate::transactable::TransactableBlock;

/// Memory-backed block cache manager. Also serves as the pre-generated
/// randomizer pool for the whitening services.
pub struct MemoryBlockCacheManager {
    blocks: DashMap<BlockHash, Block>,
    database_name: String,
    root_block: RootBlock,
    events: CacheEvents,
    weak_self: Weak<MemoryBlockCacheManager>,
}

impl MemoryBlockCacheManager {
    /// Creates a memory cache whose database name derives from the root
    /// block's GUID.
    pub fn new(root_block: RootBlock) -> Arc<Self> {
        let database_name = root_block.database_name();
        debug!(database = %database_name, "created memory block cache");
        Arc::new_cyclic(|weak| Self {
            blocks: DashMap::new(),
            database_name,
            root_block,
            events: CacheEvents::default(),
            weak_self: weak.clone(),
        })
    }

    /// The root block with authority for this cache.
    pub fn root_block(&self) -> &RootBlock {
        &self.root_block
    }

    /// Number of blocks currently held.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Whether the cache holds no blocks.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

impl BlockCacheManager for MemoryBlockCacheManager {
    fn database_name(&self) -> &str {
        &self.database_name
    }

    fn contains(&self, key: &BlockHash) -> bool {
        self.blocks.contains_key(key)
    }

    fn get(&self, key: &BlockHash) -> CacheResult<TransactableBlock> {
        match self.blocks.get(key) {
            Some(entry) => {
                let cache: Weak<dyn BlockCacheManager> = self.weak_self.clone();
                Ok(TransactableBlock::bound(entry.value().clone(), cache, true))
            }
            None => {
                self.events.emit(CacheEvent::CacheMiss(*key));
                Err(CacheError::NotFound { hash: *key })
            }
        }
    }

    fn set(&self, block: &Block) -> CacheResult<()> {
        ensure_persistable(block)?;
        match self.blocks.entry(*block.id()) {
            Entry::Occupied(_) => Err(CacheError::AlreadyExists { hash: *block.id() }),
            Entry::Vacant(slot) => {
                slot.insert(block.clone());
                self.events.emit(CacheEvent::KeyAdded(*block.id()));
                Ok(())
            }
        }
    }

    fn drop_block(&self, key: &BlockHash, no_check_contains: bool) -> CacheResult<bool> {
        if !no_check_contains && !self.blocks.contains_key(key) {
            return Ok(false);
        }
        match self.blocks.remove(key) {
            Some(_) => {
                self.events.emit(CacheEvent::KeyRemoved(*key));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.events.subscribe()
    }
}
