//! Transactable blocks: cache-bound commit/rollback semantics on top of the
//! immutable block model.

use std::cmp::Ordering;
use std::ops::Deref;
use std::sync::{Arc, Weak};

use tracing::debug;

use offs_block::{block_size_bytes, Block};

use crate::error::{CacheError, CacheResult};
use crate::manager::BlockCacheManager;

/// A block bound to a cache manager with commit/rollback bookkeeping.
///
/// The cache reference is a non-owning weak handle: the cache manager owns
/// its blocks, and a block never owns or outlives its manager. Dropping a
/// transactable block rolls it back and releases the data buffer so large
/// payloads are not held after a logical discard.
#[derive(Debug)]
pub struct TransactableBlock {
    block: Block,
    cache: Option<Weak<dyn BlockCacheManager>>,
    committed: bool,
    allow_commit: bool,
}

impl TransactableBlock {
    /// Wraps a block bound to the given cache manager.
    pub fn bound(
        block: Block,
        cache: Weak<dyn BlockCacheManager>,
        allow_commit: bool,
    ) -> Self {
        Self {
            block,
            cache: Some(cache),
            committed: false,
            allow_commit,
        }
    }

    /// Wraps a block with no cache binding.
    pub fn detached(block: Block, allow_commit: bool) -> Self {
        Self {
            block,
            cache: None,
            committed: false,
            allow_commit,
        }
    }

    /// The underlying block.
    pub fn block(&self) -> &Block {
        &self.block
    }

    /// Returns an unbound copy of the underlying block. The payload buffer
    /// is shared, not duplicated.
    pub fn into_block(self) -> Block {
        self.block.clone()
    }

    /// The cache manager this block is bound to, if it is still alive.
    pub fn cache_manager(&self) -> Option<Arc<dyn BlockCacheManager>> {
        self.cache.as_ref().and_then(Weak::upgrade)
    }

    /// Whether the block has been committed.
    pub fn committed(&self) -> bool {
        self.committed
    }

    /// Whether the block may be committed at all.
    pub fn allow_commit(&self) -> bool {
        self.allow_commit
    }

    /// Marks the block committed. Fails when commits are not permitted.
    pub fn commit(&mut self) -> CacheResult<()> {
        if !self.allow_commit {
            return Err(CacheError::CommitNotAllowed {
                hash: *self.block.id(),
            });
        }
        self.committed = true;
        Ok(())
    }

    /// Clears the committed flag. Always permitted.
    pub fn rollback(&mut self) {
        self.committed = false;
    }
}

impl Deref for TransactableBlock {
    type Target = Block;

    fn deref(&self) -> &Block {
        &self.block
    }
}

impl Drop for TransactableBlock {
    fn drop(&mut self) {
        self.rollback();
        if !self.block.data().is_empty() {
            debug!(id = %self.block.id(), "releasing transactable block data");
            self.block.release_data();
        }
    }
}

impl PartialEq for TransactableBlock {
    /// Equal iff size categories match *and* the data bytes match: two
    /// same-length buffers in different categories are never equal, keeping
    /// hash spaces separated across categories.
    fn eq(&self, other: &Self) -> bool {
        self.block.block_size() == other.block.block_size()
            && self.block.data() == other.block.data()
    }
}

impl Eq for TransactableBlock {}

impl PartialOrd for TransactableBlock {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TransactableBlock {
    /// Orders by mapped size category length first, then by data bytes.
    fn cmp(&self, other: &Self) -> Ordering {
        let self_len = block_size_bytes(self.block.block_size()).unwrap_or(0);
        let other_len = block_size_bytes(other.block.block_size()).unwrap_or(0);
        self_len
            .cmp(&other_len)
            .then_with(|| self.block.data().cmp(other.block.data()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use offs_block::{BlockParams, BlockSize, RedundancyContractType};

    fn params(size: BlockSize) -> BlockParams {
        BlockParams::new(size, 1, u64::MAX, RedundancyContractType::HeapAuto, false)
    }

    fn randomizer(size: BlockSize) -> Block {
        Block::new_randomizer(&params(size)).unwrap()
    }

    #[test]
    fn test_commit_requires_permission() {
        let mut refused = TransactableBlock::detached(randomizer(BlockSize::Message), false);
        assert!(matches!(
            refused.commit(),
            Err(CacheError::CommitNotAllowed { .. })
        ));
        assert!(!refused.committed());

        let mut allowed = TransactableBlock::detached(randomizer(BlockSize::Message), true);
        allowed.commit().unwrap();
        assert!(allowed.committed());
    }

    #[test]
    fn test_rollback_always_permitted() {
        let mut block = TransactableBlock::detached(randomizer(BlockSize::Message), true);
        block.commit().unwrap();
        block.rollback();
        assert!(!block.committed());

        let mut never_committed = TransactableBlock::detached(randomizer(BlockSize::Message), false);
        never_committed.rollback();
        assert!(!never_committed.committed());
    }

    #[test]
    fn test_detached_has_no_cache() {
        let block = TransactableBlock::detached(randomizer(BlockSize::Message), true);
        assert!(block.cache_manager().is_none());
    }

    #[test]
    fn test_equality_requires_matching_size_category() {
        let data = Bytes::from(vec![0x42u8; 512]);
        let a = TransactableBlock::detached(
            Block::new_source(&params(BlockSize::Message), data.clone()).unwrap(),
            true,
        );
        let b = TransactableBlock::detached(
            Block::new_source(&params(BlockSize::Message), data).unwrap(),
            true,
        );
        assert_eq!(a, b);

        let bigger = TransactableBlock::detached(
            Block::new_source(&params(BlockSize::Tiny), Bytes::from(vec![0x42u8; 1024])).unwrap(),
            true,
        );
        assert_ne!(a, bigger);
        assert!(a < bigger);
    }

    #[test]
    fn test_into_block_keeps_payload() {
        let inner = randomizer(BlockSize::Message);
        let id = *inner.id();
        let block = TransactableBlock::detached(inner, true);
        let recovered = block.into_block();
        assert_eq!(*recovered.id(), id);
        assert_eq!(recovered.data().len(), 512);
    }
}
