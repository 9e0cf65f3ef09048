//! Brightened-block chains: ordered sequences of blocks representing a
//! reconstructable object, plus constituent-block-list packing.

use bytes::Bytes;
use tracing::debug;

use offs_block::{
    block_size_bytes, hashes_per_block, Block, BlockError, BlockHash, BlockKind, BlockParams,
    BlockResult,
};

use crate::error::CacheResult;
use crate::manager::BlockCacheManager;

/// An ordered, non-empty, homogeneous collection of blocks.
///
/// Homogeneity: every member shares the head block's kind and size category.
/// This is verified at construction — before any member can be observed —
/// in a single walk that also fixes the tail and the count.
#[derive(Debug, Clone)]
pub struct Chain {
    blocks: Vec<Block>,
    count: usize,
}

impl Chain {
    /// Builds a chain eagerly from an in-memory block sequence.
    pub fn from_blocks(blocks: Vec<Block>) -> BlockResult<Self> {
        let head = blocks.first().ok_or(BlockError::EmptyChain)?;
        let mut count = 0;
        for (index, block) in blocks.iter().enumerate() {
            verify_member(head, block, index)?;
            count += 1;
        }
        Ok(Self { blocks, count })
    }

    /// Builds a chain by resolving constituent hashes through a cache
    /// manager. Resolution and homogeneity verification share one pass.
    pub fn from_hashes(
        hashes: &[BlockHash],
        cache: &dyn BlockCacheManager,
    ) -> CacheResult<Self> {
        if hashes.is_empty() {
            return Err(BlockError::EmptyChain.into());
        }
        let mut blocks: Vec<Block> = Vec::with_capacity(hashes.len());
        for (index, hash) in hashes.iter().enumerate() {
            let block = cache.get(hash)?.into_block();
            if let Some(head) = blocks.first() {
                verify_member(head, &block, index)?;
            }
            blocks.push(block);
        }
        let count = blocks.len();
        debug!(count, "resolved chain from cache");
        Ok(Self { blocks, count })
    }

    /// Number of member blocks.
    pub fn count(&self) -> usize {
        self.count
    }

    /// The head block.
    pub fn first(&self) -> &Block {
        &self.blocks[0]
    }

    /// The tail block.
    pub fn last(&self) -> &Block {
        &self.blocks[self.count - 1]
    }

    /// All member blocks in order.
    pub fn all(&self) -> &[Block] {
        &self.blocks
    }

    /// Restartable lazy producer of member blocks; call again for a fresh
    /// walk over the backing list.
    pub fn iter(&self) -> std::slice::Iter<'_, Block> {
        self.blocks.iter()
    }

    /// Restartable lazy producer of member ids.
    pub fn ids(&self) -> impl Iterator<Item = &BlockHash> + '_ {
        self.blocks.iter().map(|b| b.id())
    }

    /// Packs the ordered member ids into a constituent-block-list block of
    /// the given size category, zero-padded to the exact category length.
    /// The id list is bounded by the category's hash capacity.
    pub fn to_cbl_block(&self, params: &BlockParams) -> BlockResult<Block> {
        let capacity = hashes_per_block(params.block_size)?;
        let target_len = block_size_bytes(params.block_size)?;
        let ids: Vec<BlockHash> = self.ids().copied().collect();

        let mut payload = bincode::serialize(&ids).map_err(|e| BlockError::CblDecode {
            reason: e.to_string(),
        })?;
        if payload.len() > target_len {
            return Err(BlockError::CblCapacityExceeded {
                block_size: params.block_size,
                capacity,
                requested: ids.len(),
            });
        }
        payload.resize(target_len, 0);

        Ok(Block::new(BlockKind::Cbl, params, Bytes::from(payload))?.with_constituents(ids))
    }

    /// Reads the ordered constituent ids back out of a constituent-block-list
    /// block.
    pub fn constituent_hashes_from_cbl(block: &Block) -> BlockResult<Vec<BlockHash>> {
        if block.kind() != BlockKind::Cbl {
            return Err(BlockError::CblDecode {
                reason: format!("expected Cbl block, got {}", block.kind()),
            });
        }
        bincode::deserialize(block.data()).map_err(|e| BlockError::CblDecode {
            reason: e.to_string(),
        })
    }
}

/// Checks one member against the head: same kind, same size category.
fn verify_member(head: &Block, block: &Block, index: usize) -> BlockResult<()> {
    if block.kind() != head.kind() || block.block_size() != head.block_size() {
        return Err(BlockError::NonHomogeneousChain {
            index,
            expected_kind: head.kind(),
            expected_size: head.block_size(),
            actual_kind: block.kind(),
            actual_size: block.block_size(),
        });
    }
    Ok(())
}
