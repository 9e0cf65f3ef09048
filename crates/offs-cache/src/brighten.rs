//! Whitening and brightening services.
//!
//! These small services are the lynchpin of the owner-free store: they XOR
//! incoming source blocks with freshly generated randomizer blocks so that no
//! stored block is independently recognizable as user data. Randomizers are
//! generated on demand today; construction takes the randomizer cache so a
//! pre-generated pool can be substituted later without changing callers.

use std::sync::Arc;

use tracing::debug;

use offs_block::{now_epoch_secs, Block, BlockKind, BlockParams, BlockSize};

use crate::error::{CacheError, CacheResult};
use crate::manager::BlockCacheManager;

/// XORs a source block against freshly generated randomizers, returning the
/// whitened result.
pub struct BlockWhitener {
    pregenerated_randomizer_cache: Arc<dyn BlockCacheManager>,
}

impl BlockWhitener {
    /// Tuple width: one source block and `TUPLE_COUNT - 1` randomizers.
    pub const TUPLE_COUNT: usize = 3;

    /// Creates a whitener drawing randomizers against the given cache.
    pub fn new(pregenerated_randomizer_cache: Arc<dyn BlockCacheManager>) -> Self {
        Self {
            pregenerated_randomizer_cache,
        }
    }

    /// Whitens a source block. The incoming block is raw user data and is
    /// never used again after this call.
    pub fn whiten(&self, block: &Block) -> CacheResult<Block> {
        let randomizers = generate_randomizers(
            self.pregenerated_randomizer_cache.as_ref(),
            block,
            Self::TUPLE_COUNT - 1,
        )?;
        Ok(block.xor_with_all(&randomizers)?)
    }
}

/// Like [`BlockWhitener`] with a wider tuple, also handing back the
/// randomizer set so callers can persist or recycle it.
pub struct BlockBrightener {
    pregenerated_randomizer_cache: Arc<dyn BlockCacheManager>,
}

impl BlockBrightener {
    /// Tuple width: one source block and `TUPLE_COUNT - 1` randomizers.
    pub const TUPLE_COUNT: usize = 5;

    /// Creates a brightener drawing randomizers against the given cache.
    pub fn new(pregenerated_randomizer_cache: Arc<dyn BlockCacheManager>) -> Self {
        Self {
            pregenerated_randomizer_cache,
        }
    }

    /// Brightens a source block, returning the brightened block and the
    /// randomizers used to produce it.
    pub fn brighten(&self, block: &Block) -> CacheResult<(Block, Vec<Block>)> {
        let randomizers = generate_randomizers(
            self.pregenerated_randomizer_cache.as_ref(),
            block,
            Self::TUPLE_COUNT - 1,
        )?;
        let brightened = block.xor_with_all(&randomizers)?;
        debug!(
            source = %block.id(),
            brightened = %brightened.id(),
            randomizers = randomizers.len(),
            "brightened block"
        );
        Ok((brightened, randomizers))
    }

    /// Reverses brightening: resolves the constituent randomizers through the
    /// randomizer cache, XORs them back out, and reconstructs the source
    /// block.
    pub fn reveal(&self, brightened: &Block) -> CacheResult<Block> {
        if brightened.constituent_blocks().is_empty() {
            return Err(CacheError::NoConstituents {
                hash: *brightened.id(),
            });
        }
        let randomizers = brightened
            .constituent_blocks()
            .iter()
            .map(|hash| {
                self.pregenerated_randomizer_cache
                    .get(hash)
                    .map(|t| t.into_block())
            })
            .collect::<CacheResult<Vec<_>>>()?;
        let recovered = brightened.xor_with_all(&randomizers)?;

        let params = BlockParams {
            block_size: BlockSize::Unknown,
            request_time: now_epoch_secs(),
            keep_until_at_least: brightened.storage_contract().keep_until_at_least,
            redundancy: brightened.redundancy_contract().contract_type,
            private_encrypted: brightened.storage_contract().private_encrypted,
        };
        Ok(Block::new(
            BlockKind::Source,
            &params,
            recovered.data().clone(),
        )?)
    }
}

/// Generates `count` fresh randomizers matching the source's size, expiry,
/// and redundancy, registering each in the randomizer cache.
fn generate_randomizers(
    cache: &dyn BlockCacheManager,
    source: &Block,
    count: usize,
) -> CacheResult<Vec<Block>> {
    let params = BlockParams {
        block_size: source.block_size(),
        request_time: now_epoch_secs(),
        keep_until_at_least: source.storage_contract().keep_until_at_least,
        redundancy: source.redundancy_contract().contract_type,
        private_encrypted: false,
    };
    (0..count)
        .map(|_| {
            let randomizer = Block::new_randomizer(&params)?;
            cache.set(&randomizer)?;
            Ok(randomizer)
        })
        .collect()
}
