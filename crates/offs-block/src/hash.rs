//! Content hashing: SHA-256 block identities.

use core::fmt;
use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::BlockResult;
use crate::size_map::{block_size_for_length, BlockSize};

/// Digest width in bytes.
pub const HASH_SIZE_BYTES: usize = 32;

/// A 32-byte SHA-256 digest of a block's full data, tagged with the
/// originating block's size category.
///
/// Equality, ordering, and hashing are defined purely on the digest bytes;
/// the size category is carried metadata. The `computed` flag distinguishes a
/// freshly derived digest from one that was deserialized and is trusted only
/// until verified against recomputed data.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BlockHash {
    bytes: [u8; HASH_SIZE_BYTES],
    block_size: BlockSize,
    #[serde(skip)]
    computed: bool,
}

impl BlockHash {
    /// Computes the digest of `data`, deriving the size category from its
    /// length. Fails when the length maps to no category.
    pub fn for_data(data: &[u8]) -> BlockResult<Self> {
        let block_size = block_size_for_length(data.len())?;
        Ok(Self::compute(block_size, data))
    }

    /// Computes the digest of a block's full data, carrying its size
    /// category.
    pub fn for_block(block: &crate::block::Block) -> Self {
        Self::compute(block.block_size(), block.data())
    }

    /// Computes the digest of `data` for an already-known size category.
    pub fn compute(block_size: BlockSize, data: &[u8]) -> Self {
        Self {
            bytes: Sha256::digest(data).into(),
            block_size,
            computed: true,
        }
    }

    /// Wraps a pre-computed digest with its declared size category.
    ///
    /// This is the trust boundary: the digest is marked not-computed and must
    /// be verified against recomputed data before it is relied on.
    pub fn from_parts(block_size: BlockSize, bytes: [u8; HASH_SIZE_BYTES]) -> Self {
        Self {
            bytes,
            block_size,
            computed: false,
        }
    }

    /// Returns the raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; HASH_SIZE_BYTES] {
        &self.bytes
    }

    /// Returns the size category of the originating block.
    pub fn block_size(&self) -> BlockSize {
        self.block_size
    }

    /// Whether this digest was freshly derived rather than provided.
    pub fn computed(&self) -> bool {
        self.computed
    }
}

impl PartialEq for BlockHash {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl Eq for BlockHash {}

impl PartialOrd for BlockHash {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BlockHash {
    fn cmp(&self, other: &Self) -> Ordering {
        self.bytes.cmp(&other.bytes)
    }
}

impl std::hash::Hash for BlockHash {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.bytes.hash(state);
    }
}

impl fmt::Display for BlockHash {
    /// Uppercase hyphenated hex pairs (`AB-CD-…`). Stable: this rendering is
    /// the on-disk filename in the disk cache.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.bytes.iter().enumerate() {
            if i > 0 {
                write!(f, "-")?;
            }
            write!(f, "{:02X}", byte)?;
        }
        Ok(())
    }
}
