//! Block size categories and the static size map.
//!
//! Every block's data length must exactly equal the byte size mapped from its
//! category. Lookups are exact: an unrecognized category or a byte length
//! matching no category is an error, never a nearest fit.

use core::fmt;
use serde::{Deserialize, Serialize};

use crate::error::{BlockError, BlockResult};
use crate::hash::HASH_SIZE_BYTES;

/// 512 B — control messages.
pub const MESSAGE_SIZE: usize = 512;
/// 1 KiB.
pub const TINY_SIZE: usize = 1024;
/// 4 KiB.
pub const SMALL_SIZE: usize = 4 * 1024;
/// 1 MiB.
pub const MEDIUM_SIZE: usize = 1024 * 1024;
/// 4 MiB.
pub const LARGE_SIZE: usize = 4 * 1024 * 1024;

/// Supported block size categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BlockSize {
    /// Sentinel for "let the data length decide"; carries no byte length.
    Unknown,
    /// 512 B — control messages.
    Message,
    /// 1 KiB.
    Tiny,
    /// 4 KiB.
    Small,
    /// 1 MiB.
    Medium,
    /// 4 MiB.
    Large,
}

/// The size map: category to exact byte length. `Unknown` has no entry.
const SIZE_MAP: [(BlockSize, usize); 5] = [
    (BlockSize::Message, MESSAGE_SIZE),
    (BlockSize::Tiny, TINY_SIZE),
    (BlockSize::Small, SMALL_SIZE),
    (BlockSize::Medium, MEDIUM_SIZE),
    (BlockSize::Large, LARGE_SIZE),
];

impl BlockSize {
    /// Returns all known size categories in ascending order.
    pub fn known() -> &'static [BlockSize] {
        &[
            BlockSize::Message,
            BlockSize::Tiny,
            BlockSize::Small,
            BlockSize::Medium,
            BlockSize::Large,
        ]
    }
}

impl fmt::Display for BlockSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockSize::Unknown => write!(f, "Unknown"),
            BlockSize::Message => write!(f, "Message"),
            BlockSize::Tiny => write!(f, "Tiny"),
            BlockSize::Small => write!(f, "Small"),
            BlockSize::Medium => write!(f, "Medium"),
            BlockSize::Large => write!(f, "Large"),
        }
    }
}

/// Maps a size category to its exact byte length.
pub fn block_size_bytes(size: BlockSize) -> BlockResult<usize> {
    SIZE_MAP
        .iter()
        .find(|(s, _)| *s == size)
        .map(|(_, bytes)| *bytes)
        .ok_or(BlockError::UnknownBlockSize)
}

/// Maps an exact byte length back to its size category.
pub fn block_size_for_length(length: usize) -> BlockResult<BlockSize> {
    SIZE_MAP
        .iter()
        .find(|(_, bytes)| *bytes == length)
        .map(|(s, _)| *s)
        .ok_or(BlockError::NoMatchingBlockSize { length })
}

/// Maximum number of content hashes that fit in one block of the category.
pub fn hashes_per_block(size: BlockSize) -> BlockResult<usize> {
    Ok(block_size_bytes(size)? / HASH_SIZE_BYTES)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_size_bytes() {
        assert_eq!(block_size_bytes(BlockSize::Message).unwrap(), 512);
        assert_eq!(block_size_bytes(BlockSize::Tiny).unwrap(), 1024);
        assert_eq!(block_size_bytes(BlockSize::Small).unwrap(), 4096);
        assert_eq!(block_size_bytes(BlockSize::Medium).unwrap(), 1_048_576);
        assert_eq!(block_size_bytes(BlockSize::Large).unwrap(), 4_194_304);
    }

    #[test]
    fn test_unknown_has_no_byte_length() {
        assert!(matches!(
            block_size_bytes(BlockSize::Unknown),
            Err(BlockError::UnknownBlockSize)
        ));
    }

    #[test]
    fn test_block_size_for_length_exact_match() {
        assert_eq!(block_size_for_length(512).unwrap(), BlockSize::Message);
        assert_eq!(block_size_for_length(1024).unwrap(), BlockSize::Tiny);
        assert_eq!(block_size_for_length(4096).unwrap(), BlockSize::Small);
        assert_eq!(block_size_for_length(1_048_576).unwrap(), BlockSize::Medium);
        assert_eq!(block_size_for_length(4_194_304).unwrap(), BlockSize::Large);
    }

    #[test]
    fn test_block_size_for_length_no_nearest_fit() {
        for length in [0usize, 1, 511, 513, 4095, 4097, 4_194_305] {
            assert!(matches!(
                block_size_for_length(length),
                Err(BlockError::NoMatchingBlockSize { length: l }) if l == length
            ));
        }
    }

    #[test]
    fn test_hashes_per_block() {
        assert_eq!(hashes_per_block(BlockSize::Message).unwrap(), 16);
        assert_eq!(hashes_per_block(BlockSize::Tiny).unwrap(), 32);
        assert_eq!(hashes_per_block(BlockSize::Small).unwrap(), 128);
        assert_eq!(hashes_per_block(BlockSize::Medium).unwrap(), 32_768);
        assert_eq!(hashes_per_block(BlockSize::Large).unwrap(), 131_072);
        assert!(hashes_per_block(BlockSize::Unknown).is_err());
    }

    #[test]
    fn test_known_excludes_unknown() {
        let known = BlockSize::known();
        assert_eq!(known.len(), 5);
        assert!(!known.contains(&BlockSize::Unknown));
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", BlockSize::Message), "Message");
        assert_eq!(format!("{}", BlockSize::Unknown), "Unknown");
    }
}
