//! Error types for the cache layer.

use thiserror::Error;

use offs_block::{BlockError, BlockHash, BlockKind};

/// Result type alias for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Error variants for cache operations.
///
/// Cache-miss and already-exists are distinct conditions and are never
/// conflated with validation or decode failures; the insert-only discipline
/// depends on `AlreadyExists` being a hard stop.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The requested key is not present in the cache.
    #[error("Block not found: {hash}")]
    NotFound {
        /// The key that was not found.
        hash: BlockHash,
    },

    /// A block with this key is already stored. The store is insert-only per
    /// key; overwriting requires an explicit drop first.
    #[error("Block already exists: {hash}")]
    AlreadyExists {
        /// The conflicting key.
        hash: BlockHash,
    },

    /// The block's kind may never enter a persistent cache.
    #[error("{kind} blocks must never be persisted")]
    NotPersistable {
        /// The offending kind.
        kind: BlockKind,
    },

    /// `commit()` was called on a block whose `allow_commit` is false.
    #[error("Block is not allowed to be committed: {hash}")]
    CommitNotAllowed {
        /// The block that refused the commit.
        hash: BlockHash,
    },

    /// A stored record has no `0x00` metadata terminator. A corrupted
    /// on-disk record is never silently skipped.
    #[error("No metadata terminator in stored record for {hash}")]
    MetadataTerminatorMissing {
        /// The key whose record is corrupt.
        hash: BlockHash,
    },

    /// The metadata section of a stored record failed to decode.
    #[error("Invalid block metadata for {hash}: {reason}")]
    MetadataDecode {
        /// The key whose record is corrupt.
        hash: BlockHash,
        /// Description of the decode failure.
        reason: String,
    },

    /// A stored record is structurally incomplete.
    #[error("Invalid stored record for {hash}: {reason}")]
    InvalidRecord {
        /// The key whose record is corrupt.
        hash: BlockHash,
        /// Description of the inconsistency.
        reason: String,
    },

    /// A brightened block carries no constituent hashes to reverse with.
    #[error("Block {hash} has no constituent blocks")]
    NoConstituents {
        /// The block missing its lineage.
        hash: BlockHash,
    },

    /// Wraps standard I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Wraps block-model errors.
    #[error(transparent)]
    Block(#[from] BlockError),
}
