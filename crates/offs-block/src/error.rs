//! Error types for the block model.

use thiserror::Error;

use crate::block::BlockKind;
use crate::size_map::BlockSize;

/// Result type alias for block operations.
pub type BlockResult<T> = Result<T, BlockError>;

/// Error variants for block construction and composition.
///
/// These are precondition violations: they abort the operation immediately
/// and are never collected the way [`ValidationError`]s are.
#[derive(Debug, Error)]
pub enum BlockError {
    /// The `Unknown` size category has no byte length.
    #[error("Unknown block size has no byte length")]
    UnknownBlockSize,

    /// No size category maps exactly to the given byte length.
    #[error("No block size category for {length} bytes")]
    NoMatchingBlockSize {
        /// The byte length that matched no category.
        length: usize,
    },

    /// The caller supplied an explicit size hint that disagrees with the
    /// size detected from the data length.
    #[error("Block size hint {hint} does not match detected size {detected}")]
    SizeHintMismatch {
        /// The size category the caller declared.
        hint: BlockSize,
        /// The size category detected from the data length.
        detected: BlockSize,
    },

    /// An XOR operand's byte length differs from the subject's.
    #[error("XOR operand is {actual} bytes, subject is {expected} bytes")]
    LengthMismatch {
        /// The subject block's byte length.
        expected: usize,
        /// The offending operand's byte length.
        actual: usize,
    },

    /// A user-data block appeared in an XOR operand position. XOR-ing two
    /// user-data blocks together would leak a direct data correlation.
    #[error("{kind} block may not be used as an XOR operand")]
    UnexpectedUserDataOperand {
        /// The kind of the offending operand.
        kind: BlockKind,
    },

    /// The tuple-based whitening path accepts only randomizer operands.
    #[error("Whitening operands must be randomizer blocks, got {kind}")]
    NonRandomizerOperand {
        /// The kind of the offending operand.
        kind: BlockKind,
    },

    /// A chain was constructed from an empty block set.
    #[error("Chain requires at least one block")]
    EmptyChain,

    /// A chain member does not share the head block's kind and size.
    #[error(
        "Chain member {index} is {actual_kind}/{actual_size}, head is {expected_kind}/{expected_size}"
    )]
    NonHomogeneousChain {
        /// Position of the offending member.
        index: usize,
        /// Kind of the head block.
        expected_kind: BlockKind,
        /// Size category of the head block.
        expected_size: BlockSize,
        /// Kind of the offending member.
        actual_kind: BlockKind,
        /// Size category of the offending member.
        actual_size: BlockSize,
    },

    /// A constituent-block-list block cannot hold the requested id count.
    #[error("Block of size {block_size} holds at most {capacity} hashes, got {requested}")]
    CblCapacityExceeded {
        /// The target block size category.
        block_size: BlockSize,
        /// Maximum hashes that fit in one block of that size.
        capacity: usize,
        /// Number of hashes requested.
        requested: usize,
    },

    /// A constituent-block-list payload failed to decode.
    #[error("Constituent list decode failed: {reason}")]
    CblDecode {
        /// Description of the decode failure.
        reason: String,
    },

    /// The stored metadata section failed to decode.
    #[error("Metadata decode failed: {reason}")]
    MetadataDecode {
        /// Description of the decode failure.
        reason: String,
    },

    /// The stored metadata section failed to encode.
    #[error("Metadata encode failed: {reason}")]
    MetadataEncode {
        /// Description of the encode failure.
        reason: String,
    },
}

/// A single self-validation failure.
///
/// Validation failures are collected, not thrown: an invalid block still
/// exists so its failure state can be inspected and logged, but callers must
/// treat it as unsafe to persist or trust.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The block's size category is `Unknown`.
    #[error("Block size is Unknown")]
    UnknownSize,

    /// The declared size category does not map to the data length.
    #[error("Block size {declared} does not match {length} bytes of data")]
    SizeMismatch {
        /// The declared size category.
        declared: BlockSize,
        /// The actual data length.
        length: usize,
    },

    /// Recomputing the content hash produced a different digest.
    #[error("Block id {expected} does not match recomputed hash {actual}")]
    HashMismatch {
        /// The stored id, rendered.
        expected: String,
        /// The recomputed digest, rendered.
        actual: String,
    },

    /// The data length does not equal the mapped size of the category.
    #[error("Data is {actual} bytes, size category maps to {expected}")]
    DataLengthMismatch {
        /// The byte length the size category maps to.
        expected: usize,
        /// The actual data length.
        actual: usize,
    },

    /// The storage contract's byte count disagrees with the data length.
    #[error("Storage contract covers {contract} bytes, data is {actual} bytes")]
    ByteCountMismatch {
        /// The byte count recorded on the storage contract.
        contract: usize,
        /// The actual data length.
        actual: usize,
    },

    /// The redundancy contract embeds a different storage contract than the
    /// block's own.
    #[error("Redundancy contract's embedded storage contract does not match the block's")]
    ContractMismatch,
}
