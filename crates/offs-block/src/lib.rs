#![warn(missing_docs)]

//! offs block model: size-categorized content-addressed blocks, SHA-256
//! identities, storage/redundancy contracts, and the XOR composition algebra
//! used to whiten user data against randomizer blocks.
//!
//! Nothing in this crate knows about caches or persistence; those layers
//! consume blocks through the types exported here.

pub mod block;
pub mod contract;
pub mod error;
pub mod hash;
pub mod params;
pub mod root;
pub mod size_map;

pub use block::{
    random_bytes, Block, BlockKind, BlockMetadata, BlockSignature, RevocationCertificate,
    METADATA_VERSION,
};
pub use contract::{
    now_epoch_secs, RedundancyContract, RedundancyContractType, StorageDurationContract,
};
pub use error::{BlockError, BlockResult, ValidationError};
pub use hash::{BlockHash, HASH_SIZE_BYTES};
pub use params::BlockParams;
pub use root::RootBlock;
pub use size_map::{
    block_size_bytes, block_size_for_length, hashes_per_block, BlockSize, LARGE_SIZE,
    MEDIUM_SIZE, MESSAGE_SIZE, SMALL_SIZE, TINY_SIZE,
};
