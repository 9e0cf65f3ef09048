//! Construction parameter set shared by all block constructors.

use serde::{Deserialize, Serialize};

use crate::contract::{now_epoch_secs, RedundancyContractType};
use crate::size_map::BlockSize;

/// Inputs for constructing a block: a size hint plus the contract fields.
///
/// A `block_size` of `Unknown` lets the data length decide; any other value
/// is a hard assertion that must agree with the detected size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockParams {
    /// Size category hint. `Unknown` defers to the data length.
    pub block_size: BlockSize,
    /// When the storage request was made (epoch seconds).
    pub request_time: u64,
    /// Earliest time the block may be expired (epoch seconds).
    pub keep_until_at_least: u64,
    /// Redundancy class for the block.
    pub redundancy: RedundancyContractType,
    /// Whether the payload is privately encrypted user data.
    pub private_encrypted: bool,
}

impl BlockParams {
    /// Creates a parameter set with explicit values.
    pub fn new(
        block_size: BlockSize,
        request_time: u64,
        keep_until_at_least: u64,
        redundancy: RedundancyContractType,
        private_encrypted: bool,
    ) -> Self {
        Self {
            block_size,
            request_time,
            keep_until_at_least,
            redundancy,
            private_encrypted,
        }
    }

    /// Parameter set requested now, kept for `keep_secs` from now.
    pub fn kept_for(block_size: BlockSize, keep_secs: u64, redundancy: RedundancyContractType) -> Self {
        let now = now_epoch_secs();
        Self {
            block_size,
            request_time: now,
            keep_until_at_least: now.saturating_add(keep_secs),
            redundancy,
            private_encrypted: false,
        }
    }
}
