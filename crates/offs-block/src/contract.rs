//! Storage-duration and redundancy contracts attached to every block.

use core::fmt;
use serde::{Deserialize, Serialize};

/// Returns the current time as seconds since the Unix epoch.
pub fn now_epoch_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

/// How long a block must be kept and how much data the agreement covers.
///
/// `byte_count` must equal the owning block's data length; the mismatch is a
/// validation failure, not a silent correction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageDurationContract {
    /// When the storage request was made (epoch seconds).
    #[serde(rename = "RequestTime")]
    pub request_time: u64,
    /// Earliest time the block may be expired (epoch seconds).
    #[serde(rename = "KeepUntilAtLeast")]
    pub keep_until_at_least: u64,
    /// Number of data bytes the contract covers.
    #[serde(rename = "ByteCount")]
    pub byte_count: usize,
    /// Whether the payload is privately encrypted user data.
    #[serde(rename = "PrivateEncrypted")]
    pub private_encrypted: bool,
}

/// Redundancy classes, ordered by priority. XOR composition propagates the
/// maximum ordinal across all participants.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub enum RedundancyContractType {
    /// No redundancy class assigned.
    #[default]
    Unknown,
    /// Heap-managed, automatic priority.
    HeapAuto,
    /// Heap-managed, low priority.
    HeapLowPriority,
    /// Heap-managed, high priority.
    HeapHighPriority,
}

impl fmt::Display for RedundancyContractType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RedundancyContractType::Unknown => write!(f, "Unknown"),
            RedundancyContractType::HeapAuto => write!(f, "HeapAuto"),
            RedundancyContractType::HeapLowPriority => write!(f, "HeapLowPriority"),
            RedundancyContractType::HeapHighPriority => write!(f, "HeapHighPriority"),
        }
    }
}

/// Redundancy agreement for a block. The embedded storage contract must
/// structurally equal the owning block's own storage contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedundancyContract {
    /// The storage-duration contract this redundancy agreement covers.
    #[serde(rename = "StorageContract")]
    pub storage_contract: StorageDurationContract,
    /// The redundancy class.
    #[serde(rename = "RedundancyContractType")]
    pub contract_type: RedundancyContractType,
}
