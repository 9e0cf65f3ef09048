#![warn(missing_docs)]

//! offs checkpointed persistence: four parallel key-value partitions
//! (metadata, data, expiration, constituent-block-list indices) behind the
//! cache-manager contract, with coordinated full/hybrid/index checkpoints,
//! concurrent recovery, compaction, and address/serial bookkeeping.

pub mod checkpoint;
pub mod error;
pub mod manager;
pub mod partition;

pub use checkpoint::{CheckpointKind, PartitionAddresses, RecoveryReport, StoreCheckpoint};
pub use error::{StoreError, StoreResult};
pub use manager::CheckpointedBlockCacheManager;
pub use partition::{PartitionStore, StorePartition};
