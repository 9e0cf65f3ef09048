//! Error types for the checkpointed store.

use thiserror::Error;

use crate::partition::StorePartition;

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Error variants for the checkpointed multi-partition store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Wraps standard I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A partition-scoped failure.
    #[error("Partition {partition} error: {reason}")]
    Partition {
        /// The partition that failed.
        partition: StorePartition,
        /// Description of the failure.
        reason: String,
    },

    /// A checkpoint snapshot file failed to encode.
    #[error("Snapshot encode failed for {partition}: {reason}")]
    SnapshotEncode {
        /// The partition whose snapshot failed.
        partition: StorePartition,
        /// Description of the failure.
        reason: String,
    },

    /// A checkpoint snapshot file failed to decode.
    #[error("Snapshot decode failed for {partition}: {reason}")]
    SnapshotDecode {
        /// The partition whose snapshot failed.
        partition: StorePartition,
        /// Description of the failure.
        reason: String,
    },

    /// One or more partitions failed recovery. Partial recovery is never
    /// silently swallowed.
    #[error("Recovery failed for partitions {partitions:?}")]
    RecoveryFailed {
        /// Every partition that failed to recover.
        partitions: Vec<StorePartition>,
    },

    /// One or more partitions failed to complete their pending checkpoint.
    #[error("Checkpoint completion failed for partitions {partitions:?}")]
    CheckpointIncomplete {
        /// Every partition that failed to complete.
        partitions: Vec<StorePartition>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_error_names_partition() {
        let err = StoreError::Partition {
            partition: StorePartition::PrimaryData,
            reason: "short read".into(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("PrimaryData"));
        assert!(msg.contains("short read"));
    }

    #[test]
    fn test_recovery_failed_lists_partitions() {
        let err = StoreError::RecoveryFailed {
            partitions: vec![StorePartition::CblIndices],
        };
        assert!(format!("{}", err).contains("CblIndices"));
    }
}
