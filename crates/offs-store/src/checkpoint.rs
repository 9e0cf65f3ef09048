//! Checkpoint result and bookkeeping types.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::partition::StorePartition;

/// The three checkpoint operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CheckpointKind {
    /// Index and log together.
    Full,
    /// Log tail only.
    Hybrid,
    /// Index only.
    Index,
}

impl CheckpointKind {
    /// Snapshot filename stem for this kind.
    pub fn file_stem(self) -> &'static str {
        match self {
            CheckpointKind::Full => "full",
            CheckpointKind::Hybrid => "hybrid",
            CheckpointKind::Index => "index",
        }
    }
}

impl std::fmt::Display for CheckpointKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckpointKind::Full => write!(f, "Full"),
            CheckpointKind::Hybrid => write!(f, "Hybrid"),
            CheckpointKind::Index => write!(f, "Index"),
        }
    }
}

/// Outcome of one checkpoint operation across all four partitions.
///
/// `success` is the logical AND of every partition's outcome; the
/// per-partition maps always carry all four entries, so a caller can see
/// exactly which partitions succeeded even when the aggregate is false. A
/// failed partition still reports the token it attempted.
#[derive(Debug, Clone)]
pub struct StoreCheckpoint {
    /// Whether every partition checkpoint succeeded.
    pub success: bool,
    /// Per-partition success flags.
    pub results: HashMap<StorePartition, bool>,
    /// Per-partition recovery tokens.
    pub tokens: HashMap<StorePartition, Uuid>,
}

impl StoreCheckpoint {
    /// Aggregates per-partition outcomes into a checkpoint result.
    pub fn from_outcomes(outcomes: Vec<(StorePartition, bool, Uuid)>) -> Self {
        let mut success = true;
        let mut results = HashMap::with_capacity(outcomes.len());
        let mut tokens = HashMap::with_capacity(outcomes.len());
        for (partition, ok, token) in outcomes {
            success = success && ok;
            results.insert(partition, ok);
            tokens.insert(partition, token);
        }
        Self {
            success,
            results,
            tokens,
        }
    }
}

/// Per-partition log-address or serial bookkeeping, reported as a map keyed
/// by partition identity. Values are read back-to-back, not transactionally:
/// treat the map as a best-effort snapshot relative to concurrent writers.
#[derive(Debug, Clone)]
pub struct PartitionAddresses {
    /// Address (or serial) per partition.
    pub addresses: HashMap<StorePartition, u64>,
}

/// Outcome of a coordinated recovery across all four partitions.
#[derive(Debug, Clone)]
pub struct RecoveryReport {
    /// Per-partition recovery success flags.
    pub results: HashMap<StorePartition, bool>,
    /// Log records replayed per partition.
    pub records_replayed: HashMap<StorePartition, usize>,
}
