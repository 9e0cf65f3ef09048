//! Store partitions: the four parallel key-value stores behind the
//! checkpointed cache manager, each an ordered index plus an append log with
//! address/serial bookkeeping and snapshot-file persistence.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::checkpoint::CheckpointKind;
use crate::error::{StoreError, StoreResult};

/// Identity of one of the four store partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StorePartition {
    /// Block metadata records.
    PrimaryMetadata,
    /// Block data payloads.
    PrimaryData,
    /// Expiration bookkeeping keyed by keep-until time.
    PrimaryExpiration,
    /// Constituent-block-list correlation indices.
    CblIndices,
}

impl StorePartition {
    /// All four partitions, in canonical order.
    pub const ALL: [StorePartition; 4] = [
        StorePartition::PrimaryMetadata,
        StorePartition::PrimaryData,
        StorePartition::PrimaryExpiration,
        StorePartition::CblIndices,
    ];

    /// On-disk directory name for this partition.
    pub fn dir_name(self) -> &'static str {
        match self {
            StorePartition::PrimaryMetadata => "primary-metadata",
            StorePartition::PrimaryData => "primary-data",
            StorePartition::PrimaryExpiration => "primary-expiration",
            StorePartition::CblIndices => "cbl-indices",
        }
    }
}

impl std::fmt::Display for StorePartition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorePartition::PrimaryMetadata => write!(f, "PrimaryMetadata"),
            StorePartition::PrimaryData => write!(f, "PrimaryData"),
            StorePartition::PrimaryExpiration => write!(f, "PrimaryExpiration"),
            StorePartition::CblIndices => write!(f, "CblIndices"),
        }
    }
}

/// One logged mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
enum LogOp {
    /// Insert or update a key.
    Put { key: Vec<u8>, value: Vec<u8> },
    /// Remove a key.
    Delete { key: Vec<u8> },
}

/// A serially numbered log record.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LogRecord {
    serial: u64,
    op: LogOp,
}

/// Snapshot file payload. `index`/`log` presence depends on the checkpoint
/// kind: full carries both, hybrid the log tail only, index the index only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct PartitionSnapshot {
    partition: StorePartition,
    kind: CheckpointKind,
    next_serial: u64,
    begin_address: u64,
    index: Option<Vec<(Vec<u8>, Vec<u8>)>>,
    log: Option<Vec<LogRecord>>,
}

/// Ordered key-value partition with an append log.
///
/// Addresses count logged operations: `begin_address` is the first retained
/// log position, `head_address` the next to be written. Serial numbers
/// increase by one per mutation and survive checkpoints.
pub struct PartitionStore {
    partition: StorePartition,
    dir: PathBuf,
    index: BTreeMap<Vec<u8>, Vec<u8>>,
    log: Vec<LogRecord>,
    begin_address: u64,
    next_serial: u64,
}

impl PartitionStore {
    /// Opens (and creates if needed) a partition rooted at `dir`.
    pub fn new(partition: StorePartition, dir: PathBuf) -> StoreResult<Self> {
        fs::create_dir_all(&dir)?;
        debug!(partition = %partition, dir = %dir.display(), "opened partition");
        Ok(Self {
            partition,
            dir,
            index: BTreeMap::new(),
            log: Vec::new(),
            begin_address: 0,
            next_serial: 0,
        })
    }

    /// This partition's identity.
    pub fn partition(&self) -> StorePartition {
        self.partition
    }

    /// Inserts or updates a key.
    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.log.push(LogRecord {
            serial: self.next_serial,
            op: LogOp::Put {
                key: key.clone(),
                value: value.clone(),
            },
        });
        self.next_serial += 1;
        self.index.insert(key, value);
    }

    /// Inserts a key only if absent, returning whether it was inserted.
    /// Refusals leave the log untouched.
    pub fn insert_new(&mut self, key: Vec<u8>, value: Vec<u8>) -> bool {
        if self.index.contains_key(&key) {
            return false;
        }
        self.put(key, value);
        true
    }

    /// Returns the value for a key, if present.
    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.index.get(key).cloned()
    }

    /// Returns whether the key is present.
    pub fn contains(&self, key: &[u8]) -> bool {
        self.index.contains_key(key)
    }

    /// Removes a key, returning whether it was present.
    pub fn delete(&mut self, key: &[u8]) -> bool {
        if self.index.remove(key).is_none() {
            return false;
        }
        self.log.push(LogRecord {
            serial: self.next_serial,
            op: LogOp::Delete { key: key.to_vec() },
        });
        self.next_serial += 1;
        true
    }

    /// All entries with keys strictly below `end_exclusive`, in key order.
    pub fn scan_below(&self, end_exclusive: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.index
            .range(..end_exclusive.to_vec())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether the partition holds no live keys.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// First retained log address.
    pub fn begin_address(&self) -> u64 {
        self.begin_address
    }

    /// Next log address to be written.
    pub fn head_address(&self) -> u64 {
        self.begin_address + self.log.len() as u64
    }

    /// Serial number the next mutation will take.
    pub fn next_serial(&self) -> u64 {
        self.next_serial
    }

    /// Discards log records below `until_address` when `shift_begin_address`
    /// is set, returning the begin address afterwards. The index is
    /// untouched; compaction only trims replay history.
    pub fn compact(&mut self, until_address: u64, shift_begin_address: bool) -> u64 {
        let until = until_address.min(self.head_address());
        if shift_begin_address && until > self.begin_address {
            let drop = (until - self.begin_address) as usize;
            self.log.drain(..drop);
            self.begin_address = until;
            debug!(
                partition = %self.partition,
                begin_address = self.begin_address,
                "compacted partition log"
            );
        }
        self.begin_address
    }

    /// Path of the snapshot file a checkpoint of `kind` with `token` writes.
    pub fn checkpoint_path(&self, kind: CheckpointKind, token: Uuid) -> PathBuf {
        self.dir.join(format!("{}-{}.ckpt", kind.file_stem(), token))
    }

    /// Captures the state a checkpoint of `kind` persists.
    pub(crate) fn snapshot_for(&self, kind: CheckpointKind) -> PartitionSnapshot {
        let index = match kind {
            CheckpointKind::Full | CheckpointKind::Index => Some(
                self.index
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            ),
            CheckpointKind::Hybrid => None,
        };
        let log = match kind {
            CheckpointKind::Full | CheckpointKind::Hybrid => Some(self.log.clone()),
            CheckpointKind::Index => None,
        };
        PartitionSnapshot {
            partition: self.partition,
            kind,
            next_serial: self.next_serial,
            begin_address: self.begin_address,
            index,
            log,
        }
    }

    /// Takes a checkpoint synchronously, writing the snapshot file.
    pub fn checkpoint(&self, kind: CheckpointKind, token: Uuid) -> StoreResult<PathBuf> {
        let path = self.checkpoint_path(kind, token);
        write_snapshot_file(&path, &self.snapshot_for(kind))?;
        Ok(path)
    }

    /// Recovers state from snapshot files: the newest full (or, failing
    /// that, index) snapshot is installed, then newer hybrid log tails are
    /// replayed in serial order. Returns the number of replayed records.
    /// An empty directory recovers to an empty partition.
    pub fn recover(&mut self) -> StoreResult<usize> {
        let mut fulls: Vec<PartitionSnapshot> = Vec::new();
        let mut hybrids: Vec<PartitionSnapshot> = Vec::new();
        let mut indexes: Vec<PartitionSnapshot> = Vec::new();

        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().map(|e| e != "ckpt").unwrap_or(true) {
                continue;
            }
            let snapshot = read_snapshot_file(self.partition, &path)?;
            match snapshot.kind {
                CheckpointKind::Full => fulls.push(snapshot),
                CheckpointKind::Hybrid => hybrids.push(snapshot),
                CheckpointKind::Index => indexes.push(snapshot),
            }
        }

        let base = fulls
            .into_iter()
            .max_by_key(|s| s.next_serial)
            .or_else(|| indexes.into_iter().max_by_key(|s| s.next_serial));

        if let Some(snapshot) = base {
            self.index = snapshot.index.unwrap_or_default().into_iter().collect();
            self.log = snapshot.log.unwrap_or_default();
            self.begin_address = snapshot.begin_address;
            self.next_serial = snapshot.next_serial;
        } else if hybrids.is_empty() {
            debug!(partition = %self.partition, "no snapshots, recovered empty");
            return Ok(0);
        }

        let mut tail: Vec<LogRecord> = hybrids
            .into_iter()
            .flat_map(|s| s.log.unwrap_or_default())
            .filter(|r| r.serial >= self.next_serial)
            .collect();
        tail.sort_by_key(|r| r.serial);
        tail.dedup_by_key(|r| r.serial);

        let replayed = tail.len();
        for record in tail {
            match &record.op {
                LogOp::Put { key, value } => {
                    self.index.insert(key.clone(), value.clone());
                }
                LogOp::Delete { key } => {
                    self.index.remove(key);
                }
            }
            self.next_serial = record.serial + 1;
            self.log.push(record);
        }

        info!(
            partition = %self.partition,
            keys = self.index.len(),
            replayed,
            next_serial = self.next_serial,
            "recovered partition"
        );
        Ok(replayed)
    }
}

/// Serializes and writes a snapshot file.
pub(crate) fn write_snapshot_file(path: &Path, snapshot: &PartitionSnapshot) -> StoreResult<()> {
    let bytes = bincode::serialize(snapshot).map_err(|e| StoreError::SnapshotEncode {
        partition: snapshot.partition,
        reason: e.to_string(),
    })?;
    fs::write(path, bytes)?;
    debug!(
        partition = %snapshot.partition,
        kind = %snapshot.kind,
        path = %path.display(),
        "wrote checkpoint snapshot"
    );
    Ok(())
}

/// Reads and deserializes a snapshot file.
fn read_snapshot_file(partition: StorePartition, path: &Path) -> StoreResult<PartitionSnapshot> {
    let bytes = fs::read(path)?;
    bincode::deserialize(&bytes).map_err(|e| {
        warn!(partition = %partition, path = %path.display(), "corrupt snapshot file");
        StoreError::SnapshotDecode {
            partition,
            reason: e.to_string(),
        }
    })
}
