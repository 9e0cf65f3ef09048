//! The checkpointed block cache manager.
//!
//! Block records are spread across four parallel partitions — metadata,
//! data, expiration, and constituent-block-list indices — that advance
//! together: every checkpoint, compaction, and recovery operation is issued
//! against all four, and a checkpoint only counts as successful when all
//! four individual operations succeed.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{Arc, Weak};

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use offs_block::{Block, BlockHash, BlockMetadata, RootBlock};
use offs_cache::{
    ensure_persistable, BlockCacheManager, CacheError, CacheEvent, CacheEvents, CacheResult,
    NodeConfig, TransactableBlock,
};

use crate::checkpoint::{CheckpointKind, PartitionAddresses, RecoveryReport, StoreCheckpoint};
use crate::error::{StoreError, StoreResult};
use crate::partition::{write_snapshot_file, PartitionStore, StorePartition};

/// Cache manager persisting into four checkpointed key-value partitions.
pub struct CheckpointedBlockCacheManager {
    database_name: String,
    root_block: RootBlock,
    primary_metadata: Arc<RwLock<PartitionStore>>,
    primary_data: Arc<RwLock<PartitionStore>>,
    primary_expiration: Arc<RwLock<PartitionStore>>,
    cbl_indices: Arc<RwLock<PartitionStore>>,
    last_checkpoint_files: Mutex<HashMap<StorePartition, PathBuf>>,
    events: CacheEvents,
    weak_self: Weak<CheckpointedBlockCacheManager>,
}

impl CheckpointedBlockCacheManager {
    /// Opens the four partitions under `{base}/{database}/` and wires them
    /// into one manager. The database name comes from the configuration
    /// override or, by default, from the root block's GUID.
    pub fn new(config: &NodeConfig, root_block: RootBlock) -> StoreResult<Arc<Self>> {
        let database_name = config
            .database_name
            .clone()
            .unwrap_or_else(|| root_block.database_name());
        let base = config.base_path.join(&database_name);

        let open = |partition: StorePartition| -> StoreResult<Arc<RwLock<PartitionStore>>> {
            Ok(Arc::new(RwLock::new(PartitionStore::new(
                partition,
                base.join(partition.dir_name()),
            )?)))
        };
        let primary_metadata = open(StorePartition::PrimaryMetadata)?;
        let primary_data = open(StorePartition::PrimaryData)?;
        let primary_expiration = open(StorePartition::PrimaryExpiration)?;
        let cbl_indices = open(StorePartition::CblIndices)?;

        info!(database = %database_name, base = %base.display(), "opened checkpointed store");
        Ok(Arc::new_cyclic(|weak| Self {
            database_name,
            root_block,
            primary_metadata,
            primary_data,
            primary_expiration,
            cbl_indices,
            last_checkpoint_files: Mutex::new(HashMap::new()),
            events: CacheEvents::default(),
            weak_self: weak.clone(),
        }))
    }

    /// The root block with authority for this store.
    pub fn root_block(&self) -> &RootBlock {
        &self.root_block
    }

    fn partition(&self, partition: StorePartition) -> &Arc<RwLock<PartitionStore>> {
        match partition {
            StorePartition::PrimaryMetadata => &self.primary_metadata,
            StorePartition::PrimaryData => &self.primary_data,
            StorePartition::PrimaryExpiration => &self.primary_expiration,
            StorePartition::CblIndices => &self.cbl_indices,
        }
    }

    /// The constituent hashes indexed for a stored block, if any.
    pub fn constituents_of(&self, key: &BlockHash) -> StoreResult<Option<Vec<BlockHash>>> {
        match self.cbl_indices.read().get(key.as_bytes()) {
            None => Ok(None),
            Some(bytes) => bincode::deserialize(&bytes)
                .map(Some)
                .map_err(|e| StoreError::Partition {
                    partition: StorePartition::CblIndices,
                    reason: e.to_string(),
                }),
        }
    }

    /// Drops every block whose keep-until time has passed, firing a
    /// `KeyExpired` event per dropped block and returning their hashes.
    /// Blocks are kept at least until their contract time; the sweep is
    /// caller-driven, never automatic.
    pub fn sweep_expired(&self, now_secs: u64) -> StoreResult<Vec<BlockHash>> {
        let due = self
            .primary_expiration
            .read()
            .scan_below(&now_secs.to_be_bytes());

        let mut expired = Vec::with_capacity(due.len());
        for (expiration_key, value) in due {
            let hash: BlockHash =
                bincode::deserialize(&value).map_err(|e| StoreError::Partition {
                    partition: StorePartition::PrimaryExpiration,
                    reason: e.to_string(),
                })?;
            let key = hash.as_bytes().to_vec();
            self.primary_metadata.write().delete(&key);
            self.primary_data.write().delete(&key);
            self.primary_expiration.write().delete(&expiration_key);
            self.cbl_indices.write().delete(&key);
            self.events.emit(CacheEvent::KeyExpired(hash));
            expired.push(hash);
        }
        if !expired.is_empty() {
            info!(count = expired.len(), "swept expired blocks");
        }
        Ok(expired)
    }

    /// Takes a full checkpoint (index and log) of all four partitions.
    pub fn take_full_checkpoint(&self) -> StoreCheckpoint {
        self.checkpoint_sync(CheckpointKind::Full)
    }

    /// Takes a hybrid checkpoint (log tail) of all four partitions.
    pub fn take_hybrid_checkpoint(&self) -> StoreCheckpoint {
        self.checkpoint_sync(CheckpointKind::Hybrid)
    }

    /// Takes an index-only checkpoint of all four partitions.
    pub fn take_index_checkpoint(&self) -> StoreCheckpoint {
        self.checkpoint_sync(CheckpointKind::Index)
    }

    /// Async variant of [`Self::take_full_checkpoint`]; structurally
    /// equivalent results.
    pub async fn take_full_checkpoint_async(&self) -> StoreCheckpoint {
        self.checkpoint_async(CheckpointKind::Full).await
    }

    /// Async variant of [`Self::take_hybrid_checkpoint`].
    pub async fn take_hybrid_checkpoint_async(&self) -> StoreCheckpoint {
        self.checkpoint_async(CheckpointKind::Hybrid).await
    }

    /// Async variant of [`Self::take_index_checkpoint`].
    pub async fn take_index_checkpoint_async(&self) -> StoreCheckpoint {
        self.checkpoint_async(CheckpointKind::Index).await
    }

    fn checkpoint_sync(&self, kind: CheckpointKind) -> StoreCheckpoint {
        let mut outcomes = Vec::with_capacity(StorePartition::ALL.len());
        for partition in StorePartition::ALL {
            let token = Uuid::new_v4();
            let result = self.partition(partition).read().checkpoint(kind, token);
            let ok = match result {
                Ok(path) => {
                    self.last_checkpoint_files.lock().insert(partition, path);
                    true
                }
                Err(e) => {
                    warn!(partition = %partition, error = %e, "checkpoint failed");
                    false
                }
            };
            outcomes.push((partition, ok, token));
        }
        let checkpoint = StoreCheckpoint::from_outcomes(outcomes);
        debug!(kind = %kind, success = checkpoint.success, "took checkpoint");
        checkpoint
    }

    /// Issues the four partition snapshot writes before awaiting any of
    /// them: callers never observe a partial checkpoint from a single call.
    async fn checkpoint_async(&self, kind: CheckpointKind) -> StoreCheckpoint {
        type WriteJob = JoinHandle<StoreResult<PathBuf>>;
        let mut jobs: Vec<(StorePartition, Uuid, WriteJob)> =
            Vec::with_capacity(StorePartition::ALL.len());
        for partition in StorePartition::ALL {
            let token = Uuid::new_v4();
            let (snapshot, path) = {
                let guard = self.partition(partition).read();
                (guard.snapshot_for(kind), guard.checkpoint_path(kind, token))
            };
            let handle = tokio::task::spawn_blocking(move || {
                write_snapshot_file(&path, &snapshot).map(|_| path)
            });
            jobs.push((partition, token, handle));
        }

        let mut outcomes = Vec::with_capacity(jobs.len());
        for (partition, token, handle) in jobs {
            let ok = match handle.await {
                Ok(Ok(path)) => {
                    self.last_checkpoint_files.lock().insert(partition, path);
                    true
                }
                Ok(Err(e)) => {
                    warn!(partition = %partition, error = %e, "checkpoint failed");
                    false
                }
                Err(e) => {
                    warn!(partition = %partition, error = %e, "checkpoint task died");
                    false
                }
            };
            outcomes.push((partition, ok, token));
        }
        let checkpoint = StoreCheckpoint::from_outcomes(outcomes);
        debug!(kind = %kind, success = checkpoint.success, "took async checkpoint");
        checkpoint
    }

    /// Waits for the most recent checkpoint of every partition to reach
    /// durable storage, fanning the four syncs out concurrently.
    pub async fn complete_checkpoint_async(&self) -> StoreResult<()> {
        let files: Vec<(StorePartition, PathBuf)> = self
            .last_checkpoint_files
            .lock()
            .iter()
            .map(|(p, path)| (*p, path.clone()))
            .collect();

        let jobs: Vec<(StorePartition, JoinHandle<std::io::Result<()>>)> = files
            .into_iter()
            .map(|(partition, path)| {
                let handle = tokio::task::spawn_blocking(move || {
                    OpenOptions::new().read(true).open(&path)?.sync_all()
                });
                (partition, handle)
            })
            .collect();

        let mut failed = Vec::new();
        for (partition, handle) in jobs {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(partition = %partition, error = %e, "checkpoint completion failed");
                    failed.push(partition);
                }
                Err(e) => {
                    warn!(partition = %partition, error = %e, "completion task died");
                    failed.push(partition);
                }
            }
        }
        if failed.is_empty() {
            Ok(())
        } else {
            Err(StoreError::CheckpointIncomplete { partitions: failed })
        }
    }

    /// Recovers all four partitions concurrently, waiting for every one to
    /// finish. Any partition failure surfaces as an error naming the failed
    /// partitions; it is never swallowed.
    pub async fn recover(&self) -> StoreResult<RecoveryReport> {
        let mut jobs: Vec<(StorePartition, JoinHandle<StoreResult<usize>>)> =
            Vec::with_capacity(StorePartition::ALL.len());
        for partition in StorePartition::ALL {
            let store = Arc::clone(self.partition(partition));
            jobs.push((
                partition,
                tokio::task::spawn_blocking(move || store.write().recover()),
            ));
        }

        let mut results = HashMap::new();
        let mut records_replayed = HashMap::new();
        let mut failed = Vec::new();
        for (partition, handle) in jobs {
            match handle.await {
                Ok(Ok(replayed)) => {
                    results.insert(partition, true);
                    records_replayed.insert(partition, replayed);
                }
                Ok(Err(e)) => {
                    error!(partition = %partition, error = %e, "partition recovery failed");
                    results.insert(partition, false);
                    failed.push(partition);
                }
                Err(e) => {
                    error!(partition = %partition, error = %e, "recovery task died");
                    results.insert(partition, false);
                    failed.push(partition);
                }
            }
        }

        if failed.is_empty() {
            Ok(RecoveryReport {
                results,
                records_replayed,
            })
        } else {
            Err(StoreError::RecoveryFailed { partitions: failed })
        }
    }

    /// Head log address per partition. Best-effort snapshot: the four reads
    /// are issued back-to-back, not transactionally.
    pub fn head_addresses(&self) -> PartitionAddresses {
        PartitionAddresses {
            addresses: StorePartition::ALL
                .iter()
                .map(|p| (*p, self.partition(*p).read().head_address()))
                .collect(),
        }
    }

    /// Next serial number per partition. Best-effort snapshot.
    pub fn next_serials(&self) -> PartitionAddresses {
        PartitionAddresses {
            addresses: StorePartition::ALL
                .iter()
                .map(|p| (*p, self.partition(*p).read().next_serial()))
                .collect(),
        }
    }

    /// Compacts every partition's log up to its head address, reporting the
    /// begin address per partition afterwards.
    pub fn compact(&self, shift_begin_address: bool) -> PartitionAddresses {
        PartitionAddresses {
            addresses: StorePartition::ALL
                .iter()
                .map(|p| {
                    let mut guard = self.partition(*p).write();
                    let head = guard.head_address();
                    (*p, guard.compact(head, shift_begin_address))
                })
                .collect(),
        }
    }
}

/// Expiration partition key: big-endian keep-until time, then the digest,
/// so a sweep is a bounded range scan in time order.
fn expiration_key(keep_until: u64, digest: &[u8; 32]) -> Vec<u8> {
    let mut key = keep_until.to_be_bytes().to_vec();
    key.extend_from_slice(digest);
    key
}

impl BlockCacheManager for CheckpointedBlockCacheManager {
    fn database_name(&self) -> &str {
        &self.database_name
    }

    fn contains(&self, key: &BlockHash) -> bool {
        self.primary_metadata.read().contains(key.as_bytes())
    }

    fn get(&self, key: &BlockHash) -> CacheResult<TransactableBlock> {
        let metadata_bytes = match self.primary_metadata.read().get(key.as_bytes()) {
            Some(bytes) => bytes,
            None => {
                self.events.emit(CacheEvent::CacheMiss(*key));
                return Err(CacheError::NotFound { hash: *key });
            }
        };
        let data = self
            .primary_data
            .read()
            .get(key.as_bytes())
            .ok_or_else(|| CacheError::InvalidRecord {
                hash: *key,
                reason: "metadata present but data partition has no record".into(),
            })?;

        let block = Block::restore(&metadata_bytes, Bytes::from(data))?;
        let cache: Weak<dyn BlockCacheManager> = self.weak_self.clone();
        Ok(TransactableBlock::bound(block, cache, true))
    }

    fn set(&self, block: &Block) -> CacheResult<()> {
        ensure_persistable(block)?;
        let key = block.id().as_bytes().to_vec();
        let metadata_bytes = block.metadata_bytes()?;

        // The metadata partition is the insert-once gatekeeper: its write
        // lock spans the whole insert, so the existence check and the writes
        // cannot race against another set() of the same hash.
        let mut metadata = self.primary_metadata.write();
        if !metadata.insert_new(key.clone(), metadata_bytes) {
            return Err(CacheError::AlreadyExists { hash: *block.id() });
        }

        self.primary_data.write().put(key.clone(), block.data().to_vec());
        self.primary_expiration.write().put(
            expiration_key(
                block.storage_contract().keep_until_at_least,
                block.id().as_bytes(),
            ),
            bincode::serialize(block.id()).map_err(|e| CacheError::InvalidRecord {
                hash: *block.id(),
                reason: e.to_string(),
            })?,
        );
        if !block.constituent_blocks().is_empty() {
            let constituents = block.constituent_blocks().to_vec();
            self.cbl_indices.write().put(
                key,
                bincode::serialize(&constituents).map_err(|e| CacheError::InvalidRecord {
                    hash: *block.id(),
                    reason: e.to_string(),
                })?,
            );
        }
        drop(metadata);

        self.events.emit(CacheEvent::KeyAdded(*block.id()));
        Ok(())
    }

    fn drop_block(&self, key: &BlockHash, _no_check_contains: bool) -> CacheResult<bool> {
        let mut metadata = self.primary_metadata.write();
        let metadata_bytes = match metadata.get(key.as_bytes()) {
            Some(bytes) => bytes,
            None => return Ok(false),
        };
        let parsed: BlockMetadata =
            serde_json::from_slice(&metadata_bytes).map_err(|e| CacheError::MetadataDecode {
                hash: *key,
                reason: e.to_string(),
            })?;
        let keep_until = parsed
            .redundancy_contract
            .storage_contract
            .keep_until_at_least;

        metadata.delete(key.as_bytes());
        self.primary_data.write().delete(key.as_bytes());
        self.primary_expiration
            .write()
            .delete(&expiration_key(keep_until, key.as_bytes()));
        self.cbl_indices.write().delete(key.as_bytes());
        drop(metadata);

        self.events.emit(CacheEvent::KeyRemoved(*key));
        Ok(true)
    }

    fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.events.subscribe()
    }
}
