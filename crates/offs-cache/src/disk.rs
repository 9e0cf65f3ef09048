//! Disk-backed block cache manager.
//!
//! Relatively naive file-per-block store. Each block lives at
//! `{base}/{database}/{hh}/{hh}/{FULL-HASH}` — a two-level hex-prefix shard
//! scheme bounding directory fan-out — as `<metadata JSON><0x00><data>`.
//! The metadata section is JSON precisely so it can never contain a raw
//! `0x00` byte; the separator scan depends on that.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use bytes::Bytes;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use offs_block::{Block, BlockHash, RootBlock};

use crate::config::NodeConfig;
use crate::error::{CacheError, CacheResult};
use crate::events::{CacheEvent, CacheEvents};
use crate::manager::{ensure_persistable, BlockCacheManager};
use crate::transactable::TransactableBlock;

/// Separator between the metadata section and the data section.
const METADATA_TERMINATOR: u8 = 0;

/// Disk-backed block cache manager with write-once records.
pub struct DiskBlockCacheManager {
    base_path: PathBuf,
    database_name: String,
    root_block: RootBlock,
    events: CacheEvents,
    weak_self: Weak<DiskBlockCacheManager>,
}

impl DiskBlockCacheManager {
    /// Creates a disk cache rooted at the configured base path. The database
    /// directory is created if needed; its name comes from the configuration
    /// override or, by default, from the root block's GUID.
    pub fn new(config: &NodeConfig, root_block: RootBlock) -> CacheResult<Arc<Self>> {
        let database_name = config
            .database_name
            .clone()
            .unwrap_or_else(|| root_block.database_name());
        let base_path = config.base_path.clone();
        fs::create_dir_all(base_path.join(&database_name))?;
        debug!(
            base = %base_path.display(),
            database = %database_name,
            "created disk block cache"
        );
        Ok(Arc::new_cyclic(|weak| Self {
            base_path,
            database_name,
            root_block,
            events: CacheEvents::default(),
            weak_self: weak.clone(),
        }))
    }

    /// The root block with authority for this cache.
    pub fn root_block(&self) -> &RootBlock {
        &self.root_block
    }

    /// Fully qualified path for a block file:
    /// `{base}/{database}/{hh}/{hh}/{FULL-HASH}`.
    pub fn block_path(&self, key: &BlockHash) -> PathBuf {
        let digest = key.as_bytes();
        self.base_path
            .join(&self.database_name)
            .join(format!("{:02X}", digest[0]))
            .join(format!("{:02X}", digest[1]))
            .join(key.to_string())
    }

    fn read_record(&self, key: &BlockHash, path: &Path) -> CacheResult<Block> {
        let raw = fs::read(path)?;
        let terminator = raw
            .iter()
            .position(|b| *b == METADATA_TERMINATOR)
            .ok_or(CacheError::MetadataTerminatorMissing { hash: *key })?;
        let metadata = &raw[..terminator];
        let data = Bytes::copy_from_slice(&raw[terminator + 1..]);
        Block::restore(metadata, data).map_err(|e| CacheError::MetadataDecode {
            hash: *key,
            reason: e.to_string(),
        })
    }
}

impl BlockCacheManager for DiskBlockCacheManager {
    fn database_name(&self) -> &str {
        &self.database_name
    }

    fn contains(&self, key: &BlockHash) -> bool {
        self.block_path(key).is_file()
    }

    fn get(&self, key: &BlockHash) -> CacheResult<TransactableBlock> {
        let path = self.block_path(key);
        if !path.is_file() {
            self.events.emit(CacheEvent::CacheMiss(*key));
            return Err(CacheError::NotFound { hash: *key });
        }
        let block = self.read_record(key, &path)?;
        let cache: Weak<dyn BlockCacheManager> = self.weak_self.clone();
        Ok(TransactableBlock::bound(block, cache, true))
    }

    fn set(&self, block: &Block) -> CacheResult<()> {
        ensure_persistable(block)?;
        let path = self.block_path(block.id());
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Exclusive create: the existence check and the write are one atomic
        // operation, so concurrent writers of the same hash cannot race past
        // each other.
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(CacheError::AlreadyExists { hash: *block.id() });
            }
            Err(e) => return Err(e.into()),
        };

        let metadata = block.metadata_bytes()?;
        file.write_all(&metadata)?;
        file.write_all(&[METADATA_TERMINATOR])?;
        file.write_all(block.data())?;
        file.sync_all()?;

        debug!(id = %block.id(), bytes = block.data().len(), "stored block file");
        self.events.emit(CacheEvent::KeyAdded(*block.id()));
        Ok(())
    }

    fn drop_block(&self, key: &BlockHash, no_check_contains: bool) -> CacheResult<bool> {
        let path = self.block_path(key);
        if !no_check_contains && !path.is_file() {
            return Ok(false);
        }
        match fs::remove_file(&path) {
            Ok(()) => {
                self.events.emit(CacheEvent::KeyRemoved(*key));
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => {
                warn!(id = %key, error = %e, "failed to drop block file");
                Err(e.into())
            }
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.events.subscribe()
    }
}
