//! The root block: singleton authority block for a store.

use uuid::Uuid;

use crate::block::{random_bytes, Block, BlockKind};
use crate::contract::{now_epoch_secs, RedundancyContractType};
use crate::error::BlockResult;
use crate::params::BlockParams;
use crate::size_map::{block_size_bytes, BlockSize};

/// The key/control block for a cache. There is exactly one per store; the
/// store's on-disk database name is derived from its GUID.
#[derive(Debug, Clone)]
pub struct RootBlock {
    guid: Uuid,
    block: Block,
}

impl RootBlock {
    /// Creates a root block for the given database GUID.
    pub fn new(database_guid: Uuid, block_size: BlockSize) -> BlockResult<Self> {
        let params = BlockParams {
            block_size,
            request_time: now_epoch_secs(),
            keep_until_at_least: u64::MAX,
            redundancy: RedundancyContractType::HeapHighPriority,
            private_encrypted: false,
        };
        let len = block_size_bytes(block_size)?;
        let block = Block::new(BlockKind::Root, &params, random_bytes(len))?;
        Ok(Self {
            guid: database_guid,
            block,
        })
    }

    /// Creates a root block with a fresh GUID and the default `Large` size.
    pub fn generate() -> BlockResult<Self> {
        Self::new(Uuid::new_v4(), BlockSize::Large)
    }

    /// The database-identifying GUID.
    pub fn guid(&self) -> Uuid {
        self.guid
    }

    /// The underlying authority block.
    pub fn block(&self) -> &Block {
        &self.block
    }

    /// Database/directory name derived from the GUID: lowercase hex of its
    /// bytes. Cache managers use this as their on-disk tree root.
    pub fn database_name(&self) -> String {
        self.guid
            .as_bytes()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_block_defaults() {
        let root = RootBlock::new(Uuid::nil(), BlockSize::Message).unwrap();
        assert_eq!(root.block().kind(), BlockKind::Root);
        assert_eq!(root.block().block_size(), BlockSize::Message);
        assert_eq!(
            root.block().storage_contract().keep_until_at_least,
            u64::MAX
        );
        assert_eq!(
            root.block().redundancy_contract().contract_type,
            RedundancyContractType::HeapHighPriority
        );
        assert!(root.block().is_valid());
    }

    #[test]
    fn test_database_name_is_guid_hex() {
        let root = RootBlock::new(Uuid::nil(), BlockSize::Message).unwrap();
        assert_eq!(root.database_name(), "0".repeat(32));

        let other = RootBlock::generate().unwrap();
        assert_eq!(other.database_name().len(), 32);
        assert_ne!(other.database_name(), root.database_name());
    }

    #[test]
    fn test_generated_roots_differ() {
        let a = RootBlock::generate().unwrap();
        let b = RootBlock::generate().unwrap();
        assert_ne!(a.guid(), b.guid());
        assert_ne!(a.block().id(), b.block().id());
    }
}
