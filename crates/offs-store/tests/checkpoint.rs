//! Integration tests for the four-partition checkpoint coordination and
//! recovery paths.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use offs_block::{Block, BlockParams, BlockSize, RedundancyContractType, RootBlock};
use offs_cache::{BlockCacheManager, NodeConfig};
use offs_store::{CheckpointedBlockCacheManager, StoreError, StorePartition};

fn config(dir: &Path) -> NodeConfig {
    NodeConfig {
        base_path: dir.to_path_buf(),
        database_name: Some("ckpt-test".into()),
    }
}

fn manager(dir: &Path) -> Arc<CheckpointedBlockCacheManager> {
    CheckpointedBlockCacheManager::new(&config(dir), RootBlock::generate().unwrap()).unwrap()
}

fn brightened_block() -> Block {
    let params = BlockParams::new(
        BlockSize::Message,
        1_000,
        u64::MAX,
        RedundancyContractType::HeapAuto,
        false,
    );
    let source = Block::new_source(
        &BlockParams { block_size: BlockSize::Unknown, ..params },
        offs_block::random_bytes(512),
    )
    .unwrap();
    let randomizer = Block::new_randomizer(&params).unwrap();
    source.xor_with_all(std::slice::from_ref(&randomizer)).unwrap()
}

fn partition_dir(dir: &Path, partition: StorePartition) -> std::path::PathBuf {
    dir.join("ckpt-test").join(partition.dir_name())
}

#[test]
fn sync_full_checkpoint_reports_all_partitions() {
    let tmp = tempfile::tempdir().unwrap();
    let store = manager(tmp.path());
    store.set(&brightened_block()).unwrap();

    let checkpoint = store.take_full_checkpoint();
    assert!(checkpoint.success);
    assert_eq!(checkpoint.results.len(), 4);
    assert_eq!(checkpoint.tokens.len(), 4);
    for partition in StorePartition::ALL {
        assert!(checkpoint.results[&partition]);
        assert!(partition_dir(tmp.path(), partition).is_dir());
    }
}

#[tokio::test]
async fn async_checkpoint_is_structurally_equivalent_to_sync() {
    let tmp = tempfile::tempdir().unwrap();
    let store = manager(tmp.path());
    store.set(&brightened_block()).unwrap();

    let sync = store.take_hybrid_checkpoint();
    let asynchronous = store.take_hybrid_checkpoint_async().await;

    assert_eq!(sync.success, asynchronous.success);
    assert_eq!(sync.results.len(), asynchronous.results.len());
    for partition in StorePartition::ALL {
        assert_eq!(sync.results[&partition], asynchronous.results[&partition]);
        assert!(asynchronous.tokens.contains_key(&partition));
    }
}

#[tokio::test]
async fn one_failing_partition_fails_the_aggregate_only() {
    let tmp = tempfile::tempdir().unwrap();
    let store = manager(tmp.path());
    store.set(&brightened_block()).unwrap();

    // Replace the expiration partition's directory with a plain file so its
    // snapshot write cannot succeed.
    let sabotaged = partition_dir(tmp.path(), StorePartition::PrimaryExpiration);
    fs::remove_dir_all(&sabotaged).unwrap();
    fs::write(&sabotaged, b"not a directory").unwrap();

    for checkpoint in [
        store.take_full_checkpoint(),
        store.take_full_checkpoint_async().await,
    ] {
        assert!(!checkpoint.success);
        assert!(!checkpoint.results[&StorePartition::PrimaryExpiration]);
        assert!(checkpoint.results[&StorePartition::PrimaryMetadata]);
        assert!(checkpoint.results[&StorePartition::PrimaryData]);
        assert!(checkpoint.results[&StorePartition::CblIndices]);
        // the failed partition still reports the token it attempted
        assert!(checkpoint
            .tokens
            .contains_key(&StorePartition::PrimaryExpiration));
    }
}

#[tokio::test]
async fn complete_checkpoint_waits_on_all_partitions() {
    let tmp = tempfile::tempdir().unwrap();
    let store = manager(tmp.path());
    store.set(&brightened_block()).unwrap();

    let checkpoint = store.take_full_checkpoint_async().await;
    assert!(checkpoint.success);
    store.complete_checkpoint_async().await.unwrap();
}

#[tokio::test]
async fn recovery_restores_blocks_across_instances() {
    let tmp = tempfile::tempdir().unwrap();
    let block = brightened_block();

    {
        let store = manager(tmp.path());
        store.set(&block).unwrap();
        let checkpoint = store.take_full_checkpoint();
        assert!(checkpoint.success);
    }

    let reopened = manager(tmp.path());
    assert!(!reopened.contains(block.id()));

    let report = reopened.recover().await.unwrap();
    for partition in StorePartition::ALL {
        assert!(report.results[&partition]);
    }

    assert!(reopened.contains(block.id()));
    let fetched = reopened.get(block.id()).unwrap();
    assert!(fetched.block().is_valid());
    assert_eq!(fetched.block().data(), block.data());
    assert_eq!(
        reopened.constituents_of(block.id()).unwrap().unwrap(),
        block.constituent_blocks().to_vec()
    );
}

#[tokio::test]
async fn recovery_replays_hybrid_tail() {
    let tmp = tempfile::tempdir().unwrap();
    let first = brightened_block();
    let second = brightened_block();

    {
        let store = manager(tmp.path());
        store.set(&first).unwrap();
        assert!(store.take_full_checkpoint().success);
        store.set(&second).unwrap();
        assert!(store.take_hybrid_checkpoint().success);
    }

    let reopened = manager(tmp.path());
    let report = reopened.recover().await.unwrap();
    assert!(report.records_replayed[&StorePartition::PrimaryData] > 0);
    assert!(reopened.contains(first.id()));
    assert!(reopened.contains(second.id()));
}

#[tokio::test]
async fn corrupt_snapshot_surfaces_as_recovery_failure() {
    let tmp = tempfile::tempdir().unwrap();
    {
        let store = manager(tmp.path());
        store.set(&brightened_block()).unwrap();
        assert!(store.take_full_checkpoint().success);
    }

    // corrupt the data partition's snapshot file
    let data_dir = partition_dir(tmp.path(), StorePartition::PrimaryData);
    let snapshot = fs::read_dir(&data_dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .find(|p| p.extension().map(|e| e == "ckpt").unwrap_or(false))
        .unwrap();
    fs::write(&snapshot, b"corrupted").unwrap();

    let reopened = manager(tmp.path());
    match reopened.recover().await {
        Err(StoreError::RecoveryFailed { partitions }) => {
            assert_eq!(partitions, vec![StorePartition::PrimaryData]);
        }
        other => panic!("expected RecoveryFailed, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn compaction_after_checkpoint_keeps_blocks_readable() {
    let tmp = tempfile::tempdir().unwrap();
    let store = manager(tmp.path());
    let block = brightened_block();
    store.set(&block).unwrap();

    assert!(store.take_full_checkpoint().success);
    let compacted = store.compact(true);
    for partition in StorePartition::ALL {
        assert_eq!(
            compacted.addresses[&partition],
            store.head_addresses().addresses[&partition]
        );
    }
    assert_eq!(store.get(block.id()).unwrap().block().data(), block.data());
}
