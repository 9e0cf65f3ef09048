//! Core block model: tagged kinds, construction, validation, and the XOR
//! composition algebra behind whitening.
//!
//! A block is immutable once constructed: the content hash is derived at
//! construction time, full self-validation runs immediately, and the result
//! is cached rather than thrown. The only mutation after construction is
//! signature/validation bookkeeping.

use std::cmp::Ordering;

use bytes::Bytes;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::contract::{now_epoch_secs, RedundancyContract, StorageDurationContract};
use crate::error::{BlockError, BlockResult, ValidationError};
use crate::hash::BlockHash;
use crate::params::BlockParams;
use crate::size_map::{block_size_bytes, block_size_for_length, BlockSize};

/// Version tag written into every metadata section.
pub const METADATA_VERSION: u32 = 1;

/// Closed set of block variants. The discriminator is written to the
/// metadata section (`_t`) and matched exhaustively on restore; there is no
/// open type registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockKind {
    /// Raw user data. Never persisted; only ever the subject of whitening.
    Source,
    /// CSPRNG filler used exclusively as an XOR operand.
    Randomizer,
    /// XOR of a source block with randomizers. The only user-data form
    /// allowed into a persistent cache.
    Brightened,
    /// CSPRNG test/filler payload treated like raw user data.
    RandomData,
    /// Singleton authority block for a store.
    Root,
    /// Constituent-block-list payload describing a chain.
    Cbl,
}

impl BlockKind {
    /// Whether this kind carries (or is derived from) user data. User-data
    /// blocks must never appear as XOR operands.
    pub fn is_user_data(self) -> bool {
        matches!(
            self,
            BlockKind::Source | BlockKind::RandomData | BlockKind::Brightened | BlockKind::Cbl
        )
    }

    /// Whether a block of this kind may enter a persistent cache. Raw source
    /// forms never do; they contribute no id of their own to XOR lineage.
    pub fn may_persist(self) -> bool {
        !matches!(self, BlockKind::Source | BlockKind::RandomData)
    }
}

impl std::fmt::Display for BlockKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlockKind::Source => write!(f, "Source"),
            BlockKind::Randomizer => write!(f, "Randomizer"),
            BlockKind::Brightened => write!(f, "Brightened"),
            BlockKind::RandomData => write!(f, "RandomData"),
            BlockKind::Root => write!(f, "Root"),
            BlockKind::Cbl => write!(f, "Cbl"),
        }
    }
}

/// Detached signature over a block. Present in the data model only; no
/// signing scheme is wired up yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSignature(
    /// Raw signature bytes.
    pub Vec<u8>,
);

/// Revocation token for privately encrypted payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevocationCertificate {
    /// Opaque revocation token bytes.
    pub token: Vec<u8>,
}

/// The serialized metadata section of a stored block: everything needed to
/// reconstruct construction parameters except the data itself.
///
/// Serialized as JSON. The on-disk record format separates metadata from
/// data with a single `0x00` byte, so the metadata text must never contain a
/// raw zero byte; JSON guarantees that (control characters are escaped).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockMetadata {
    /// Kind discriminator.
    #[serde(rename = "_t")]
    pub kind: BlockKind,
    /// Metadata format version.
    #[serde(rename = "_v")]
    pub version: u32,
    /// Redundancy contract, embedding the storage contract.
    #[serde(rename = "RedundancyContract")]
    pub redundancy_contract: RedundancyContract,
    /// Stored content hash, trusted until verified against the data.
    #[serde(rename = "Hash", skip_serializing_if = "Option::is_none", default)]
    pub hash: Option<BlockHash>,
    /// Detached signature, if any.
    #[serde(rename = "Signature", skip_serializing_if = "Option::is_none", default)]
    pub signature: Option<BlockSignature>,
}

/// The base unit persisted to disk: an immutable payload plus its derived
/// identity, contracts, and XOR lineage.
#[derive(Debug, Clone)]
pub struct Block {
    kind: BlockKind,
    block_size: BlockSize,
    data: Bytes,
    id: BlockHash,
    storage_contract: StorageDurationContract,
    redundancy_contract: RedundancyContract,
    constituent_blocks: Vec<BlockHash>,
    signature: Option<BlockSignature>,
    revocation_certificates: Vec<RevocationCertificate>,
    validation_errors: Vec<ValidationError>,
    hash_verified: bool,
}

impl Block {
    /// Constructs a block of the given kind.
    ///
    /// The size category is detected from the data length; a non-`Unknown`
    /// hint that disagrees is a hard precondition failure. Validation runs
    /// immediately but does not abort construction — an invalid block exists
    /// so its failure state can be inspected.
    pub fn new(kind: BlockKind, params: &BlockParams, data: Bytes) -> BlockResult<Self> {
        let detected = block_size_for_length(data.len())?;
        if params.block_size != BlockSize::Unknown && params.block_size != detected {
            return Err(BlockError::SizeHintMismatch {
                hint: params.block_size,
                detected,
            });
        }

        let storage_contract = StorageDurationContract {
            request_time: params.request_time,
            keep_until_at_least: params.keep_until_at_least,
            byte_count: data.len(),
            private_encrypted: params.private_encrypted,
        };
        let redundancy_contract = RedundancyContract {
            storage_contract,
            contract_type: params.redundancy,
        };
        let id = BlockHash::compute(detected, &data);

        let mut block = Self {
            kind,
            block_size: detected,
            data,
            id,
            storage_contract,
            redundancy_contract,
            constituent_blocks: Vec::new(),
            signature: None,
            revocation_certificates: Vec::new(),
            validation_errors: Vec::new(),
            hash_verified: false,
        };
        block.revalidate();
        Ok(block)
    }

    /// Constructs a raw user-data block. Never persisted.
    pub fn new_source(params: &BlockParams, data: Bytes) -> BlockResult<Self> {
        Self::new(BlockKind::Source, params, data)
    }

    /// Constructs a randomizer block filled from the operating system CSPRNG.
    /// The parameter set must name an explicit size category.
    pub fn new_randomizer(params: &BlockParams) -> BlockResult<Self> {
        let len = block_size_bytes(params.block_size)?;
        Self::new(BlockKind::Randomizer, params, random_bytes(len))
    }

    /// Constructs a CSPRNG-filled block treated as user data.
    pub fn new_random_data(params: &BlockParams) -> BlockResult<Self> {
        let len = block_size_bytes(params.block_size)?;
        Self::new(BlockKind::RandomData, params, random_bytes(len))
    }

    /// Replaces the constituent-block lineage. Used by the XOR paths and by
    /// chain packing; the list is not part of the hashed identity.
    pub fn with_constituents(mut self, constituents: Vec<BlockHash>) -> Self {
        self.constituent_blocks = constituents;
        self
    }

    /// The block's kind discriminator.
    pub fn kind(&self) -> BlockKind {
        self.kind
    }

    /// The block's size category.
    pub fn block_size(&self) -> BlockSize {
        self.block_size
    }

    /// The immutable payload.
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// The content-hash identity, derived at construction.
    pub fn id(&self) -> &BlockHash {
        &self.id
    }

    /// The storage-duration contract.
    pub fn storage_contract(&self) -> &StorageDurationContract {
        &self.storage_contract
    }

    /// The redundancy contract.
    pub fn redundancy_contract(&self) -> &RedundancyContract {
        &self.redundancy_contract
    }

    /// Ordered hashes of the blocks XORed to produce this one; empty for
    /// leaf blocks.
    pub fn constituent_blocks(&self) -> &[BlockHash] {
        &self.constituent_blocks
    }

    /// The detached signature, if any.
    pub fn signature(&self) -> Option<&BlockSignature> {
        self.signature.as_ref()
    }

    /// Revocation tokens attached to this block.
    pub fn revocation_certificates(&self) -> &[RevocationCertificate] {
        &self.revocation_certificates
    }

    /// Whether the last validation pass found zero failures.
    pub fn is_valid(&self) -> bool {
        self.hash_verified && self.validation_errors.is_empty()
    }

    /// Failures collected by the last validation pass.
    pub fn validation_errors(&self) -> &[ValidationError] {
        &self.validation_errors
    }

    /// Reconstructs the construction parameter set from the block's state.
    pub fn block_params(&self) -> BlockParams {
        BlockParams {
            block_size: self.block_size,
            request_time: self.storage_contract.request_time,
            keep_until_at_least: self.storage_contract.keep_until_at_least,
            redundancy: self.redundancy_contract.contract_type,
            private_encrypted: self.storage_contract.private_encrypted,
        }
    }

    /// Releases the payload buffer, leaving the block empty and invalid.
    /// Used by transactional wrappers on rollback-and-dispose so large
    /// buffers are not held after a logical discard.
    pub fn release_data(&mut self) {
        self.data = Bytes::new();
    }

    /// Runs the full self-validation pass, caching the failure list.
    /// All checks run independently; failures collect, nothing short-circuits.
    pub fn revalidate(&mut self) -> bool {
        let mut errors = Vec::new();

        if self.block_size == BlockSize::Unknown {
            errors.push(ValidationError::UnknownSize);
        }

        match block_size_bytes(self.block_size) {
            Ok(expected) if expected == self.data.len() => {}
            Ok(_) | Err(_) => errors.push(ValidationError::SizeMismatch {
                declared: self.block_size,
                length: self.data.len(),
            }),
        }

        let recomputed = BlockHash::compute(self.block_size, &self.data);
        if recomputed != self.id {
            errors.push(ValidationError::HashMismatch {
                expected: self.id.to_string(),
                actual: recomputed.to_string(),
            });
        }

        if let Ok(expected) = block_size_bytes(self.block_size) {
            if self.data.len() != expected {
                errors.push(ValidationError::DataLengthMismatch {
                    expected,
                    actual: self.data.len(),
                });
            }
        }

        if self.storage_contract.byte_count != self.data.len() {
            errors.push(ValidationError::ByteCountMismatch {
                contract: self.storage_contract.byte_count,
                actual: self.data.len(),
            });
        }

        if self.redundancy_contract.storage_contract != self.storage_contract {
            errors.push(ValidationError::ContractMismatch);
        }

        if !errors.is_empty() {
            warn!(
                id = %self.id,
                kind = %self.kind,
                failures = errors.len(),
                "block failed validation"
            );
        }

        let ok = errors.is_empty();
        self.hash_verified = ok;
        self.validation_errors = errors;
        ok
    }

    /// XORs this block with a single operand.
    ///
    /// The operand must not be user data and must match the subject's byte
    /// length. The result keeps the subject's kind, carries the maximum
    /// expiry and redundancy across both participants, and extends the
    /// constituent lineage with every persistable participant's id.
    pub fn xor_with(&self, other: &Block) -> BlockResult<Block> {
        if other.kind.is_user_data() {
            return Err(BlockError::UnexpectedUserDataOperand { kind: other.kind });
        }
        if other.data.len() != self.data.len() {
            return Err(BlockError::LengthMismatch {
                expected: self.data.len(),
                actual: other.data.len(),
            });
        }

        let keep_until = self
            .storage_contract
            .keep_until_at_least
            .max(other.storage_contract.keep_until_at_least);
        let redundancy = self
            .redundancy_contract
            .contract_type
            .max(other.redundancy_contract.contract_type);

        let mut out = self.data.to_vec();
        xor_fold(&mut out, &other.data);

        let mut constituents = self.constituent_blocks.clone();
        if self.kind.may_persist() {
            constituents.push(self.id);
        }
        if other.kind.may_persist() {
            constituents.push(other.id);
        }

        let params = BlockParams {
            block_size: self.block_size,
            request_time: now_epoch_secs(),
            keep_until_at_least: keep_until,
            redundancy,
            private_encrypted: self.storage_contract.private_encrypted,
        };
        Ok(Block::new(self.kind, &params, Bytes::from(out))?.with_constituents(constituents))
    }

    /// XORs this block with a list of randomizer operands — the whitening
    /// path. Every operand must be a randomizer block of matching length.
    ///
    /// A `Source` subject yields a `Brightened` result; any other subject
    /// keeps its kind (un-brightening XORs the same randomizer set back out
    /// of a brightened block).
    pub fn xor_with_all(&self, others: &[Block]) -> BlockResult<Block> {
        let mut keep_until = self.storage_contract.keep_until_at_least;
        let mut redundancy = self.redundancy_contract.contract_type;
        let mut out = self.data.to_vec();
        let mut constituents = self.constituent_blocks.clone();
        if self.kind.may_persist() {
            constituents.push(self.id);
        }

        for other in others {
            if other.kind.is_user_data() {
                return Err(BlockError::UnexpectedUserDataOperand { kind: other.kind });
            }
            if other.kind != BlockKind::Randomizer {
                return Err(BlockError::NonRandomizerOperand { kind: other.kind });
            }
            if other.data.len() != self.data.len() {
                return Err(BlockError::LengthMismatch {
                    expected: self.data.len(),
                    actual: other.data.len(),
                });
            }

            keep_until = keep_until.max(other.storage_contract.keep_until_at_least);
            redundancy = redundancy.max(other.redundancy_contract.contract_type);
            xor_fold(&mut out, &other.data);
            constituents.push(other.id);
        }

        let result_kind = if self.kind == BlockKind::Source {
            BlockKind::Brightened
        } else {
            self.kind
        };
        let params = BlockParams {
            block_size: self.block_size,
            request_time: now_epoch_secs(),
            keep_until_at_least: keep_until,
            redundancy,
            private_encrypted: self.storage_contract.private_encrypted,
        };
        debug!(
            subject = %self.id,
            operands = others.len(),
            result_kind = %result_kind,
            "xor composition"
        );
        Ok(Block::new(result_kind, &params, Bytes::from(out))?.with_constituents(constituents))
    }

    /// The metadata section for this block. Data is always excluded.
    pub fn metadata(&self) -> BlockMetadata {
        BlockMetadata {
            kind: self.kind,
            version: METADATA_VERSION,
            redundancy_contract: self.redundancy_contract,
            hash: Some(self.id),
            signature: self.signature.clone(),
        }
    }

    /// Serializes the metadata section as JSON bytes.
    pub fn metadata_bytes(&self) -> BlockResult<Vec<u8>> {
        serde_json::to_vec(&self.metadata()).map_err(|e| BlockError::MetadataEncode {
            reason: e.to_string(),
        })
    }

    /// Restores a block from its serialized metadata section plus data.
    pub fn restore(metadata_bytes: &[u8], data: Bytes) -> BlockResult<Self> {
        let metadata: BlockMetadata =
            serde_json::from_slice(metadata_bytes).map_err(|e| BlockError::MetadataDecode {
                reason: e.to_string(),
            })?;
        Self::from_metadata(&metadata, data)
    }

    /// Rebuilds a block from an already-parsed metadata section.
    ///
    /// The stored contracts are installed verbatim and the stored hash (if
    /// present) becomes the provided identity, so any disagreement with the
    /// data surfaces through validation rather than being silently repaired.
    pub fn from_metadata(metadata: &BlockMetadata, data: Bytes) -> BlockResult<Self> {
        let stored = &metadata.redundancy_contract.storage_contract;
        let params = BlockParams {
            block_size: BlockSize::Unknown,
            request_time: stored.request_time,
            keep_until_at_least: stored.keep_until_at_least,
            redundancy: metadata.redundancy_contract.contract_type,
            private_encrypted: stored.private_encrypted,
        };
        let mut block = Block::new(metadata.kind, &params, data)?;
        block.storage_contract = *stored;
        block.redundancy_contract = metadata.redundancy_contract;
        if let Some(hash) = metadata.hash {
            block.id = BlockHash::from_parts(block.block_size, *hash.as_bytes());
        }
        block.signature = metadata.signature.clone();
        block.revalidate();
        Ok(block)
    }
}

impl PartialEq for Block {
    /// Two blocks are equal iff their data bytes are equal.
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

impl Eq for Block {}

impl PartialOrd for Block {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Block {
    fn cmp(&self, other: &Self) -> Ordering {
        self.data.cmp(&other.data)
    }
}

/// In-place bytewise XOR fold of `operand` into `acc` over the full buffer.
fn xor_fold(acc: &mut [u8], operand: &[u8]) {
    for (a, o) in acc.iter_mut().zip(operand.iter()) {
        *a ^= o;
    }
}

/// CSPRNG-filled buffer of the given length.
pub fn random_bytes(len: usize) -> Bytes {
    let mut buf = vec![0u8; len];
    OsRng.fill_bytes(&mut buf);
    Bytes::from(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::RedundancyContractType;

    fn params(size: BlockSize) -> BlockParams {
        BlockParams::new(size, 1_000, 2_000, RedundancyContractType::HeapAuto, false)
    }

    fn source(size: BlockSize, fill: u8) -> Block {
        let len = block_size_bytes(size).unwrap();
        Block::new_source(&params(size), Bytes::from(vec![fill; len])).unwrap()
    }

    #[test]
    fn test_construction_detects_size() {
        let block = source(BlockSize::Message, 0x11);
        assert_eq!(block.block_size(), BlockSize::Message);
        assert_eq!(block.data().len(), 512);
        assert!(block.is_valid());
        assert!(block.constituent_blocks().is_empty());
        assert!(block.signature().is_none());
    }

    #[test]
    fn test_construction_rejects_disagreeing_hint() {
        let err = Block::new_source(&params(BlockSize::Small), Bytes::from(vec![0u8; 512]));
        assert!(matches!(
            err,
            Err(BlockError::SizeHintMismatch {
                hint: BlockSize::Small,
                detected: BlockSize::Message,
            })
        ));
    }

    #[test]
    fn test_construction_rejects_unmapped_length() {
        let err = Block::new_source(&params(BlockSize::Unknown), Bytes::from(vec![0u8; 777]));
        assert!(matches!(
            err,
            Err(BlockError::NoMatchingBlockSize { length: 777 })
        ));
    }

    #[test]
    fn test_unknown_hint_defers_to_data() {
        let block =
            Block::new_source(&params(BlockSize::Unknown), Bytes::from(vec![9u8; 1024])).unwrap();
        assert_eq!(block.block_size(), BlockSize::Tiny);
    }

    #[test]
    fn test_byte_count_mismatch_is_collected_not_thrown() {
        let mut block = source(BlockSize::Message, 0x22);
        block.storage_contract.byte_count = 511;
        assert!(!block.revalidate());
        assert!(block
            .validation_errors()
            .iter()
            .any(|e| matches!(e, ValidationError::ByteCountMismatch { .. })));
        // contract mismatch also fires since the embedded copy still says 512
        assert!(block
            .validation_errors()
            .iter()
            .any(|e| matches!(e, ValidationError::ContractMismatch)));
    }

    #[test]
    fn test_tampered_data_fails_hash_check() {
        let mut block = source(BlockSize::Message, 0x33);
        let mut tampered = block.data.to_vec();
        tampered[0] ^= 0xFF;
        block.data = Bytes::from(tampered);
        assert!(!block.revalidate());
        assert!(block
            .validation_errors()
            .iter()
            .any(|e| matches!(e, ValidationError::HashMismatch { .. })));
    }

    #[test]
    fn test_randomizer_fills_to_category_size() {
        let r = Block::new_randomizer(&params(BlockSize::Tiny)).unwrap();
        assert_eq!(r.kind(), BlockKind::Randomizer);
        assert_eq!(r.data().len(), 1024);
        assert!(r.is_valid());
    }

    #[test]
    fn test_randomizer_requires_explicit_size() {
        assert!(Block::new_randomizer(&params(BlockSize::Unknown)).is_err());
    }

    #[test]
    fn test_kind_predicates() {
        assert!(BlockKind::Source.is_user_data());
        assert!(BlockKind::Brightened.is_user_data());
        assert!(BlockKind::Cbl.is_user_data());
        assert!(!BlockKind::Randomizer.is_user_data());
        assert!(!BlockKind::Root.is_user_data());

        assert!(!BlockKind::Source.may_persist());
        assert!(!BlockKind::RandomData.may_persist());
        assert!(BlockKind::Brightened.may_persist());
        assert!(BlockKind::Randomizer.may_persist());
    }

    #[test]
    fn test_xor_rejects_user_data_operand() {
        let subject = source(BlockSize::Message, 0x01);
        let operand = source(BlockSize::Message, 0x02);
        assert!(matches!(
            subject.xor_with(&operand),
            Err(BlockError::UnexpectedUserDataOperand {
                kind: BlockKind::Source
            })
        ));
    }

    #[test]
    fn test_xor_rejects_length_mismatch() {
        let subject = source(BlockSize::Message, 0x01);
        let operand = Block::new_randomizer(&params(BlockSize::Tiny)).unwrap();
        assert!(matches!(
            subject.xor_with(&operand),
            Err(BlockError::LengthMismatch {
                expected: 512,
                actual: 1024
            })
        ));
    }

    #[test]
    fn test_xor_multi_rejects_non_randomizer() {
        let subject = source(BlockSize::Message, 0x01);
        let root = Block::new(
            BlockKind::Root,
            &params(BlockSize::Message),
            random_bytes(512),
        )
        .unwrap();
        assert!(matches!(
            subject.xor_with_all(std::slice::from_ref(&root)),
            Err(BlockError::NonRandomizerOperand {
                kind: BlockKind::Root
            })
        ));
    }

    #[test]
    fn test_xor_folds_every_byte() {
        // A naive reimplementation is prone to folding only the first byte;
        // verify the full buffer exhaustively.
        let len = 512;
        let subject_data: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        let subject =
            Block::new_source(&params(BlockSize::Message), Bytes::from(subject_data.clone()))
                .unwrap();
        let r = Block::new_randomizer(&params(BlockSize::Message)).unwrap();
        let result = subject.xor_with_all(std::slice::from_ref(&r)).unwrap();
        for i in 0..len {
            assert_eq!(result.data()[i], subject_data[i] ^ r.data()[i], "byte {}", i);
        }
    }

    #[test]
    fn test_xor_involution() {
        let subject = source(BlockSize::Message, 0x5A);
        let randomizers: Vec<Block> = (0..4)
            .map(|_| Block::new_randomizer(&params(BlockSize::Message)).unwrap())
            .collect();
        let brightened = subject.xor_with_all(&randomizers).unwrap();
        let recovered = brightened.xor_with_all(&randomizers).unwrap();
        assert_eq!(recovered.data(), subject.data());
    }

    #[test]
    fn test_xor_operand_order_is_irrelevant() {
        let subject = source(BlockSize::Message, 0x77);
        let r1 = Block::new_randomizer(&params(BlockSize::Message)).unwrap();
        let r2 = Block::new_randomizer(&params(BlockSize::Message)).unwrap();
        let forward = subject.xor_with_all(&[r1.clone(), r2.clone()]).unwrap();
        let backward = subject.xor_with_all(&[r2, r1]).unwrap();
        assert_eq!(forward.data(), backward.data());
    }

    #[test]
    fn test_xor_metadata_propagation() {
        let subject = source(BlockSize::Message, 0x01);
        let mut late = params(BlockSize::Message);
        late.keep_until_at_least = 9_999;
        late.redundancy = RedundancyContractType::HeapHighPriority;
        let r = Block::new_randomizer(&late).unwrap();

        let result = subject.xor_with_all(std::slice::from_ref(&r)).unwrap();
        assert_eq!(result.storage_contract().keep_until_at_least, 9_999);
        assert_eq!(
            result.redundancy_contract().contract_type,
            RedundancyContractType::HeapHighPriority
        );
        assert!(!result.storage_contract().private_encrypted);
    }

    #[test]
    fn test_source_subject_brightens_and_contributes_no_id() {
        let subject = source(BlockSize::Message, 0x42);
        let randomizers: Vec<Block> = (0..2)
            .map(|_| Block::new_randomizer(&params(BlockSize::Message)).unwrap())
            .collect();
        let result = subject.xor_with_all(&randomizers).unwrap();
        assert_eq!(result.kind(), BlockKind::Brightened);
        assert_eq!(result.constituent_blocks().len(), 2);
        assert_eq!(result.constituent_blocks()[0], *randomizers[0].id());
        assert_eq!(result.constituent_blocks()[1], *randomizers[1].id());
    }

    #[test]
    fn test_persistable_subject_contributes_its_id() {
        let r1 = Block::new_randomizer(&params(BlockSize::Message)).unwrap();
        let r2 = Block::new_randomizer(&params(BlockSize::Message)).unwrap();
        let result = r1.xor_with(&r2).unwrap();
        assert_eq!(result.kind(), BlockKind::Randomizer);
        assert_eq!(result.constituent_blocks(), &[*r1.id(), *r2.id()]);
    }

    #[test]
    fn test_block_equality_is_data_equality() {
        let a = source(BlockSize::Message, 0x10);
        let b = source(BlockSize::Message, 0x10);
        let c = source(BlockSize::Message, 0x11);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a < c);
    }

    #[test]
    fn test_metadata_roundtrip() {
        let block = source(BlockSize::Message, 0x3C);
        let metadata = block.metadata_bytes().unwrap();
        assert!(!metadata.contains(&0u8), "metadata must stay 0x00-free");

        let restored = Block::restore(&metadata, block.data().clone()).unwrap();
        assert!(restored.is_valid());
        assert_eq!(restored.kind(), BlockKind::Source);
        assert_eq!(restored.id(), block.id());
        assert!(!restored.id().computed());
        assert_eq!(restored.storage_contract(), block.storage_contract());
        assert_eq!(restored.redundancy_contract(), block.redundancy_contract());
    }

    #[test]
    fn test_restore_flags_wrong_data() {
        let block = source(BlockSize::Message, 0x3C);
        let metadata = block.metadata_bytes().unwrap();
        let restored = Block::restore(&metadata, Bytes::from(vec![0xEE; 512])).unwrap();
        assert!(!restored.is_valid());
        assert!(restored
            .validation_errors()
            .iter()
            .any(|e| matches!(e, ValidationError::HashMismatch { .. })));
    }

    #[test]
    fn test_restore_flags_wrong_length_data() {
        let block = source(BlockSize::Message, 0x3C);
        let metadata = block.metadata_bytes().unwrap();
        // stored contract covers 512 bytes; the record carries 1024
        let restored = Block::restore(&metadata, Bytes::from(vec![0xEE; 1024])).unwrap();
        assert!(!restored.is_valid());
        assert!(restored
            .validation_errors()
            .iter()
            .any(|e| matches!(e, ValidationError::ByteCountMismatch { .. })));
    }

    #[test]
    fn test_restore_rejects_garbage_metadata() {
        assert!(matches!(
            Block::restore(b"not json", Bytes::from(vec![0u8; 512])),
            Err(BlockError::MetadataDecode { .. })
        ));
    }

    #[test]
    fn test_metadata_discriminator_field() {
        let r = Block::new_randomizer(&params(BlockSize::Message)).unwrap();
        let text = String::from_utf8(r.metadata_bytes().unwrap()).unwrap();
        assert!(text.contains("\"_t\":\"Randomizer\""));
        assert!(text.contains("\"_v\":1"));
        assert!(text.contains("\"RedundancyContract\""));
    }
}
