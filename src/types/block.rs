use std::collections::BTreeMap;

use alloy_primitives::{keccak256, B256};
use serde::{Deserialize, Serialize};

use crate::{
    codec::{self, DecodeError},
    common::{BlockHash, BlockHeader, Fr, L1Origin},
};

use super::{ContractData, L1ToL2Message, MerkleTreeId, PublicDataWrite, Tx, TxHash};

/// State of an append-only tree after a block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeSnapshot {
    pub root: Fr,
    pub next_available_leaf_index: u64,
}

/// One snapshot per [MerkleTreeId]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeRoots(BTreeMap<MerkleTreeId, TreeSnapshot>);

impl TreeRoots {
    /// Builds a snapshot for every tree
    pub fn from_fn(mut snapshot: impl FnMut(MerkleTreeId) -> TreeSnapshot) -> Self {
        Self(
            MerkleTreeId::ALL
                .into_iter()
                .map(|id| (id, snapshot(id)))
                .collect(),
        )
    }

    /// Builds roots from decoded `(tree id, snapshot)` pairs. Every known tree
    /// must appear exactly once.
    pub fn from_entries(
        entries: impl IntoIterator<Item = (u8, TreeSnapshot)>,
    ) -> Result<Self, DecodeError> {
        let mut roots = BTreeMap::new();

        for (raw_id, snapshot) in entries {
            let id = MerkleTreeId::try_from(raw_id)?;
            if roots.insert(id, snapshot).is_some() {
                return Err(DecodeError::DuplicateTreeId(raw_id));
            }
        }

        if let Some(missing) = MerkleTreeId::ALL.iter().find(|id| !roots.contains_key(*id)) {
            return Err(DecodeError::MissingTreeRoot(missing.name()));
        }

        Ok(Self(roots))
    }

    pub fn get(&self, id: MerkleTreeId) -> Option<&TreeSnapshot> {
        self.0.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (MerkleTreeId, &TreeSnapshot)> {
        self.0.iter().map(|(id, snapshot)| (*id, snapshot))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A finalized L2 block.
///
/// The block hash is a content hash over the encoded block, sealed by
/// [L2Block::new] and checked again by [decode_block](crate::codec::decode_block).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct L2Block {
    pub header: BlockHeader,
    /// Where the block was published on L1
    pub l1_origin: L1Origin,
    pub tree_roots: TreeRoots,
    /// Cross-chain messages inserted into the message tree by this block
    pub l1_to_l2_messages: Vec<L1ToL2Message>,
    pub txs: Vec<Tx>,
}

impl L2Block {
    /// Assembles a block and seals its content hash
    pub fn new(
        height: u64,
        parent_hash: BlockHash,
        timestamp: u64,
        l1_origin: L1Origin,
        tree_roots: TreeRoots,
        l1_to_l2_messages: Vec<L1ToL2Message>,
        txs: Vec<Tx>,
    ) -> Self {
        let mut block = Self {
            header: BlockHeader {
                height,
                hash: B256::ZERO,
                parent_hash,
                timestamp,
            },
            l1_origin,
            tree_roots,
            l1_to_l2_messages,
            txs,
        };
        block.header.hash = block.compute_hash();
        block
    }

    /// Recomputes the content hash from the block's fields
    pub fn compute_hash(&self) -> BlockHash {
        keccak256(codec::encode_block_payload(self))
    }

    pub fn height(&self) -> u64 {
        self.header.height
    }

    pub fn hash(&self) -> BlockHash {
        self.header.hash
    }

    pub fn parent_hash(&self) -> BlockHash {
        self.header.parent_hash
    }

    /// True if this block directly extends `other`
    pub fn is_immediate_successor_of(&self, other: &L2Block) -> bool {
        self.header.is_immediate_successor_of(&other.header)
    }

    pub fn tx_hashes(&self) -> Vec<TxHash> {
        self.txs.iter().map(Tx::hash).collect()
    }

    /// All public data writes of the block in execution order
    pub fn public_data_writes(&self) -> impl Iterator<Item = &PublicDataWrite> {
        self.txs.iter().flat_map(|tx| tx.public_data_writes.iter())
    }

    pub fn new_contracts(&self) -> impl Iterator<Item = &ContractData> {
        self.txs.iter().flat_map(|tx| tx.new_contracts.iter())
    }
}
