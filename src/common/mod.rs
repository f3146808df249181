use std::fmt;

use alloy_primitives::{Address, B256};
use serde::{Deserialize, Serialize};

/// A field element of the rollup's proving system, stored as 32 big-endian bytes
pub type Fr = B256;

/// An L2 account or contract address
pub type AztecAddress = B256;

/// An L1 account or contract address
pub type EthAddress = Address;

/// A block hash
pub type BlockHash = B256;

/// Selected L2 block header info
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockHeader {
    pub height: u64,
    pub hash: BlockHash,
    pub parent_hash: BlockHash,
    pub timestamp: u64,
}

impl BlockHeader {
    /// True if `self` directly extends `other`: one height above it and
    /// linked to it by parent hash.
    pub fn is_immediate_successor_of(&self, other: &BlockHeader) -> bool {
        other.height.checked_add(1) == Some(self.height) && self.parent_hash == other.hash
    }
}

impl fmt::Display for BlockHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} ({})", self.height, self.hash)
    }
}

/// Where on L1 an L2 block was published
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct L1Origin {
    /// L1 block number containing the publishing transaction
    pub block_number: u64,
    /// L1 block hash containing the publishing transaction
    pub block_hash: B256,
    /// Hash of the L1 transaction that published the block
    pub tx_hash: B256,
    /// Index of the rollup's block-processed log within the L1 block
    pub log_index: u32,
}

#[cfg(test)]
mod tests {
    use alloy_primitives::B256;

    use super::BlockHeader;

    fn header(height: u64, parent: u8, hash: u8) -> BlockHeader {
        BlockHeader {
            height,
            hash: B256::repeat_byte(hash),
            parent_hash: B256::repeat_byte(parent),
            timestamp: 0,
        }
    }

    #[test]
    fn test_successor_linkage() {
        let parent = header(4, 0, 1);

        assert!(header(5, 1, 2).is_immediate_successor_of(&parent));
        assert!(!header(6, 1, 2).is_immediate_successor_of(&parent));
        assert!(!header(5, 9, 2).is_immediate_successor_of(&parent));
        assert!(!parent.is_immediate_successor_of(&parent));
    }

    #[test]
    fn test_successor_at_max_height() {
        let parent = header(u64::MAX, 0, 1);
        assert!(!header(0, 1, 2).is_immediate_successor_of(&parent));
    }
}
