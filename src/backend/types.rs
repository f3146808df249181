use serde::{Deserialize, Serialize};

use crate::{common::BlockHeader, types::L2Block};

/// The most recent confirmed block, stored as JSON under `HEAD_INFO`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeadInfo {
    pub header: BlockHeader,
    /// L1 block the head was published in
    pub l1_block_number: u64,
}

impl From<&L2Block> for HeadInfo {
    fn from(block: &L2Block) -> Self {
        Self {
            header: block.header,
            l1_block_number: block.l1_origin.block_number,
        }
    }
}

impl TryFrom<sled::IVec> for HeadInfo {
    type Error = serde_json::Error;

    fn try_from(bytes: sled::IVec) -> Result<Self, Self::Error> {
        serde_json::from_slice(bytes.as_ref())
    }
}

impl TryFrom<HeadInfo> for sled::IVec {
    type Error = serde_json::Error;

    fn try_from(head: HeadInfo) -> Result<Self, Self::Error> {
        serde_json::to_vec(&head).map(sled::IVec::from)
    }
}

/// Big-endian so sled's key order is height order
pub(crate) fn height_key(height: u64) -> [u8; 8] {
    height.to_be_bytes()
}

pub(crate) fn key_height(key: &[u8]) -> Option<u64> {
    key.try_into().ok().map(u64::from_be_bytes)
}
