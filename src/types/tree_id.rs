use std::fmt;

use serde::{Deserialize, Serialize};

use crate::codec::DecodeError;

/// Identifies one of the rollup's append-only Merkle trees.
///
/// The set is closed: a new tree kind is a protocol upgrade, so an identifier
/// outside this enum is rejected at decode time instead of being carried along
/// as an opaque value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum MerkleTreeId {
    Contract = 0,
    Nullifier = 1,
    NoteHash = 2,
    PublicData = 3,
    L1ToL2Messages = 4,
    Archive = 5,
}

impl MerkleTreeId {
    /// Every tree, in wire order
    pub const ALL: [MerkleTreeId; 6] = [
        MerkleTreeId::Contract,
        MerkleTreeId::Nullifier,
        MerkleTreeId::NoteHash,
        MerkleTreeId::PublicData,
        MerkleTreeId::L1ToL2Messages,
        MerkleTreeId::Archive,
    ];

    /// Returns true if `id` names a known tree
    pub fn is_valid(id: u8) -> bool {
        Self::try_from(id).is_ok()
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            MerkleTreeId::Contract => "CONTRACT_TREE",
            MerkleTreeId::Nullifier => "NULLIFIER_TREE",
            MerkleTreeId::NoteHash => "NOTE_HASH_TREE",
            MerkleTreeId::PublicData => "PUBLIC_DATA_TREE",
            MerkleTreeId::L1ToL2Messages => "L1_TO_L2_MESSAGES_TREE",
            MerkleTreeId::Archive => "ARCHIVE_TREE",
        }
    }
}

impl TryFrom<u8> for MerkleTreeId {
    type Error = DecodeError;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        match id {
            0 => Ok(MerkleTreeId::Contract),
            1 => Ok(MerkleTreeId::Nullifier),
            2 => Ok(MerkleTreeId::NoteHash),
            3 => Ok(MerkleTreeId::PublicData),
            4 => Ok(MerkleTreeId::L1ToL2Messages),
            5 => Ok(MerkleTreeId::Archive),
            other => Err(DecodeError::UnknownTreeId(other)),
        }
    }
}

impl From<MerkleTreeId> for u8 {
    fn from(id: MerkleTreeId) -> Self {
        id.as_u8()
    }
}

impl fmt::Display for MerkleTreeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
