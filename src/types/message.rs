use alloy_primitives::{keccak256, B256};
use serde::{Deserialize, Serialize};

use crate::{
    codec,
    common::{AztecAddress, EthAddress, Fr},
};

/// The L1 side of a cross-chain message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct L1Actor {
    pub sender: EthAddress,
    pub chain_id: u64,
}

/// The L2 side of a cross-chain message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct L2Actor {
    pub recipient: AztecAddress,
    pub version: u32,
}

/// A message sent from L1 to a contract on L2
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct L1ToL2Message {
    pub sender: L1Actor,
    pub recipient: L2Actor,
    pub content: Fr,
    /// Hash of the secret the recipient reveals to consume the message
    pub secret_hash: Fr,
    /// L1 timestamp after which the message can be cancelled
    pub deadline: u32,
    pub fee: u64,
    /// First L2 block height at which the message can be consumed
    pub consumable_at: u64,
    /// Content hash over every other field. Messages are unique by entry key.
    pub entry_key: B256,
}

impl L1ToL2Message {
    /// Creates a message and seals its entry key
    pub fn new(
        sender: L1Actor,
        recipient: L2Actor,
        content: Fr,
        secret_hash: Fr,
        deadline: u32,
        fee: u64,
        consumable_at: u64,
    ) -> Self {
        let mut message = Self {
            sender,
            recipient,
            content,
            secret_hash,
            deadline,
            fee,
            consumable_at,
            entry_key: B256::ZERO,
        };
        message.entry_key = message.compute_entry_key();
        message
    }

    /// Recomputes the entry key from the message fields
    pub fn compute_entry_key(&self) -> B256 {
        keccak256(codec::encode_message_payload(self))
    }

    /// True once the chain has reached the height the message unlocks at
    pub fn is_consumable_at(&self, height: u64) -> bool {
        height >= self.consumable_at
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{Address, B256};

    use super::{L1Actor, L1ToL2Message, L2Actor};

    fn message(fee: u64) -> L1ToL2Message {
        L1ToL2Message::new(
            L1Actor {
                sender: Address::repeat_byte(1),
                chain_id: 1,
            },
            L2Actor {
                recipient: B256::repeat_byte(2),
                version: 1,
            },
            B256::repeat_byte(3),
            B256::repeat_byte(4),
            1_000,
            fee,
            7,
        )
    }

    #[test]
    fn test_entry_key_sealed() {
        let msg = message(5);
        assert_ne!(msg.entry_key, B256::ZERO);
        assert_eq!(msg.entry_key, msg.compute_entry_key());
        assert_ne!(msg.entry_key, message(6).entry_key);
    }

    #[test]
    fn test_consumable_height() {
        let msg = message(5);
        assert!(!msg.is_consumable_at(6));
        assert!(msg.is_consumable_at(7));
        assert!(msg.is_consumable_at(8));
    }
}
