use std::fmt;

use alloy_primitives::{keccak256, B256};
use serde::{Deserialize, Serialize};

use crate::{
    codec,
    common::{AztecAddress, Fr},
};

use super::{ContractData, PublicDataWrite, UnverifiedData};

/// Content-derived transaction identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct TxHash(pub B256);

impl TxHash {
    /// Derives the hash of a transaction from its content. Identical content
    /// always yields the same hash.
    pub fn from_content<C: TxContent + ?Sized>(content: &C) -> Self {
        let mut preimage = vec![C::DOMAIN];
        content.write_preimage(&mut preimage);
        TxHash(keccak256(preimage))
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_slice()
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<B256> for TxHash {
    fn from(hash: B256) -> Self {
        TxHash(hash)
    }
}

/// Anything a [TxHash] can be derived from
pub trait TxContent {
    /// Separates preimages of different content kinds
    const DOMAIN: u8;

    /// Appends the canonical encoding of the hashed fields to `out`
    fn write_preimage(&self, out: &mut Vec<u8>);
}

/// The effects of an included transaction
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tx {
    pub new_note_hashes: Vec<Fr>,
    pub new_nullifiers: Vec<Fr>,
    pub new_contracts: Vec<ContractData>,
    /// Public state updates, in execution order
    pub public_data_writes: Vec<PublicDataWrite>,
    pub new_l2_to_l1_msgs: Vec<Fr>,
    /// Provisional payload. Not part of the transaction hash.
    pub unverified_data: UnverifiedData,
}

impl Tx {
    pub fn hash(&self) -> TxHash {
        TxHash::from_content(self)
    }
}

impl TxContent for Tx {
    const DOMAIN: u8 = 0x01;

    fn write_preimage(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&codec::encode_tx_effects(self));
    }
}

/// Identifies the function a request calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionData {
    pub selector: [u8; 4],
    pub is_private: bool,
    pub is_constructor: bool,
}

/// The intent of a transaction before execution
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxExecutionRequest {
    pub from: AztecAddress,
    pub to: AztecAddress,
    pub function_data: FunctionData,
    pub args: Vec<Fr>,
    pub nonce: Fr,
    pub chain_id: u64,
}

impl TxExecutionRequest {
    pub fn hash(&self) -> TxHash {
        TxHash::from_content(self)
    }
}

impl TxContent for TxExecutionRequest {
    const DOMAIN: u8 = 0x02;

    fn write_preimage(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&codec::encode_tx_request(self));
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{Address, B256};
    use bytes::Bytes;

    use super::{FunctionData, Tx, TxExecutionRequest, TxHash};
    use crate::types::{ContractData, PublicDataWrite, UnverifiedData};

    fn tx() -> Tx {
        Tx {
            new_note_hashes: vec![B256::repeat_byte(1), B256::repeat_byte(2)],
            new_nullifiers: vec![B256::repeat_byte(3)],
            new_contracts: vec![ContractData {
                contract_address: B256::repeat_byte(4),
                portal_address: Address::repeat_byte(5),
                function_selectors: vec![[1, 2, 3, 4]],
            }],
            public_data_writes: vec![PublicDataWrite::new(
                B256::repeat_byte(6),
                B256::repeat_byte(7),
            )],
            new_l2_to_l1_msgs: vec![B256::repeat_byte(8)],
            unverified_data: UnverifiedData::new(vec![Bytes::from_static(b"secret")]),
        }
    }

    fn request() -> TxExecutionRequest {
        TxExecutionRequest {
            from: B256::repeat_byte(1),
            to: B256::repeat_byte(2),
            function_data: FunctionData {
                selector: [0xde, 0xad, 0xbe, 0xef],
                is_private: true,
                is_constructor: false,
            },
            args: vec![B256::repeat_byte(3)],
            nonce: B256::repeat_byte(4),
            chain_id: 31337,
        }
    }

    #[test]
    fn test_tx_hash_is_deterministic() {
        assert_eq!(tx().hash(), tx().hash());
        assert_eq!(TxHash::from_content(&tx()), tx().hash());
        assert_eq!(request().hash(), request().hash());
    }

    #[test]
    fn test_every_tx_field_changes_hash() {
        let base = tx().hash();
        let mutations: Vec<fn(&mut Tx)> = vec![
            |t: &mut Tx| t.new_note_hashes.push(B256::repeat_byte(9)),
            |t: &mut Tx| t.new_note_hashes.swap(0, 1),
            |t: &mut Tx| t.new_nullifiers[0] = B256::repeat_byte(9),
            |t: &mut Tx| t.new_contracts[0].portal_address = Address::repeat_byte(9),
            |t: &mut Tx| t.new_contracts[0].function_selectors.push([9; 4]),
            |t: &mut Tx| t.public_data_writes[0].new_value = B256::repeat_byte(9),
            |t: &mut Tx| t.new_l2_to_l1_msgs.clear(),
        ];

        let mut seen = vec![base];
        for mutate in mutations {
            let mut changed = tx();
            mutate(&mut changed);
            let hash = changed.hash();
            assert!(!seen.contains(&hash), "collision for {changed:?}");
            seen.push(hash);
        }
    }

    #[test]
    fn test_unverified_data_not_hashed() {
        let mut changed = tx();
        changed.unverified_data = UnverifiedData::default();
        assert_eq!(changed.hash(), tx().hash());
    }

    #[test]
    fn test_every_request_field_changes_hash() {
        let base = request().hash();
        let mutations: Vec<fn(&mut TxExecutionRequest)> = vec![
            |r: &mut TxExecutionRequest| r.from = B256::repeat_byte(9),
            |r: &mut TxExecutionRequest| r.to = B256::repeat_byte(9),
            |r: &mut TxExecutionRequest| r.function_data.selector = [0; 4],
            |r: &mut TxExecutionRequest| r.function_data.is_private = false,
            |r: &mut TxExecutionRequest| r.function_data.is_constructor = true,
            |r: &mut TxExecutionRequest| r.args.push(B256::ZERO),
            |r: &mut TxExecutionRequest| r.nonce = B256::ZERO,
            |r: &mut TxExecutionRequest| r.chain_id = 1,
        ];

        for mutate in mutations {
            let mut changed = request();
            mutate(&mut changed);
            assert_ne!(changed.hash(), base, "unchanged hash for {changed:?}");
        }
    }

    #[test]
    fn test_request_and_effects_domains_differ() {
        assert_ne!(Tx::default().hash(), TxExecutionRequest::default().hash());
    }
}
