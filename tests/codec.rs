use std::sync::Arc;

use alloy_primitives::{Address, B256, U256};
use bytes::Bytes;

use l2_sync::{
    codec::{self, DecodeError},
    common::L1Origin,
    types::{
        ContractData, L1Actor, L1ToL2Message, L2Actor, L2Block, L2BlockContext, MerkleTreeId,
        PublicDataWrite, TreeRoots, TreeSnapshot, Tx, UnverifiedData,
    },
};

fn fr(n: u64) -> B256 {
    B256::from(U256::from(n))
}

fn message(n: u64) -> L1ToL2Message {
    L1ToL2Message::new(
        L1Actor {
            sender: Address::with_last_byte(n as u8),
            chain_id: 1,
        },
        L2Actor {
            recipient: fr(1000 + n),
            version: 1,
        },
        fr(n),
        fr(2000 + n),
        1_800_000_000,
        n * 100,
        7,
    )
}

fn busy_block() -> L2Block {
    let deploy = Tx {
        new_note_hashes: vec![fr(11), fr(12)],
        new_nullifiers: vec![fr(13)],
        new_contracts: vec![ContractData {
            contract_address: fr(14),
            portal_address: Address::with_last_byte(15),
            function_selectors: vec![[0xde, 0xad, 0xbe, 0xef], [0, 0, 0, 1]],
        }],
        public_data_writes: vec![PublicDataWrite::new(fr(1), fr(16))],
        new_l2_to_l1_msgs: vec![fr(17)],
        unverified_data: UnverifiedData::new(vec![Bytes::from_static(b"note preimage")]),
    };
    let transfer = Tx {
        new_nullifiers: vec![fr(21), fr(22)],
        public_data_writes: vec![
            PublicDataWrite::new(fr(1), fr(23)),
            PublicDataWrite::new(fr(2), fr(24)),
        ],
        ..Default::default()
    };

    L2Block::new(
        7,
        fr(6),
        1_700_000_084,
        L1Origin {
            block_number: 18_000_000,
            block_hash: fr(30),
            tx_hash: fr(31),
            log_index: 3,
        },
        TreeRoots::from_fn(|id| TreeSnapshot {
            root: fr(40 + id.as_u8() as u64),
            next_available_leaf_index: 128 * (id.as_u8() as u64 + 1),
        }),
        vec![message(1), message(2)],
        vec![deploy, transfer],
    )
}

#[test]
fn test_block_survives_encoding() {
    let block = busy_block();
    let bytes = codec::encode_block(&block);
    let decoded = codec::decode_block(&bytes).unwrap();

    assert_eq!(decoded, block);
    assert_eq!(decoded.hash(), block.compute_hash());
    assert_eq!(decoded.tx_hashes(), block.tx_hashes());
    assert_eq!(decoded.new_contracts().count(), 1);
    assert_eq!(
        decoded
            .tree_roots
            .get(MerkleTreeId::Archive)
            .map(|s| s.next_available_leaf_index),
        Some(768)
    );

    let writes: Vec<_> = decoded.public_data_writes().map(|w| w.new_value).collect();
    assert_eq!(writes, vec![fr(16), fr(23), fr(24)]);
}

#[test]
fn test_decoded_block_context() {
    let block = busy_block();
    let decoded = codec::decode_block(&codec::encode_block(&block)).unwrap();
    let ctx = L2BlockContext::new(Arc::new(decoded));

    assert_eq!(ctx.height(), 7);
    assert_eq!(ctx.l1_origin().log_index, 3);

    let first = ctx.tx_hash(0).unwrap();
    let tx = ctx.tx(&first).unwrap();
    assert_eq!(
        tx.unverified_data,
        UnverifiedData::new(vec![Bytes::from_static(b"note preimage")])
    );
    assert!(tx.new_contracts[0].has_function([0xde, 0xad, 0xbe, 0xef]));
    assert!(ctx.tx_hash(2).is_none());
}

#[test]
fn test_messages_decode_standalone() {
    let original = message(5);
    let decoded = codec::decode_message(&codec::encode_message(&original)).unwrap();

    assert_eq!(decoded, original);
    assert_eq!(decoded.entry_key, decoded.compute_entry_key());
    assert!(decoded.is_consumable_at(7));
    assert!(!decoded.is_consumable_at(6));
}

#[test]
fn test_tampered_block_rejected() {
    let mut bytes = codec::encode_block(&busy_block());
    // low byte of the timestamp
    bytes[80] ^= 0xff;

    assert!(matches!(
        codec::decode_block(&bytes),
        Err(DecodeError::ChecksumMismatch { .. })
    ));
}

#[test]
fn test_empty_input_is_truncated() {
    assert!(matches!(
        codec::decode_block(&[]),
        Err(DecodeError::Truncated { field: "version", .. })
    ));
    assert!(matches!(
        codec::decode_message(&[]),
        Err(DecodeError::Truncated { .. })
    ));
}
