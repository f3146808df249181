//! Binary codec for blocks, transactions and L1-to-L2 messages.
//!
//! All integers are big-endian, hashes and field elements are 32 bytes and L1
//! addresses are 20 bytes. Variable-size collections carry a u32 count, and
//! nested records a u32 byte length. Blocks and messages embed a keccak-256
//! content hash which is recomputed and checked on decode.
//!
//! Encoders panic if a collection or nested record exceeds `u32::MAX`
//! elements or bytes, since the wire format cannot express it.
//!
//! ## Example
//!
//! ```rust
//! use l2_sync::codec::{decode_block, encode_block};
//! use l2_sync::common::L1Origin;
//! use l2_sync::types::{L2Block, TreeRoots, TreeSnapshot};
//!
//! let block = L2Block::new(
//!     1,
//!     Default::default(),
//!     1_700_000_000,
//!     L1Origin::default(),
//!     TreeRoots::from_fn(|_| TreeSnapshot::default()),
//!     Vec::new(),
//!     Vec::new(),
//! );
//!
//! let bytes = encode_block(&block);
//! assert_eq!(decode_block(&bytes).unwrap(), block);
//! ```

use alloy_primitives::keccak256;

mod error;
pub use error::DecodeError;

mod reader;
use reader::Reader;

mod writer;
use writer::Writer;

use crate::{
    common::{BlockHeader, L1Origin},
    types::{
        ContractData, FunctionData, L1Actor, L1ToL2Message, L2Actor, L2Block, PublicDataWrite,
        TreeRoots, TreeSnapshot, Tx, TxExecutionRequest, UnverifiedData,
    },
};

/// Current block encoding version
pub const BLOCK_VERSION: u8 = 1;

const HASH_SIZE: usize = 32;
const ADDRESS_SIZE: usize = 20;
const LENGTH_PREFIX_SIZE: usize = 4;
const CONTRACT_MIN_SIZE: usize = HASH_SIZE + ADDRESS_SIZE + LENGTH_PREFIX_SIZE;
const TREE_SNAPSHOT_SIZE: usize = 1 + HASH_SIZE + 8;

/// Decodes a block and verifies its embedded content hash
pub fn decode_block(bytes: &[u8]) -> Result<L2Block, DecodeError> {
    let mut reader = Reader::new(bytes);

    let version = reader.u8("version")?;
    if version != BLOCK_VERSION {
        return Err(DecodeError::UnsupportedVersion(version));
    }

    let embedded = reader.b256("block hash")?;
    let payload_start = bytes.len() - reader.remaining();

    let height = reader.u64("height")?;
    let parent_hash = reader.b256("parent hash")?;
    let timestamp = reader.u64("timestamp")?;

    let l1_origin = L1Origin {
        block_number: reader.u64("l1 block number")?,
        block_hash: reader.b256("l1 block hash")?,
        tx_hash: reader.b256("l1 tx hash")?,
        log_index: reader.u32("l1 log index")?,
    };

    let tree_count = reader.u8("tree count")? as usize;
    if tree_count * TREE_SNAPSHOT_SIZE > reader.remaining() {
        return Err(DecodeError::InvalidLength {
            field: "tree roots",
            declared: (tree_count * TREE_SNAPSHOT_SIZE) as u64,
            remaining: reader.remaining(),
        });
    }

    let mut entries = Vec::with_capacity(tree_count);
    for _ in 0..tree_count {
        let id = reader.u8("tree id")?;
        let snapshot = TreeSnapshot {
            root: reader.b256("tree root")?,
            next_available_leaf_index: reader.u64("next leaf index")?,
        };
        entries.push((id, snapshot));
    }
    let tree_roots = TreeRoots::from_entries(entries)?;

    let message_count = reader.count("l1 to l2 messages", LENGTH_PREFIX_SIZE)?;
    let mut l1_to_l2_messages = Vec::with_capacity(message_count);
    for _ in 0..message_count {
        l1_to_l2_messages.push(decode_message(reader.length_prefixed("l1 to l2 message")?)?);
    }

    let tx_count = reader.count("txs", LENGTH_PREFIX_SIZE)?;
    let mut txs = Vec::with_capacity(tx_count);
    for _ in 0..tx_count {
        txs.push(decode_tx(reader.length_prefixed("tx")?)?);
    }

    reader.finish("block")?;

    let computed = keccak256(&bytes[payload_start..]);
    if computed != embedded {
        return Err(DecodeError::ChecksumMismatch {
            field: "block hash",
            embedded,
            computed,
        });
    }

    Ok(L2Block {
        header: BlockHeader {
            height,
            hash: embedded,
            parent_hash,
            timestamp,
        },
        l1_origin,
        tree_roots,
        l1_to_l2_messages,
        txs,
    })
}

/// Encodes a block including its version byte and content hash
///
/// ## Panics
///
/// Panics if any collection or nested record in the block is longer than
/// `u32::MAX`.
pub fn encode_block(block: &L2Block) -> Vec<u8> {
    let mut writer = Writer::new();
    writer
        .u8(BLOCK_VERSION)
        .b256(&block.header.hash)
        .raw(&encode_block_payload(block));
    writer.into_bytes()
}

/// Encodes the hashed part of a block: everything after the hash field
pub fn encode_block_payload(block: &L2Block) -> Vec<u8> {
    let mut writer = Writer::new();

    writer
        .u64(block.header.height)
        .b256(&block.header.parent_hash)
        .u64(block.header.timestamp);

    writer
        .u64(block.l1_origin.block_number)
        .b256(&block.l1_origin.block_hash)
        .b256(&block.l1_origin.tx_hash)
        .u32(block.l1_origin.log_index);

    // at most one entry per tree id, so the count always fits a byte
    writer.u8(block.tree_roots.len() as u8);
    for (id, snapshot) in block.tree_roots.iter() {
        writer
            .u8(id.as_u8())
            .b256(&snapshot.root)
            .u64(snapshot.next_available_leaf_index);
    }

    writer.count(block.l1_to_l2_messages.len());
    for message in &block.l1_to_l2_messages {
        writer.length_prefixed(&encode_message(message));
    }

    writer.count(block.txs.len());
    for tx in &block.txs {
        writer.length_prefixed(&encode_tx(tx));
    }

    writer.into_bytes()
}

/// Decodes an L1-to-L2 message and verifies its entry key
pub fn decode_message(bytes: &[u8]) -> Result<L1ToL2Message, DecodeError> {
    let mut reader = Reader::new(bytes);

    let sender = L1Actor {
        sender: reader.address("sender")?,
        chain_id: reader.u64("sender chain id")?,
    };
    let recipient = L2Actor {
        recipient: reader.b256("recipient")?,
        version: reader.u32("recipient version")?,
    };

    let message = L1ToL2Message {
        sender,
        recipient,
        content: reader.b256("content")?,
        secret_hash: reader.b256("secret hash")?,
        deadline: reader.u32("deadline")?,
        fee: reader.u64("fee")?,
        consumable_at: reader.u64("consumable at")?,
        entry_key: reader.b256("entry key")?,
    };
    reader.finish("l1 to l2 message")?;

    let computed = message.compute_entry_key();
    if computed != message.entry_key {
        return Err(DecodeError::ChecksumMismatch {
            field: "entry key",
            embedded: message.entry_key,
            computed,
        });
    }

    Ok(message)
}

pub fn encode_message(message: &L1ToL2Message) -> Vec<u8> {
    let mut bytes = encode_message_payload(message);
    bytes.extend_from_slice(message.entry_key.as_slice());
    bytes
}

/// Encodes the fields covered by the message entry key
pub fn encode_message_payload(message: &L1ToL2Message) -> Vec<u8> {
    let mut writer = Writer::new();
    writer
        .address(&message.sender.sender)
        .u64(message.sender.chain_id)
        .b256(&message.recipient.recipient)
        .u32(message.recipient.version)
        .b256(&message.content)
        .b256(&message.secret_hash)
        .u32(message.deadline)
        .u64(message.fee)
        .u64(message.consumable_at);
    writer.into_bytes()
}

pub fn decode_tx(bytes: &[u8]) -> Result<Tx, DecodeError> {
    let mut reader = Reader::new(bytes);

    let new_note_hashes = decode_fields(&mut reader, "note hashes")?;
    let new_nullifiers = decode_fields(&mut reader, "nullifiers")?;

    let contract_count = reader.count("contracts", CONTRACT_MIN_SIZE)?;
    let mut new_contracts = Vec::with_capacity(contract_count);
    for _ in 0..contract_count {
        let contract_address = reader.b256("contract address")?;
        let portal_address = reader.address("portal address")?;
        let selector_count = reader.count("function selectors", 4)?;
        let function_selectors = (0..selector_count)
            .map(|_| reader.selector("function selector"))
            .collect::<Result<_, _>>()?;

        new_contracts.push(ContractData {
            contract_address,
            portal_address,
            function_selectors,
        });
    }

    let write_count = reader.count("public data writes", HASH_SIZE * 2)?;
    let public_data_writes = (0..write_count)
        .map(|_| -> Result<PublicDataWrite, DecodeError> {
            Ok(PublicDataWrite {
                leaf_index: reader.b256("public data slot")?,
                new_value: reader.b256("public data value")?,
            })
        })
        .collect::<Result<_, _>>()?;

    let new_l2_to_l1_msgs = decode_fields(&mut reader, "l2 to l1 messages")?;

    let chunk_count = reader.count("unverified data", LENGTH_PREFIX_SIZE)?;
    let chunks = (0..chunk_count)
        .map(|_| {
            reader
                .length_prefixed("unverified data chunk")
                .map(bytes::Bytes::copy_from_slice)
        })
        .collect::<Result<_, _>>()?;

    reader.finish("tx")?;

    Ok(Tx {
        new_note_hashes,
        new_nullifiers,
        new_contracts,
        public_data_writes,
        new_l2_to_l1_msgs,
        unverified_data: UnverifiedData::new(chunks),
    })
}

/// ## Panics
///
/// Panics if any list or unverified data chunk is longer than `u32::MAX`.
pub fn encode_tx(tx: &Tx) -> Vec<u8> {
    let mut writer = Writer::new();
    writer.raw(&encode_tx_effects(tx));

    writer.count(tx.unverified_data.chunks.len());
    for chunk in &tx.unverified_data.chunks {
        writer.length_prefixed(chunk);
    }

    writer.into_bytes()
}

/// Encodes the effects of a transaction, leaving out its unverified data
pub fn encode_tx_effects(tx: &Tx) -> Vec<u8> {
    let mut writer = Writer::new();

    write_fields(&mut writer, &tx.new_note_hashes);
    write_fields(&mut writer, &tx.new_nullifiers);

    writer.count(tx.new_contracts.len());
    for contract in &tx.new_contracts {
        writer
            .b256(&contract.contract_address)
            .address(&contract.portal_address)
            .count(contract.function_selectors.len());
        for selector in &contract.function_selectors {
            writer.raw(selector);
        }
    }

    writer.count(tx.public_data_writes.len());
    for write in &tx.public_data_writes {
        writer.b256(&write.leaf_index).b256(&write.new_value);
    }

    write_fields(&mut writer, &tx.new_l2_to_l1_msgs);

    writer.into_bytes()
}

pub fn decode_tx_request(bytes: &[u8]) -> Result<TxExecutionRequest, DecodeError> {
    let mut reader = Reader::new(bytes);

    let request = TxExecutionRequest {
        from: reader.b256("from")?,
        to: reader.b256("to")?,
        function_data: FunctionData {
            selector: reader.selector("function selector")?,
            is_private: reader.bool("is private")?,
            is_constructor: reader.bool("is constructor")?,
        },
        args: decode_fields(&mut reader, "args")?,
        nonce: reader.b256("nonce")?,
        chain_id: reader.u64("chain id")?,
    };
    reader.finish("tx execution request")?;

    Ok(request)
}

pub fn encode_tx_request(request: &TxExecutionRequest) -> Vec<u8> {
    let mut writer = Writer::new();
    writer
        .b256(&request.from)
        .b256(&request.to)
        .raw(&request.function_data.selector)
        .bool(request.function_data.is_private)
        .bool(request.function_data.is_constructor);
    write_fields(&mut writer, &request.args);
    writer.b256(&request.nonce).u64(request.chain_id);
    writer.into_bytes()
}

fn decode_fields(
    reader: &mut Reader<'_>,
    field: &'static str,
) -> Result<Vec<alloy_primitives::B256>, DecodeError> {
    let count = reader.count(field, HASH_SIZE)?;
    (0..count).map(|_| reader.b256(field)).collect()
}

fn write_fields(writer: &mut Writer, fields: &[alloy_primitives::B256]) {
    writer.count(fields.len());
    for field in fields {
        writer.b256(field);
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{Address, B256};
    use bytes::Bytes;

    use super::*;
    use crate::types::{MerkleTreeId, TxHash};

    fn message(content: u8) -> L1ToL2Message {
        L1ToL2Message::new(
            L1Actor {
                sender: Address::repeat_byte(0xaa),
                chain_id: 1,
            },
            L2Actor {
                recipient: B256::repeat_byte(0xbb),
                version: 2,
            },
            B256::repeat_byte(content),
            B256::repeat_byte(0xcc),
            4_000_000_000,
            21,
            12,
        )
    }

    fn tx(seed: u8) -> Tx {
        Tx {
            new_note_hashes: vec![B256::repeat_byte(seed); 2],
            new_nullifiers: vec![B256::repeat_byte(seed.wrapping_add(1))],
            new_contracts: vec![ContractData {
                contract_address: B256::repeat_byte(seed),
                portal_address: Address::repeat_byte(seed),
                function_selectors: vec![[seed, 0, 0, 1], [seed, 0, 0, 2]],
            }],
            public_data_writes: vec![
                PublicDataWrite::new(B256::repeat_byte(1), B256::repeat_byte(seed)),
                PublicDataWrite::new(B256::repeat_byte(1), B256::repeat_byte(seed.wrapping_add(1))),
            ],
            new_l2_to_l1_msgs: Vec::new(),
            unverified_data: UnverifiedData::new(vec![
                Bytes::from(vec![seed; 3]),
                Bytes::new(),
            ]),
        }
    }

    fn block() -> L2Block {
        L2Block::new(
            12,
            B256::repeat_byte(0x11),
            1_700_000_012,
            L1Origin {
                block_number: 18_000_000,
                block_hash: B256::repeat_byte(0x22),
                tx_hash: B256::repeat_byte(0x33),
                log_index: 4,
            },
            TreeRoots::from_fn(|id| TreeSnapshot {
                root: B256::repeat_byte(0x40 + id.as_u8()),
                next_available_leaf_index: 64,
            }),
            vec![message(1), message(2)],
            vec![tx(5), tx(6), Tx::default()],
        )
    }

    /// Offset of the tree count byte in an encoded block
    const TREE_COUNT_OFFSET: usize = 1 + 32 + 8 + 32 + 8 + 8 + 32 + 32 + 4;

    /// Re-seals the hash of a block encoding after its payload was modified
    fn reseal(bytes: &mut [u8]) {
        let hash = keccak256(&bytes[33..]);
        bytes[1..33].copy_from_slice(hash.as_slice());
    }

    #[test]
    fn test_block_round_trip() {
        let block = block();
        let decoded = decode_block(&encode_block(&block)).unwrap();

        assert_eq!(decoded, block);
        assert_eq!(decoded.hash(), block.compute_hash());
    }

    #[test]
    fn test_message_round_trip() {
        let msg = message(9);
        assert_eq!(decode_message(&encode_message(&msg)).unwrap(), msg);
    }

    #[test]
    fn test_tx_round_trip_keeps_hash() {
        let tx = tx(3);
        let decoded = decode_tx(&encode_tx(&tx)).unwrap();

        assert_eq!(decoded, tx);
        assert_eq!(TxHash::from_content(&decoded), tx.hash());
    }

    #[test]
    fn test_tx_request_round_trip() {
        let request = TxExecutionRequest {
            from: B256::repeat_byte(1),
            to: B256::repeat_byte(2),
            function_data: FunctionData {
                selector: [1, 2, 3, 4],
                is_private: false,
                is_constructor: true,
            },
            args: vec![B256::repeat_byte(5); 3],
            nonce: B256::repeat_byte(6),
            chain_id: 677,
        };

        assert_eq!(decode_tx_request(&encode_tx_request(&request)).unwrap(), request);
    }

    #[test]
    fn test_every_truncation_fails_cleanly() {
        let bytes = encode_block(&block());

        for len in 0..bytes.len() {
            let err = decode_block(&bytes[..len]).unwrap_err();
            assert!(
                matches!(
                    err,
                    DecodeError::Truncated { .. } | DecodeError::InvalidLength { .. }
                ),
                "unexpected error {err:?} at length {len}"
            );
        }
    }

    #[test]
    fn test_unsupported_version() {
        let mut bytes = encode_block(&block());
        bytes[0] = 7;
        assert_eq!(decode_block(&bytes), Err(DecodeError::UnsupportedVersion(7)));
    }

    #[test]
    fn test_unknown_tree_id() {
        let mut bytes = encode_block(&block());
        // first tree id follows the tree count
        bytes[TREE_COUNT_OFFSET + 1] = 0x7f;
        reseal(&mut bytes);

        assert_eq!(decode_block(&bytes), Err(DecodeError::UnknownTreeId(0x7f)));
    }

    #[test]
    fn test_duplicate_tree_id() {
        let mut bytes = encode_block(&block());
        // second entry claims the first entry's id
        bytes[TREE_COUNT_OFFSET + 1 + TREE_SNAPSHOT_SIZE] = MerkleTreeId::Contract.as_u8();
        reseal(&mut bytes);

        assert_eq!(decode_block(&bytes), Err(DecodeError::DuplicateTreeId(0)));
    }

    #[test]
    fn test_tree_count_exceeds_buffer() {
        let bytes = encode_block(&block());
        let mut short = bytes[..=TREE_COUNT_OFFSET].to_vec();
        short.extend_from_slice(&[0; 10]);

        assert!(matches!(
            decode_block(&short),
            Err(DecodeError::InvalidLength {
                field: "tree roots",
                ..
            })
        ));
    }

    #[test]
    fn test_block_checksum_mismatch() {
        let mut bytes = encode_block(&block());
        // flip a bit of the timestamp without resealing
        bytes[1 + 32 + 8 + 32 + 7] ^= 1;

        assert!(matches!(
            decode_block(&bytes),
            Err(DecodeError::ChecksumMismatch {
                field: "block hash",
                ..
            })
        ));
    }

    #[test]
    fn test_message_checksum_mismatch() {
        let mut bytes = encode_message(&message(1));
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;

        assert!(matches!(
            decode_message(&bytes),
            Err(DecodeError::ChecksumMismatch {
                field: "entry key",
                ..
            })
        ));
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut bytes = encode_block(&block());
        bytes.push(0);
        assert_eq!(decode_block(&bytes), Err(DecodeError::TrailingBytes(1, "block")));
    }

    #[test]
    fn test_oversized_tx_length_prefix() {
        let block = L2Block::new(
            1,
            B256::ZERO,
            0,
            L1Origin::default(),
            TreeRoots::from_fn(|_| TreeSnapshot::default()),
            Vec::new(),
            vec![Tx::default()],
        );
        let mut bytes = encode_block(&block);

        // tx length prefix sits right before the encoded tx
        let tx_len = encode_tx(&Tx::default()).len();
        let prefix_at = bytes.len() - tx_len - 4;
        bytes[prefix_at..prefix_at + 4].copy_from_slice(&u32::MAX.to_be_bytes());
        reseal(&mut bytes);

        assert!(matches!(
            decode_block(&bytes),
            Err(DecodeError::InvalidLength { field: "tx", .. })
        ));
    }
}
