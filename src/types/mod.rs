//! Value types for blocks, transactions and cross-chain messages.
//!
//! Everything here is immutable once built and performs no I/O.

mod tree_id;
pub use tree_id::MerkleTreeId;

mod block;
pub use block::{L2Block, TreeRoots, TreeSnapshot};

mod block_context;
pub use block_context::L2BlockContext;

mod message;
pub use message::{L1Actor, L1ToL2Message, L2Actor};

mod tx;
pub use tx::{FunctionData, Tx, TxContent, TxExecutionRequest, TxHash};

mod contract;
pub use contract::ContractData;

mod public_data;
pub use public_data::PublicDataWrite;

mod unverified_data;
pub use unverified_data::UnverifiedData;
