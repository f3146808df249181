#![warn(missing_debug_implementations)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Confirmed Block Store
//!
//! Checkpoints the blocks the downloader has handed off so a restart resumes
//! from the last confirmed height instead of from genesis.
//!
//! ## Example
//!
//! ```rust
//! use alloy_primitives::B256;
//! use l2_sync::backend::{BlockStore, SledBlockStore};
//! use l2_sync::source::build_chain;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let store = SledBlockStore::new(SledBlockStore::fallback_location()).unwrap();
//! for block in build_chain(B256::ZERO, 1, 3, 0) {
//!     store.persist_block(&block).await.unwrap();
//! }
//! assert_eq!(store.load_last_confirmed_height().await.unwrap(), Some(3));
//!
//! store.rollback_to(1).await.unwrap();
//! assert_eq!(store.load_last_confirmed_height().await.unwrap(), Some(1));
//! assert!(store.load_block(2).await.unwrap().is_none());
//! store.clear().unwrap();
//! # }
//! ```

use std::sync::Arc;

use async_trait::async_trait;

use crate::{codec::DecodeError, types::L2Block};

/// Core Backend Types
mod types;
pub use types::HeadInfo;

/// Sled-backed store
mod database;
pub use database::SledBlockStore;

/// In-memory store
mod memory;
pub use memory::MemoryBlockStore;

/// Errors raised by a [BlockStore]
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sled::Error),
    #[error("corrupt head record: {0}")]
    Head(#[from] serde_json::Error),
    #[error("corrupt block at height {height}: {source}")]
    Block {
        height: u64,
        #[source]
        source: DecodeError,
    },
}

/// Persistence boundary for confirmed blocks.
///
/// Heights above a rollback target must be gone once [BlockStore::rollback_to]
/// returns.
#[async_trait]
pub trait BlockStore: Send + Sync {
    /// Checkpoints a confirmed block and makes it the head
    async fn persist_block(&self, block: &L2Block) -> Result<(), StoreError>;

    /// Height of the most recent persisted block, if any
    async fn load_last_confirmed_height(&self) -> Result<Option<u64>, StoreError>;

    async fn load_block(&self, height: u64) -> Result<Option<L2Block>, StoreError>;

    /// Deletes every block above `height`
    async fn rollback_to(&self, height: u64) -> Result<(), StoreError>;
}

#[async_trait]
impl<S: BlockStore + ?Sized> BlockStore for Arc<S> {
    async fn persist_block(&self, block: &L2Block) -> Result<(), StoreError> {
        (**self).persist_block(block).await
    }

    async fn load_last_confirmed_height(&self) -> Result<Option<u64>, StoreError> {
        (**self).load_last_confirmed_height().await
    }

    async fn load_block(&self, height: u64) -> Result<Option<L2Block>, StoreError> {
        (**self).load_block(height).await
    }

    async fn rollback_to(&self, height: u64) -> Result<(), StoreError> {
        (**self).rollback_to(height).await
    }
}
