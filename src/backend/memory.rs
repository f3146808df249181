use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::types::L2Block;

use super::{BlockStore, StoreError};

/// Keeps confirmed blocks in memory. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryBlockStore {
    blocks: RwLock<BTreeMap<u64, L2Block>>,
}

impl MemoryBlockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of blocks held
    pub async fn len(&self) -> usize {
        self.blocks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blocks.read().await.is_empty()
    }
}

#[async_trait]
impl BlockStore for MemoryBlockStore {
    async fn persist_block(&self, block: &L2Block) -> Result<(), StoreError> {
        let mut blocks = self.blocks.write().await;
        blocks.split_off(&block.height());
        blocks.insert(block.height(), block.clone());
        Ok(())
    }

    async fn load_last_confirmed_height(&self) -> Result<Option<u64>, StoreError> {
        Ok(self.blocks.read().await.keys().next_back().copied())
    }

    async fn load_block(&self, height: u64) -> Result<Option<L2Block>, StoreError> {
        Ok(self.blocks.read().await.get(&height).cloned())
    }

    async fn rollback_to(&self, height: u64) -> Result<(), StoreError> {
        if let Some(first_removed) = height.checked_add(1) {
            self.blocks.write().await.split_off(&first_removed);
        }
        Ok(())
    }
}
