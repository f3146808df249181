use std::path::Path;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{codec, types::L2Block};

use super::{
    types::{height_key, key_height, HeadInfo},
    BlockStore, StoreError,
};

const HEAD_INFO_KEY: &str = "HEAD_INFO";
const BLOCKS_TREE: &str = "blocks";

/// Stores confirmed blocks in [sled].
///
/// Blocks live in their own tree keyed by big-endian height and hold the
/// canonical block encoding, so every load re-verifies the content hash. The
/// head is kept as a JSON [HeadInfo] in the default tree.
#[derive(Debug, Clone)]
pub struct SledBlockStore {
    /// Internal [sled] db
    db: sled::Db,
    blocks: sled::Tree,
}

impl SledBlockStore {
    /// Opens the store at `path`, falling back to a temporary location if the
    /// path cannot be used.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = Self::try_construct_db(path)?;
        let blocks = db.open_tree(BLOCKS_TREE)?;
        Ok(Self { db, blocks })
    }

    /// Gets a random location to use as a fallback
    pub fn fallback_location() -> String {
        format!("/tmp/l2-sync/{}", Uuid::new_v4())
    }

    fn try_construct_db<P: AsRef<Path>>(path: P) -> Result<sled::Db, StoreError> {
        match sled::open(path) {
            Ok(db) => Ok(db),
            Err(e) => {
                tracing::error!(target: "l2_sync", "failed to open database: {}", e);
                let new_loc = Self::fallback_location();
                tracing::debug!(target: "l2_sync", "optimistically creating new database at {}", new_loc);
                Ok(sled::open(new_loc)?)
            }
        }
    }

    /// Clear wipes every stored block and the head.
    ///
    /// ## Warning
    ///
    /// Be careful when using this function, as it will delete all data.
    pub fn clear(&self) -> Result<(), StoreError> {
        self.blocks.clear()?;
        self.db.clear()?;
        Ok(())
    }

    /// Reads the most recent [HeadInfo]
    pub fn read_head(&self) -> Result<Option<HeadInfo>, StoreError> {
        let head = self.db.get(HEAD_INFO_KEY)?;
        Ok(head.map(HeadInfo::try_from).transpose()?)
    }

    fn write_head(&self, head: Option<HeadInfo>) -> Result<(), StoreError> {
        match head {
            Some(head) => {
                let ivec = sled::IVec::try_from(head)?;
                self.db.insert(HEAD_INFO_KEY, ivec)?;
            }
            None => {
                self.db.remove(HEAD_INFO_KEY)?;
            }
        }
        Ok(())
    }

    /// Removes every block at or above `height`
    fn truncate_from(&self, height: u64) -> Result<(), StoreError> {
        let mut batch = sled::Batch::default();
        for key in self.blocks.range(height_key(height)..).keys() {
            batch.remove(key?);
        }
        self.blocks.apply_batch(batch)?;
        Ok(())
    }

    fn read_block(&self, height: u64) -> Result<Option<L2Block>, StoreError> {
        let Some(bytes) = self.blocks.get(height_key(height))? else {
            return Ok(None);
        };

        codec::decode_block(&bytes)
            .map(Some)
            .map_err(|source| StoreError::Block { height, source })
    }

    /// Flushes all dirty IO buffers and calls fsync. Once this succeeds every
    /// previous write survives a crash.
    async fn flush_async(&self) -> Result<usize, StoreError> {
        Ok(self.db.flush_async().await?)
    }
}

#[async_trait]
impl BlockStore for SledBlockStore {
    async fn persist_block(&self, block: &L2Block) -> Result<(), StoreError> {
        self.truncate_from(block.height())?;
        self.blocks
            .insert(height_key(block.height()), codec::encode_block(block))?;
        self.write_head(Some(HeadInfo::from(block)))?;
        self.flush_async().await?;
        Ok(())
    }

    async fn load_last_confirmed_height(&self) -> Result<Option<u64>, StoreError> {
        Ok(self.read_head()?.map(|head| head.header.height))
    }

    async fn load_block(&self, height: u64) -> Result<Option<L2Block>, StoreError> {
        self.read_block(height)
    }

    async fn rollback_to(&self, height: u64) -> Result<(), StoreError> {
        if let Some(first_removed) = height.checked_add(1) {
            self.truncate_from(first_removed)?;
        }

        let last = self.blocks.last()?.and_then(|(key, _)| key_height(&key));
        let head = match last {
            Some(last) => self.read_block(last)?.map(|block| HeadInfo::from(&block)),
            None => None,
        };

        self.write_head(head)?;
        self.flush_async().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::B256;

    use super::SledBlockStore;
    use crate::{
        backend::{types::height_key, BlockStore, StoreError},
        source::build_chain,
    };

    #[tokio::test]
    async fn test_head_follows_rollback() {
        let store = SledBlockStore::new(SledBlockStore::fallback_location()).unwrap();
        let chain = build_chain(B256::ZERO, 1, 3, 0);
        for block in &chain {
            store.persist_block(block).await.unwrap();
        }

        let head = store.read_head().unwrap().unwrap();
        assert_eq!(head.header, chain[2].header);

        store.rollback_to(1).await.unwrap();
        let head = store.read_head().unwrap().unwrap();
        assert_eq!(head.header, chain[0].header);
        assert_eq!(store.load_block(1).await.unwrap().unwrap(), chain[0]);
        store.clear().unwrap();
    }

    #[tokio::test]
    async fn test_corrupt_block_is_reported() {
        let store = SledBlockStore::new(SledBlockStore::fallback_location()).unwrap();
        store.blocks.insert(height_key(4), vec![1u8, 2, 3]).unwrap();

        let err = store.load_block(4).await.unwrap_err();
        assert!(matches!(err, StoreError::Block { height: 4, .. }));
        store.clear().unwrap();
    }
}
