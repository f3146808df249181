use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use crate::types::{L2BlockContext, TxHash, UnverifiedData};

#[derive(Debug, Default)]
struct Pool {
    by_tx: HashMap<TxHash, (u64, UnverifiedData)>,
    by_height: BTreeMap<u64, Vec<TxHash>>,
}

impl Pool {
    fn remove_heights(&mut self, heights: BTreeMap<u64, Vec<TxHash>>) -> usize {
        let mut removed = 0;
        for (height, hashes) in heights {
            for hash in hashes {
                // A later block may have re-indexed the same tx
                if matches!(self.by_tx.get(&hash), Some((h, _)) if *h == height) {
                    self.by_tx.remove(&hash);
                    removed += 1;
                }
            }
        }
        removed
    }
}

/// TxHash-keyed store of provisional payloads. Only the downloader writes
/// to it; consumers go through an [UnverifiedDataReader].
#[derive(Debug, Clone, Default)]
pub(crate) struct UnverifiedDataPool {
    inner: Arc<RwLock<Pool>>,
}

impl UnverifiedDataPool {
    fn read(&self) -> RwLockReadGuard<'_, Pool> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Pool> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Indexes the non-empty unverified data of every tx in the block
    pub fn insert_block(&self, context: &L2BlockContext) {
        let height = context.height();
        let mut pool = self.write();
        let mut hashes = Vec::new();

        for (tx, hash) in context.block().txs.iter().zip(context.tx_hashes()) {
            if tx.unverified_data.is_empty() {
                continue;
            }
            pool.by_tx
                .insert(*hash, (height, tx.unverified_data.clone()));
            hashes.push(*hash);
        }

        if !hashes.is_empty() {
            pool.by_height.insert(height, hashes);
        }
    }

    /// Discards the data of every block above `height`. Returns the number
    /// of payloads dropped.
    pub fn discard_above(&self, height: u64) -> usize {
        let Some(first) = height.checked_add(1) else {
            return 0;
        };
        let mut pool = self.write();
        let discarded = pool.by_height.split_off(&first);
        pool.remove_heights(discarded)
    }

    /// Discards the data of every block at or below `height`
    pub fn prune_through(&self, height: u64) -> usize {
        let mut pool = self.write();
        let kept = match height.checked_add(1) {
            Some(first_kept) => pool.by_height.split_off(&first_kept),
            None => BTreeMap::new(),
        };
        let pruned = std::mem::replace(&mut pool.by_height, kept);
        pool.remove_heights(pruned)
    }

    pub fn reader(&self) -> UnverifiedDataReader {
        UnverifiedDataReader { pool: self.clone() }
    }
}

/// Consumer view of the unverified data of emitted blocks.
///
/// Data disappears when its block is rolled back, when it falls out of the
/// retention window, or when a consumer takes it for verification.
#[derive(Debug, Clone)]
pub struct UnverifiedDataReader {
    pool: UnverifiedDataPool,
}

impl UnverifiedDataReader {
    pub fn get(&self, tx_hash: &TxHash) -> Option<UnverifiedData> {
        self.pool.read().by_tx.get(tx_hash).map(|(_, d)| d.clone())
    }

    /// Removes and returns the data of a tx
    pub fn take(&self, tx_hash: &TxHash) -> Option<UnverifiedData> {
        let mut pool = self.pool.write();
        let (height, data) = pool.by_tx.remove(tx_hash)?;
        if let Some(hashes) = pool.by_height.get_mut(&height) {
            hashes.retain(|h| h != tx_hash);
            if hashes.is_empty() {
                pool.by_height.remove(&height);
            }
        }
        Some(data)
    }

    /// Data of every tx of the block at `height`, in tx order
    pub fn for_block(&self, height: u64) -> Vec<(TxHash, UnverifiedData)> {
        let pool = self.pool.read();
        let Some(hashes) = pool.by_height.get(&height) else {
            return Vec::new();
        };

        hashes
            .iter()
            .filter_map(|hash| {
                pool.by_tx
                    .get(hash)
                    .filter(|(h, _)| *h == height)
                    .map(|(_, data)| (*hash, data.clone()))
            })
            .collect()
    }

    /// Number of payloads held
    pub fn len(&self) -> usize {
        self.pool.read().by_tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
