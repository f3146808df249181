use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::common::{BlockHeader, L1Origin};

use super::{L2Block, Tx, TxHash};

/// A downloaded block on its way to a consumer.
///
/// Wraps a shared, read-only [L2Block] and caches the transaction hashes the
/// first time they are requested.
#[derive(Debug, Clone)]
pub struct L2BlockContext {
    block: Arc<L2Block>,
    tx_hashes: OnceCell<Vec<TxHash>>,
}

impl L2BlockContext {
    pub fn new(block: Arc<L2Block>) -> Self {
        Self {
            block,
            tx_hashes: OnceCell::new(),
        }
    }

    pub fn block(&self) -> &Arc<L2Block> {
        &self.block
    }

    pub fn into_block(self) -> Arc<L2Block> {
        self.block
    }

    pub fn header(&self) -> &BlockHeader {
        &self.block.header
    }

    pub fn height(&self) -> u64 {
        self.block.height()
    }

    /// The L1 block, transaction and log that published this block
    pub fn l1_origin(&self) -> &L1Origin {
        &self.block.l1_origin
    }

    pub fn tx_hashes(&self) -> &[TxHash] {
        self.tx_hashes.get_or_init(|| self.block.tx_hashes())
    }

    pub fn tx_hash(&self, index: usize) -> Option<TxHash> {
        self.tx_hashes().get(index).copied()
    }

    /// Finds a transaction of the block by hash
    pub fn tx(&self, hash: &TxHash) -> Option<&Tx> {
        let index = self.tx_hashes().iter().position(|h| h == hash)?;
        self.block.txs.get(index)
    }
}

impl From<L2Block> for L2BlockContext {
    fn from(block: L2Block) -> Self {
        Self::new(Arc::new(block))
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::B256;

    use super::L2BlockContext;
    use crate::{
        common::L1Origin,
        types::{L2Block, TreeRoots, TreeSnapshot, Tx, TxHash},
    };

    #[test]
    fn test_tx_hashes_cached_and_indexed() {
        let txs = vec![
            Tx {
                new_nullifiers: vec![B256::repeat_byte(1)],
                ..Default::default()
            },
            Tx {
                new_nullifiers: vec![B256::repeat_byte(2)],
                ..Default::default()
            },
        ];
        let block = L2Block::new(
            3,
            B256::ZERO,
            0,
            L1Origin {
                block_number: 99,
                ..Default::default()
            },
            TreeRoots::from_fn(|_| TreeSnapshot::default()),
            Vec::new(),
            txs.clone(),
        );

        let ctx = L2BlockContext::from(block);

        assert_eq!(ctx.height(), 3);
        assert_eq!(ctx.l1_origin().block_number, 99);
        assert_eq!(ctx.tx_hashes(), &[txs[0].hash(), txs[1].hash()]);
        assert_eq!(ctx.tx_hash(1), Some(txs[1].hash()));
        assert_eq!(ctx.tx_hash(2), None);
        assert_eq!(ctx.tx(&txs[1].hash()), Some(&txs[1]));
        assert_eq!(ctx.tx(&TxHash::default()), None);
    }
}
