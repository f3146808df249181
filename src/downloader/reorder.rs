use std::collections::BTreeMap;

use crate::types::L2Block;

/// Holds blocks fetched out of order until every lower height has arrived
#[derive(Debug)]
pub struct ReorderBuffer {
    next: u64,
    pending: BTreeMap<u64, L2Block>,
}

impl ReorderBuffer {
    /// Creates a buffer releasing from height `next`
    pub fn new(next: u64) -> Self {
        Self {
            next,
            pending: BTreeMap::new(),
        }
    }

    /// Buffers a block. Blocks below the release point or already buffered
    /// are dropped; returns whether the block was kept.
    pub fn insert(&mut self, block: L2Block) -> bool {
        let height = block.height();
        if height < self.next || self.pending.contains_key(&height) {
            return false;
        }
        self.pending.insert(height, block);
        true
    }

    /// Releases the block at the release point, if it has arrived
    pub fn pop_ready(&mut self) -> Option<L2Block> {
        let block = self.pending.remove(&self.next)?;
        self.next += 1;
        Some(block)
    }

    /// Next height to be released
    pub fn next_height(&self) -> u64 {
        self.next
    }

    /// Drops everything buffered and moves the release point to `next`
    pub fn reset(&mut self, next: u64) {
        self.pending.clear();
        self.next = next;
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::B256;

    use super::ReorderBuffer;
    use crate::source::build_chain;

    #[test]
    fn test_releases_in_height_order() {
        let chain = build_chain(B256::ZERO, 1, 6, 0);
        let mut buffer = ReorderBuffer::new(1);

        for block in chain[3..].iter().cloned() {
            assert!(buffer.insert(block));
        }
        assert!(buffer.pop_ready().is_none());

        for block in chain[..3].iter().rev().cloned() {
            buffer.insert(block);
        }

        let heights: Vec<_> = std::iter::from_fn(|| buffer.pop_ready())
            .map(|b| b.height())
            .collect();
        assert_eq!(heights, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(buffer.next_height(), 7);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_gap_holds_back_higher_blocks() {
        let chain = build_chain(B256::ZERO, 1, 4, 0);
        let mut buffer = ReorderBuffer::new(1);
        buffer.insert(chain[0].clone());
        buffer.insert(chain[2].clone());
        buffer.insert(chain[3].clone());

        assert_eq!(buffer.pop_ready().map(|b| b.height()), Some(1));
        assert!(buffer.pop_ready().is_none());
        assert_eq!(buffer.len(), 2);

        buffer.reset(2);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_stale_and_duplicate_blocks_dropped() {
        let chain = build_chain(B256::ZERO, 1, 3, 0);
        let mut buffer = ReorderBuffer::new(2);
        assert!(!buffer.insert(chain[0].clone()));
        assert!(buffer.insert(chain[1].clone()));
        assert!(!buffer.insert(chain[1].clone()));
    }
}
