use std::collections::VecDeque;

use crate::common::BlockHeader;

/// Headers of the most recently confirmed blocks.
///
/// Holds at most `capacity` contiguous headers, enough to find a common
/// ancestor within the maximum reorg depth. With no headers retained the
/// local height is the floor, one below the first height to sync.
#[derive(Debug)]
pub struct SyncFrontier {
    headers: VecDeque<BlockHeader>,
    capacity: usize,
    floor: u64,
}

impl SyncFrontier {
    /// Creates an empty frontier syncing from `initial_height`. Height 0 is
    /// the implicit genesis and is never synced.
    pub fn new(initial_height: u64, capacity: usize) -> Self {
        Self {
            headers: VecDeque::new(),
            capacity: capacity.max(1),
            floor: initial_height.max(1) - 1,
        }
    }

    pub fn tip(&self) -> Option<&BlockHeader> {
        self.headers.back()
    }

    /// Height of the last confirmed block
    pub fn height(&self) -> u64 {
        self.tip().map(|h| h.height).unwrap_or(self.floor)
    }

    pub fn floor(&self) -> u64 {
        self.floor
    }

    /// Retains a newly confirmed header. A header that does not directly
    /// follow the tip by height restarts the retained window.
    pub fn push(&mut self, header: BlockHeader) {
        if let Some(tip) = self.tip() {
            if tip.height.checked_add(1) != Some(header.height) {
                self.headers.clear();
            }
        }

        self.headers.push_back(header);
        while self.headers.len() > self.capacity {
            self.headers.pop_front();
        }
    }

    pub fn header_at(&self, height: u64) -> Option<&BlockHeader> {
        let first = self.headers.front()?.height;
        let index = height.checked_sub(first)?;
        self.headers.get(usize::try_from(index).ok()?)
    }

    /// Forgets every header above `height`
    pub fn rollback_to(&mut self, height: u64) {
        while self.tip().map_or(false, |tip| tip.height > height) {
            self.headers.pop_back();
        }
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}
