//! The block source boundary.
//!
//! A [BlockSource] hands out raw, undecoded block bytes by height. The
//! production implementation talks JSON-RPC to a node tracking the rollup
//! contract on L1; tests use the [ScriptedBlockSource].

use std::{fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

mod http;
pub use http::HttpBlockSource;

#[cfg(any(test, feature = "test-utils"))]
mod scripted;
#[cfg(any(test, feature = "test-utils"))]
pub use scripted::{build_chain, test_block, ScriptedBlockSource, SourceCall};

/// Errors returned by a [BlockSource]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    /// The source could not be reached or answered with an error
    #[error("block source unavailable: {0}")]
    Unavailable(String),
    /// The call did not complete in time
    #[error("block source call timed out after {0:?}")]
    Timeout(Duration),
    /// Fewer blocks than requested are available. `received` holds the blocks
    /// that were returned, starting at the requested height.
    #[error("partial range: received {} blocks", received.len())]
    PartialRange { received: Vec<Bytes> },
    /// The source answered, but the payload is not usable. Retrying the same
    /// request returns the same bytes.
    #[error("malformed response from block source: {0}")]
    Malformed(String),
}

impl SourceError {
    /// Whether the error is absorbed by retrying the call
    pub fn is_transient(&self) -> bool {
        matches!(self, SourceError::Unavailable(_) | SourceError::Timeout(_))
    }
}

/// Capability to read finalized L2 blocks from an authoritative source.
///
/// Every call may fail or stall; callers wrap them in timeouts and retries.
#[async_trait]
pub trait BlockSource: Send + Sync {
    /// Height of the most recent block available
    async fn latest_height(&self) -> Result<u64, SourceError>;

    /// Raw blocks for the inclusive range `[from, to]`, in height order and
    /// starting at `from`. Returning fewer blocks than requested is a partial
    /// range, not an error.
    async fn get_blocks(&self, from: u64, to: u64) -> Result<Vec<Bytes>, SourceError>;

    /// Lazily produces the heights of newly available blocks. Sources without
    /// push support return `None` and are polled instead. The stream may end
    /// at any time; callers subscribe again when they need it.
    fn subscribe(&self) -> Option<BoxStream<'static, u64>> {
        None
    }
}

#[async_trait]
impl<S: BlockSource + ?Sized> BlockSource for Arc<S> {
    async fn latest_height(&self) -> Result<u64, SourceError> {
        (**self).latest_height().await
    }

    async fn get_blocks(&self, from: u64, to: u64) -> Result<Vec<Bytes>, SourceError> {
        (**self).get_blocks(from, to).await
    }

    fn subscribe(&self) -> Option<BoxStream<'static, u64>> {
        (**self).subscribe()
    }
}

/// Block range helper used for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeightRange {
    pub from: u64,
    pub to: u64,
}

impl HeightRange {
    pub fn new(from: u64, to: u64) -> Self {
        Self { from, to }
    }

    pub fn len(&self) -> u64 {
        if self.to < self.from {
            0
        } else {
            self.to - self.from + 1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Splits the range into consecutive chunks of at most `size` heights
    pub fn chunks(self, size: u64) -> impl Iterator<Item = HeightRange> {
        let size = size.max(1);
        let mut next = (!self.is_empty()).then_some(self.from);
        std::iter::from_fn(move || {
            let from = next?;
            let to = from.saturating_add(size - 1).min(self.to);
            next = (to < self.to).then(|| to + 1);
            Some(HeightRange::new(from, to))
        })
    }
}

impl fmt::Display for HeightRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.from, self.to)
    }
}

#[cfg(test)]
mod tests {
    use super::HeightRange;

    #[test]
    fn test_range_chunks() {
        let chunks: Vec<_> = HeightRange::new(10, 20).chunks(4).collect();
        assert_eq!(
            chunks,
            vec![
                HeightRange::new(10, 13),
                HeightRange::new(14, 17),
                HeightRange::new(18, 20)
            ]
        );
    }

    #[test]
    fn test_empty_range() {
        let range = HeightRange::new(5, 4);
        assert!(range.is_empty());
        assert_eq!(range.chunks(10).count(), 0);
    }

    #[test]
    fn test_single_chunk() {
        let chunks: Vec<_> = HeightRange::new(1, 3).chunks(100).collect();
        assert_eq!(chunks, vec![HeightRange::new(1, 3)]);
    }
}
