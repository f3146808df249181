use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Transaction payload that has not been verified yet.
///
/// The chunks are opaque to this crate. Verification happens downstream,
/// after which the payload is taken out of the downloader's pool.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UnverifiedData {
    pub chunks: Vec<Bytes>,
}

impl UnverifiedData {
    pub fn new(chunks: Vec<Bytes>) -> Self {
        Self { chunks }
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.iter().all(|chunk| chunk.is_empty())
    }

    /// Total payload size in bytes
    pub fn size(&self) -> usize {
        self.chunks.iter().map(Bytes::len).sum()
    }
}
