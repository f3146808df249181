use std::{
    collections::{BTreeMap, VecDeque},
    sync::{Mutex, MutexGuard},
    time::Duration,
};

use alloy_primitives::{B256, U256};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{channel::mpsc, stream::BoxStream, StreamExt};

use crate::{
    codec,
    common::{BlockHash, L1Origin},
    types::{L2Block, TreeRoots, TreeSnapshot, Tx, UnverifiedData},
};

use super::{BlockSource, SourceError};

/// A call received by a [ScriptedBlockSource]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceCall {
    LatestHeight,
    GetBlocks { from: u64, to: u64 },
}

/// In-memory [BlockSource] whose chain, failures and latency are scripted by
/// the test driving it. Every call is recorded.
#[derive(Debug, Default)]
pub struct ScriptedBlockSource {
    inner: Mutex<Script>,
}

#[derive(Debug, Default)]
struct Script {
    chain: BTreeMap<u64, Bytes>,
    failures: VecDeque<SourceError>,
    failing: Option<SourceError>,
    range_failures: Vec<(u64, SourceError)>,
    range_limit: Option<u64>,
    latency: Option<Duration>,
    calls: Vec<SourceCall>,
    subscribers: Vec<mpsc::UnboundedSender<u64>>,
    push_enabled: bool,
}

impl ScriptedBlockSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a source serving the given blocks
    pub fn with_blocks<'a>(blocks: impl IntoIterator<Item = &'a L2Block>) -> Self {
        let source = Self::new();
        source.extend(blocks);
        source
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn push_block(&self, block: &L2Block) {
        self.insert_raw(block.height(), codec::encode_block(block));
    }

    pub fn extend<'a>(&self, blocks: impl IntoIterator<Item = &'a L2Block>) {
        for block in blocks {
            self.push_block(block);
        }
    }

    /// Serves arbitrary bytes at `height`
    pub fn insert_raw(&self, height: u64, bytes: impl Into<Bytes>) {
        self.script().chain.insert(height, bytes.into());
    }

    /// Drops every block from `height` upward and serves `blocks` instead
    pub fn replace_from<'a>(&self, height: u64, blocks: impl IntoIterator<Item = &'a L2Block>) {
        self.script().chain.split_off(&height);
        self.extend(blocks);
    }

    /// Fails the next call with `err`. Queued failures are consumed in order.
    pub fn push_failure(&self, err: SourceError) {
        self.script().failures.push_back(err);
    }

    /// Fails the next `get_blocks` call starting at `from` with `err`
    pub fn push_range_failure(&self, from: u64, err: SourceError) {
        self.script().range_failures.push((from, err));
    }

    /// Fails every call with `err` until [ScriptedBlockSource::recover]
    pub fn fail_always(&self, err: SourceError) {
        self.script().failing = Some(err);
    }

    pub fn recover(&self) {
        let mut script = self.script();
        script.failing = None;
        script.failures.clear();
        script.range_failures.clear();
    }

    /// Serves at most `n` blocks on the next `get_blocks` call
    pub fn limit_next_range(&self, n: u64) {
        self.script().range_limit = Some(n);
    }

    /// Delays every answer by `latency`
    pub fn set_latency(&self, latency: Duration) {
        self.script().latency = Some(latency);
    }

    /// Makes [BlockSource::subscribe] hand out notification streams
    pub fn enable_push(&self) {
        self.script().push_enabled = true;
    }

    /// Notifies subscribers that `height` is available
    pub fn notify(&self, height: u64) {
        self.script()
            .subscribers
            .retain(|s| s.unbounded_send(height).is_ok());
    }

    pub fn calls(&self) -> Vec<SourceCall> {
        self.script().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.script().calls.clear();
    }

    /// Ranges requested through `get_blocks`, in call order
    pub fn range_calls(&self) -> Vec<(u64, u64)> {
        self.script()
            .calls
            .iter()
            .filter_map(|c| match c {
                SourceCall::GetBlocks { from, to } => Some((*from, *to)),
                SourceCall::LatestHeight => None,
            })
            .collect()
    }

    fn begin(&self, call: SourceCall) -> (Option<Duration>, Result<(), SourceError>) {
        let mut script = self.script();
        script.calls.push(call);

        let outcome = match script.failures.pop_front() {
            Some(err) => Err(err),
            None => match &script.failing {
                Some(err) => Err(err.clone()),
                None => Ok(()),
            },
        };

        (script.latency, outcome)
    }
}

#[async_trait]
impl BlockSource for ScriptedBlockSource {
    async fn latest_height(&self) -> Result<u64, SourceError> {
        let (latency, outcome) = self.begin(SourceCall::LatestHeight);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        outcome?;

        Ok(self
            .script()
            .chain
            .keys()
            .next_back()
            .copied()
            .unwrap_or_default())
    }

    async fn get_blocks(&self, from: u64, to: u64) -> Result<Vec<Bytes>, SourceError> {
        let (latency, outcome) = self.begin(SourceCall::GetBlocks { from, to });
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        outcome?;

        let mut script = self.script();
        if let Some(i) = script.range_failures.iter().position(|(f, _)| *f == from) {
            return Err(script.range_failures.remove(i).1);
        }

        let limit = script.range_limit.take().unwrap_or(u64::MAX);

        let mut blocks = Vec::new();
        let mut expected = from;
        for (height, bytes) in script.chain.range(from..=to) {
            if *height != expected || blocks.len() as u64 >= limit {
                break;
            }
            blocks.push(bytes.clone());
            expected += 1;
        }

        Ok(blocks)
    }

    fn subscribe(&self) -> Option<BoxStream<'static, u64>> {
        let mut script = self.script();
        if !script.push_enabled {
            return None;
        }

        let (tx, rx) = mpsc::unbounded();
        script.subscribers.push(tx);
        Some(rx.boxed())
    }
}

/// Builds `count` linked blocks starting at height `from` on top of `parent`.
///
/// `fork` is mixed into every block so two chains built from the same parent
/// with different forks diverge. Every block carries one tx with a single
/// unverified data chunk.
pub fn build_chain(parent: BlockHash, from: u64, count: u64, fork: u8) -> Vec<L2Block> {
    let mut parent = parent;
    (from..from + count)
        .map(|height| {
            let block = test_block(height, parent, fork);
            parent = block.hash();
            block
        })
        .collect()
}

/// A single block with deterministic content
pub fn test_block(height: u64, parent_hash: BlockHash, fork: u8) -> L2Block {
    let tree_roots = TreeRoots::from_fn(|id| TreeSnapshot {
        root: B256::with_last_byte(id.as_u8()),
        next_available_leaf_index: height * 64,
    });

    let mut nullifier = B256::from(U256::from(height));
    nullifier.0[0] = fork;

    let tx = Tx {
        new_nullifiers: vec![nullifier],
        unverified_data: UnverifiedData::new(vec![Bytes::from(vec![fork, height as u8])]),
        ..Default::default()
    };

    L2Block::new(
        height,
        parent_hash,
        1_700_000_000 + height * 12 + fork as u64,
        L1Origin {
            block_number: 100 + height,
            ..Default::default()
        },
        tree_roots,
        Vec::new(),
        vec![tx],
    )
}
