use std::{collections::BTreeSet, future::Future, sync::Arc, time::Duration};

use bytes::Bytes;
use futures::{stream, stream::BoxStream, StreamExt};
use tokio::{
    sync::{mpsc, watch},
    time::{sleep, timeout},
};

use crate::{
    backend::BlockStore,
    codec,
    config::{BackoffConfig, DownloaderConfig},
    source::{BlockSource, HeightRange, SourceError},
    telemetry::metrics::{LATEST_HEIGHT, REORGS, RETRIES, SYNC_HEIGHT, SYNC_STATE},
    types::{L2Block, L2BlockContext},
};

use super::{
    frontier::SyncFrontier, reorder::ReorderBuffer, retry::Backoff,
    unverified::UnverifiedDataPool, BlockUpdate, ErrorKind, SyncError, SyncState,
};

pub(super) type UpdateSender = mpsc::Sender<Result<BlockUpdate, SyncError>>;

/// Result of one fetch round
#[derive(Debug, PartialEq, Eq)]
enum Round {
    /// At least one block was emitted
    Progress,
    /// The source had nothing to serve yet
    Stalled,
    /// A fetched block does not extend the local tip
    Diverged,
}

/// Issues source calls with timeouts and retries. Every wait is raced against
/// the consumer going away.
#[derive(Clone)]
struct Fetcher {
    source: Arc<dyn BlockSource>,
    sender: UpdateSender,
    request_timeout: Duration,
    backoff: BackoffConfig,
}

impl Fetcher {
    async fn call<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, SyncError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SourceError>>,
    {
        let mut backoff = Backoff::new(&self.backoff);

        loop {
            let attempt = backoff.retries() + 1;
            let result = tokio::select! {
                _ = self.sender.closed() => return Err(SyncError::Cancelled),
                res = timeout(self.request_timeout, op()) => {
                    res.unwrap_or(Err(SourceError::Timeout(self.request_timeout)))
                }
            };

            let err = match result {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !err.is_transient() {
                return Err(SyncError::Source(err));
            }

            let kind = ErrorKind::from(&err);
            let Some(delay) = backoff.next_delay() else {
                return Err(SyncError::RetriesExhausted {
                    attempts: attempt,
                    source: err,
                });
            };

            RETRIES.inc();
            tracing::warn!(
                target: "l2_sync",
                attempt,
                kind = %kind,
                delay_ms = delay.as_millis() as u64,
                "{} failed: {}",
                what,
                err
            );

            tokio::select! {
                _ = self.sender.closed() => return Err(SyncError::Cancelled),
                _ = sleep(delay) => {}
            }
        }
    }

    async fn latest_height(&self) -> Result<u64, SyncError> {
        let source = &self.source;
        self.call("latest height", move || source.latest_height()).await
    }

    async fn raw_blocks(&self, from: u64, to: u64) -> Result<Vec<Bytes>, SyncError> {
        let source = &self.source;
        self.call("get blocks", move || async move {
            match source.get_blocks(from, to).await {
                Err(SourceError::PartialRange { received }) => Ok(received),
                other => other,
            }
        })
        .await
    }

    /// Fetches and decodes a chunk, re-requesting the remainder after a
    /// partial answer. Stops early once the source returns nothing. On failure
    /// the blocks decoded so far are returned along with the error.
    async fn fetch_chunk(&self, range: HeightRange) -> (Vec<L2Block>, Option<SyncError>) {
        let mut blocks = Vec::new();
        let mut from = range.from;

        while from <= range.to {
            let wanted = HeightRange::new(from, range.to).len();
            let raw = match self.raw_blocks(from, range.to).await {
                Ok(raw) if raw.is_empty() => break,
                Ok(raw) => raw,
                Err(err) => return (blocks, Some(err)),
            };

            let received = (raw.len() as u64).min(wanted);
            if received < wanted {
                tracing::debug!(
                    target: "l2_sync",
                    range = %HeightRange::new(from, range.to),
                    received,
                    "partial range"
                );
            }

            for (height, bytes) in (from..).zip(raw.iter().take(received as usize)) {
                match decode_at(height, bytes) {
                    Ok(block) => blocks.push(block),
                    Err(err) => return (blocks, Some(err)),
                }
            }
            from += received;
        }

        (blocks, None)
    }

    /// The remote block at `height`, if the source has one
    async fn fetch_block(&self, height: u64) -> Result<Option<L2Block>, SyncError> {
        let raw = self.raw_blocks(height, height).await?;
        raw.first().map(|bytes| decode_at(height, bytes)).transpose()
    }
}

fn decode_at(height: u64, bytes: &[u8]) -> Result<L2Block, SyncError> {
    let block =
        codec::decode_block(bytes).map_err(|source| SyncError::Decode { height, source })?;
    if block.height() != height {
        return Err(SyncError::UnexpectedHeight {
            expected: height,
            actual: block.height(),
        });
    }
    Ok(block)
}

/// The downloader task. Owns the sync frontier; everything it learns reaches
/// the consumer through the update channel.
pub(super) struct InnerDownloader {
    config: DownloaderConfig,
    fetcher: Fetcher,
    store: Arc<dyn BlockStore>,
    pool: UnverifiedDataPool,
    sender: UpdateSender,
    state: Arc<watch::Sender<SyncState>>,
    frontier: SyncFrontier,
    buffer: ReorderBuffer,
    subscription: Option<BoxStream<'static, u64>>,
}

impl InnerDownloader {
    pub(super) fn new(
        source: Arc<dyn BlockSource>,
        store: Arc<dyn BlockStore>,
        config: DownloaderConfig,
        pool: UnverifiedDataPool,
        sender: UpdateSender,
        state: Arc<watch::Sender<SyncState>>,
    ) -> Self {
        let fetcher = Fetcher {
            source,
            sender: sender.clone(),
            request_timeout: config.request_timeout(),
            backoff: config.backoff.clone(),
        };
        let capacity =
            usize::try_from(config.max_reorg_depth.saturating_add(1)).unwrap_or(usize::MAX);
        let frontier = SyncFrontier::new(config.initial_height, capacity);
        let buffer = ReorderBuffer::new(frontier.height() + 1);

        Self {
            config,
            fetcher,
            store,
            pool,
            sender,
            state,
            frontier,
            buffer,
            subscription: None,
        }
    }

    /// Runs until the consumer goes away or a fatal error occurs. A fatal
    /// error is delivered to the consumer as the last update.
    pub(super) async fn run(mut self) {
        self.set_state(SyncState::Syncing);

        let err = match self.seed().await {
            Ok(()) => self.sync_loop().await,
            Err(err) => err,
        };

        if let SyncError::Cancelled = err {
            tracing::debug!(target: "l2_sync", "block stream closed, stopping downloader");
            return;
        }

        tracing::error!(target: "l2_sync", kind = %err.kind(), "downloader faulted: {}", err);
        self.set_state(SyncState::Faulted);
        let _ = self.sender.send(Err(err)).await;
    }

    /// Restores the frontier from the block store
    async fn seed(&mut self) -> Result<(), SyncError> {
        let Some(last) = self.store.load_last_confirmed_height().await? else {
            return Ok(());
        };

        let first = last
            .saturating_sub(self.config.max_reorg_depth)
            .max(self.frontier.floor() + 1);
        for height in first..=last {
            if let Some(block) = self.store.load_block(height).await? {
                self.frontier.push(block.header);
            }
        }

        let pruned = self.pool.discard_above(self.frontier.height());
        self.buffer.reset(self.frontier.height() + 1);
        SYNC_HEIGHT.set(self.frontier.height() as i64);
        tracing::info!(
            target: "l2_sync",
            height = self.frontier.height(),
            headers = self.frontier.len(),
            pruned,
            "resuming from block store"
        );
        Ok(())
    }

    async fn sync_loop(&mut self) -> SyncError {
        loop {
            if let Err(err) = self.step().await {
                return err;
            }
        }
    }

    async fn step(&mut self) -> Result<(), SyncError> {
        let latest = self.fetcher.latest_height().await?;
        LATEST_HEIGHT.set(latest as i64);

        let local = self.frontier.height();
        if latest < local {
            tracing::info!(target: "l2_sync", latest, local, "source is behind the local tip");
            return self.reorg().await;
        }

        if latest == local {
            self.set_state(SyncState::Synced);
            return self.wait_for_blocks().await;
        }

        self.set_state(SyncState::Syncing);
        let to = latest.min(local.saturating_add(self.config.round_size()));
        match self.sync_round(HeightRange::new(local + 1, to)).await? {
            Round::Progress => Ok(()),
            Round::Stalled => self.wait_for_blocks().await,
            Round::Diverged => self.reorg().await,
        }
    }

    /// Fetches `range` in concurrent chunks and emits every block that
    /// becomes contiguous with the tip
    async fn sync_round(&mut self, range: HeightRange) -> Result<Round, SyncError> {
        tracing::debug!(target: "l2_sync", range = %range, "fetching blocks");
        let start = self.frontier.height();
        self.buffer.reset(range.from);

        let chunks: Vec<HeightRange> = range.chunks(self.config.batch_size).collect();
        let mut outstanding: BTreeSet<u64> = chunks.iter().map(|c| c.from).collect();

        let fetcher = &self.fetcher.clone();
        let mut fetches = stream::iter(chunks)
            .map(move |chunk| async move { (chunk, fetcher.fetch_chunk(chunk).await) })
            .buffer_unordered(self.config.concurrency);

        // Lowest failing height and its error. Chunks below it keep running so
        // their blocks are still emitted before the fault.
        let mut failure: Option<(u64, SyncError)> = None;
        while let Some((chunk, (blocks, error))) = fetches.next().await {
            outstanding.remove(&chunk.from);
            let reached = chunk.from + blocks.len() as u64;
            for block in blocks {
                self.buffer.insert(block);
            }

            match error {
                Some(SyncError::Cancelled) => return Err(SyncError::Cancelled),
                Some(err) if failure.as_ref().map_or(true, |(at, _)| reached < *at) => {
                    failure = Some((reached, err));
                }
                _ => {}
            }

            if let Some((at, _)) = &failure {
                if outstanding.iter().next().map_or(true, |from| from >= at) {
                    break;
                }
            }
        }
        drop(fetches);

        let linked = self.release_ready().await;
        self.buffer.reset(self.frontier.height() + 1);

        // A cancelled or failed emission outranks the fetch failure
        let linked = linked?;
        if let Some((_, err)) = failure {
            return Err(err);
        }

        Ok(if !linked {
            Round::Diverged
        } else if self.frontier.height() == start {
            Round::Stalled
        } else {
            Round::Progress
        })
    }

    /// Emits buffered blocks in height order. Returns false once a block does
    /// not extend the tip.
    async fn release_ready(&mut self) -> Result<bool, SyncError> {
        while let Some(block) = self.buffer.pop_ready() {
            if let Some(tip) = self.frontier.tip() {
                if !block.header.is_immediate_successor_of(tip) {
                    tracing::warn!(
                        target: "l2_sync",
                        tip = %tip,
                        block = %block.header,
                        "block does not extend the local tip"
                    );
                    return Ok(false);
                }
            }

            self.commit(block).await?;
        }

        Ok(true)
    }

    /// Checkpoints a block, indexes its unverified data and hands it to the
    /// consumer
    async fn commit(&mut self, block: L2Block) -> Result<(), SyncError> {
        self.store.persist_block(&block).await?;

        let context = L2BlockContext::new(Arc::new(block));
        let height = context.height();
        self.pool.insert_block(&context);
        self.frontier.push(*context.header());
        SYNC_HEIGHT.set(height as i64);

        self.send(BlockUpdate::NewBlock(context)).await?;

        if let Some(expired) = height.checked_sub(self.config.unverified_retention) {
            self.pool.prune_through(expired);
        }
        Ok(())
    }

    async fn reorg(&mut self) -> Result<(), SyncError> {
        self.set_state(SyncState::Reorging);
        let tip = self.frontier.height();
        let ancestor = self.find_common_ancestor(tip).await?;

        if ancestor == tip {
            tracing::warn!(
                target: "l2_sync",
                tip,
                "source agrees with the local tip but does not extend it"
            );
            self.set_state(SyncState::Synced);
            return self.wait_for_blocks().await;
        }

        self.frontier.rollback_to(ancestor);
        self.store.rollback_to(ancestor).await?;
        let discarded = self.pool.discard_above(ancestor);
        self.buffer.reset(ancestor + 1);
        REORGS.inc();
        SYNC_HEIGHT.set(ancestor as i64);

        tracing::info!(
            target: "l2_sync",
            common_ancestor = ancestor,
            depth = tip - ancestor,
            discarded,
            "rolled back to common ancestor"
        );

        self.send(BlockUpdate::Rollback {
            common_ancestor: ancestor,
        })
        .await?;
        self.set_state(SyncState::Syncing);
        Ok(())
    }

    /// Walks down from `tip` until the local and remote hashes agree
    async fn find_common_ancestor(&mut self, tip: u64) -> Result<u64, SyncError> {
        let max = self.config.max_reorg_depth;
        let mut height = tip;

        loop {
            let depth = tip - height;
            if depth > max {
                return Err(SyncError::ReorgDepthExceeded { depth, max });
            }
            if height == self.frontier.floor() {
                return Ok(height);
            }

            let local = self
                .frontier
                .header_at(height)
                .ok_or(SyncError::ReorgDepthExceeded { depth, max })?;
            let remote = self.fetcher.fetch_block(height).await?;

            if remote.map(|b| b.hash()) == Some(local.hash) {
                return Ok(height);
            }

            tracing::debug!(target: "l2_sync", height, "local block not on the source chain");
            height -= 1;
        }
    }

    /// Waits for a subscription notification or the poll interval
    async fn wait_for_blocks(&mut self) -> Result<(), SyncError> {
        if self.subscription.is_none() {
            self.subscription = self.fetcher.source.subscribe();
        }

        let poll = sleep(self.config.poll_interval());
        let ended = match self.subscription.as_mut() {
            Some(subscription) => tokio::select! {
                _ = self.sender.closed() => return Err(SyncError::Cancelled),
                _ = poll => false,
                next = subscription.next() => next.is_none(),
            },
            None => tokio::select! {
                _ = self.sender.closed() => return Err(SyncError::Cancelled),
                _ = poll => false,
            },
        };

        if ended {
            tracing::debug!(target: "l2_sync", "subscription ended");
            self.subscription = None;
        }
        Ok(())
    }

    async fn send(&mut self, update: BlockUpdate) -> Result<(), SyncError> {
        self.sender
            .send(Ok(update))
            .await
            .map_err(|_| SyncError::Cancelled)
    }

    fn set_state(&self, state: SyncState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            SYNC_STATE.set(state.as_i64());
            tracing::info!(target: "l2_sync", from = %previous, to = %state, "sync state changed");
        }
    }
}
