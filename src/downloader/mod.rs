//! # L2 Block Downloader
//!
//! Keeps a local, strictly ordered view of the finalized L2 chain served by a
//! [BlockSource](crate::source::BlockSource).
//!
//! The download loop is spawned in a separate task and talks to its consumer
//! through a bounded channel exposed as a [BlockStream]. Blocks arrive in
//! height order without gaps. When the source reorganizes, the consumer first
//! receives a [BlockUpdate::Rollback] naming the common ancestor and then the
//! blocks of the new chain above it. A fatal error is delivered once, as the
//! last item of the stream.
//!
//! Dropping the [BlockStream] stops the task; dropping the
//! [L2BlockDownloader] aborts it.

use std::{
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use eyre::Result;
use futures::Stream;
use tokio::{
    spawn,
    sync::{mpsc, watch},
    task::JoinHandle,
};

use crate::{
    backend::BlockStore, config::DownloaderConfig, source::BlockSource, types::L2BlockContext,
};

mod errors;
pub use errors::{ErrorKind, SyncError};

mod frontier;
pub use frontier::SyncFrontier;

mod inner;
use inner::InnerDownloader;

mod reorder;
pub use reorder::ReorderBuffer;

mod retry;
pub use retry::Backoff;

mod state;
pub use state::SyncState;

mod unverified;
use unverified::UnverifiedDataPool;
pub use unverified::UnverifiedDataReader;

/// Updates delivered to the consumer
#[derive(Debug, Clone)]
pub enum BlockUpdate {
    /// The next block extending the local chain
    NewBlock(L2BlockContext),
    /// Every block above `common_ancestor` was discarded. The next block has
    /// height `common_ancestor + 1`.
    Rollback { common_ancestor: u64 },
}

/// Ordered stream of [BlockUpdate]s. Single consumer.
#[derive(Debug)]
pub struct BlockStream {
    receiver: mpsc::Receiver<Result<BlockUpdate, SyncError>>,
}

impl BlockStream {
    /// Receives the next update. Returns `None` once the downloader stopped.
    pub async fn recv(&mut self) -> Option<Result<BlockUpdate, SyncError>> {
        self.receiver.recv().await
    }

    /// Receives an update if one is ready
    pub fn try_recv(&mut self) -> Option<Result<BlockUpdate, SyncError>> {
        self.receiver.try_recv().ok()
    }
}

impl Stream for BlockStream {
    type Item = Result<BlockUpdate, SyncError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

/// Handle to the downloader task. When the handle is dropped, the task is
/// aborted.
pub struct L2BlockDownloader {
    /// Task handle for the download loop
    handle: Option<JoinHandle<()>>,
    source: Arc<dyn BlockSource>,
    store: Arc<dyn BlockStore>,
    config: DownloaderConfig,
    pool: UnverifiedDataPool,
    state: Arc<watch::Sender<SyncState>>,
}

impl Drop for L2BlockDownloader {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl L2BlockDownloader {
    /// Creates an idle downloader. Nothing is fetched until [L2BlockDownloader::start].
    ///
    /// Fails if `config` does not pass [DownloaderConfig::validate].
    pub fn new(
        source: Arc<dyn BlockSource>,
        store: Arc<dyn BlockStore>,
        config: DownloaderConfig,
    ) -> Result<Self> {
        config.validate()?;

        let (state, _) = watch::channel(SyncState::Idle);
        Ok(Self {
            handle: None,
            source,
            store,
            config,
            pool: UnverifiedDataPool::default(),
            state: Arc::new(state),
        })
    }

    /// Starts the download loop from the block store's last confirmed height
    /// and returns the stream of updates. A running loop is stopped first.
    pub async fn start(&mut self) -> BlockStream {
        self.stop().await;

        let (sender, receiver) = mpsc::channel(self.config.max_queue_size);
        let inner = InnerDownloader::new(
            self.source.clone(),
            self.store.clone(),
            self.config.clone(),
            self.pool.clone(),
            sender,
            self.state.clone(),
        );

        tracing::info!(target: "l2_sync", "starting downloader");
        self.state.send_replace(SyncState::Syncing);
        self.handle = Some(spawn(inner.run()));
        BlockStream { receiver }
    }

    /// Stops the current loop, typically after a fault, and starts a fresh
    /// one from the block store
    pub async fn restart(&mut self) -> BlockStream {
        tracing::info!(target: "l2_sync", state = %self.state(), "restarting downloader");
        self.start().await
    }

    /// Aborts the running loop and waits until it is gone, so it can no longer
    /// touch the block store or the unverified data pool
    async fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            let _ = handle.await;
        }
    }

    pub fn state(&self) -> SyncState {
        *self.state.borrow()
    }

    /// Watches state transitions
    pub fn subscribe_state(&self) -> watch::Receiver<SyncState> {
        self.state.subscribe()
    }

    /// True while the download task is alive
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().map_or(false, |h| !h.is_finished())
    }

    /// Read access to the unverified data of emitted blocks
    pub fn unverified_data(&self) -> UnverifiedDataReader {
        self.pool.reader()
    }
}
