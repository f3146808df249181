use std::fmt;

/// Lifecycle of the downloader task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SyncState {
    /// Not started yet
    #[default]
    Idle = 0,
    /// Fetching blocks above the local tip
    Syncing = 1,
    /// Caught up with the source, waiting for new blocks
    Synced = 2,
    /// Searching for the common ancestor with the source chain
    Reorging = 3,
    /// Stopped after a fatal error. Only a restart leaves this state.
    Faulted = 4,
}

impl SyncState {
    pub fn is_faulted(&self) -> bool {
        matches!(self, SyncState::Faulted)
    }

    /// Gauge value exported to prometheus
    pub fn as_i64(&self) -> i64 {
        *self as i64
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncState::Idle => "idle",
            SyncState::Syncing => "syncing",
            SyncState::Synced => "synced",
            SyncState::Reorging => "reorging",
            SyncState::Faulted => "faulted",
        };
        f.write_str(name)
    }
}
