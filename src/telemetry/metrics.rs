//! Prometheus Metrics Module.

use std::net::SocketAddr;

use eyre::Result;
use lazy_static::lazy_static;
use prometheus_exporter::{
    prometheus::{register_int_gauge, IntGauge},
    start,
};

lazy_static! {
    /// Height of the most recent block handed to the consumer.
    pub static ref SYNC_HEIGHT: IntGauge =
        register_int_gauge!("l2_sync_height", "last emitted block height").unwrap();
    /// Latest height reported by the block source.
    pub static ref LATEST_HEIGHT: IntGauge =
        register_int_gauge!("l2_sync_latest_height", "latest source block height").unwrap();
    /// Current downloader state, see `SyncState`.
    pub static ref SYNC_STATE: IntGauge =
        register_int_gauge!("l2_sync_state", "downloader state").unwrap();
    /// Rollbacks performed since startup.
    pub static ref REORGS: IntGauge =
        register_int_gauge!("l2_sync_reorgs", "rollbacks performed").unwrap();
    /// Failed source calls that were retried.
    pub static ref RETRIES: IntGauge =
        register_int_gauge!("l2_sync_retries", "retried source calls").unwrap();
}

/// Starts the metrics server on `addr`
pub fn init(addr: SocketAddr) -> Result<()> {
    match start(addr) {
        Ok(_) => Ok(()),
        Err(e) => Err(eyre::eyre!(e)),
    }
}
