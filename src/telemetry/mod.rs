//! Telemetry module
//!
//! This module encompasses telemetry and logging.
//! Core components are described below.
//!
//! ### Logging
//!
//! Logging is constructed using the [tracing](https://crates.io/crates/tracing) crate.
//! The `tracing` crate is a framework for instrumenting Rust programs to collect
//! structured, event-based diagnostic information. You can use the [crate::telemetry::init] function
//! to initialize a global logger, passing in a boolean `verbose` parameter. This function
//! will return an error if a logger has already been initialized.
//!
//! ### Metrics
//!
//! Metrics are collected using the [prometheus](https://crates.io/crates/prometheus) crate
//! and served by [prometheus_exporter] once [crate::telemetry::init_metrics] is called.

pub mod logging;
pub use logging::{get_subscriber, init, init_subscriber, AnsiTermLayer, AnsiVisitor};

pub mod metrics;
pub use metrics::{
    init as init_metrics, LATEST_HEIGHT, REORGS, RETRIES, SYNC_HEIGHT, SYNC_STATE,
};

mod shutdown;
pub use shutdown::register_shutdown;
