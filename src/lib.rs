/// Common types and functions
pub mod common;

/// The rollup's block, transaction and message model
pub mod types;

/// Binary encoding of blocks, transactions and messages
pub mod codec;

/// Sources of raw L2 blocks
pub mod source;

/// Persistence of confirmed blocks
pub mod backend;

/// The block downloader keeping the local chain in sync with a source
pub mod downloader;

/// Configuration management
pub mod config;

/// Application telemetry and logging
pub mod telemetry;
