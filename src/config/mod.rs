use std::{net::SocketAddr, path::Path, path::PathBuf, time::Duration};

use eyre::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment, Provider,
};
use serde::{Deserialize, Serialize};

/// Prefix of environment variables overriding config values. Nested keys are
/// separated by `__`, e.g. `L2SYNC_DOWNLOADER__BATCH_SIZE`.
pub const ENV_PREFIX: &str = "L2SYNC_";

/// Sync node configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// JSON-RPC endpoint of the archiver serving L2 blocks
    pub source_rpc_url: String,
    /// Location of the block store. `None` selects a temporary location.
    pub db_location: Option<PathBuf>,
    /// Address the prometheus exporter listens on
    pub metrics_addr: SocketAddr,
    pub downloader: DownloaderConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_rpc_url: "http://127.0.0.1:8080".to_string(),
            db_location: None,
            metrics_addr: SocketAddr::from(([0, 0, 0, 0], 9200)),
            downloader: DownloaderConfig::default(),
        }
    }
}

impl Config {
    /// Loads the config from defaults, then the toml file, then `L2SYNC_`
    /// environment variables, then the cli provider. Later sources win.
    pub fn new(toml_file_path: &Path, cli_provider: impl Provider) -> Result<Self> {
        let config = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(toml_file_path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .merge(cli_provider)
            .extract::<Config>()?;

        config.downloader.validate()?;
        Ok(config)
    }
}

/// Block downloader tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloaderConfig {
    /// First height to sync when the block store is empty
    pub initial_height: u64,
    /// Heights requested per `get_blocks` call
    pub batch_size: u64,
    /// Chunks fetched in parallel
    pub concurrency: usize,
    /// Updates buffered for the consumer before the downloader blocks
    pub max_queue_size: usize,
    pub poll_interval_ms: u64,
    /// Upper bound on a single source call
    pub request_timeout_ms: u64,
    /// Deepest rollback handled before faulting
    pub max_reorg_depth: u64,
    /// Blocks for which unverified data is kept after emission
    pub unverified_retention: u64,
    pub backoff: BackoffConfig,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            initial_height: 1,
            batch_size: 32,
            concurrency: 4,
            max_queue_size: 64,
            poll_interval_ms: 1_000,
            request_timeout_ms: 10_000,
            max_reorg_depth: 64,
            unverified_retention: 128,
            backoff: BackoffConfig::default(),
        }
    }
}

impl DownloaderConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Most heights requested in one sync round
    pub fn round_size(&self) -> u64 {
        self.batch_size.saturating_mul(self.concurrency as u64)
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            eyre::bail!("batch_size must be positive");
        }
        if self.concurrency == 0 {
            eyre::bail!("concurrency must be positive");
        }
        if self.max_queue_size == 0 {
            eyre::bail!("max_queue_size must be positive");
        }
        self.backoff.validate()
    }
}

/// Exponential backoff applied to failed source calls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    pub initial_delay_ms: u64,
    pub multiplier: f64,
    pub max_delay_ms: u64,
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Proportional jitter in `[0, 1]`. Each delay is scaled by a random
    /// factor in `[1 - jitter, 1 + jitter]`.
    pub jitter: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 1_000,
            multiplier: 2.0,
            max_delay_ms: 60_000,
            max_retries: 5,
            jitter: 0.1,
        }
    }
}

impl BackoffConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            eyre::bail!("backoff multiplier must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            eyre::bail!("backoff jitter must be within [0, 1]");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, path::Path};

    use figment::{providers::Serialized, value::Value};
    use serde_json::json;

    use super::{BackoffConfig, Config, DownloaderConfig};

    #[test]
    fn test_cli_overrides_defaults() {
        let mut cli = HashMap::new();
        cli.insert("source_rpc_url", Value::from("http://archiver:9000".to_string()));
        let provider = Serialized::from(cli, "default".to_string());

        let config = Config::new(Path::new("/nonexistent/l2-sync.toml"), provider).unwrap();
        assert_eq!(config.source_rpc_url, "http://archiver:9000");
        assert_eq!(config.downloader, DownloaderConfig::default());
    }

    #[test]
    fn test_nested_override() {
        let provider = Serialized::default("downloader", json!({ "batch_size": 8 }));
        let config = Config::new(Path::new("/nonexistent/l2-sync.toml"), provider).unwrap();
        assert_eq!(config.downloader.batch_size, 8);
        assert_eq!(config.downloader.round_size(), 32);
    }

    #[test]
    fn test_invalid_downloader_config() {
        let provider = Serialized::default("downloader", json!({ "concurrency": 0 }));
        assert!(Config::new(Path::new("/nonexistent/l2-sync.toml"), provider).is_err());

        let backoff = BackoffConfig {
            jitter: 1.5,
            ..Default::default()
        };
        assert!(backoff.validate().is_err());
    }
}
