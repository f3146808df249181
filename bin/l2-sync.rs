use std::{collections::HashMap, path::PathBuf, sync::Arc};

use clap::Parser;
use dirs::home_dir;
use eyre::Result;
use figment::{
    providers::Serialized,
    value::{Dict, Tag, Value},
};
use futures::StreamExt;

use l2_sync::{
    backend::SledBlockStore,
    config::Config,
    downloader::{BlockUpdate, L2BlockDownloader},
    source::HttpBlockSource,
    telemetry,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init(cli.verbose)?;
    telemetry::register_shutdown()?;

    let config = cli.to_config()?;
    telemetry::init_metrics(config.metrics_addr)?;

    if let Err(err) = run(config).await {
        tracing::error!(target: "l2_sync", "{}", err);
        std::process::exit(1);
    }

    Ok(())
}

async fn run(config: Config) -> Result<()> {
    let source = HttpBlockSource::new(
        &config.source_rpc_url,
        config.downloader.request_timeout(),
    )?;

    let db_location = config
        .db_location
        .clone()
        .unwrap_or_else(|| PathBuf::from(SledBlockStore::fallback_location()));
    let store = SledBlockStore::new(&db_location)?;

    tracing::info!(
        target: "l2_sync",
        source = %config.source_rpc_url,
        db = %db_location.display(),
        "starting sync"
    );

    let mut downloader =
        L2BlockDownloader::new(Arc::new(source), Arc::new(store), config.downloader)?;
    let mut updates = downloader.start().await;

    while let Some(update) = updates.next().await {
        match update? {
            BlockUpdate::NewBlock(ctx) => {
                let unverified = downloader.unverified_data().for_block(ctx.height()).len();
                tracing::info!(
                    target: "l2_sync",
                    height = ctx.height(),
                    hash = %ctx.header().hash,
                    txs = ctx.block().txs.len(),
                    messages = ctx.block().l1_to_l2_messages.len(),
                    unverified,
                    "new block"
                );
            }
            BlockUpdate::Rollback { common_ancestor } => {
                tracing::warn!(target: "l2_sync", common_ancestor, "chain rolled back");
            }
        }
    }

    Ok(())
}

#[derive(Parser)]
#[clap(version, about = "Follows the finalized L2 chain served by an archiver")]
pub struct Cli {
    /// JSON-RPC endpoint of the archiver
    #[clap(short = 'u', long, env = "L2SYNC_SOURCE_RPC_URL")]
    source_rpc_url: Option<String>,
    #[clap(long)]
    db_location: Option<String>,
    /// Config file, defaults to ~/.l2-sync/l2-sync.toml
    #[clap(short, long)]
    config: Option<PathBuf>,
    #[clap(long)]
    metrics_addr: Option<String>,
    #[clap(long)]
    initial_height: Option<u64>,
    #[clap(short, long)]
    verbose: bool,
}

impl Cli {
    pub fn to_config(&self) -> Result<Config> {
        let config_path = match &self.config {
            Some(path) => path.clone(),
            None => home_dir()
                .ok_or(eyre::eyre!("could not locate home directory"))?
                .join(".l2-sync/l2-sync.toml"),
        };

        Config::new(&config_path, self.as_provider())
    }

    pub fn as_provider(&self) -> Serialized<HashMap<&str, Value>> {
        let mut user_dict = HashMap::new();

        if let Some(url) = &self.source_rpc_url {
            user_dict.insert("source_rpc_url", Value::from(url.clone()));
        }

        if let Some(db_loc) = &self.db_location {
            user_dict.insert("db_location", Value::from(db_loc.clone()));
        }

        if let Some(addr) = &self.metrics_addr {
            user_dict.insert("metrics_addr", Value::from(addr.clone()));
        }

        if let Some(height) = self.initial_height {
            let mut downloader = Dict::new();
            downloader.insert("initial_height".to_string(), Value::from(height));
            user_dict.insert("downloader", Value::Dict(Tag::Default, downloader));
        }

        Serialized::from(user_dict, "default".to_string())
    }
}
