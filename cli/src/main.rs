//! ChainSync CLI.
//!
//! # Commands
//! ```bash
//! chainsync run     --config chainsync.yaml [--chain-rpc <url>] [--app-rpc <url>] [--storage <target>]
//! chainsync status  --config chainsync.yaml [--json]
//! chainsync version
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use chainsync_core::EventHandler;
use chainsync_engine::{SyncConfig, SyncManager};
use chainsync_observability::init_tracing;
use chainsync_rpc::{ChainRpc, HttpChainClient};
use chainsync_storage::open_handler;

#[derive(Parser)]
#[command(
    name = "chainsync",
    about = "Cosmos / Tendermint indexer — ChainSync CLI",
    long_about = "
ChainSync CLI: index a Cosmos SDK chain height by height into an event store.

ENVIRONMENT VARIABLES:
  CHAINSYNC_CONFIG      Path to the YAML config file
  CHAINSYNC_CHAIN_RPC   Tendermint RPC URL
  CHAINSYNC_APP_RPC     Cosmos SDK REST URL
  CHAINSYNC_STORAGE     memory | sqlite:<path> | postgres://...
  RUST_LOG              Log filter, overrides the config file
",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the indexer until Ctrl-C
    Run {
        #[command(flatten)]
        config: ConfigArgs,
        /// Heights fetched concurrently
        #[arg(long)]
        window_size: Option<u64>,
        /// First height indexed after genesis
        #[arg(long)]
        starting_height: Option<u64>,
        /// Emit JSON logs
        #[arg(long)]
        json_logs: bool,
    },

    /// Show the node's latest height and the handler cursor
    Status {
        #[command(flatten)]
        config: ConfigArgs,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print version
    Version,
}

#[derive(Args)]
struct ConfigArgs {
    /// YAML config file (defaults apply when omitted)
    #[arg(short, long, env = "CHAINSYNC_CONFIG")]
    config: Option<PathBuf>,
    #[arg(long, env = "CHAINSYNC_CHAIN_RPC")]
    chain_rpc: Option<String>,
    #[arg(long, env = "CHAINSYNC_APP_RPC")]
    app_rpc: Option<String>,
    #[arg(long, env = "CHAINSYNC_STORAGE")]
    storage: Option<String>,
    /// Handler ID (cursor key)
    #[arg(long)]
    handler_id: Option<String>,
}

impl ConfigArgs {
    fn load(&self) -> Result<SyncConfig> {
        let mut config = match &self.config {
            Some(path) => SyncConfig::from_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => SyncConfig::default(),
        };
        if let Some(url) = &self.chain_rpc {
            config.chain_rpc_url = url.clone();
        }
        if let Some(url) = &self.app_rpc {
            config.app_rpc_url = url.clone();
        }
        if let Some(storage) = &self.storage {
            config.storage = storage.clone();
        }
        if let Some(id) = &self.handler_id {
            config.handler_id = id.clone();
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            window_size,
            starting_height,
            json_logs,
        } => {
            let mut config = config.load()?;
            if let Some(w) = window_size {
                config.window_size = w;
            }
            if let Some(h) = starting_height {
                config.starting_block_height = h;
            }
            config.log.json |= json_logs;
            cmd_run(config).await
        }

        Commands::Status { config, json } => cmd_status(config.load()?, json).await,

        Commands::Version => {
            println!("chainsync {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

// ─── Command implementations ─────────────────────────────────────────────────

async fn cmd_run(config: SyncConfig) -> Result<()> {
    init_tracing(&config.log);
    config.validate()?;

    let manager = SyncManager::from_config(config)
        .await
        .context("starting sync manager")?;
    let metrics = manager.metrics();

    manager
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
            tracing::info!("shutdown requested");
        })
        .await;

    let stats = metrics.snapshot();
    tracing::info!(
        heights = stats.heights_synced,
        events = stats.events_handled,
        failures = stats.sync_failures,
        last_height = stats.last_synced_height,
        "indexer stopped"
    );
    Ok(())
}

async fn cmd_status(config: SyncConfig, as_json: bool) -> Result<()> {
    config.validate()?;

    let chain = HttpChainClient::new(&config.chain_rpc_url, config.http_config())
        .context("invalid chain RPC URL")?;
    let status = chain
        .status()
        .await
        .with_context(|| format!("querying {}", config.chain_rpc_url))?;

    let handler = open_handler(&config.storage_target()?, &config.handler_id).await?;
    let cursor = handler.last_handled_event_height().await?;
    let behind = cursor.map_or(status.latest_block_height + 1, |c| {
        status.latest_block_height.saturating_sub(c)
    });

    if as_json {
        let out = serde_json::json!({
            "network": status.network,
            "latest_height": status.latest_block_height,
            "latest_time": status.latest_block_time,
            "catching_up": status.catching_up,
            "handler_id": config.handler_id,
            "last_handled_height": cursor,
            "heights_behind": behind,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("Network:        {}", status.network);
        println!(
            "Latest height:  {} ({})",
            status.latest_block_height, status.latest_block_time
        );
        if status.catching_up {
            println!("                node is catching up");
        }
        println!("Handler:        {} ({})", config.handler_id, config.storage);
        match cursor {
            Some(h) => println!("Last handled:   {h}"),
            None => println!("Last handled:   nothing yet"),
        }
        println!("Behind:         {behind}");
    }
    Ok(())
}
