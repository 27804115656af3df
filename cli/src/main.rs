//! eventsync CLI: run a reorg-safe ingestion loop and manage its checkpoint.
//!
//! # Commands
//! ```text
//! eventsync run    --config eventsync.toml [--bytes-as-text]
//! eventsync status --config eventsync.toml [--json]
//! eventsync reset  --config eventsync.toml [--block <N>]
//! eventsync topic  --abi <path.json> --event <Name>
//! eventsync info
//! ```

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};

use eventsync_core::checkpoint::Checkpoint;
use eventsync_core::error::HandlerError;
use eventsync_core::handler::EventHandler;
use eventsync_core::indexer::IndexerConfig;
use eventsync_core::reorg::ReorgEvent;
use eventsync_core::types::DecodedEvent;
use eventsync_core::value::{encode_event_as, BytesFormat};
use eventsync_evm::{event_topic, parse_abi, HttpNodeClient, IngestionEngine};

mod config;
mod logging;

use config::AppConfig;

#[derive(Parser)]
#[command(
    name = "eventsync",
    about = "Reorg-safe EVM event ingestion",
    long_about = "
eventsync polls an EVM node, decodes the watched contract events and hands
them to handlers in chain order, surviving reorgs and restarts.

ENVIRONMENT VARIABLES:
  EVENTSYNC_RPC_URL   Node JSON-RPC URL (overrides `rpc_url` in the config)
  RUST_LOG            Log filter (overrides the [log] section)
",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest until Ctrl-C (or `to_block`), printing one JSON line per event
    Run {
        #[arg(short, long, default_value = "eventsync.toml")]
        config: PathBuf,
        /// Render bytes fields as NUL-stripped UTF-8 text where possible
        #[arg(long)]
        bytes_as_text: bool,
    },

    /// Show the stored checkpoint
    Status {
        #[arg(short, long, default_value = "eventsync.toml")]
        config: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Reset the checkpoint (required after a reorg deeper than the window)
    Reset {
        #[arg(short, long, default_value = "eventsync.toml")]
        config: PathBuf,
        /// Restart ingestion at this block instead of `from_block`
        #[arg(long)]
        block: Option<u64>,
    },

    /// Print the topic0 hash of an event in an ABI file
    Topic {
        /// Path to the ABI JSON file
        #[arg(long)]
        abi: PathBuf,
        /// Event name
        #[arg(long)]
        event: String,
    },

    /// Show eventsync build and default settings
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, bytes_as_text } => {
            let bytes = if bytes_as_text { BytesFormat::Text } else { BytesFormat::Hex };
            cmd_run(&config, bytes).await
        }
        Commands::Status { config, json } => cmd_status(&config, json).await,
        Commands::Reset { config, block } => cmd_reset(&config, block).await,
        Commands::Topic { abi, event } => cmd_topic(&abi, &event),
        Commands::Info => cmd_info(),
    }
}

// ─── Handlers ────────────────────────────────────────────────────────────────

/// Writes each delivered event to stdout as a single JSON line.
struct LogHandler {
    bytes: BytesFormat,
}

#[async_trait]
impl EventHandler for LogHandler {
    fn name(&self) -> &str {
        "stdout"
    }

    async fn handle(&self, event: &DecodedEvent) -> Result<(), HandlerError> {
        let line = serde_json::to_string(&encode_event_as(event, self.bytes)).map_err(|e| HandlerError::failed(e.to_string()))?;
        let mut out = std::io::stdout().lock();
        writeln!(out, "{line}").map_err(|e| HandlerError::failed(e.to_string()))
    }

    async fn on_reorg(&self, reorg: &ReorgEvent) -> Result<(), HandlerError> {
        let line = serde_json::json!({
            "reorg": {
                "fork_block": reorg.fork_block,
                "depth": reorg.depth,
                "ancestor": reorg.ancestor.number,
            }
        });
        let mut out = std::io::stdout().lock();
        writeln!(out, "{line}").map_err(|e| HandlerError::failed(e.to_string()))
    }
}

// ─── Command implementations ─────────────────────────────────────────────────

async fn cmd_run(path: &Path, bytes: BytesFormat) -> Result<()> {
    let config = AppConfig::load(path)?;
    logging::init_tracing(&config.log);

    let node = HttpNodeClient::new(
        config.rpc_url()?,
        Duration::from_millis(config.indexer.request_timeout_ms),
    )
    .context("create node client")?;
    let store = config.storage.open().await?;

    let mut engine = IngestionEngine::new(config.indexer.clone(), node, store)?;
    engine.add_handler(Arc::new(LogHandler { bytes }))?;
    for watch in &config.watch {
        let abi_json = std::fs::read_to_string(&watch.abi)
            .with_context(|| format!("read ABI file '{}'", watch.abi.display()))?;
        engine
            .watch_json(&watch.address, &abi_json, &watch.event)
            .with_context(|| format!("watch {} on {}", watch.event, watch.address))?;
    }

    engine
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Cannot listen for Ctrl-C");
            }
        })
        .await
        .context("ingestion stopped")?;
    Ok(())
}

async fn cmd_status(path: &Path, as_json: bool) -> Result<()> {
    let config = AppConfig::load(path)?;
    let store = config.storage.open().await?;
    let checkpoint = store.load(&config.indexer.chain, &config.indexer.id).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&checkpoint)?);
        return Ok(());
    }

    println!("Indexer:     {}/{}", config.indexer.chain, config.indexer.id);
    match checkpoint {
        None => println!("Checkpoint:  none (starts at block {})", config.indexer.from_block),
        Some(cp) => print_checkpoint(&cp),
    }
    Ok(())
}

fn print_checkpoint(cp: &Checkpoint) {
    match cp.last_block {
        Some(last) => println!("Last block:  {last}"),
        None => println!("Last block:  none"),
    }
    println!("Next block:  {}", cp.next_block());
    println!("Start block: {}", cp.start_block);
    match (cp.recent.first(), cp.recent.last()) {
        (Some(first), Some(last)) => {
            println!("Window:      {} blocks ({}..={})", cp.recent.len(), first.number, last.number);
            println!("Tip hash:    {}", last.hash);
        }
        _ => println!("Window:      empty"),
    }
    let updated = chrono::DateTime::from_timestamp(cp.updated_at, 0)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| cp.updated_at.to_string());
    println!("Updated:     {updated}");
}

async fn cmd_reset(path: &Path, block: Option<u64>) -> Result<()> {
    let config = AppConfig::load(path)?;
    let store = config.storage.open().await?;
    let (chain, id) = (&config.indexer.chain, &config.indexer.id);

    match block {
        Some(block) => {
            store.save(Checkpoint::genesis(chain.as_str(), id.as_str(), block)).await?;
            println!("Checkpoint for {chain}/{id} reset; ingestion restarts at block {block}");
        }
        None => {
            store.delete(chain, id).await?;
            println!(
                "Checkpoint for {chain}/{id} deleted; ingestion restarts at block {}",
                config.indexer.from_block
            );
        }
    }
    Ok(())
}

fn cmd_topic(abi_path: &Path, event: &str) -> Result<()> {
    let abi_json = std::fs::read_to_string(abi_path)
        .with_context(|| format!("read ABI file '{}'", abi_path.display()))?;
    let abi = parse_abi(&abi_json)?;
    println!("{}", event_topic(&abi, event)?);
    Ok(())
}

fn cmd_info() -> Result<()> {
    let defaults = IndexerConfig::default();
    println!("eventsync v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Defaults:");
    println!("  Confirmation depth:   {} blocks", defaults.confirmation_depth);
    println!("  Blocks per getLogs:   {}", defaults.max_block_range);
    println!("  Blocks per cycle:     {}", defaults.max_blocks_per_cycle);
    println!("  Poll interval:        {} ms", defaults.poll_interval_ms);
    println!("  Handler timeout:      {} ms", defaults.delivery.handler_timeout_ms);
    println!("  Required settings:    indexer.reorg_window, indexer.delivery.max_attempts");
    println!();
    println!("Storage backends:       file (JSON, atomic rename), sqlite (sqlx)");
    println!("Chains:                 any EVM JSON-RPC endpoint");
    Ok(())
}
