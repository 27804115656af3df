//! `eventsync.toml` configuration file.
//!
//! ```toml
//! rpc_url = "http://localhost:8545"
//!
//! [indexer]
//! id = "usdc-transfers"
//! from_block = 19000000
//! reorg_window = 64
//!
//! [indexer.delivery]
//! max_attempts = 5
//!
//! [[watch]]
//! address = "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"
//! abi = "abi/erc20.json"
//! event = "Transfer"
//!
//! [storage]
//! kind = "sqlite"
//! path = "eventsync.db"
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use eventsync_core::checkpoint::CheckpointStore;
use eventsync_core::indexer::IndexerConfig;
use eventsync_storage::{FileCheckpointStore, SqliteCheckpointStore};

use crate::logging::LogConfig;

/// Environment variable that overrides `rpc_url`.
pub const RPC_URL_ENV: &str = "EVENTSYNC_RPC_URL";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// JSON-RPC endpoint of the node.
    #[serde(default)]
    pub rpc_url: Option<String>,
    pub indexer: IndexerConfig,
    #[serde(default)]
    pub watch: Vec<WatchConfig>,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub log: LogConfig,
}

/// One watched (contract, event) pair.
#[derive(Debug, Clone, Deserialize)]
pub struct WatchConfig {
    pub address: String,
    /// Path to the ABI JSON (bare array or compiler artifact), relative to
    /// the config file.
    pub abi: PathBuf,
    pub event: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StorageConfig {
    File { dir: PathBuf },
    Sqlite { path: PathBuf },
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::File {
            dir: PathBuf::from("checkpoints"),
        }
    }
}

impl StorageConfig {
    fn resolve(&mut self, base: &Path) {
        match self {
            Self::File { dir } => *dir = base.join(&*dir),
            Self::Sqlite { path } => *path = base.join(&*path),
        }
    }

    /// Open the configured checkpoint store.
    pub async fn open(&self) -> Result<Arc<dyn CheckpointStore>> {
        Ok(match self {
            Self::File { dir } => Arc::new(
                FileCheckpointStore::open(dir)
                    .await
                    .with_context(|| format!("open checkpoint dir '{}'", dir.display()))?,
            ),
            Self::Sqlite { path } => {
                let path_str = path
                    .to_str()
                    .with_context(|| format!("non-UTF-8 database path '{}'", path.display()))?;
                Arc::new(
                    SqliteCheckpointStore::open(path_str)
                        .await
                        .with_context(|| format!("open database '{}'", path.display()))?,
                )
            }
        })
    }
}

impl AppConfig {
    /// Read and validate a config file. Relative paths inside it resolve
    /// against the file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config file '{}'", path.display()))?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Self::parse(&text, base, std::env::var(RPC_URL_ENV).ok())
            .with_context(|| format!("invalid config file '{}'", path.display()))
    }

    /// Parse config text. `rpc_override` (from the environment) replaces
    /// `rpc_url` when set.
    pub fn parse(text: &str, base: &Path, rpc_override: Option<String>) -> Result<Self> {
        let mut config: AppConfig = toml::from_str(text)?;
        if let Some(url) = rpc_override.filter(|u| !u.is_empty()) {
            config.rpc_url = Some(url);
        }
        for watch in &mut config.watch {
            watch.abi = base.join(&watch.abi);
        }
        config.storage.resolve(base);
        config.indexer.validate()?;
        Ok(config)
    }

    /// The node URL, which `run` cannot do without.
    pub fn rpc_url(&self) -> Result<&str> {
        match self.rpc_url.as_deref() {
            Some(url) if !url.is_empty() => Ok(url),
            _ => bail!("no node URL: set `rpc_url` or {RPC_URL_ENV}"),
        }
    }
}
