//! eventsync-evm: EVM ABI index, log fetcher, event decoder and the
//! ingestion engine.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use eventsync_core::MemoryCheckpointStore;
//! use eventsync_evm::{HttpNodeClient, IndexerBuilder, IngestionEngine};
//!
//! # async fn example(abi_json: &str) -> Result<(), Box<dyn std::error::Error>> {
//! let config = IndexerBuilder::new().reorg_window(64).max_attempts(5).build()?;
//! let node = HttpNodeClient::new("http://localhost:8545", Duration::from_secs(10))?;
//! let engine = IngestionEngine::new(config, node, Arc::new(MemoryCheckpointStore::new()))?;
//! engine.watch_json("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48", abi_json, "Transfer")?;
//! engine.run(async { let _ = tokio::signal::ctrl_c().await; }).await?;
//! # Ok(())
//! # }
//! ```

pub mod abi;
pub mod builder;
pub mod decoder;
pub mod engine;
pub mod fetcher;
pub mod normalizer;
pub mod rpc;

pub use abi::{event_topic, parse_abi, AbiIndex};
pub use builder::IndexerBuilder;
pub use decoder::EventDecoder;
pub use engine::{CycleOutcome, CycleReport, IngestionEngine};
pub use fetcher::LogFetcher;
pub use rpc::HttpNodeClient;
