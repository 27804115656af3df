//! Indexer configuration and runtime state.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::IndexerError;
use crate::retry::RetryConfig;

/// Handler delivery policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Attempts per (handler, event) across all cycles before the delivery is
    /// abandoned with an alert. Required; there is no safe default.
    pub max_attempts: u32,
    /// Timeout for a single handler invocation.
    #[serde(default = "default_handler_timeout_ms")]
    pub handler_timeout_ms: u64,
    /// Backoff between attempts within one cycle.
    #[serde(default = "default_delivery_retry")]
    pub retry: RetryConfig,
}

fn default_handler_timeout_ms() -> u64 {
    30_000
}

fn default_delivery_retry() -> RetryConfig {
    RetryConfig {
        max_retries: 2,
        initial_backoff_ms: 100,
        max_backoff_ms: 2_000,
        multiplier: 2.0,
    }
}

impl DeliveryConfig {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            handler_timeout_ms: default_handler_timeout_ms(),
            retry: default_delivery_retry(),
        }
    }

    pub fn handler_timeout(&self) -> Duration {
        Duration::from_millis(self.handler_timeout_ms)
    }
}

impl Default for DeliveryConfig {
    /// `max_attempts` is left at `0` (unset) and rejected by
    /// [`IndexerConfig::validate`].
    fn default() -> Self {
        Self::new(0)
    }
}

/// Configuration for an indexer instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexerConfig {
    /// Unique name for this indexer (used for checkpoint keys).
    #[serde(default = "default_id")]
    pub id: String,
    /// Chain to index (e.g. `"ethereum"`).
    #[serde(default = "default_chain")]
    pub chain: String,
    /// First block to index when no checkpoint exists.
    #[serde(default)]
    pub from_block: u64,
    /// Optional last block (bounded backfill). `None` = follow the head.
    #[serde(default)]
    pub to_block: Option<u64>,
    /// Blocks behind head before a block is processed.
    #[serde(default = "default_confirmation_depth")]
    pub confirmation_depth: u64,
    /// Largest block span per `getLogs` request.
    #[serde(default = "default_max_block_range")]
    pub max_block_range: u64,
    /// Largest block span processed by a single cycle.
    #[serde(default = "default_max_blocks_per_cycle")]
    pub max_blocks_per_cycle: u64,
    /// Concurrent `getLogs` / block-hash requests within one fetch.
    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,
    /// Recent block hashes kept for reorg detection; also the deepest
    /// recoverable reorg. Required.
    pub reorg_window: usize,
    /// Poll interval of the run loop (milliseconds).
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Timeout for each node request (milliseconds).
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Backoff for transient node failures.
    #[serde(default)]
    pub retry: RetryConfig,
    /// Handler delivery policy.
    pub delivery: DeliveryConfig,
    /// Reorgs tolerated within a single cycle before it is aborted.
    #[serde(default = "default_max_rewinds")]
    pub max_rewinds: u32,
}

fn default_id() -> String {
    "default".into()
}

fn default_chain() -> String {
    "ethereum".into()
}

fn default_confirmation_depth() -> u64 {
    12
}

fn default_max_block_range() -> u64 {
    1_000
}

fn default_max_blocks_per_cycle() -> u64 {
    10_000
}

fn default_fetch_concurrency() -> usize {
    4
}

fn default_poll_interval_ms() -> u64 {
    2_000
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_max_rewinds() -> u32 {
    3
}

impl Default for IndexerConfig {
    /// Everything except `reorg_window` and `delivery.max_attempts`, which
    /// are left unset and must be provided.
    fn default() -> Self {
        Self {
            id: default_id(),
            chain: default_chain(),
            from_block: 0,
            to_block: None,
            confirmation_depth: default_confirmation_depth(),
            max_block_range: default_max_block_range(),
            max_blocks_per_cycle: default_max_blocks_per_cycle(),
            fetch_concurrency: default_fetch_concurrency(),
            reorg_window: 0,
            poll_interval_ms: default_poll_interval_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            retry: RetryConfig::default(),
            delivery: DeliveryConfig::default(),
            max_rewinds: default_max_rewinds(),
        }
    }
}

impl IndexerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> Result<(), IndexerError> {
        let fail = |msg: &str| Err(IndexerError::Config(msg.to_string()));
        if self.id.is_empty() || self.chain.is_empty() {
            return fail("`id` and `chain` must be non-empty");
        }
        if self.reorg_window == 0 {
            return fail("`reorg_window` must be set to at least 1");
        }
        if self.delivery.max_attempts == 0 {
            return fail("`delivery.max_attempts` must be set to at least 1");
        }
        if self.max_block_range == 0 || self.max_blocks_per_cycle == 0 {
            return fail("`max_block_range` and `max_blocks_per_cycle` must be at least 1");
        }
        if self.fetch_concurrency == 0 {
            return fail("`fetch_concurrency` must be at least 1");
        }
        if self.request_timeout_ms == 0 || self.delivery.handler_timeout_ms == 0 {
            return fail("timeouts must be non-zero");
        }
        if let Some(to) = self.to_block {
            if to < self.from_block {
                return fail("`to_block` is before `from_block`");
            }
        }
        Ok(())
    }
}

/// Runtime state of the ingestion engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IngestState {
    /// Waiting for the next poll tick.
    Idle,
    /// Reading head, block hashes and logs from the node.
    Fetching,
    /// Comparing the checkpoint window against the node.
    ReorgCheck,
    /// Turning raw logs into decoded events.
    Decoding,
    /// Delivering events to handlers.
    Dispatching,
    /// Persisting the advanced checkpoint.
    Checkpointing,
    /// The last cycle failed.
    Error,
}

impl std::fmt::Display for IngestState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Fetching => write!(f, "fetching"),
            Self::ReorgCheck => write!(f, "reorg-check"),
            Self::Decoding => write!(f, "decoding"),
            Self::Dispatching => write!(f, "dispatching"),
            Self::Checkpointing => write!(f, "checkpointing"),
            Self::Error => write!(f, "error"),
        }
    }
}
