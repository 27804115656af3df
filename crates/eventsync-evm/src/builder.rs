//! Fluent builder API for indexer configuration.
//!
//! # Example
//!
//! ```rust
//! use eventsync_evm::IndexerBuilder;
//!
//! let config = IndexerBuilder::new()
//!     .chain("ethereum")
//!     .from_block(19_000_000)
//!     .confirmation_depth(12)
//!     .reorg_window(64)
//!     .max_attempts(5)
//!     .build()
//!     .unwrap();
//! assert_eq!(config.reorg_window, 64);
//! ```

use eventsync_core::error::IndexerError;
use eventsync_core::indexer::IndexerConfig;
use eventsync_core::retry::RetryConfig;

/// Fluent builder for `IndexerConfig`.
#[derive(Default)]
pub struct IndexerBuilder {
    config: IndexerConfig,
}

impl IndexerBuilder {
    pub fn new() -> Self {
        Self {
            config: IndexerConfig::default(),
        }
    }

    /// Set the indexer ID (used for checkpoint keys).
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.config.id = id.into();
        self
    }

    /// Set the chain to index.
    pub fn chain(mut self, chain: impl Into<String>) -> Self {
        self.config.chain = chain.into();
        self
    }

    /// Set the start block.
    pub fn from_block(mut self, block: u64) -> Self {
        self.config.from_block = block;
        self
    }

    /// Set the end block (for bounded backfill).
    pub fn to_block(mut self, block: u64) -> Self {
        self.config.to_block = Some(block);
        self
    }

    /// Set confirmation depth (blocks behind head before processing).
    pub fn confirmation_depth(mut self, depth: u64) -> Self {
        self.config.confirmation_depth = depth;
        self
    }

    /// Set the number of blocks per `eth_getLogs` request.
    pub fn max_block_range(mut self, blocks: u64) -> Self {
        self.config.max_block_range = blocks;
        self
    }

    /// Set the number of blocks processed per cycle.
    pub fn max_blocks_per_cycle(mut self, blocks: u64) -> Self {
        self.config.max_blocks_per_cycle = blocks;
        self
    }

    pub fn fetch_concurrency(mut self, n: usize) -> Self {
        self.config.fetch_concurrency = n;
        self
    }

    /// Set the reorg window (recorded hashes = deepest recoverable reorg).
    pub fn reorg_window(mut self, blocks: usize) -> Self {
        self.config.reorg_window = blocks;
        self
    }

    /// Set live mode polling interval in milliseconds.
    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    pub fn request_timeout_ms(mut self, ms: u64) -> Self {
        self.config.request_timeout_ms = ms;
        self
    }

    /// Retry policy for node calls.
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.config.retry = retry;
        self
    }

    /// Attempts per delivery before it is abandoned.
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.delivery.max_attempts = attempts;
        self
    }

    pub fn handler_timeout_ms(mut self, ms: u64) -> Self {
        self.config.delivery.handler_timeout_ms = ms;
        self
    }

    /// Backoff between delivery attempts within one cycle.
    pub fn delivery_retry(mut self, retry: RetryConfig) -> Self {
        self.config.delivery.retry = retry;
        self
    }

    pub fn max_rewinds(mut self, n: u32) -> Self {
        self.config.max_rewinds = n;
        self
    }

    /// Build the `IndexerConfig` without validating it.
    pub fn build_config(self) -> IndexerConfig {
        self.config
    }

    /// Build and validate the `IndexerConfig`.
    pub fn build(self) -> Result<IndexerConfig, IndexerError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let cfg = IndexerBuilder::new().build_config();
        assert_eq!(cfg.chain, "ethereum");
        assert_eq!(cfg.confirmation_depth, 12);
        assert_eq!(cfg.max_block_range, 1000);
    }

    #[test]
    fn window_and_threshold_are_required() {
        assert!(IndexerBuilder::new().build().is_err());
        assert!(IndexerBuilder::new().reorg_window(32).build().is_err());
        assert!(IndexerBuilder::new().max_attempts(3).build().is_err());
    }

    #[test]
    fn builder_custom() {
        let cfg = IndexerBuilder::new()
            .id("my-indexer")
            .chain("polygon")
            .from_block(50_000_000)
            .confirmation_depth(32)
            .max_block_range(500)
            .reorg_window(128)
            .max_attempts(4)
            .handler_timeout_ms(1_000)
            .build()
            .unwrap();

        assert_eq!(cfg.id, "my-indexer");
        assert_eq!(cfg.chain, "polygon");
        assert_eq!(cfg.from_block, 50_000_000);
        assert_eq!(cfg.confirmation_depth, 32);
        assert_eq!(cfg.max_block_range, 500);
        assert_eq!(cfg.reorg_window, 128);
        assert_eq!(cfg.delivery.max_attempts, 4);
        assert_eq!(cfg.delivery.handler_timeout_ms, 1_000);
    }
}
