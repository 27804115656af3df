//! `LogFetcher`: range-chunked, retried node access.
//!
//! Wraps a [`NodeClient`] and adds:
//! - a per-request timeout,
//! - retry with exponential backoff for transient failures,
//! - splitting a block range into `max_block_range`-sized `getLogs` calls,
//!   issued with bounded concurrency and reassembled in chain order.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};

use eventsync_core::error::{IndexerError, NodeError};
use eventsync_core::indexer::IndexerConfig;
use eventsync_core::node::NodeClient;
use eventsync_core::reorg::BlockHashSource;
use eventsync_core::retry::RetryPolicy;
use eventsync_core::types::{LogFilter, RawLog};

/// Split `[from, to]` into inclusive chunks of at most `max_range` blocks.
pub fn chunks(from: u64, to: u64, max_range: u64) -> Vec<(u64, u64)> {
    let mut out = Vec::new();
    if to < from {
        return out;
    }
    let step = max_range.max(1);
    let mut start = from;
    loop {
        let end = start.saturating_add(step - 1).min(to);
        out.push((start, end));
        if end >= to {
            break;
        }
        start = end + 1;
    }
    out
}

/// Node access used by the ingestion engine.
pub struct LogFetcher<N> {
    node: N,
    max_block_range: u64,
    concurrency: usize,
    timeout: Duration,
    retry: RetryPolicy,
}

impl<N: NodeClient> LogFetcher<N> {
    pub fn new(node: N, config: &IndexerConfig) -> Self {
        Self {
            node,
            max_block_range: config.max_block_range,
            concurrency: config.fetch_concurrency.max(1),
            timeout: config.request_timeout(),
            retry: RetryPolicy::new(config.retry.clone()),
        }
    }

    pub fn node(&self) -> &N {
        &self.node
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Current head block number.
    pub async fn head(&self) -> Result<u64, IndexerError> {
        self.with_retry("block_head", || self.node.block_head()).await
    }

    /// Canonical hash at `number`, if the node knows the block.
    pub async fn block_hash(&self, number: u64) -> Result<Option<String>, IndexerError> {
        self.with_retry("block_hash", || self.node.block_hash(number)).await
    }

    /// All logs in `[from, to]` matching `filter`, sorted by
    /// (block number, log index).
    pub async fn fetch(&self, from: u64, to: u64, filter: &LogFilter) -> Result<Vec<RawLog>, IndexerError> {
        let ranges = chunks(from, to, self.max_block_range);
        tracing::debug!(from, to, requests = ranges.len(), "Fetching logs");

        let batches: Vec<Vec<RawLog>> = stream::iter(ranges)
            .map(|(start, end)| async move {
                self.with_retry("get_logs", || self.node.get_logs(start, end, filter)).await
            })
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        let mut logs: Vec<RawLog> = batches.into_iter().flatten().collect();
        if let Some(stray) = logs.iter().find(|l| l.block_number < from || l.block_number > to) {
            return Err(IndexerError::InconsistentNode(format!(
                "getLogs [{from}, {to}] returned a log from block #{}",
                stray.block_number
            )));
        }
        logs.sort_by_key(RawLog::position);
        Ok(logs)
    }

    /// Run `call` with a timeout, retrying transient failures per the
    /// retry policy.
    async fn with_retry<T, F, Fut>(&self, op: &str, call: F) -> Result<T, IndexerError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, NodeError>>,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let err = match tokio::time::timeout(self.timeout, call()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) => e,
                Err(_) => NodeError::Timeout { ms: self.timeout.as_millis() as u64 },
            };

            if !err.is_retryable() {
                return Err(IndexerError::Fetch { op: op.to_string(), attempts: attempt, reason: err.to_string() });
            }
            match self.retry.next_delay(attempt) {
                Some(delay) => {
                    tracing::debug!(op, attempt, delay_ms = delay.as_millis() as u64, error = %err, "Retrying node call");
                    tokio::time::sleep(delay).await;
                }
                None => {
                    tracing::warn!(op, attempts = attempt, error = %err, "Node call failed, retries exhausted");
                    return Err(IndexerError::Fetch { op: op.to_string(), attempts: attempt, reason: err.to_string() });
                }
            }
        }
    }
}

#[async_trait]
impl<N: NodeClient> BlockHashSource for LogFetcher<N> {
    async fn canonical_hash(&self, number: u64) -> Result<Option<String>, IndexerError> {
        self.block_hash(number).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eventsync_core::indexer::DeliveryConfig;
    use eventsync_core::retry::RetryConfig;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn chunk_boundaries() {
        assert_eq!(chunks(0, 9, 4), vec![(0, 3), (4, 7), (8, 9)]);
        assert_eq!(chunks(5, 5, 100), vec![(5, 5)]);
        assert!(chunks(6, 5, 10).is_empty());
        assert_eq!(chunks(u64::MAX - 1, u64::MAX, 10), vec![(u64::MAX - 1, u64::MAX)]);
    }

    /// Fails the first `failures` calls of every kind, then answers.
    struct Flaky {
        failures: u32,
        calls: AtomicU32,
        error: fn() -> NodeError,
    }

    impl Flaky {
        fn fail(&self) -> Result<(), NodeError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
                Err((self.error)())
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl NodeClient for Flaky {
        async fn block_head(&self) -> Result<u64, NodeError> {
            self.fail().map(|_| 42)
        }

        async fn get_logs(&self, from: u64, to: u64, _filter: &LogFilter) -> Result<Vec<RawLog>, NodeError> {
            self.fail()?;
            // One log per chunk, newest chunk's log first to exercise sorting.
            Ok(vec![RawLog {
                address: "0x01".into(),
                topics: vec![],
                data: vec![],
                block_number: to,
                block_hash: format!("0x{to:x}"),
                tx_hash: format!("0xt{from}"),
                log_index: 0,
                removed: false,
            }])
        }

        async fn block_hash(&self, number: u64) -> Result<Option<String>, NodeError> {
            self.fail().map(|_| Some(format!("0x{number:x}")))
        }
    }

    fn config() -> IndexerConfig {
        IndexerConfig {
            reorg_window: 8,
            delivery: DeliveryConfig::new(3),
            max_block_range: 10,
            retry: RetryConfig::fixed(2, 1),
            ..Default::default()
        }
    }

    fn flaky(failures: u32, error: fn() -> NodeError) -> LogFetcher<Flaky> {
        LogFetcher::new(Flaky { failures, calls: AtomicU32::new(0), error }, &config())
    }

    #[tokio::test]
    async fn transient_errors_are_retried() {
        let fetcher = flaky(2, || NodeError::Transport("reset".into()));
        assert_eq!(fetcher.head().await.unwrap(), 42);
        assert_eq!(fetcher.node().calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausted_retries_report_attempts() {
        let fetcher = flaky(10, || NodeError::RateLimited);
        match fetcher.head().await.unwrap_err() {
            IndexerError::Fetch { op, attempts, .. } => {
                assert_eq!(op, "block_head");
                assert_eq!(attempts, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn permanent_errors_fail_fast() {
        let fetcher = flaky(10, || NodeError::Rpc { code: -32602, message: "bad params".into() });
        assert!(fetcher.block_hash(1).await.is_err());
        assert_eq!(fetcher.node().calls.load(Ordering::SeqCst), 1);
    }

    /// Accepts every call and never answers.
    struct Hanging {
        calls: AtomicU32,
    }

    #[async_trait]
    impl NodeClient for Hanging {
        async fn block_head(&self) -> Result<u64, NodeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::future::pending().await
        }

        async fn get_logs(&self, _from: u64, _to: u64, _filter: &LogFilter) -> Result<Vec<RawLog>, NodeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::future::pending().await
        }

        async fn block_hash(&self, _number: u64) -> Result<Option<String>, NodeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn hung_requests_time_out_and_are_retried() {
        let config = IndexerConfig { request_timeout_ms: 500, ..config() };
        let fetcher = LogFetcher::new(Hanging { calls: AtomicU32::new(0) }, &config);

        let started = tokio::time::Instant::now();
        match fetcher.fetch(0, 5, &LogFilter::default()).await.unwrap_err() {
            IndexerError::Fetch { op, attempts, reason } => {
                assert_eq!(op, "get_logs");
                assert_eq!(attempts, 3);
                assert!(reason.contains("timed out after 500ms"), "{reason}");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(fetcher.node().calls.load(Ordering::SeqCst), 3);
        assert!(started.elapsed() >= Duration::from_millis(1_500));
    }

    #[tokio::test]
    async fn fetch_chunks_and_sorts() {
        let fetcher = flaky(0, || NodeError::RateLimited);
        let logs = fetcher.fetch(0, 34, &LogFilter::default()).await.unwrap();
        let blocks: Vec<u64> = logs.iter().map(|l| l.block_number).collect();
        assert_eq!(blocks, vec![9, 19, 29, 34]);
    }
}
