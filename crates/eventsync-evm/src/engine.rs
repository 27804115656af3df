//! The ingestion engine, one polling cycle at a time.
//!
//! # Cycle
//! 1. **Fetching**: read the head, fetch the hashes of the blocks that will
//!    form the new reorg window, then the logs of `[next, target]`.
//! 2. **ReorgCheck**: compare the checkpoint window with the node. A reorg
//!    rewinds the range to the fork point and restarts Fetching.
//! 3. **Decoding**: decode every log; malformed logs go to the audit channel.
//! 4. **Dispatching**: deliver events to every handler, in chain order per
//!    handler, with timeouts and bounded retries.
//! 5. **Checkpointing**: persist the new cursor and window in one write.
//!
//! Only one cycle runs at a time; a tick that arrives while a cycle is in
//! flight is dropped.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::{Arc, Mutex as StdMutex, PoisonError, RwLock};

use alloy_json_abi::JsonAbi;
use futures::future::join_all;
use futures::stream::{self, StreamExt, TryStreamExt};
use futures::FutureExt;
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;

use eventsync_core::audit::{AuditRecord, AuditSink, TracingAuditSink};
use eventsync_core::checkpoint::{Checkpoint, CheckpointStore};
use eventsync_core::error::{DecodeError, HandlerError, IndexerError, SchemaError};
use eventsync_core::handler::{EventHandler, HandlerRegistry};
use eventsync_core::indexer::{IndexerConfig, IngestState};
use eventsync_core::ledger::DeliveryLedger;
use eventsync_core::node::NodeClient;
use eventsync_core::reorg::{ReorgDetector, ReorgEvent};
use eventsync_core::retry::RetryPolicy;
use eventsync_core::types::{BlockRef, DecodedEvent, EventKey, LogFilter, RawLog, WatchedEvent};

use crate::abi::AbiIndex;
use crate::decoder::EventDecoder;
use crate::fetcher::LogFetcher;

// ─── Results ─────────────────────────────────────────────────────────────────

/// Summary of a completed cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    /// First block fetched (lower than the checkpoint cursor after a reorg).
    pub from: u64,
    /// Last block fetched.
    pub to: u64,
    /// Node head at the start of the cycle.
    pub head: u64,
    /// Block the checkpoint now points at, if it advanced.
    pub committed: Option<u64>,
    /// Logs decoded into events.
    pub decoded: usize,
    /// Successful (handler, event) deliveries.
    pub delivered: usize,
    /// Logs that matched a watched event but failed to decode.
    pub decode_failures: usize,
    /// Deliveries abandoned in this cycle.
    pub abandoned: usize,
    /// Deliveries still failing; they pin the checkpoint.
    pub pending_failures: usize,
    /// The reorg handled during this cycle, if any.
    pub reorg: Option<ReorgEvent>,
    /// The checkpoint as stored at the end of the cycle.
    pub checkpoint: Checkpoint,
    /// `true` if more confirmed blocks are already available.
    pub behind: bool,
}

/// What a call to [`IngestionEngine::tick`] did.
#[derive(Debug, Clone)]
pub enum CycleOutcome {
    /// Another cycle was in flight; this tick was dropped.
    Skipped,
    /// No new confirmed blocks.
    UpToDate { head: u64 },
    /// `to_block` has been fully processed.
    Finished { at: u64 },
    Completed(CycleReport),
}

#[derive(Debug)]
enum DeliveryOutcome {
    Delivered,
    Failed { attempts: u32, reason: String },
    Abandoned { attempts: u32, reason: String },
}

#[derive(Debug)]
struct Delivery {
    key: EventKey,
    outcome: DeliveryOutcome,
}

/// State owned by the cycle lease.
#[derive(Default)]
struct CycleState {
    ledger: DeliveryLedger,
    filter: LogFilter,
    filter_generation: Option<u64>,
    /// Set by a deep reorg; cleared by [`IngestionEngine::reset_checkpoint`].
    halted: Option<String>,
}

// ─── IngestionEngine ─────────────────────────────────────────────────────────

/// Orchestrates fetching, reorg handling, decoding, dispatch and
/// checkpointing for one indexer on one chain.
pub struct IngestionEngine<N> {
    config: IndexerConfig,
    fetcher: LogFetcher<N>,
    abi: RwLock<AbiIndex>,
    handlers: HandlerRegistry,
    store: Arc<dyn CheckpointStore>,
    audit: Arc<dyn AuditSink>,
    detector: ReorgDetector,
    delivery_retry: RetryPolicy,
    cycle: Mutex<CycleState>,
    state: StdMutex<IngestState>,
}

impl<N: NodeClient> IngestionEngine<N> {
    pub fn new(config: IndexerConfig, node: N, store: Arc<dyn CheckpointStore>) -> Result<Self, IndexerError> {
        config.validate()?;
        Ok(Self {
            fetcher: LogFetcher::new(node, &config),
            abi: RwLock::new(AbiIndex::new()),
            handlers: HandlerRegistry::new(),
            store,
            audit: Arc::new(TracingAuditSink),
            detector: ReorgDetector::new(config.reorg_window),
            delivery_retry: RetryPolicy::new(config.delivery.retry.clone()),
            cycle: Mutex::new(CycleState::default()),
            state: StdMutex::new(IngestState::Idle),
            config,
        })
    }

    /// Replace the default (tracing) audit sink.
    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Register a handler. Handlers are registered before the engine runs.
    pub fn add_handler(&mut self, handler: Arc<dyn EventHandler>) -> Result<(), IndexerError> {
        self.handlers.register(handler)
    }

    /// Watch `event_name` on `address`. Takes effect from the next cycle.
    pub fn watch(&self, address: &str, abi: &JsonAbi, event_name: &str) -> Result<Arc<WatchedEvent>, SchemaError> {
        self.abi_mut().register(address, abi, event_name)
    }

    /// [`watch`](Self::watch) with ABI JSON text.
    pub fn watch_json(&self, address: &str, abi_json: &str, event_name: &str) -> Result<Arc<WatchedEvent>, SchemaError> {
        self.abi_mut().register_json(address, abi_json, event_name)
    }

    pub fn config(&self) -> &IndexerConfig {
        &self.config
    }

    pub fn state(&self) -> IngestState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of watched (contract, event) pairs.
    pub fn watched(&self) -> usize {
        self.abi.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// The stored checkpoint, if any.
    pub async fn checkpoint(&self) -> Result<Option<Checkpoint>, IndexerError> {
        self.store.load(&self.config.chain, &self.config.id).await
    }

    /// Operator reset: restart ingestion at `block`, or at the configured
    /// `from_block` if `None`. Clears the reorg window, the delivery ledger
    /// and any halt caused by a deep reorg.
    pub async fn reset_checkpoint(&self, block: Option<u64>) -> Result<(), IndexerError> {
        let mut cycle = self.cycle.lock().await;
        match block {
            Some(block) => {
                self.store
                    .save(Checkpoint::genesis(&self.config.chain, &self.config.id, block))
                    .await?
            }
            None => self.store.delete(&self.config.chain, &self.config.id).await?,
        }
        cycle.ledger.clear();
        cycle.halted = None;
        self.set_state(IngestState::Idle);
        tracing::info!(
            chain = %self.config.chain,
            indexer = %self.config.id,
            from = block.unwrap_or(self.config.from_block),
            "Checkpoint reset"
        );
        Ok(())
    }

    /// Run one cycle unless one is already in flight.
    pub async fn tick(&self) -> Result<CycleOutcome, IndexerError> {
        let Ok(mut cycle) = self.cycle.try_lock() else {
            tracing::debug!("Cycle in flight, tick dropped");
            return Ok(CycleOutcome::Skipped);
        };
        if let Some(reason) = &cycle.halted {
            return Err(IndexerError::Halted { reason: reason.clone() });
        }

        let result = self.run_cycle(&mut cycle).await;
        match &result {
            Ok(_) => self.set_state(IngestState::Idle),
            Err(e) => {
                self.set_state(IngestState::Error);
                if let IndexerError::DeepReorg { last_block, .. } = e {
                    self.audit.record(AuditRecord::DeepReorg { last_block: *last_block, reason: e.to_string() });
                    cycle.halted = Some(e.to_string());
                }
            }
        }
        result
    }

    /// Poll until `shutdown` resolves, `to_block` is reached or a fatal
    /// error occurs. Non-fatal cycle errors are logged and retried on the
    /// next tick.
    pub async fn run<F>(&self, shutdown: F) -> Result<(), IndexerError>
    where
        F: Future<Output = ()>,
    {
        let mut interval = tokio::time::interval(self.config.poll_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        tracing::info!(
            chain = %self.config.chain,
            indexer = %self.config.id,
            handlers = self.handlers.len(),
            watched = self.watched(),
            "Ingestion started"
        );

        let mut behind = false;
        loop {
            if behind {
                if shutdown.as_mut().now_or_never().is_some() {
                    break;
                }
            } else {
                tokio::select! {
                    _ = &mut shutdown => break,
                    _ = interval.tick() => {}
                }
            }

            behind = false;
            match self.tick().await {
                Ok(CycleOutcome::Completed(report)) => behind = report.behind,
                Ok(CycleOutcome::Finished { at }) => {
                    tracing::info!(at, "Reached configured end block");
                    return Ok(());
                }
                Ok(_) => {}
                Err(e) if e.is_fatal() => {
                    tracing::error!(error = %e, "Ingestion stopped");
                    return Err(e);
                }
                Err(e) => tracing::warn!(error = %e, "Cycle failed, retrying on next tick"),
            }
        }

        tracing::info!("Shutdown requested, ingestion stopped");
        Ok(())
    }

    // ─── Cycle ───────────────────────────────────────────────────────────────

    async fn run_cycle(&self, cycle: &mut CycleState) -> Result<CycleOutcome, IndexerError> {
        self.set_state(IngestState::Fetching);
        let filter = self.refresh_filter(cycle);
        if filter.is_empty() {
            return Err(IndexerError::Config("no events are watched".into()));
        }

        let checkpoint = match self.store.load(&self.config.chain, &self.config.id).await? {
            Some(cp) => cp,
            None => Checkpoint::genesis(&self.config.chain, &self.config.id, self.config.from_block),
        };
        let next = checkpoint.next_block();
        if let Some(to) = self.config.to_block {
            if next > to {
                return Ok(CycleOutcome::Finished { at: to });
            }
        }

        let head = self.fetcher.head().await?;
        let Some(mut limit) = head.checked_sub(self.config.confirmation_depth) else {
            return Ok(CycleOutcome::UpToDate { head });
        };
        if let Some(to) = self.config.to_block {
            limit = limit.min(to);
        }
        let mut target = limit.min(next.saturating_add(self.config.max_blocks_per_cycle - 1));
        if target < next {
            // No new blocks, but recorded ones may have been replaced at the
            // same height.
            self.set_state(IngestState::ReorgCheck);
            match self.detector.check(&checkpoint.recent, &self.fetcher).await? {
                Some(event) if event.fork_block <= limit => target = limit,
                _ => return Ok(CycleOutcome::UpToDate { head }),
            }
        }

        // Fetching ⇄ ReorgCheck until the window is consistent with the node.
        let mut window = checkpoint.recent.clone();
        let mut from = next;
        let mut reorg: Option<ReorgEvent> = None;
        let mut rewinds = 0u32;
        let (refs, logs) = loop {
            self.set_state(IngestState::Fetching);
            let retained = self.detector.retained() as u64;
            let tail_start = from.max(target.saturating_sub(retained - 1));
            // Hashes first: a log fetched afterwards can only be newer.
            let refs = self.block_refs(tail_start, target).await?;
            let logs = self.fetcher.fetch(from, target, &filter).await?;
            self.verify_log_hashes(&logs, &refs).await?;

            self.set_state(IngestState::ReorgCheck);
            let Some(event) = self.detector.check(&window, &self.fetcher).await? else {
                break (refs, logs);
            };

            rewinds += 1;
            if rewinds > self.config.max_rewinds {
                return Err(IndexerError::InconsistentNode(format!(
                    "chain reorganized {rewinds} times within one cycle"
                )));
            }
            self.audit.record(AuditRecord::Reorg(event.clone()));
            self.handlers.notify_reorg(&event).await;
            ReorgDetector::rewind(&mut window, &event);
            cycle.ledger.reset_attempts_from(event.fork_block);
            from = from.min(event.fork_block);
            reorg = Some(event);
        };

        self.set_state(IngestState::Decoding);
        let (events, decode_failures) = self.decode_logs(&logs);

        self.set_state(IngestState::Dispatching);
        let results = self.dispatch(&events, &cycle.ledger).await;

        let (mut delivered, mut abandoned, mut pending_failures) = (0, 0, 0);
        let mut earliest_pending: Option<u64> = None;
        for (handler, deliveries) in results {
            for Delivery { key, outcome } in deliveries {
                match outcome {
                    DeliveryOutcome::Delivered => {
                        cycle.ledger.mark_delivered(&handler, &key);
                        delivered += 1;
                    }
                    DeliveryOutcome::Failed { attempts, reason } => {
                        cycle.ledger.set_attempts(&handler, &key, attempts);
                        pending_failures += 1;
                        earliest_pending = Some(earliest_pending.map_or(key.block_number, |b| b.min(key.block_number)));
                        self.audit.record(AuditRecord::DeliveryFailed { handler: handler.clone(), key, attempts, reason });
                    }
                    DeliveryOutcome::Abandoned { attempts, reason } => {
                        cycle.ledger.mark_abandoned(&handler, &key);
                        abandoned += 1;
                        self.audit.record(AuditRecord::DeliveryAbandoned { handler: handler.clone(), key, attempts, reason });
                    }
                }
            }
        }

        // The window must end at the committed block, so a partial commit is
        // only possible inside the block range whose hashes were fetched.
        let tail_start = refs.first().map_or(target, |r| r.number);
        let committed = match earliest_pending {
            None => Some(target),
            Some(block) => block.checked_sub(1).filter(|c| *c >= tail_start),
        };

        self.set_state(IngestState::Checkpointing);
        let mut updated = checkpoint;
        if let Some(event) = &reorg {
            updated.rewind_to(event.ancestor.number);
        }
        if let Some(last) = committed {
            updated.advance(last, refs, self.detector.retained());
        }
        if committed.is_some() || reorg.is_some() {
            self.store.save(updated.clone()).await?;
        }
        if let Some(floor) = updated.window_floor() {
            cycle.ledger.prune_below(floor);
        }

        let behind = committed == Some(target) && target < limit;
        tracing::info!(
            from,
            to = target,
            head,
            committed = ?committed,
            events = events.len(),
            delivered,
            decode_failures,
            abandoned,
            pending_failures,
            "Cycle complete"
        );

        Ok(CycleOutcome::Completed(CycleReport {
            from,
            to: target,
            head,
            committed,
            decoded: events.len(),
            delivered,
            decode_failures,
            abandoned,
            pending_failures,
            reorg,
            checkpoint: updated,
            behind,
        }))
    }

    /// Rebuild the node filter if registrations changed since the last cycle.
    fn refresh_filter(&self, cycle: &mut CycleState) -> LogFilter {
        let abi = self.abi.read().unwrap_or_else(PoisonError::into_inner);
        if cycle.filter_generation != Some(abi.generation()) {
            cycle.filter = abi.filter();
            cycle.filter_generation = Some(abi.generation());
            tracing::debug!(
                addresses = cycle.filter.addresses.len(),
                topics = cycle.filter.topic0s.len(),
                "Log filter rebuilt"
            );
        }
        cycle.filter.clone()
    }

    /// Canonical hashes of `[from, to]`, fetched concurrently.
    async fn block_refs(&self, from: u64, to: u64) -> Result<Vec<BlockRef>, IndexerError> {
        stream::iter(from..=to)
            .map(|number| async move {
                match self.fetcher.block_hash(number).await? {
                    Some(hash) => Ok(BlockRef::new(number, hash)),
                    None => Err(IndexerError::InconsistentNode(format!(
                        "node has no block #{number} below its reported head"
                    ))),
                }
            })
            .buffered(self.fetcher.concurrency())
            .try_collect()
            .await
    }

    /// Every log must carry the hash the node reports for its block.
    /// A disagreement means the chain moved between calls.
    async fn verify_log_hashes(&self, logs: &[RawLog], refs: &[BlockRef]) -> Result<(), IndexerError> {
        let mismatch = |number: u64, a: &str, b: &str| {
            IndexerError::InconsistentNode(format!("block #{number} reported as both {a} and {b}"))
        };

        let known: HashMap<u64, &str> = refs.iter().map(|r| (r.number, r.hash.as_str())).collect();
        let mut unchecked: BTreeMap<u64, &str> = BTreeMap::new();
        for log in logs.iter().filter(|l| !l.removed) {
            let seen = known.get(&log.block_number).or_else(|| unchecked.get(&log.block_number)).copied();
            match seen {
                Some(hash) if !hash.eq_ignore_ascii_case(&log.block_hash) => {
                    return Err(mismatch(log.block_number, hash, &log.block_hash));
                }
                Some(_) => {}
                None => {
                    unchecked.insert(log.block_number, &log.block_hash);
                }
            }
        }
        if unchecked.is_empty() {
            return Ok(());
        }

        let headers: Vec<(u64, Option<String>)> = stream::iter(unchecked.keys().copied())
            .map(|number| async move { self.fetcher.block_hash(number).await.map(|h| (number, h)) })
            .buffered(self.fetcher.concurrency())
            .try_collect()
            .await?;
        for (number, header) in headers {
            let logged = unchecked.get(&number).copied().unwrap_or_default();
            match header {
                Some(hash) if hash.eq_ignore_ascii_case(logged) => {}
                Some(hash) => return Err(mismatch(number, &hash, logged)),
                None => {
                    return Err(IndexerError::InconsistentNode(format!(
                        "node returned logs for unknown block #{number}"
                    )))
                }
            }
        }
        Ok(())
    }

    fn decode_logs(&self, logs: &[RawLog]) -> (Vec<DecodedEvent>, usize) {
        let abi = self.abi.read().unwrap_or_else(PoisonError::into_inner);
        let decoder = EventDecoder::new(&abi);

        let mut events = Vec::with_capacity(logs.len());
        let mut failures = 0;
        for log in logs {
            if log.removed {
                tracing::debug!(tx_hash = %log.tx_hash, log_index = log.log_index, "Skipping removed log");
                continue;
            }
            match decoder.decode(log) {
                Ok(event) => events.push(event),
                Err(DecodeError::Unwatched { tx_hash, log_index }) => {
                    tracing::debug!(%tx_hash, log_index, address = %log.address, "Skipping unwatched log");
                }
                Err(e) => {
                    failures += 1;
                    self.audit.record(AuditRecord::DecodeFailed {
                        key: EventKey {
                            block_number: log.block_number,
                            block_hash: log.block_hash.clone(),
                            tx_hash: log.tx_hash.clone(),
                            log_index: log.log_index,
                        },
                        reason: e.to_string(),
                    });
                }
            }
        }
        events.sort_by_key(DecodedEvent::position);
        (events, failures)
    }

    /// Deliver `events` to all handlers concurrently; each handler sees its
    /// events one at a time, in chain order. Settled deliveries are skipped.
    async fn dispatch(&self, events: &[DecodedEvent], ledger: &DeliveryLedger) -> Vec<(String, Vec<Delivery>)> {
        let runs = self.handlers.iter().map(|handler| {
            let queue: Vec<(&DecodedEvent, EventKey, u32)> = events
                .iter()
                .filter(|e| handler.interested(e))
                .filter_map(|e| {
                    let key = e.key();
                    if ledger.is_settled(handler.name(), &key) {
                        return None;
                    }
                    let prior = ledger.attempts(handler.name(), &key);
                    Some((e, key, prior))
                })
                .collect();

            async move {
                let mut out = Vec::with_capacity(queue.len());
                for (event, key, prior) in queue {
                    let outcome = self.deliver(&**handler, event, prior).await;
                    out.push(Delivery { key, outcome });
                }
                (handler.name().to_string(), out)
            }
        });
        join_all(runs).await
    }

    /// One (handler, event) delivery with in-cycle retries.
    async fn deliver(&self, handler: &dyn EventHandler, event: &DecodedEvent, prior: u32) -> DeliveryOutcome {
        let timeout = self.config.delivery.handler_timeout();
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let total = prior + attempt;
            let err = match tokio::time::timeout(timeout, handler.handle(event)).await {
                Ok(Ok(())) => return DeliveryOutcome::Delivered,
                Ok(Err(e)) => e,
                Err(_) => HandlerError::Timeout { ms: timeout.as_millis() as u64 },
            };

            if total >= self.config.delivery.max_attempts {
                return DeliveryOutcome::Abandoned { attempts: total, reason: err.to_string() };
            }
            match self.delivery_retry.next_delay(attempt) {
                Some(delay) => {
                    tracing::debug!(
                        handler = handler.name(),
                        event = %event.event.signature,
                        block = event.block_number,
                        attempts = total,
                        error = %err,
                        "Delivery failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                None => return DeliveryOutcome::Failed { attempts: total, reason: err.to_string() },
            }
        }
    }

    fn abi_mut(&self) -> std::sync::RwLockWriteGuard<'_, AbiIndex> {
        self.abi.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: IngestState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use eventsync_core::checkpoint::MemoryCheckpointStore;
    use eventsync_core::error::NodeError;
    use eventsync_core::indexer::DeliveryConfig;

    struct StaticNode {
        head: u64,
    }

    #[async_trait]
    impl NodeClient for StaticNode {
        async fn block_head(&self) -> Result<u64, NodeError> {
            Ok(self.head)
        }

        async fn get_logs(&self, _from: u64, _to: u64, _filter: &LogFilter) -> Result<Vec<RawLog>, NodeError> {
            Ok(vec![])
        }

        async fn block_hash(&self, number: u64) -> Result<Option<String>, NodeError> {
            Ok((number <= self.head).then(|| format!("0x{number:064x}")))
        }
    }

    const ABI: &str = r#"[{"type":"event","name":"Ping","anonymous":false,"inputs":[]}]"#;

    fn engine(head: u64) -> IngestionEngine<StaticNode> {
        let config = IndexerConfig {
            reorg_window: 4,
            confirmation_depth: 2,
            delivery: DeliveryConfig::new(3),
            ..Default::default()
        };
        IngestionEngine::new(config, StaticNode { head }, Arc::new(MemoryCheckpointStore::new())).unwrap()
    }

    #[test]
    fn rejects_invalid_config() {
        let result = IngestionEngine::new(
            IndexerConfig::default(),
            StaticNode { head: 0 },
            Arc::new(MemoryCheckpointStore::new()),
        );
        assert!(matches!(result, Err(IndexerError::Config(_))));
    }

    #[tokio::test]
    async fn nothing_watched_is_a_config_error() {
        let engine = engine(10);
        assert!(matches!(engine.tick().await, Err(IndexerError::Config(_))));
        assert_eq!(engine.state(), IngestState::Error);
    }

    #[tokio::test]
    async fn waits_for_confirmations() {
        let engine = engine(1);
        engine.watch_json("0x00000000000000000000000000000000000000aa", ABI, "Ping").unwrap();
        assert!(matches!(engine.tick().await.unwrap(), CycleOutcome::UpToDate { head: 1 }));
        assert!(engine.checkpoint().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn empty_range_advances_window() {
        let engine = engine(11);
        engine.watch_json("0x00000000000000000000000000000000000000aa", ABI, "Ping").unwrap();
        let CycleOutcome::Completed(report) = engine.tick().await.unwrap() else {
            panic!("expected a completed cycle");
        };
        assert_eq!((report.from, report.to, report.committed), (0, 9, Some(9)));
        let numbers: Vec<u64> = report.checkpoint.recent.iter().map(|r| r.number).collect();
        assert_eq!(numbers, vec![5, 6, 7, 8, 9]);
        assert_eq!(engine.state(), IngestState::Idle);

        assert!(matches!(engine.tick().await.unwrap(), CycleOutcome::UpToDate { .. }));
    }

    #[tokio::test]
    async fn reset_restarts_at_block() {
        let engine = engine(11);
        engine.watch_json("0x00000000000000000000000000000000000000aa", ABI, "Ping").unwrap();
        engine.tick().await.unwrap();
        engine.reset_checkpoint(Some(5)).await.unwrap();
        let cp = engine.checkpoint().await.unwrap().unwrap();
        assert_eq!(cp.next_block(), 5);
        assert!(cp.recent.is_empty());
    }
}
