//! Durable ingestion cursor.
//!
//! A checkpoint records the last fully processed block and a short window of
//! recent (number, hash) pairs. On every cycle the window is compared against
//! the node to detect reorganizations; on restart ingestion resumes at
//! `last_block + 1`.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::IndexerError;
use crate::types::BlockRef;

/// A persisted checkpoint for one indexer on one chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Chain slug (e.g. `"ethereum"`).
    pub chain_id: String,
    /// Unique indexer identifier.
    pub indexer_id: String,
    /// First block this indexer is responsible for.
    pub start_block: u64,
    /// Last block whose events were all dispatched (or permanently failed).
    /// `None` until the first range completes.
    pub last_block: Option<u64>,
    /// Recent block hashes, ascending by number, at most `reorg_window + 1` long.
    pub recent: Vec<BlockRef>,
    /// Unix timestamp of the last update.
    pub updated_at: i64,
}

impl Checkpoint {
    /// A fresh checkpoint that starts ingesting at `start_block`.
    pub fn genesis(chain_id: impl Into<String>, indexer_id: impl Into<String>, start_block: u64) -> Self {
        Self {
            chain_id: chain_id.into(),
            indexer_id: indexer_id.into(),
            start_block,
            last_block: None,
            recent: Vec::new(),
            updated_at: chrono::Utc::now().timestamp(),
        }
    }

    /// The next block to fetch.
    pub fn next_block(&self) -> u64 {
        self.last_block.map_or(self.start_block, |b| b + 1)
    }

    /// Lowest block still covered by the reorg window.
    pub fn window_floor(&self) -> Option<u64> {
        self.recent.first().map(|b| b.number)
    }

    /// Mark everything up to `last_block` as processed and append `refs`
    /// (ascending) to the window, keeping only the newest `window` entries.
    pub fn advance(
        &mut self,
        last_block: u64,
        refs: impl IntoIterator<Item = BlockRef>,
        window: usize,
    ) {
        for block in refs {
            if block.number > last_block {
                break;
            }
            self.recent.retain(|b| b.number < block.number);
            self.recent.push(block);
        }
        if self.recent.len() > window {
            let excess = self.recent.len() - window;
            self.recent.drain(..excess);
        }
        self.last_block = Some(last_block);
        self.updated_at = chrono::Utc::now().timestamp();
    }

    /// Roll the cursor back so that `ancestor` is the last processed block.
    pub fn rewind_to(&mut self, ancestor: u64) {
        self.recent.retain(|b| b.number <= ancestor);
        self.last_block = (ancestor >= self.start_block).then_some(ancestor);
        self.updated_at = chrono::Utc::now().timestamp();
    }
}

/// Durable checkpoint storage.
///
/// `save` must replace the stored checkpoint atomically: readers never see a
/// new `last_block` with an old window or vice versa.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Load the checkpoint for a chain + indexer pair.
    async fn load(&self, chain_id: &str, indexer_id: &str) -> Result<Option<Checkpoint>, IndexerError>;

    /// Save (upsert) a checkpoint.
    async fn save(&self, checkpoint: Checkpoint) -> Result<(), IndexerError>;

    /// Delete a checkpoint (e.g. when resetting an indexer).
    async fn delete(&self, chain_id: &str, indexer_id: &str) -> Result<(), IndexerError>;
}

// ─── In-memory store (for testing) ───────────────────────────────────────────

/// In-memory checkpoint store for tests and ephemeral indexers.
#[derive(Default)]
pub struct MemoryCheckpointStore {
    data: Mutex<HashMap<String, Checkpoint>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(chain_id: &str, indexer_id: &str) -> String {
        format!("{chain_id}:{indexer_id}")
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn load(&self, chain_id: &str, indexer_id: &str) -> Result<Option<Checkpoint>, IndexerError> {
        let data = self.data.lock().map_err(|e| IndexerError::Storage(e.to_string()))?;
        Ok(data.get(&Self::key(chain_id, indexer_id)).cloned())
    }

    async fn save(&self, checkpoint: Checkpoint) -> Result<(), IndexerError> {
        let key = Self::key(&checkpoint.chain_id, &checkpoint.indexer_id);
        let mut data = self.data.lock().map_err(|e| IndexerError::Storage(e.to_string()))?;
        data.insert(key, checkpoint);
        Ok(())
    }

    async fn delete(&self, chain_id: &str, indexer_id: &str) -> Result<(), IndexerError> {
        let mut data = self.data.lock().map_err(|e| IndexerError::Storage(e.to_string()))?;
        data.remove(&Self::key(chain_id, indexer_id));
        Ok(())
    }
}
