//! Reorg detection against the checkpoint's recent-hash window.
//!
//! The detector walks the recorded window from the newest block backwards,
//! asking the node for its current hash at each height:
//!
//! - newest block still matches → no reorg,
//! - match found `k > 0` blocks back → reorg; re-process from the block after
//!   the match (the fork point),
//! - nothing in the window matches → deep reorg, beyond recoverable depth.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::IndexerError;
use crate::types::BlockRef;

/// Describes a detected chain reorganization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorgEvent {
    /// First block that diverged; ingestion restarts here.
    pub fork_block: u64,
    /// Newest recorded block still on the canonical chain.
    pub ancestor: BlockRef,
    /// Hash we had recorded at `fork_block`.
    pub old_hash: String,
    /// Hash the node now reports at `fork_block`.
    pub new_hash: String,
    /// Number of recorded blocks that were replaced.
    pub depth: u64,
}

/// Source of canonical block hashes, as seen by the node right now.
#[async_trait]
pub trait BlockHashSource: Send + Sync {
    async fn canonical_hash(&self, number: u64) -> Result<Option<String>, IndexerError>;
}

/// Detects reorganizations by comparing a recorded window with the node.
#[derive(Debug, Clone)]
pub struct ReorgDetector {
    window: usize,
}

impl ReorgDetector {
    /// `window` is the maximum recoverable depth. Recovering a reorg of
    /// depth `window` needs the common ancestor below it, so checkpoints
    /// retain [`retained`](Self::retained) hashes.
    pub fn new(window: usize) -> Self {
        Self { window }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Number of recent hashes a checkpoint must keep: the window plus the
    /// ancestor beneath it.
    pub fn retained(&self) -> usize {
        self.window + 1
    }

    /// Compare `recorded` (ascending) against `source`.
    ///
    /// Returns `Ok(None)` if the newest recorded block is still canonical (or
    /// nothing is recorded yet), `Ok(Some(event))` for a recoverable reorg and
    /// [`IndexerError::DeepReorg`] if no recorded block is canonical anymore.
    pub async fn check(
        &self,
        recorded: &[BlockRef],
        source: &dyn BlockHashSource,
    ) -> Result<Option<ReorgEvent>, IndexerError> {
        let Some(newest) = recorded.last() else {
            return Ok(None);
        };

        let mut newer: Option<(&BlockRef, String)> = None;
        for (depth, block) in recorded.iter().rev().take(self.retained()).enumerate() {
            let current = source.canonical_hash(block.number).await?.ok_or_else(|| {
                IndexerError::InconsistentNode(format!(
                    "node has no block #{} although it was recorded",
                    block.number
                ))
            })?;

            if block.same_hash(&current) {
                let Some((diverged, new_hash)) = newer else {
                    return Ok(None);
                };
                let event = ReorgEvent {
                    fork_block: block.number + 1,
                    ancestor: block.clone(),
                    old_hash: diverged.hash.clone(),
                    new_hash,
                    depth: depth as u64,
                };
                tracing::warn!(
                    fork_block = event.fork_block,
                    depth = event.depth,
                    old_hash = %event.old_hash,
                    new_hash = %event.new_hash,
                    "Reorg detected"
                );
                return Ok(Some(event));
            }

            tracing::debug!(number = block.number, recorded = %block.hash, current = %current, "Recorded hash replaced");
            newer = Some((block, current));
        }

        Err(IndexerError::DeepReorg {
            last_block: newest.number,
            window: recorded.len().min(self.retained()),
        })
    }

    /// Drop every recorded block at or after the fork point.
    pub fn rewind(recorded: &mut Vec<BlockRef>, event: &ReorgEvent) {
        recorded.retain(|b| b.number < event.fork_block);
    }
}
