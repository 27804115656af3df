//! Node query interface consumed by the ingestion engine.
//!
//! Implementations are treated as unreliable: calls may fail, time out, or
//! disagree with each other between calls. The engine wraps every call in a
//! timeout and a retry policy.

use async_trait::async_trait;

use crate::error::NodeError;
use crate::types::{LogFilter, RawLog};

#[async_trait]
pub trait NodeClient: Send + Sync {
    /// Current head block number.
    async fn block_head(&self) -> Result<u64, NodeError>;

    /// All logs in `[from, to]` (inclusive) matching `filter`.
    async fn get_logs(&self, from: u64, to: u64, filter: &LogFilter) -> Result<Vec<RawLog>, NodeError>;

    /// Hash of the canonical block at `number`, or `None` if the node does
    /// not know that block.
    async fn block_hash(&self, number: u64) -> Result<Option<String>, NodeError>;
}

#[async_trait]
impl<T: NodeClient + ?Sized> NodeClient for std::sync::Arc<T> {
    async fn block_head(&self) -> Result<u64, NodeError> {
        (**self).block_head().await
    }

    async fn get_logs(&self, from: u64, to: u64, filter: &LogFilter) -> Result<Vec<RawLog>, NodeError> {
        (**self).get_logs(from, to, filter).await
    }

    async fn block_hash(&self, number: u64) -> Result<Option<String>, NodeError> {
        (**self).block_hash(number).await
    }
}
