//! Error types for the ingestion pipeline.
//!
//! Each stage has its own error so the engine can decide what is fatal:
//! schema errors stop registration, decode errors skip a single log,
//! node errors are retried, handler errors follow the delivery policy.

use thiserror::Error;

/// Errors raised while registering or resolving watched events.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("invalid contract ABI: {0}")]
    InvalidAbi(String),

    #[error("event `{event}` not found in contract ABI")]
    EventNotFound { event: String },

    #[error("event `{event}` is ambiguous: {count} overloads in contract ABI")]
    Ambiguous { event: String, count: usize },

    #[error("event `{event}` is anonymous and has no topic hash")]
    Anonymous { event: String },

    #[error("invalid contract address `{0}`")]
    InvalidAddress(String),

    #[error("unsupported type `{ty}` for field `{field}`: {reason}")]
    InvalidType {
        field: String,
        ty: String,
        reason: String,
    },

    #[error("no watched event for topic {topic} at {address}")]
    NotFound { topic: String, address: String },
}

/// Errors raised while decoding a single raw log.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The log does not belong to any watched (contract, event) pair.
    #[error("log {tx_hash}:{log_index} does not match a watched event")]
    Unwatched { tx_hash: String, log_index: u32 },

    /// The schema resolved but the topics or data do not decode.
    #[error("malformed `{event}` log {tx_hash}:{log_index}: {reason}")]
    Malformed {
        event: String,
        tx_hash: String,
        log_index: u32,
        reason: String,
    },
}

impl DecodeError {
    /// Returns `true` if the log failed to decode against a resolved schema.
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed { .. })
    }
}

/// Errors returned by a node client.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out after {ms}ms")]
    Timeout { ms: u64 },

    #[error("rate limited by node")]
    RateLimited,

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("invalid node response: {0}")]
    InvalidResponse(String),
}

impl NodeError {
    /// JSON-RPC code used by common providers for "limit exceeded".
    pub const LIMIT_EXCEEDED: i64 = -32005;

    /// Returns `true` if the error is transient and the call may be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout { .. } | Self::RateLimited => true,
            Self::Rpc { code, .. } => *code == Self::LIMIT_EXCEEDED,
            Self::InvalidResponse(_) => false,
        }
    }
}

/// Error returned by an event handler for a single delivery.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("{0}")]
    Failed(String),

    #[error("handler timed out after {ms}ms")]
    Timeout { ms: u64 },
}

impl HandlerError {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed(reason.into())
    }
}

/// Cycle-level errors of the ingestion engine.
#[derive(Debug, Error)]
pub enum IndexerError {
    /// A node call kept failing after all retries; the cycle is aborted
    /// and the next tick resumes from the same checkpoint.
    #[error("fetch `{op}` failed after {attempts} attempt(s): {reason}")]
    Fetch {
        op: String,
        attempts: u32,
        reason: String,
    },

    /// No block in the recorded window matches the node's chain.
    #[error(
        "deep reorg: none of the {window} recorded block(s) up to #{last_block} match the node; \
         checkpoint must be reset"
    )]
    DeepReorg { last_block: u64, window: usize },

    /// The node returned data that contradicts itself within one cycle.
    #[error("inconsistent node response: {0}")]
    InconsistentNode(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("invalid configuration: {0}")]
    Config(String),

    /// The engine refuses to run until an operator resets the checkpoint.
    #[error("ingestion halted: {reason}")]
    Halted { reason: String },
}

impl IndexerError {
    /// Returns `true` if the error is a deep reorg.
    pub fn is_deep_reorg(&self) -> bool {
        matches!(self, Self::DeepReorg { .. })
    }

    /// Returns `true` if retrying on the next tick cannot succeed without
    /// operator intervention.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::DeepReorg { .. } | Self::Halted { .. } | Self::Config(_) | Self::Schema(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_error_retryability() {
        assert!(NodeError::Transport("reset".into()).is_retryable());
        assert!(NodeError::Timeout { ms: 10 }.is_retryable());
        assert!(NodeError::Rpc { code: NodeError::LIMIT_EXCEEDED, message: "limit".into() }
            .is_retryable());
        assert!(!NodeError::Rpc { code: -32602, message: "invalid params".into() }.is_retryable());
        assert!(!NodeError::InvalidResponse("garbage".into()).is_retryable());
    }

    #[test]
    fn fatal_classification() {
        assert!(IndexerError::DeepReorg { last_block: 10, window: 4 }.is_fatal());
        assert!(!IndexerError::Fetch { op: "logs".into(), attempts: 3, reason: "x".into() }
            .is_fatal());
        assert!(!IndexerError::InconsistentNode("x".into()).is_fatal());
    }
}
