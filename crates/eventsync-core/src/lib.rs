//! eventsync-core: chain-agnostic foundation for reorg-safe event ingestion.
//!
//! # Architecture
//!
//! ```text
//! IngestionEngine (eventsync-evm)
//!      ├── NodeClient        (head, logs, block hashes)
//!      ├── ReorgDetector     (walks the checkpoint's recent-hash window)
//!      ├── CheckpointStore   (durable cursor + recent-hash window)
//!      ├── HandlerRegistry   (consumer handlers, idempotent)
//!      ├── DeliveryLedger    (per-handler delivery + attempt bookkeeping)
//!      └── AuditSink         (decode failures, abandoned deliveries, reorgs)
//! ```

pub mod audit;
pub mod checkpoint;
pub mod error;
pub mod handler;
pub mod indexer;
pub mod ledger;
pub mod node;
pub mod reorg;
pub mod retry;
pub mod types;
pub mod value;

pub use audit::{AuditRecord, AuditSink, MemoryAuditSink, TracingAuditSink};
pub use checkpoint::{Checkpoint, CheckpointStore, MemoryCheckpointStore};
pub use error::{DecodeError, HandlerError, IndexerError, NodeError, SchemaError};
pub use handler::{EventHandler, HandlerRegistry};
pub use indexer::{DeliveryConfig, IndexerConfig, IngestState};
pub use ledger::DeliveryLedger;
pub use node::NodeClient;
pub use reorg::{BlockHashSource, ReorgDetector, ReorgEvent};
pub use retry::{RetryConfig, RetryPolicy};
pub use types::{BlockRef, DecodedEvent, EventField, EventKey, LogFilter, RawLog, WatchedEvent};
pub use value::{encode_event, encode_event_as, encode_fields, encode_fields_as, BytesFormat, FieldValue};
