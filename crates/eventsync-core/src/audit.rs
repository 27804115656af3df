//! Audit / alert channel.
//!
//! Nothing is dropped silently: logs that fail to decode, deliveries that are
//! abandoned, and reorgs are all reported here.

use std::sync::Mutex;

use serde::Serialize;

use crate::reorg::ReorgEvent;
use crate::types::EventKey;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditRecord {
    /// A log matched a watched event but could not be decoded. Not retried.
    DecodeFailed { key: EventKey, reason: String },
    /// A delivery failed and will be retried on a later cycle.
    DeliveryFailed {
        handler: String,
        key: EventKey,
        attempts: u32,
        reason: String,
    },
    /// A delivery exceeded the abandonment threshold and was skipped.
    DeliveryAbandoned {
        handler: String,
        key: EventKey,
        attempts: u32,
        reason: String,
    },
    /// A recoverable reorg was detected and the range rewound.
    Reorg(ReorgEvent),
    /// An unrecoverable reorg halted ingestion.
    DeepReorg { last_block: u64, reason: String },
}

impl AuditRecord {
    /// Records that need an operator's attention.
    pub fn is_alert(&self) -> bool {
        matches!(self, Self::DeliveryAbandoned { .. } | Self::DeepReorg { .. })
    }
}

pub trait AuditSink: Send + Sync {
    fn record(&self, record: AuditRecord);
}

/// Default sink: structured log lines.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, record: AuditRecord) {
        match &record {
            AuditRecord::DecodeFailed { key, reason } => {
                tracing::warn!(target: "eventsync::audit", %key, %reason, "Log failed to decode");
            }
            AuditRecord::DeliveryFailed { handler, key, attempts, reason } => {
                tracing::warn!(target: "eventsync::audit", handler = %handler, %key, attempts, %reason, "Delivery failed");
            }
            AuditRecord::DeliveryAbandoned { handler, key, attempts, reason } => {
                tracing::error!(
                    target: "eventsync::audit",
                    handler = %handler,
                    %key,
                    attempts,
                    %reason,
                    "ALERT: delivery abandoned"
                );
            }
            AuditRecord::Reorg(event) => {
                tracing::warn!(
                    target: "eventsync::audit",
                    fork_block = event.fork_block,
                    depth = event.depth,
                    "Chain reorganized, range rewound"
                );
            }
            AuditRecord::DeepReorg { last_block, reason } => {
                tracing::error!(target: "eventsync::audit", last_block, %reason, "ALERT: deep reorg, ingestion halted");
            }
        }
    }
}

/// Collects records in memory, for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn count(&self, pred: impl Fn(&AuditRecord) -> bool) -> usize {
        self.records().iter().filter(|r| pred(r)).count()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, record: AuditRecord) {
        if let Ok(mut records) = self.records.lock() {
            records.push(record);
        }
    }
}
