//! Shared types for the ingestion pipeline.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::value::FieldValue;

// ─── BlockRef ────────────────────────────────────────────────────────────────

/// A (number, hash) pair recorded in the checkpoint's reorg window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRef {
    pub number: u64,
    /// Block hash (`0x…`).
    pub hash: String,
}

impl BlockRef {
    pub fn new(number: u64, hash: impl Into<String>) -> Self {
        Self {
            number,
            hash: hash.into(),
        }
    }

    /// Hash comparison that ignores hex letter case.
    pub fn same_hash(&self, other: &str) -> bool {
        self.hash.eq_ignore_ascii_case(other)
    }
}

// ─── WatchedEvent ────────────────────────────────────────────────────────────

/// One parameter of a watched event, in ABI declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventField {
    pub name: String,
    /// Canonical ABI type, e.g. `uint256` or `(address,uint256)[]`.
    pub ty: String,
    /// `true` if the parameter is carried in a topic rather than the data.
    pub indexed: bool,
}

/// A registered (contract, event) pair. Immutable once registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchedEvent {
    /// Lower-case contract address (`0x…`).
    pub address: String,
    /// Event name, e.g. `Transfer`.
    pub name: String,
    /// Canonical signature, e.g. `Transfer(address,address,uint256)`.
    pub signature: String,
    /// Lower-case keccak256 of the signature (`0x…`), i.e. `topics[0]`.
    pub topic0: String,
    pub fields: Vec<EventField>,
}

impl WatchedEvent {
    pub fn indexed_fields(&self) -> impl Iterator<Item = &EventField> {
        self.fields.iter().filter(|f| f.indexed)
    }

    pub fn data_fields(&self) -> impl Iterator<Item = &EventField> {
        self.fields.iter().filter(|f| !f.indexed)
    }
}

// ─── RawLog ──────────────────────────────────────────────────────────────────

/// A log entry as returned by the node. Opaque until decoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLog {
    pub address: String,
    /// `topics[0]` is the event topic hash for non-anonymous events.
    pub topics: Vec<String>,
    pub data: Vec<u8>,
    pub block_number: u64,
    pub block_hash: String,
    pub tx_hash: String,
    pub log_index: u32,
    /// Set by the node when the log was dropped by a reorg.
    #[serde(default)]
    pub removed: bool,
}

impl RawLog {
    pub fn topic0(&self) -> Option<&str> {
        self.topics.first().map(String::as_str)
    }

    /// Sort key: ascending (block number, log index).
    pub fn position(&self) -> (u64, u32) {
        (self.block_number, self.log_index)
    }
}

// ─── LogFilter ───────────────────────────────────────────────────────────────

/// Address / topic filter handed to the node's `getLogs`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogFilter {
    /// Only logs from these addresses (empty = all addresses).
    pub addresses: Vec<String>,
    /// Only logs whose `topics[0]` is one of these (empty = all events).
    pub topic0s: Vec<String>,
}

impl LogFilter {
    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty() && self.topic0s.is_empty()
    }
}

// ─── DecodedEvent ────────────────────────────────────────────────────────────

/// Delivery identity of a decoded event.
///
/// The block hash is part of the key: a reorg can re-include the same
/// transaction in a different block, which must be delivered again.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventKey {
    pub block_number: u64,
    pub block_hash: String,
    pub tx_hash: String,
    pub log_index: u32,
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{}({})/{}:{}",
            self.block_number, self.block_hash, self.tx_hash, self.log_index
        )
    }
}

/// A decoded log ready for dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedEvent {
    pub event: Arc<WatchedEvent>,
    pub block_number: u64,
    pub block_hash: String,
    pub tx_hash: String,
    pub log_index: u32,
    /// Field name → value, in ABI declaration order.
    pub fields: IndexMap<String, FieldValue>,
}

impl DecodedEvent {
    pub fn name(&self) -> &str {
        &self.event.name
    }

    pub fn address(&self) -> &str {
        &self.event.address
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn position(&self) -> (u64, u32) {
        (self.block_number, self.log_index)
    }

    pub fn key(&self) -> EventKey {
        EventKey {
            block_number: self.block_number,
            block_hash: self.block_hash.clone(),
            tx_hash: self.tx_hash.clone(),
            log_index: self.log_index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_is_empty_without_addresses_or_topics() {
        assert!(LogFilter::default().is_empty());
        let f = LogFilter { addresses: vec!["0xabcdef".into()], topic0s: vec![] };
        assert!(!f.is_empty());
    }

    #[test]
    fn event_key_display() {
        let key = EventKey {
            block_number: 7,
            block_hash: "0xb7".into(),
            tx_hash: "0xt".into(),
            log_index: 2,
        };
        assert_eq!(key.to_string(), "#7(0xb7)/0xt:2");
    }
}
