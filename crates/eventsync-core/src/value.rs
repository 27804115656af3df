//! Decoded field values and the canonical JSON encoding used at the
//! system boundary.
//!
//! Encoding rules:
//! - integers of any width are decimal strings (no precision loss in JS),
//! - byte strings and fixed bytes are `0x`-prefixed lower-case hex, or
//!   right-padded UTF-8 text under [`BytesFormat::Text`],
//! - addresses are lower-case `0x` hex,
//! - arrays and tuples are JSON arrays.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::types::DecodedEvent;

/// Rendering of `bytes` and `bytesN` values in the JSON encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BytesFormat {
    /// `0x`-prefixed lower-case hex.
    #[default]
    Hex,
    /// UTF-8 text with trailing NULs stripped (`bytes32` names and symbols).
    /// Values that are not valid UTF-8 stay hex.
    Text,
}

/// A decoded, typed event field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Bool(bool),
    Uint(u128),
    /// Unsigned integer wider than 128 bits, as a decimal string.
    BigUint(String),
    Int(i128),
    /// Signed integer wider than 128 bits, as a decimal string.
    BigInt(String),
    /// 20-byte address, lower-case hex with `0x` prefix.
    Address(String),
    /// Dynamic `bytes`.
    Bytes(Vec<u8>),
    /// `bytes1` .. `bytes32`, and hashed indexed reference types.
    FixedBytes(Vec<u8>),
    Str(String),
    Array(Vec<FieldValue>),
    Tuple(Vec<FieldValue>),
}

impl FieldValue {
    /// Canonical JSON form of this value.
    pub fn to_json(&self) -> Value {
        self.to_json_as(BytesFormat::Hex)
    }

    /// JSON form with byte values rendered per `bytes`.
    pub fn to_json_as(&self, bytes: BytesFormat) -> Value {
        match self {
            Self::Bool(b) => Value::Bool(*b),
            Self::Uint(v) => Value::String(v.to_string()),
            Self::Int(v) => Value::String(v.to_string()),
            Self::BigUint(s) | Self::BigInt(s) => Value::String(s.clone()),
            Self::Address(a) => Value::String(a.to_ascii_lowercase()),
            Self::Bytes(b) | Self::FixedBytes(b) => match bytes {
                BytesFormat::Text => padded_text(b).map_or_else(|| hex_string(b), Value::String),
                BytesFormat::Hex => hex_string(b),
            },
            Self::Str(s) => Value::String(s.clone()),
            Self::Array(items) | Self::Tuple(items) => {
                Value::Array(items.iter().map(|v| v.to_json_as(bytes)).collect())
            }
        }
    }

    pub fn as_address(&self) -> Option<&str> {
        match self {
            Self::Address(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_u128(&self) -> Option<u128> {
        match self {
            Self::Uint(v) => Some(*v),
            _ => None,
        }
    }
}

fn hex_string(b: &[u8]) -> Value {
    Value::String(format!("0x{}", hex::encode(b)))
}

/// Right-padded UTF-8 text; `None` if the unpadded prefix is not UTF-8.
fn padded_text(b: &[u8]) -> Option<String> {
    let end = b.iter().rposition(|&c| c != 0).map_or(0, |i| i + 1);
    std::str::from_utf8(&b[..end]).ok().map(str::to_owned)
}

/// Encode an ordered field map as a JSON object, preserving field order.
pub fn encode_fields<'a>(fields: impl IntoIterator<Item = (&'a String, &'a FieldValue)>) -> Value {
    encode_fields_as(fields, BytesFormat::Hex)
}

pub fn encode_fields_as<'a>(
    fields: impl IntoIterator<Item = (&'a String, &'a FieldValue)>,
    bytes: BytesFormat,
) -> Value {
    let mut map = Map::new();
    for (name, value) in fields {
        map.insert(name.clone(), value.to_json_as(bytes));
    }
    Value::Object(map)
}

/// Encode a decoded event, with its position metadata, for transport.
pub fn encode_event(event: &DecodedEvent) -> Value {
    encode_event_as(event, BytesFormat::Hex)
}

pub fn encode_event_as(event: &DecodedEvent, bytes: BytesFormat) -> Value {
    json!({
        "event": event.name(),
        "signature": event.event.signature,
        "address": event.address(),
        "block_number": event.block_number,
        "block_hash": event.block_hash,
        "tx_hash": event.tx_hash,
        "log_index": event.log_index,
        "fields": encode_fields_as(&event.fields, bytes),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EventField, WatchedEvent};
    use indexmap::IndexMap;
    use std::sync::Arc;

    #[test]
    fn integers_encode_as_decimal_strings() {
        assert_eq!(FieldValue::Uint(u128::MAX).to_json(), json!(u128::MAX.to_string()));
        assert_eq!(FieldValue::Int(-5).to_json(), json!("-5"));
        assert_eq!(FieldValue::BigUint("1".repeat(40)).to_json(), json!("1".repeat(40)));
    }

    #[test]
    fn bytes_encode_as_hex() {
        assert_eq!(FieldValue::Bytes(vec![0xde, 0xad]).to_json(), json!("0xdead"));
        assert_eq!(FieldValue::FixedBytes(vec![]).to_json(), json!("0x"));
    }

    #[test]
    fn text_format_strips_trailing_nuls() {
        let mut raw = b"USDC".to_vec();
        raw.resize(32, 0);
        let symbol = FieldValue::FixedBytes(raw);
        assert_eq!(symbol.to_json_as(BytesFormat::Text), json!("USDC"));
        assert_eq!(symbol.to_json(), json!(format!("0x55534443{}", "00".repeat(28))));
        assert_eq!(FieldValue::Bytes(vec![0; 4]).to_json_as(BytesFormat::Text), json!(""));
    }

    #[test]
    fn text_format_keeps_non_utf8_as_hex() {
        let nested = FieldValue::Array(vec![
            FieldValue::Bytes(b"ok".to_vec()),
            FieldValue::FixedBytes(vec![0xff, 0]),
            FieldValue::Uint(7),
        ]);
        assert_eq!(nested.to_json_as(BytesFormat::Text), json!(["ok", "0xff00", "7"]));
    }

    #[test]
    fn encode_event_preserves_field_order() {
        let watched = Arc::new(WatchedEvent {
            address: "0xaa".into(),
            name: "Transfer".into(),
            signature: "Transfer(address,address,uint256)".into(),
            topic0: "0xddf2".into(),
            fields: vec![EventField { name: "value".into(), ty: "uint256".into(), indexed: false }],
        });
        let mut fields = IndexMap::new();
        fields.insert("to".to_string(), FieldValue::Address("0xBB".into()));
        fields.insert("from".to_string(), FieldValue::Address("0xCC".into()));
        let event = DecodedEvent {
            event: watched,
            block_number: 9,
            block_hash: "0xb9".into(),
            tx_hash: "0xt9".into(),
            log_index: 1,
            fields,
        };
        let json = encode_event(&event);
        assert_eq!(json, encode_event_as(&event, BytesFormat::Text));
        assert_eq!(json["event"], "Transfer");
        assert_eq!(json["fields"]["to"], "0xbb");
        let keys: Vec<_> = json["fields"].as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["to", "from"]);
    }
}
