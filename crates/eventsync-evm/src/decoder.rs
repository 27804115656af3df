//! `EventDecoder` turns a `RawLog` into a `DecodedEvent`.
//!
//! # Layout of an EVM log
//! - `topics[0]`: keccak256 of the event signature
//! - `topics[1..]`: indexed parameters, in declaration order, one word each
//! - `data`: the ABI-encoded tuple of the non-indexed parameters
//!
//! Indexed reference types (`string`, `bytes`, arrays, tuples) are stored as
//! the keccak256 of their encoding. The value is unrecoverable, so the raw
//! 32-byte topic is surfaced as [`FieldValue::FixedBytes`].
//!
//! Decoded values must re-encode to the bytes they came from: a `bool` topic
//! of `2` or an address with non-zero high bytes is malformed. Trailing bytes
//! after the data tuple are tolerated.

use std::sync::Arc;

use alloy_dyn_abi::{DynSolType, DynSolValue};
use indexmap::IndexMap;

use eventsync_core::error::DecodeError;
use eventsync_core::types::{DecodedEvent, RawLog, WatchedEvent};
use eventsync_core::value::FieldValue;

use crate::abi::AbiIndex;
use crate::normalizer;

/// Stateless decoder over an [`AbiIndex`].
#[derive(Debug, Clone, Copy)]
pub struct EventDecoder<'a> {
    index: &'a AbiIndex,
}

impl<'a> EventDecoder<'a> {
    pub fn new(index: &'a AbiIndex) -> Self {
        Self { index }
    }

    /// Decode a log.
    ///
    /// [`DecodeError::Unwatched`] if the (topic, address) pair is not
    /// registered, [`DecodeError::Malformed`] if it is but the payload does not
    /// match the declared layout.
    pub fn decode(&self, log: &RawLog) -> Result<DecodedEvent, DecodeError> {
        let unwatched = || DecodeError::Unwatched {
            tx_hash: log.tx_hash.clone(),
            log_index: log.log_index,
        };
        let topic0 = log.topic0().ok_or_else(unwatched)?;
        let event = self.index.resolve(topic0, &log.address).map_err(|_| unwatched())?;
        decode_with(&event, log)
    }
}

/// Decode `log` against an already-resolved event.
pub fn decode_with(event: &Arc<WatchedEvent>, log: &RawLog) -> Result<DecodedEvent, DecodeError> {
    let malformed = |reason: String| DecodeError::Malformed {
        event: event.signature.clone(),
        tx_hash: log.tx_hash.clone(),
        log_index: log.log_index,
        reason,
    };

    let indexed_count = event.indexed_fields().count();
    if log.topics.len() != indexed_count + 1 {
        return Err(malformed(format!(
            "expected {} topics, got {}",
            indexed_count + 1,
            log.topics.len()
        )));
    }

    // Indexed fields → topics[1..]
    let mut indexed = Vec::with_capacity(indexed_count);
    for (field, topic) in event.indexed_fields().zip(&log.topics[1..]) {
        let word = parse_topic(topic).map_err(|e| malformed(format!("field `{}`: {e}", field.name)))?;
        let ty = parse_type(&field.ty).map_err(|e| malformed(format!("field `{}`: {e}", field.name)))?;
        let value = if is_hashed_when_indexed(&ty) {
            FieldValue::FixedBytes(word.to_vec())
        } else {
            let decoded = ty.abi_decode(&word).map_err(|e| malformed(format!("field `{}`: {e}", field.name)))?;
            if decoded.as_word().is_some_and(|w| w.0 != word) {
                return Err(malformed(format!("field `{}`: non-canonical topic {topic}", field.name)));
            }
            normalizer::normalize(decoded)
        };
        indexed.push(value);
    }

    // Non-indexed fields → data payload
    let data_types = event
        .data_fields()
        .map(|f| parse_type(&f.ty).map_err(|e| malformed(format!("field `{}`: {e}", f.name))))
        .collect::<Result<Vec<_>, _>>()?;
    let mut data = if data_types.is_empty() {
        if !log.data.is_empty() {
            tracing::debug!(tx_hash = %log.tx_hash, log_index = log.log_index, "Ignoring data on event without data fields");
        }
        Vec::new()
    } else {
        let decoded = DynSolType::Tuple(data_types)
            .abi_decode_sequence(&log.data)
            .map_err(|e| malformed(format!("data: {e}")))?;
        let canonical = decoded.abi_encode_sequence().unwrap_or_default();
        if !log.data.starts_with(&canonical) {
            return Err(malformed("data: non-canonical encoding".into()));
        }
        match decoded {
            DynSolValue::Tuple(values) => values,
            other => vec![other],
        }
    };

    // Reassemble in declaration order.
    let mut indexed = indexed.into_iter();
    data.reverse();
    let mut fields = IndexMap::with_capacity(event.fields.len());
    for field in &event.fields {
        let value = if field.indexed {
            indexed.next()
        } else {
            data.pop().map(normalizer::normalize)
        };
        let value = value.ok_or_else(|| malformed(format!("field `{}` missing", field.name)))?;
        fields.insert(field.name.clone(), value);
    }

    Ok(DecodedEvent {
        event: event.clone(),
        block_number: log.block_number,
        block_hash: log.block_hash.clone(),
        tx_hash: log.tx_hash.clone(),
        log_index: log.log_index,
        fields,
    })
}

fn parse_type(ty: &str) -> Result<DynSolType, String> {
    DynSolType::parse(ty).map_err(|e| e.to_string())
}

fn parse_topic(topic: &str) -> Result<[u8; 32], String> {
    let hex_str = topic.strip_prefix("0x").unwrap_or(topic);
    let bytes = hex::decode(hex_str).map_err(|e| format!("invalid topic hex: {e}"))?;
    <[u8; 32]>::try_from(bytes.as_slice())
        .map_err(|_| format!("topic is {} bytes, expected 32", bytes.len()))
}

fn is_hashed_when_indexed(ty: &DynSolType) -> bool {
    matches!(
        ty,
        DynSolType::String
            | DynSolType::Bytes
            | DynSolType::Array(_)
            | DynSolType::FixedArray(..)
            | DynSolType::Tuple(_)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const ERC20_ABI: &str = r#"[
        {"type":"event","name":"Transfer","anonymous":false,"inputs":[
            {"name":"from","type":"address","indexed":true},
            {"name":"to","type":"address","indexed":true},
            {"name":"value","type":"uint256","indexed":false}]}
    ]"#;
    const TRANSFER_TOPIC: &str =
        "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef";
    const TOKEN: &str = "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48";

    fn addr_topic(byte: u8) -> String {
        format!("0x{}{}", "00".repeat(12), format!("{byte:02x}").repeat(20))
    }

    fn word(n: u128) -> Vec<u8> {
        let mut w = vec![0u8; 16];
        w.extend_from_slice(&n.to_be_bytes());
        w
    }

    fn transfer_log(data: Vec<u8>) -> RawLog {
        RawLog {
            address: TOKEN.into(),
            topics: vec![TRANSFER_TOPIC.into(), addr_topic(0x11), addr_topic(0x22)],
            data,
            block_number: 100,
            block_hash: "0xb100".into(),
            tx_hash: "0xt1".into(),
            log_index: 3,
            removed: false,
        }
    }

    fn index() -> AbiIndex {
        let mut index = AbiIndex::new();
        index.register_json(TOKEN, ERC20_ABI, "Transfer").unwrap();
        index
    }

    #[test]
    fn decode_transfer() {
        let index = index();
        let ev = EventDecoder::new(&index).decode(&transfer_log(word(1_000))).unwrap();
        assert_eq!(ev.name(), "Transfer");
        assert_eq!(ev.fields.keys().collect::<Vec<_>>(), ["from", "to", "value"]);
        assert_eq!(ev.field("from").and_then(FieldValue::as_address), Some(&*format!("0x{}", "11".repeat(20))));
        assert_eq!(ev.field("value").and_then(FieldValue::as_u128), Some(1_000));
        assert_eq!(ev.position(), (100, 3));
    }

    #[test]
    fn short_data_is_malformed() {
        let index = index();
        let err = EventDecoder::new(&index).decode(&transfer_log(vec![0; 7])).unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn wrong_topic_count_is_malformed() {
        let index = index();
        let mut log = transfer_log(word(1));
        log.topics.pop();
        assert!(EventDecoder::new(&index).decode(&log).unwrap_err().is_malformed());
    }

    #[test]
    fn unregistered_address_is_unwatched() {
        let index = index();
        let mut log = transfer_log(word(1));
        log.address = format!("0x{}", "99".repeat(20));
        assert!(matches!(
            EventDecoder::new(&index).decode(&log),
            Err(DecodeError::Unwatched { .. })
        ));

        log.topics.clear();
        assert!(matches!(
            EventDecoder::new(&index).decode(&log),
            Err(DecodeError::Unwatched { .. })
        ));
    }

    #[test]
    fn dirty_address_topic_is_malformed() {
        let index = index();
        let mut log = transfer_log(word(1));
        log.topics[1] = format!("0x{}{}", "ff".repeat(12), "11".repeat(20));
        let err = EventDecoder::new(&index).decode(&log).unwrap_err();
        assert!(err.is_malformed());
        assert!(err.to_string().contains("field `from`"), "{err}");
    }

    #[test]
    fn bool_topic_must_be_zero_or_one() {
        let abi = r#"[{"type":"event","name":"Paused","anonymous":false,"inputs":[
            {"name":"on","type":"bool","indexed":true}]}]"#;
        let mut index = AbiIndex::new();
        let watched = index.register_json(TOKEN, abi, "Paused").unwrap();
        let flag = |v: u8| RawLog {
            topics: vec![watched.topic0.clone(), format!("0x{}", hex::encode(word(v as u128)))],
            ..transfer_log(vec![])
        };

        let decoder = EventDecoder::new(&index);
        assert_eq!(decoder.decode(&flag(1)).unwrap().field("on"), Some(&FieldValue::Bool(true)));
        assert_eq!(decoder.decode(&flag(0)).unwrap().field("on"), Some(&FieldValue::Bool(false)));
        assert!(decoder.decode(&flag(2)).unwrap_err().is_malformed());
    }

    #[test]
    fn dirty_address_in_data_is_malformed() {
        let abi = r#"[{"type":"event","name":"Owner","anonymous":false,"inputs":[
            {"name":"owner","type":"address","indexed":false}]}]"#;
        let mut index = AbiIndex::new();
        let watched = index.register_json(TOKEN, abi, "Owner").unwrap();
        let owner = |data: Vec<u8>| RawLog { topics: vec![watched.topic0.clone()], data, ..transfer_log(vec![]) };

        let mut clean = vec![0u8; 12];
        clean.extend([0x33; 20]);
        let mut dirty = clean.clone();
        dirty[0] = 0x01;

        let decoder = EventDecoder::new(&index);
        assert!(decoder.decode(&owner(clean)).is_ok());
        assert!(decoder.decode(&owner(dirty)).unwrap_err().is_malformed());
    }

    #[test]
    fn indexed_string_surfaces_topic_hash() {
        let abi = r#"[{"type":"event","name":"Named","anonymous":false,"inputs":[
            {"name":"label","type":"string","indexed":true},
            {"name":"id","type":"uint8","indexed":false}]}]"#;
        let mut index = AbiIndex::new();
        let watched = index.register_json(TOKEN, abi, "Named").unwrap();
        let hash = format!("0x{}", "ab".repeat(32));
        let log = RawLog {
            topics: vec![watched.topic0.clone(), hash],
            data: word(7),
            ..transfer_log(vec![])
        };
        let ev = EventDecoder::new(&index).decode(&log).unwrap();
        assert_eq!(ev.field("label"), Some(&FieldValue::FixedBytes(vec![0xab; 32])));
        assert_eq!(ev.field("id"), Some(&FieldValue::Uint(7)));
    }

    #[test]
    fn dynamic_data_fields() {
        let abi = r#"[{"type":"event","name":"Note","anonymous":false,"inputs":[
            {"name":"text","type":"string","indexed":false},
            {"name":"n","type":"uint256","indexed":false}]}]"#;
        let mut index = AbiIndex::new();
        let watched = index.register_json(TOKEN, abi, "Note").unwrap();

        // (string "hi", uint 5): offset, n, len, padded bytes
        let mut data = word(0x40);
        data.extend(word(5));
        data.extend(word(2));
        let mut text = b"hi".to_vec();
        text.resize(32, 0);
        data.extend(text);

        let log = RawLog {
            topics: vec![watched.topic0.clone()],
            data,
            ..transfer_log(vec![])
        };
        let ev = EventDecoder::new(&index).decode(&log).unwrap();
        assert_eq!(ev.field("text"), Some(&FieldValue::Str("hi".into())));
        assert_eq!(ev.field("n"), Some(&FieldValue::Uint(5)));
    }
}
