//! `AbiIndex`: registry of watched (contract, event) pairs.
//!
//! Events are keyed by `(contract address, topics[0])`. The same event
//! signature on two contracts resolves to two independent entries, and a
//! contract's unwatched events never resolve.

use std::collections::HashMap;
use std::sync::Arc;

use alloy_dyn_abi::DynSolType;
use alloy_json_abi::{Event, JsonAbi};
use alloy_primitives::Address;

use eventsync_core::error::SchemaError;
use eventsync_core::types::{EventField, LogFilter, WatchedEvent};

/// Lower-case `0x…` form of `address`, after validating it.
pub fn normalize_address(address: &str) -> Result<String, SchemaError> {
    let parsed: Address = address
        .trim()
        .parse()
        .map_err(|_| SchemaError::InvalidAddress(address.to_string()))?;
    Ok(format!("{parsed:#x}"))
}

/// Parse ABI JSON. Accepts a bare ABI array or a compiler artifact with an
/// `abi` key.
pub fn parse_abi(json: &str) -> Result<JsonAbi, SchemaError> {
    match serde_json::from_str::<JsonAbi>(json) {
        Ok(abi) => Ok(abi),
        Err(e) => {
            #[derive(serde::Deserialize)]
            struct Artifact {
                abi: JsonAbi,
            }
            serde_json::from_str::<Artifact>(json)
                .map(|a| a.abi)
                .map_err(|_| SchemaError::InvalidAbi(e.to_string()))
        }
    }
}

/// `topics[0]` of `event_name` in `abi`, without registering anything.
pub fn event_topic(abi: &JsonAbi, event_name: &str) -> Result<String, SchemaError> {
    let event = find_event(abi, event_name)?;
    Ok(format!("0x{}", hex::encode(event.selector())))
}

fn find_event<'a>(abi: &'a JsonAbi, event_name: &str) -> Result<&'a Event, SchemaError> {
    let overloads = abi
        .events
        .get(event_name)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| SchemaError::EventNotFound { event: event_name.to_string() })?;
    if overloads.len() > 1 {
        return Err(SchemaError::Ambiguous {
            event: event_name.to_string(),
            count: overloads.len(),
        });
    }
    let event = &overloads[0];
    if event.anonymous {
        return Err(SchemaError::Anonymous { event: event_name.to_string() });
    }
    Ok(event)
}

fn watched_event(address: String, event: &Event) -> Result<WatchedEvent, SchemaError> {
    let mut fields = Vec::with_capacity(event.inputs.len());
    for (i, input) in event.inputs.iter().enumerate() {
        let name = if input.name.is_empty() { format!("arg{i}") } else { input.name.clone() };
        let ty = input.selector_type().into_owned();
        DynSolType::parse(&ty).map_err(|e| SchemaError::InvalidType {
            field: name.clone(),
            ty: ty.clone(),
            reason: e.to_string(),
        })?;
        fields.push(EventField { name, ty, indexed: input.indexed });
    }

    Ok(WatchedEvent {
        address,
        name: event.name.clone(),
        signature: event.signature(),
        topic0: format!("0x{}", hex::encode(event.selector())),
        fields,
    })
}

/// Index of watched events.
///
/// Registration happens before or between ingestion cycles; lookups are
/// read-only. Every registration bumps [`AbiIndex::generation`] so the
/// engine knows to rebuild its log filter.
#[derive(Debug, Default)]
pub struct AbiIndex {
    entries: HashMap<(String, String), Arc<WatchedEvent>>,
    generation: u64,
}

impl AbiIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Watch `event_name` of `abi` on the contract at `address`.
    ///
    /// Registering the same pair twice returns the existing entry.
    pub fn register(
        &mut self,
        address: &str,
        abi: &JsonAbi,
        event_name: &str,
    ) -> Result<Arc<WatchedEvent>, SchemaError> {
        let address = normalize_address(address)?;
        let event = find_event(abi, event_name)?;
        let watched = watched_event(address, event)?;

        let key = (watched.address.clone(), watched.topic0.clone());
        if let Some(existing) = self.entries.get(&key) {
            return Ok(existing.clone());
        }

        tracing::info!(
            address = %watched.address,
            event = %watched.signature,
            topic0 = %watched.topic0,
            "Watching event"
        );
        let watched = Arc::new(watched);
        self.entries.insert(key, watched.clone());
        self.generation += 1;
        Ok(watched)
    }

    /// [`register`](Self::register) with ABI JSON text.
    pub fn register_json(
        &mut self,
        address: &str,
        abi_json: &str,
        event_name: &str,
    ) -> Result<Arc<WatchedEvent>, SchemaError> {
        let abi = parse_abi(abi_json)?;
        self.register(address, &abi, event_name)
    }

    /// Look up the watched event for a log's `topics[0]` and address.
    pub fn resolve(&self, topic0: &str, address: &str) -> Result<Arc<WatchedEvent>, SchemaError> {
        let key = (address.to_ascii_lowercase(), topic0.to_ascii_lowercase());
        self.entries.get(&key).cloned().ok_or_else(|| SchemaError::NotFound {
            topic: topic0.to_string(),
            address: address.to_string(),
        })
    }

    /// Every registered event, in no particular order.
    pub fn events(&self) -> impl Iterator<Item = &Arc<WatchedEvent>> {
        self.entries.values()
    }

    /// Node-side filter covering every registered pair.
    ///
    /// The filter is a superset (address × topic product); logs outside the
    /// registered pairs are dropped by [`resolve`](Self::resolve).
    pub fn filter(&self) -> LogFilter {
        let mut addresses: Vec<String> = self.entries.keys().map(|(a, _)| a.clone()).collect();
        let mut topic0s: Vec<String> = self.entries.keys().map(|(_, t)| t.clone()).collect();
        addresses.sort();
        addresses.dedup();
        topic0s.sort();
        topic0s.dedup();
        LogFilter { addresses, topic0s }
    }

    /// Incremented on every new registration.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
