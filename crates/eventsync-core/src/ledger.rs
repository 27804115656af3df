//! Per-handler delivery bookkeeping.
//!
//! The ledger remembers which (handler, event) pairs are settled (delivered
//! or abandoned) and how many attempts a still-failing delivery has used.
//! When a range is re-fetched because a handler is still failing, settled
//! pairs are not sent again.

use std::collections::{HashMap, HashSet};

use crate::types::EventKey;

type Entry = (String, EventKey);

#[derive(Debug, Default)]
pub struct DeliveryLedger {
    delivered: HashSet<Entry>,
    abandoned: HashSet<Entry>,
    attempts: HashMap<Entry, u32>,
}

impl DeliveryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(handler: &str, key: &EventKey) -> Entry {
        (handler.to_string(), key.clone())
    }

    /// `true` if the pair was delivered or abandoned.
    pub fn is_settled(&self, handler: &str, key: &EventKey) -> bool {
        let entry = Self::entry(handler, key);
        self.delivered.contains(&entry) || self.abandoned.contains(&entry)
    }

    /// Attempts used so far by an unsettled delivery.
    pub fn attempts(&self, handler: &str, key: &EventKey) -> u32 {
        self.attempts.get(&Self::entry(handler, key)).copied().unwrap_or(0)
    }

    pub fn mark_delivered(&mut self, handler: &str, key: &EventKey) {
        let entry = Self::entry(handler, key);
        self.attempts.remove(&entry);
        self.delivered.insert(entry);
    }

    pub fn mark_abandoned(&mut self, handler: &str, key: &EventKey) {
        let entry = Self::entry(handler, key);
        self.attempts.remove(&entry);
        self.abandoned.insert(entry);
    }

    pub fn set_attempts(&mut self, handler: &str, key: &EventKey, attempts: u32) {
        self.attempts.insert(Self::entry(handler, key), attempts);
    }

    /// Restart attempt counting at or after `block` after a reorg.
    ///
    /// Settled pairs stay: keys carry the block hash, so a branch that comes
    /// back produces the same keys and must not be delivered twice.
    pub fn reset_attempts_from(&mut self, block: u64) {
        self.attempts.retain(|(_, k), _| k.block_number < block);
    }

    /// Drop bookkeeping below `block`; those blocks can no longer be re-fetched.
    pub fn prune_below(&mut self, block: u64) {
        self.retain(|key| key.block_number >= block);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.delivered.len() + self.abandoned.len() + self.attempts.len()
    }

    pub fn clear(&mut self) {
        self.delivered.clear();
        self.abandoned.clear();
        self.attempts.clear();
    }

    fn retain(&mut self, keep: impl Fn(&EventKey) -> bool) {
        self.delivered.retain(|(_, k)| keep(k));
        self.abandoned.retain(|(_, k)| keep(k));
        self.attempts.retain(|(_, k), _| keep(k));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(block: u64, hash: &str) -> EventKey {
        EventKey {
            block_number: block,
            block_hash: hash.into(),
            tx_hash: format!("0xt{block}"),
            log_index: 0,
        }
    }

    #[test]
    fn settled_is_per_handler() {
        let mut ledger = DeliveryLedger::new();
        ledger.mark_delivered("a", &key(1, "0x1"));
        assert!(ledger.is_settled("a", &key(1, "0x1")));
        assert!(!ledger.is_settled("b", &key(1, "0x1")));
    }

    #[test]
    fn block_hash_is_part_of_identity() {
        let mut ledger = DeliveryLedger::new();
        ledger.mark_delivered("a", &key(1, "0xold"));
        assert!(!ledger.is_settled("a", &key(1, "0xnew")));
    }

    #[test]
    fn attempts_cleared_when_settled() {
        let mut ledger = DeliveryLedger::new();
        let k = key(3, "0x3");
        ledger.set_attempts("a", &k, 2);
        assert_eq!(ledger.attempts("a", &k), 2);
        ledger.mark_abandoned("a", &k);
        assert_eq!(ledger.attempts("a", &k), 0);
        assert!(ledger.is_settled("a", &k));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn reorg_resets_attempts_but_keeps_settled() {
        let mut ledger = DeliveryLedger::new();
        ledger.mark_delivered("a", &key(5, "0x5"));
        ledger.mark_abandoned("a", &key(6, "0x6"));
        ledger.set_attempts("a", &key(4, "0x4"), 2);
        ledger.set_attempts("a", &key(7, "0x7"), 2);

        ledger.reset_attempts_from(5);
        assert!(ledger.is_settled("a", &key(5, "0x5")));
        assert!(ledger.is_settled("a", &key(6, "0x6")));
        assert_eq!(ledger.attempts("a", &key(4, "0x4")), 2);
        assert_eq!(ledger.attempts("a", &key(7, "0x7")), 0);
    }

    #[test]
    fn prune_drops_everything_below_block() {
        let mut ledger = DeliveryLedger::new();
        for n in 1..=6 {
            ledger.mark_delivered("a", &key(n, "0x"));
        }
        ledger.prune_below(3);
        assert_eq!(ledger.len(), 4);
        assert!(ledger.is_settled("a", &key(3, "0x")));
        assert!(!ledger.is_settled("a", &key(2, "0x")));
    }
}
