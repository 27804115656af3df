//! Consumer-facing handler trait and registry.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{HandlerError, IndexerError};
use crate::reorg::ReorgEvent;
use crate::types::DecodedEvent;

/// A consumer of decoded events.
///
/// Delivery is at-least-once: after a crash, or when an earlier event in the
/// same range is still failing, an event may be handed over again.
/// Implementations must be idempotent on [`DecodedEvent::key`].
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Stable, unique name; used as the delivery-bookkeeping key.
    fn name(&self) -> &str;

    /// Whether this handler wants `event` at all. Defaults to every event.
    fn interested(&self, _event: &DecodedEvent) -> bool {
        true
    }

    /// Process one event.
    async fn handle(&self, event: &DecodedEvent) -> Result<(), HandlerError>;

    /// Called before events from blocks at or after `reorg.fork_block` are
    /// re-delivered with their new block hashes.
    async fn on_reorg(&self, _reorg: &ReorgEvent) -> Result<(), HandlerError> {
        Ok(())
    }
}

/// Registered handlers, in registration order.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: Vec<Arc<dyn EventHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler. Names must be unique.
    pub fn register(&mut self, handler: Arc<dyn EventHandler>) -> Result<(), IndexerError> {
        if self.get(handler.name()).is_some() {
            return Err(IndexerError::Config(format!(
                "handler `{}` is already registered",
                handler.name()
            )));
        }
        self.handlers.push(handler);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn EventHandler>> {
        self.handlers.iter().find(|h| h.name() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn EventHandler>> {
        self.handlers.iter()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Tell every handler about a reorg. Failures are logged; re-delivery
    /// of the forked range proceeds regardless.
    pub async fn notify_reorg(&self, reorg: &ReorgEvent) {
        for handler in &self.handlers {
            if let Err(e) = handler.on_reorg(reorg).await {
                tracing::warn!(
                    handler = handler.name(),
                    fork_block = reorg.fork_block,
                    error = %e,
                    "Reorg notification failed"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BlockRef;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Counter {
        name: String,
        reorgs: AtomicU32,
    }

    impl Counter {
        fn new(name: &str) -> Arc<Self> {
            Arc::new(Self { name: name.into(), reorgs: AtomicU32::new(0) })
        }
    }

    #[async_trait]
    impl EventHandler for Counter {
        fn name(&self) -> &str {
            &self.name
        }

        async fn handle(&self, _event: &DecodedEvent) -> Result<(), HandlerError> {
            Ok(())
        }

        async fn on_reorg(&self, _reorg: &ReorgEvent) -> Result<(), HandlerError> {
            self.reorgs.fetch_add(1, Ordering::Relaxed);
            Err(HandlerError::failed("rollback unsupported"))
        }
    }

    #[test]
    fn duplicate_names_rejected() {
        let mut registry = HandlerRegistry::new();
        registry.register(Counter::new("balances")).unwrap();
        let err = registry.register(Counter::new("balances")).unwrap_err();
        assert!(matches!(err, IndexerError::Config(_)));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn reorg_notification_reaches_every_handler() {
        let a = Counter::new("a");
        let b = Counter::new("b");
        let mut registry = HandlerRegistry::new();
        registry.register(a.clone()).unwrap();
        registry.register(b.clone()).unwrap();

        let reorg = ReorgEvent {
            fork_block: 5,
            ancestor: BlockRef::new(4, "0x4"),
            old_hash: "0xa5".into(),
            new_hash: "0xb5".into(),
            depth: 1,
        };
        registry.notify_reorg(&reorg).await;

        assert_eq!(a.reorgs.load(Ordering::Relaxed), 1);
        assert_eq!(b.reorgs.load(Ordering::Relaxed), 1);
    }
}
