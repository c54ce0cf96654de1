//! Processor registry
//!
//! Maps `(version, direction, action)` to the ordered list of registered
//! processors. Ordering is insertion order, stable-sorted by declared
//! priority, so two processors at the same priority run in the order they
//! were registered.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use super::processor::ActionProcessor;
use crate::domain::ActionKey;

struct Registration {
    processor: Arc<dyn ActionProcessor>,
    priority: i32,
    seq: usize,
}

/// Registry of action processors.
pub struct ProcessorRegistry {
    table: DashMap<ActionKey, Vec<Registration>>,
    counter: AtomicUsize,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self {
            table: DashMap::new(),
            counter: AtomicUsize::new(0),
        }
    }

    /// Register a processor for every action it declares.
    pub fn register(&self, processor: Arc<dyn ActionProcessor>) {
        let seq = self.counter.fetch_add(1, Ordering::SeqCst);
        let priority = processor.priority();
        for key in processor.actions() {
            debug!(action = %key, priority, "Registering processor");
            let mut entry = self.table.entry(key).or_default();
            entry.push(Registration {
                processor: processor.clone(),
                priority,
                seq,
            });
            entry.sort_by_key(|r| (r.priority, r.seq));
        }
    }

    /// Ordered processors for one action; empty if none registered.
    pub fn processors_for(&self, key: &ActionKey) -> Vec<Arc<dyn ActionProcessor>> {
        self.table
            .get(key)
            .map(|entry| entry.iter().map(|r| r.processor.clone()).collect())
            .unwrap_or_default()
    }

    pub fn is_registered(&self, key: &ActionKey) -> bool {
        self.table.get(key).map(|e| !e.is_empty()).unwrap_or(false)
    }
}

impl Default for ProcessorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::action::v16::CentralAction;
    use crate::engine::processor::ProcessError;
    use crate::protocol::{Envelope, ResultSink};
    use async_trait::async_trait;

    struct Tagged {
        tag: &'static str,
        priority: i32,
    }

    #[async_trait]
    impl ActionProcessor for Tagged {
        fn actions(&self) -> Vec<ActionKey> {
            vec![CentralAction::Heartbeat.key()]
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        async fn process(
            &self,
            _envelope: &Envelope,
            sink: &ResultSink,
        ) -> Result<(), ProcessError> {
            sink.deliver_result(&serde_json::json!({"tag": self.tag}));
            Ok(())
        }
    }

    #[test]
    fn insertion_order_within_same_priority() {
        let registry = ProcessorRegistry::new();
        registry.register(Arc::new(Tagged {
            tag: "first",
            priority: 0,
        }));
        registry.register(Arc::new(Tagged {
            tag: "second",
            priority: 0,
        }));

        let procs = registry.processors_for(&CentralAction::Heartbeat.key());
        assert_eq!(procs.len(), 2);
    }

    #[test]
    fn lower_priority_runs_first() {
        let registry = ProcessorRegistry::new();
        registry.register(Arc::new(Tagged {
            tag: "late",
            priority: 10,
        }));
        registry.register(Arc::new(Tagged {
            tag: "early",
            priority: -10,
        }));

        let procs = registry.processors_for(&CentralAction::Heartbeat.key());
        assert_eq!(procs[0].priority(), -10);
        assert_eq!(procs[1].priority(), 10);
    }

    #[test]
    fn unknown_action_is_empty() {
        let registry = ProcessorRegistry::new();
        assert!(registry
            .processors_for(&CentralAction::Authorize.key())
            .is_empty());
        assert!(!registry.is_registered(&CentralAction::Authorize.key()));
    }
}
