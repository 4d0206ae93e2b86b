//! Event Sink
//!
//! Durable storage backing the event log. `InMemorySink` is the default for
//! this engine and for tests; a Redis Streams-backed sink (per SPEC_FULL.md
//! §6's "Persisted state") can implement the same trait without touching
//! `EventBus` callers.

use ctforge_types::Event;
use dashmap::DashMap;
use std::sync::RwLock;

#[async_trait::async_trait]
pub trait EventSink: Send + Sync {
    /// Durably append `event` to `partition`, returning only once the
    /// append is acknowledged.
    async fn append(&self, partition: &str, event: Event) -> anyhow::Result<()>;

    /// Point-in-time snapshot of a partition's full ordered log. Used by
    /// `consume` to compute undelivered offsets.
    fn snapshot(&self, partition: &str) -> Vec<Event>;
}

/// In-process append log, one `Vec<Event>` per partition guarded by an
/// `RwLock`, keyed in a `DashMap` for concurrent access across partitions.
#[derive(Default)]
pub struct InMemorySink {
    partitions: DashMap<String, RwLock<Vec<Event>>>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl EventSink for InMemorySink {
    async fn append(&self, partition: &str, event: Event) -> anyhow::Result<()> {
        let log = self
            .partitions
            .entry(partition.to_string())
            .or_insert_with(|| RwLock::new(Vec::new()));
        log.write()
            .map_err(|_| anyhow::anyhow!("event log lock poisoned"))?
            .push(event);
        Ok(())
    }

    fn snapshot(&self, partition: &str) -> Vec<Event> {
        self.partitions
            .get(partition)
            .map(|log| log.read().map(|g| g.clone()).unwrap_or_default())
            .unwrap_or_default()
    }
}
