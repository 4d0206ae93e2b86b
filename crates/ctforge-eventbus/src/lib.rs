//! Event Bus
//!
//! Partitioned append-only log with fan-out, modeled after the teacher's
//! Postgres-backed task result queue (`listener.rs`): a durable append log,
//! an at-least-once consumer-group pop with explicit ack, and a visibility
//! timeout for redelivery. Here the durable store is in-process rather than
//! Postgres-backed, behind an `EventSink` trait so a Redis Streams sink can
//! later be substituted without touching callers.

mod sink;

pub use sink::{EventSink, InMemorySink};

use ctforge_types::{Event, EventType};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum EventBusError {
    #[error("event sink unreachable: {0}")]
    SinkUnreachable(String),
}

/// A handler invoked synchronously (within `publish`) for every event of a
/// registered type. Failures are isolated: logged, never propagated to the
/// publisher.
#[async_trait::async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &Event) -> Result<(), EventBusError>;
}

/// Default visibility timeout before a pending (unacked) message is
/// redelivered to the same consumer group.
const DEFAULT_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(30);

struct ConsumerCursor {
    /// Next log offset within the partition not yet delivered to this group.
    next_offset: usize,
    /// Offsets delivered but not yet acked, with the instant they become
    /// eligible for redelivery.
    pending: std::collections::HashMap<usize, tokio::time::Instant>,
}

impl ConsumerCursor {
    fn new() -> Self {
        Self {
            next_offset: 0,
            pending: std::collections::HashMap::new(),
        }
    }
}

/// Partitioned append-only event log with consumer groups and in-process
/// subscriber fan-out.
pub struct EventBus {
    sink: Arc<dyn EventSink>,
    subscribers: DashMap<EventType, Vec<Arc<dyn EventHandler>>>,
    /// Keyed by (partition, group).
    cursors: DashMap<(String, String), ConsumerCursor>,
    visibility_timeout: Duration,
}

impl EventBus {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self {
            sink,
            subscribers: DashMap::new(),
            cursors: DashMap::new(),
            visibility_timeout: DEFAULT_VISIBILITY_TIMEOUT,
        }
    }

    pub fn with_visibility_timeout(mut self, timeout: Duration) -> Self {
        self.visibility_timeout = timeout;
        self
    }

    /// Register an in-process handler invoked on every publish of `event_type`.
    /// Delivery order within a single type matches publish order; order
    /// across types is not preserved.
    pub fn subscribe(&self, event_type: EventType, handler: Arc<dyn EventHandler>) {
        self.subscribers.entry(event_type).or_default().push(handler);
    }

    /// Append `event` to `events:<type>` and, once durability is
    /// acknowledged, synchronously invoke all registered subscribers for its
    /// type. Subscriber failures are logged and isolated.
    ///
    /// Returns an error only when the underlying sink is unreachable; the
    /// orchestrator must treat that as fatal to this event's observability
    /// only, never to the workflow itself (see SPEC_FULL.md §4.1).
    pub async fn publish(&self, event: Event) -> Result<(), EventBusError> {
        self.sink
            .append(event.partition(), event.clone())
            .await
            .map_err(|e| EventBusError::SinkUnreachable(e.to_string()))?;

        if let Some(handlers) = self.subscribers.get(&event.event_type) {
            for handler in handlers.iter() {
                if let Err(err) = handler.handle(&event).await {
                    warn!(
                        event_id = %event.id,
                        event_type = %event.event_type,
                        error = %err,
                        "event subscriber failed; isolating"
                    );
                }
            }
        }
        Ok(())
    }

    /// Pop up to `max` undelivered-or-expired messages for `(partition, group)`,
    /// marking them pending. Callers must `ack` each id they successfully
    /// process; unacked messages are redelivered after the visibility
    /// timeout.
    pub fn consume(
        &self,
        partition: &str,
        group: &str,
        max: usize,
    ) -> Vec<(usize, Event)> {
        let log = self.sink.snapshot(partition);
        let key = (partition.to_string(), group.to_string());
        let mut cursor = self.cursors.entry(key).or_insert_with(ConsumerCursor::new);
        let now = tokio::time::Instant::now();

        // Redeliver anything past its visibility timeout first.
        let mut expired: Vec<usize> = cursor
            .pending
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(offset, _)| *offset)
            .collect();
        expired.sort_unstable();

        let mut out = Vec::new();
        for offset in expired {
            if out.len() >= max {
                break;
            }
            if let Some(event) = log.get(offset) {
                cursor
                    .pending
                    .insert(offset, now + self.visibility_timeout);
                out.push((offset, event.clone()));
            }
        }

        while out.len() < max && cursor.next_offset < log.len() {
            let offset = cursor.next_offset;
            cursor.next_offset += 1;
            if cursor.pending.contains_key(&offset) {
                continue;
            }
            cursor
                .pending
                .insert(offset, now + self.visibility_timeout);
            out.push((offset, log[offset].clone()));
        }

        out
    }

    /// Acknowledge message `offset` for `(partition, group)`, removing it
    /// from the pending-redelivery set.
    pub fn ack(&self, partition: &str, group: &str, offset: usize) {
        let key = (partition.to_string(), group.to_string());
        if let Some(mut cursor) = self.cursors.get_mut(&key) {
            cursor.pending.remove(&offset);
        } else {
            error!(partition, group, offset, "ack for unknown consumer group");
        }
    }

    /// Convenience for tests and collaborators: publish and immediately
    /// generate a fresh id/timestamp event of the given type.
    pub fn new_event(
        event_type: EventType,
        workflow_id: Uuid,
        source_agent: &str,
        data: serde_json::Value,
    ) -> Event {
        Event::new(event_type, workflow_id, source_agent, data)
    }
}
