//! WebSocket Event Hub
//!
//! Bridges the in-process Event Bus to `/ws/workflow/{id}` connections. The
//! hub registers one `EventHandler` per `EventType` at startup; each handler
//! forwards the event onto a `tokio::sync::broadcast` channel that every
//! open WebSocket subscribes to, filtering down to its own `workflow_id` in
//! the route handler (§6 WebSocket contract).

use std::sync::Arc;

use async_trait::async_trait;
use ctforge_eventbus::{EventBus, EventBusError, EventHandler};
use ctforge_types::{Event, EventType};
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 1024;

pub struct WsHub {
    sender: broadcast::Sender<Event>,
}

impl WsHub {
    pub fn new() -> Self {
        let (sender, _receiver) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Register this hub as a subscriber for every event type so all stage
    /// and orchestrator events reach connected WebSocket clients.
    pub fn attach(self: &Arc<Self>, event_bus: &EventBus) {
        for event_type in ALL_EVENT_TYPES {
            event_bus.subscribe(event_type, self.clone());
        }
    }
}

impl Default for WsHub {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventHandler for WsHub {
    async fn handle(&self, event: &Event) -> Result<(), EventBusError> {
        // `send` only errors when there are no receivers; that's expected
        // whenever no client is currently watching this workflow.
        let _ = self.sender.send(event.clone());
        Ok(())
    }
}

const ALL_EVENT_TYPES: [EventType; 20] = [
    EventType::WorkflowCreated,
    EventType::WorkflowStarted,
    EventType::WorkflowCompleted,
    EventType::WorkflowFailed,
    EventType::WorkflowCancelled,
    EventType::GenerationStarted,
    EventType::GenerationCompleted,
    EventType::GenerationFailed,
    EventType::CompilationStarted,
    EventType::CompilationCompleted,
    EventType::CompilationFailed,
    EventType::AuditStarted,
    EventType::AuditCompleted,
    EventType::AuditFailed,
    EventType::TestingStarted,
    EventType::TestingCompleted,
    EventType::TestingFailed,
    EventType::DeploymentStarted,
    EventType::DeploymentConfirmed,
    EventType::DeploymentFailed,
];

#[cfg(test)]
mod tests {
    use super::*;
    use ctforge_eventbus::InMemorySink;
    use uuid::Uuid;

    #[tokio::test]
    async fn attached_hub_forwards_published_events_to_subscribers() {
        let bus = EventBus::new(Arc::new(InMemorySink::new()));
        let hub = Arc::new(WsHub::new());
        hub.attach(&bus);
        let mut receiver = hub.subscribe();

        let workflow_id = Uuid::new_v4();
        bus.publish(Event::new(
            EventType::GenerationCompleted,
            workflow_id,
            "generation",
            serde_json::json!({}),
        ))
        .await
        .unwrap();

        let received = receiver.recv().await.unwrap();
        assert_eq!(received.workflow_id, workflow_id);
        assert_eq!(received.event_type, EventType::GenerationCompleted);
    }
}
