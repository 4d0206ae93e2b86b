//! Event
//!
//! Append-only log entries published on the Event Bus for progress signaling
//! and external streaming. The type hierarchy is expressed as a tagged
//! union over a small closed set rather than runtime string matching, per
//! the REDESIGN FLAGS in SPEC_FULL.md.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    WorkflowCreated,
    WorkflowStarted,
    WorkflowCompleted,
    WorkflowFailed,
    WorkflowCancelled,
    GenerationStarted,
    GenerationCompleted,
    GenerationFailed,
    CompilationStarted,
    CompilationCompleted,
    CompilationFailed,
    AuditStarted,
    AuditCompleted,
    AuditFailed,
    TestingStarted,
    TestingCompleted,
    TestingFailed,
    DeploymentStarted,
    DeploymentConfirmed,
    DeploymentFailed,
}

impl EventType {
    pub fn as_str(self) -> &'static str {
        match self {
            EventType::WorkflowCreated => "workflow.created",
            EventType::WorkflowStarted => "workflow.started",
            EventType::WorkflowCompleted => "workflow.completed",
            EventType::WorkflowFailed => "workflow.failed",
            EventType::WorkflowCancelled => "workflow.cancelled",
            EventType::GenerationStarted => "generation.started",
            EventType::GenerationCompleted => "generation.completed",
            EventType::GenerationFailed => "generation.failed",
            EventType::CompilationStarted => "compilation.started",
            EventType::CompilationCompleted => "compilation.completed",
            EventType::CompilationFailed => "compilation.failed",
            EventType::AuditStarted => "audit.started",
            EventType::AuditCompleted => "audit.completed",
            EventType::AuditFailed => "audit.failed",
            EventType::TestingStarted => "testing.started",
            EventType::TestingCompleted => "testing.completed",
            EventType::TestingFailed => "testing.failed",
            EventType::DeploymentStarted => "deployment.started",
            EventType::DeploymentConfirmed => "deployment.confirmed",
            EventType::DeploymentFailed => "deployment.failed",
        }
    }

    /// Partition name this event routes to. All event types under one
    /// top-level namespace (`workflow`, `generation`, `compilation`,
    /// `audit`, `testing`, `deployment`) share a partition, so a consumer
    /// group cursor sees them in relative publish order.
    pub fn partition(self) -> &'static str {
        match self {
            EventType::WorkflowCreated
            | EventType::WorkflowStarted
            | EventType::WorkflowCompleted
            | EventType::WorkflowFailed
            | EventType::WorkflowCancelled => "workflow",
            EventType::GenerationStarted | EventType::GenerationCompleted | EventType::GenerationFailed => {
                "generation"
            }
            EventType::CompilationStarted | EventType::CompilationCompleted | EventType::CompilationFailed => {
                "compilation"
            }
            EventType::AuditStarted | EventType::AuditCompleted | EventType::AuditFailed => "audit",
            EventType::TestingStarted | EventType::TestingCompleted | EventType::TestingFailed => "testing",
            EventType::DeploymentStarted | EventType::DeploymentConfirmed | EventType::DeploymentFailed => {
                "deployment"
            }
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub workflow_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub data: serde_json::Value,
    pub source_agent: String,
}

impl Event {
    pub fn new(
        event_type: EventType,
        workflow_id: Uuid,
        source_agent: impl Into<String>,
        data: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type,
            workflow_id,
            timestamp: Utc::now(),
            data,
            source_agent: source_agent.into(),
        }
    }

    pub fn partition(&self) -> &'static str {
        self.event_type.partition()
    }
}
