//! Sequential Orchestrator
//!
//! Drives one workflow through its fixed pipeline, one stage at a time on a
//! single `tokio::spawn`ed task, per SPEC_FULL.md §4.5.

use std::sync::Arc;

use ctforge_eventbus::EventBus;
use ctforge_stages::{ServiceRegistry, WorkflowContext};
use ctforge_types::{Event, EventType, WorkflowError, WorkflowStatus};
use tokio::sync::watch;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::pipeline::PipelineEntry;

/// Per-stage outcome reported back to the Coordinator so it can update
/// workflow status/progress/history without the orchestrator owning
/// persistence concerns directly.
#[derive(Debug, Clone)]
pub enum StageOutcome {
    Started {
        stage_name: &'static str,
        status: WorkflowStatus,
    },
    Completed {
        stage_name: &'static str,
        progress: u8,
    },
    FailedAdvisory {
        stage_name: &'static str,
        error: String,
    },
    FailedFatal {
        stage_name: &'static str,
        error: String,
    },
    Cancelled,
}

pub struct SequentialOrchestrator {
    registry: Arc<ServiceRegistry>,
    event_bus: Arc<EventBus>,
    pipeline: Vec<PipelineEntry>,
}

impl SequentialOrchestrator {
    pub fn new(registry: Arc<ServiceRegistry>, event_bus: Arc<EventBus>, pipeline: Vec<PipelineEntry>) -> Self {
        Self {
            registry,
            event_bus,
            pipeline,
        }
    }

    /// Run every pipeline stage against `ctx` in order. `cancel` is polled
    /// before each stage boundary; a set flag stops the pipeline there
    /// without interrupting a stage already in flight (cooperative
    /// cancellation, per §4.5). Emits one `StageOutcome` per transition via
    /// `on_outcome` so the Coordinator can mirror workflow state without the
    /// orchestrator reaching into persistence itself.
    #[instrument(skip(self, ctx, cancel, on_outcome), fields(workflow_id = %workflow_id))]
    pub async fn run(
        &self,
        workflow_id: Uuid,
        ctx: &mut WorkflowContext,
        mut cancel: watch::Receiver<bool>,
        mut on_outcome: impl FnMut(StageOutcome),
    ) -> Result<(), WorkflowError> {
        self.event_bus
            .publish(Event::new(
                EventType::WorkflowStarted,
                workflow_id,
                "orchestrator",
                serde_json::json!({}),
            ))
            .await
            .ok();

        for entry in &self.pipeline {
            if *cancel.borrow_and_update() {
                info!(stage = entry.stage_name, "cancellation observed at stage boundary");
                on_outcome(StageOutcome::Cancelled);
                self.event_bus
                    .publish(Event::new(
                        EventType::WorkflowCancelled,
                        workflow_id,
                        "orchestrator",
                        serde_json::json!({}),
                    ))
                    .await
                    .ok();
                return Err(WorkflowError::Cancelled);
            }

            let service = self.registry.get(entry.stage_name).ok_or_else(|| {
                WorkflowError::Internal(format!("no stage registered for {}", entry.stage_name))
            })?;

            on_outcome(StageOutcome::Started {
                stage_name: entry.stage_name,
                status: entry.status_on_start,
            });

            if let Err(err) = service.validate(ctx).await {
                service.on_error(workflow_id, &err);
                self.handle_stage_failure(workflow_id, entry, err, &mut on_outcome).await?;
                continue;
            }

            match service.process(workflow_id, ctx, &self.event_bus).await {
                Ok(()) => {
                    on_outcome(StageOutcome::Completed {
                        stage_name: entry.stage_name,
                        progress: entry.progress_milestone,
                    });
                }
                Err(err) => {
                    service.on_error(workflow_id, &err);
                    self.handle_stage_failure(workflow_id, entry, err, &mut on_outcome).await?;
                }
            }
        }

        self.event_bus
            .publish(Event::new(
                EventType::WorkflowCompleted,
                workflow_id,
                "orchestrator",
                serde_json::json!({}),
            ))
            .await
            .ok();
        Ok(())
    }

    async fn handle_stage_failure(
        &self,
        workflow_id: Uuid,
        entry: &PipelineEntry,
        err: WorkflowError,
        on_outcome: &mut impl FnMut(StageOutcome),
    ) -> Result<(), WorkflowError> {
        if entry.fatal {
            on_outcome(StageOutcome::FailedFatal {
                stage_name: entry.stage_name,
                error: err.to_string(),
            });
            self.event_bus
                .publish(Event::new(
                    EventType::WorkflowFailed,
                    workflow_id,
                    "orchestrator",
                    serde_json::json!({"stage": entry.stage_name, "error": err.to_string()}),
                ))
                .await
                .ok();
            Err(err)
        } else {
            warn!(stage = entry.stage_name, error = %err, "non-fatal stage failed; continuing pipeline");
            on_outcome(StageOutcome::FailedAdvisory {
                stage_name: entry.stage_name,
                error: err.to_string(),
            });
            Ok(())
        }
    }
}
