//! Workflow State Types
//!
//! A `Workflow` is one end-to-end execution of the five-stage pipeline for a
//! single natural-language description. Mutated only by the orchestrator
//! task assigned to it; reaches a terminal state exactly once.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a workflow. Transitions only move forward through the
/// pipeline order, or jump directly to `Failed`/`Cancelled` from any
/// non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Created,
    Generating,
    Compiling,
    Auditing,
    Testing,
    Deploying,
    Completed,
    Failed,
    Cancelled,
}

impl WorkflowStatus {
    /// True once a workflow cannot transition further.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            WorkflowStatus::Completed | WorkflowStatus::Failed | WorkflowStatus::Cancelled
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WorkflowStatus::Created => "created",
            WorkflowStatus::Generating => "generating",
            WorkflowStatus::Compiling => "compiling",
            WorkflowStatus::Auditing => "auditing",
            WorkflowStatus::Testing => "testing",
            WorkflowStatus::Deploying => "deploying",
            WorkflowStatus::Completed => "completed",
            WorkflowStatus::Failed => "failed",
            WorkflowStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Feature toggles requested for a workflow. The Coordinator silently
/// disables any toggle the target network does not support and records a
/// warning rather than failing the request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureToggles {
    #[serde(default)]
    pub optimize_for_metisvm: bool,
    #[serde(default)]
    pub enable_floating_point: bool,
    #[serde(default)]
    pub enable_ai_inference: bool,
    #[serde(default)]
    pub enable_eigenda: bool,
    #[serde(default)]
    pub enable_pef_batch: bool,
    /// When set, a Testing-stage failure becomes fatal instead of advisory.
    #[serde(default)]
    pub strict_test: bool,
}

/// Record of a status transition, kept for the workflow's audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub from_status: WorkflowStatus,
    pub to_status: WorkflowStatus,
    pub transitioned_at: DateTime<Utc>,
    pub source_stage: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub nlp_description: String,
    pub status: WorkflowStatus,
    pub progress: u8,
    pub target_network: String,
    pub features: FeatureToggles,
    pub error_message: Option<String>,
    pub warnings: Vec<String>,
    pub history: Vec<StateTransition>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Workflow {
    pub fn new(
        owner_id: Uuid,
        nlp_description: String,
        target_network: String,
        features: FeatureToggles,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner_id,
            nlp_description,
            status: WorkflowStatus::Created,
            progress: 0,
            target_network,
            features,
            error_message: None,
            warnings: Vec::new(),
            history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Move to a new status, recording the transition. `progress` is only
    /// ratcheted upward; callers pass the milestone value for the stage that
    /// just completed (see the pipeline table in SPEC_FULL.md §4.5).
    pub fn transition(&mut self, to: WorkflowStatus, progress: u8, source_stage: Option<&str>) {
        let from = self.status;
        self.status = to;
        self.progress = self.progress.max(progress.min(100));
        self.updated_at = Utc::now();
        self.history.push(StateTransition {
            from_status: from,
            to_status: to,
            transitioned_at: self.updated_at,
            source_stage: source_stage.map(str::to_string),
        });
    }

    pub fn fail(&mut self, message: impl Into<String>, source_stage: Option<&str>) {
        self.error_message = Some(message.into());
        self.transition(WorkflowStatus::Failed, self.progress, source_stage);
    }

    pub fn cancel(&mut self) {
        self.transition(WorkflowStatus::Cancelled, self.progress, None);
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_is_monotone_across_transitions() {
        let mut wf = Workflow::new(
            Uuid::new_v4(),
            "Create an ERC20 token".into(),
            "hyperion_testnet".into(),
            FeatureToggles::default(),
        );
        wf.transition(WorkflowStatus::Generating, 0, None);
        wf.transition(WorkflowStatus::Compiling, 20, Some("generation"));
        wf.transition(WorkflowStatus::Auditing, 40, Some("compilation"));
        assert_eq!(wf.progress, 40);
        // A lower milestone must never regress progress.
        wf.transition(WorkflowStatus::Testing, 10, Some("audit"));
        assert_eq!(wf.progress, 40);
    }

    #[test]
    fn terminal_status_detection() {
        assert!(WorkflowStatus::Completed.is_terminal());
        assert!(WorkflowStatus::Failed.is_terminal());
        assert!(WorkflowStatus::Cancelled.is_terminal());
        assert!(!WorkflowStatus::Generating.is_terminal());
    }

    #[test]
    fn cancel_yields_cancelled_with_bounded_progress() {
        let mut wf = Workflow::new(
            Uuid::new_v4(),
            "Create an ERC20 token".into(),
            "hyperion_testnet".into(),
            FeatureToggles::default(),
        );
        wf.transition(WorkflowStatus::Generating, 20, None);
        wf.cancel();
        assert_eq!(wf.status, WorkflowStatus::Cancelled);
        assert!(wf.progress <= 100);
    }
}
