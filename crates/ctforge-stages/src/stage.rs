//! Stage Service Trait
//!
//! Every stage implements `validate`/`process`/`on_error` per SPEC_FULL.md
//! §4.4. Stages are stateless between invocations: any number may run in
//! parallel across workflows, but only one stage runs at a time within a
//! single workflow (enforced by the orchestrator, not this trait).

use crate::context::WorkflowContext;
use async_trait::async_trait;
use ctforge_eventbus::EventBus;
use ctforge_types::WorkflowError;
use tracing::error;
use uuid::Uuid;

#[async_trait]
pub trait StageService: Send + Sync {
    /// Stage name used for event sourcing (`<name>.started` etc.) and
    /// Service Registry lookup.
    fn name(&self) -> &'static str;

    /// Whether this stage's failure is fatal to the workflow. Audit and
    /// Testing default to non-fatal (advisory); Generation, Compilation,
    /// and Deployment are fatal.
    fn is_fatal(&self) -> bool {
        true
    }

    /// Structural and semantic preconditions over the current context.
    async fn validate(&self, ctx: &WorkflowContext) -> Result<(), WorkflowError>;

    /// Do the work. Implementations publish `<name>.started` before
    /// beginning and `<name>.completed`/`<name>.failed` when they end, and
    /// write their output into `ctx` on success.
    async fn process(
        &self,
        workflow_id: Uuid,
        ctx: &mut WorkflowContext,
        events: &EventBus,
    ) -> Result<(), WorkflowError>;

    /// Diagnostic hook invoked by the orchestrator when `process` returns an
    /// error. Default just logs; cleanup of any resources the stage
    /// acquired is left to their own `Drop` impls, not to this hook.
    fn on_error(&self, workflow_id: Uuid, err: &WorkflowError) {
        error!(workflow_id = %workflow_id, stage = self.name(), error = %err, "stage failed");
    }
}
