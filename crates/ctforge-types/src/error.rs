//! Error Taxonomy
//!
//! Every stage and component classifies its failures into this enum before
//! handing them to the orchestrator. Local crates keep their own narrower
//! error enums and convert into this one at the boundary, the same way
//! stage- and listener-local errors convert into a single workflow error in
//! the teacher engine.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("llm call failed after retries: {0}")]
    Llm(String),

    #[error("compilation failed: {0}")]
    Compilation(String),

    #[error("audit tool error: {0}")]
    AuditTool(String),

    #[error("transient network error: {0}")]
    NetworkTransient(String),

    #[error("fatal network error: {0}")]
    NetworkFatal(String),

    #[error("feature unavailable on network {network}: {feature} ({fallback})")]
    FeatureUnavailable {
        network: String,
        feature: String,
        fallback: String,
    },

    #[error("cancellation requested")]
    Cancelled,

    #[error("unknown network: {0}")]
    UnknownNetwork(String),

    #[error("workflow not found: {0}")]
    NotFound(uuid::Uuid),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("event bus error: {0}")]
    EventBus(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl WorkflowError {
    /// One-line summary suitable for `Workflow::error_message`.
    pub fn summary(&self) -> String {
        self.to_string()
    }

    /// True when this error is fatal to the whole workflow rather than
    /// advisory to a single non-fatal stage.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, WorkflowError::FeatureUnavailable { .. })
    }
}
