//! Persistence Error
//!
//! Local error enum converted into `ctforge_types::WorkflowError` at the
//! orchestrator boundary, the same shape the teacher uses for `sqlx::Error`
//! wrapping in `ob-workflow`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("row not found")]
    NotFound,
}

impl From<PersistenceError> for ctforge_types::WorkflowError {
    fn from(err: PersistenceError) -> Self {
        ctforge_types::WorkflowError::Persistence(err.to_string())
    }
}
