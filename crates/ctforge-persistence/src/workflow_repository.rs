//! Workflow Repository

use chrono::{DateTime, Utc};
use ctforge_types::{FeatureToggles, StateTransition, Workflow, WorkflowStatus};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::PersistenceError;

#[derive(Debug, sqlx::FromRow)]
struct WorkflowRow {
    id: Uuid,
    owner_id: Uuid,
    nlp_description: String,
    status: String,
    progress: i16,
    target_network: String,
    features: Json<FeatureToggles>,
    error_message: Option<String>,
    warnings: Json<Vec<String>>,
    history: Json<Vec<StateTransition>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn parse_status(status: &str) -> WorkflowStatus {
    match status {
        "created" => WorkflowStatus::Created,
        "generating" => WorkflowStatus::Generating,
        "compiling" => WorkflowStatus::Compiling,
        "auditing" => WorkflowStatus::Auditing,
        "testing" => WorkflowStatus::Testing,
        "deploying" => WorkflowStatus::Deploying,
        "completed" => WorkflowStatus::Completed,
        "failed" => WorkflowStatus::Failed,
        _ => WorkflowStatus::Cancelled,
    }
}

impl From<WorkflowRow> for Workflow {
    fn from(row: WorkflowRow) -> Self {
        Workflow {
            id: row.id,
            owner_id: row.owner_id,
            nlp_description: row.nlp_description,
            status: parse_status(&row.status),
            progress: row.progress.clamp(0, 100) as u8,
            target_network: row.target_network,
            features: row.features.0,
            error_message: row.error_message,
            warnings: row.warnings.0,
            history: row.history.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

pub struct WorkflowRepository;

impl WorkflowRepository {
    pub async fn insert(pool: &PgPool, workflow: &Workflow) -> Result<(), PersistenceError> {
        sqlx::query(
            r#"
            INSERT INTO workflows
                (id, owner_id, nlp_description, status, progress, target_network,
                 features, error_message, warnings, history, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(workflow.id)
        .bind(workflow.owner_id)
        .bind(&workflow.nlp_description)
        .bind(workflow.status.as_str())
        .bind(workflow.progress as i16)
        .bind(&workflow.target_network)
        .bind(Json(&workflow.features))
        .bind(&workflow.error_message)
        .bind(Json(&workflow.warnings))
        .bind(Json(&workflow.history))
        .bind(workflow.created_at)
        .bind(workflow.updated_at)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn update_state(pool: &PgPool, workflow: &Workflow) -> Result<(), PersistenceError> {
        sqlx::query(
            r#"
            UPDATE workflows
            SET status = $2, progress = $3, error_message = $4, warnings = $5,
                history = $6, updated_at = $7
            WHERE id = $1
            "#,
        )
        .bind(workflow.id)
        .bind(workflow.status.as_str())
        .bind(workflow.progress as i16)
        .bind(&workflow.error_message)
        .bind(Json(&workflow.warnings))
        .bind(Json(&workflow.history))
        .bind(workflow.updated_at)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn get(pool: &PgPool, id: Uuid) -> Result<Workflow, PersistenceError> {
        let row = sqlx::query_as::<_, WorkflowRow>("SELECT * FROM workflows WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or(PersistenceError::NotFound)?;
        Ok(row.into())
    }
}
