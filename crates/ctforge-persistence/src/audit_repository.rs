//! Audit Record Repository

use chrono::{DateTime, Utc};
use ctforge_types::audit::{Finding, SeverityCounts};
use ctforge_types::{AuditRecord, AuditStatus};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::PersistenceError;

#[derive(Debug, sqlx::FromRow)]
struct AuditRecordRow {
    id: Uuid,
    contract_id: Uuid,
    findings: Json<Vec<Finding>>,
    counts: Json<SeverityCounts>,
    risk_score: i32,
    status: String,
    created_at: DateTime<Utc>,
}

fn parse_status(status: &str) -> AuditStatus {
    match status {
        "passed" => AuditStatus::Passed,
        "warning" => AuditStatus::Warning,
        _ => AuditStatus::Failed,
    }
}

fn status_str(status: AuditStatus) -> &'static str {
    match status {
        AuditStatus::Passed => "passed",
        AuditStatus::Warning => "warning",
        AuditStatus::Failed => "failed",
    }
}

impl From<AuditRecordRow> for AuditRecord {
    fn from(row: AuditRecordRow) -> Self {
        AuditRecord {
            id: row.id,
            contract_id: row.contract_id,
            findings: row.findings.0,
            counts: row.counts.0,
            risk_score: row.risk_score.max(0) as u32,
            status: parse_status(&row.status),
            created_at: row.created_at,
        }
    }
}

pub struct AuditRepository;

impl AuditRepository {
    pub async fn insert(pool: &PgPool, record: &AuditRecord) -> Result<(), PersistenceError> {
        sqlx::query(
            r#"
            INSERT INTO audit_records
                (id, contract_id, findings, counts, risk_score, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(record.id)
        .bind(record.contract_id)
        .bind(Json(&record.findings))
        .bind(Json(&record.counts))
        .bind(record.risk_score as i32)
        .bind(status_str(record.status))
        .bind(record.created_at)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn get_for_contract(
        pool: &PgPool,
        contract_id: Uuid,
    ) -> Result<Option<AuditRecord>, PersistenceError> {
        let row = sqlx::query_as::<_, AuditRecordRow>(
            "SELECT * FROM audit_records WHERE contract_id = $1 ORDER BY created_at DESC LIMIT 1",
        )
        .bind(contract_id)
        .fetch_optional(pool)
        .await?;
        Ok(row.map(Into::into))
    }
}
