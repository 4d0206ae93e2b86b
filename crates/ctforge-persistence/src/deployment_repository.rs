//! Deployment Record Repository

use chrono::{DateTime, Utc};
use ctforge_types::{DeploymentRecord, DeploymentStatus};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::PersistenceError;

#[derive(Debug, sqlx::FromRow)]
struct DeploymentRecordRow {
    id: Uuid,
    contract_id: Uuid,
    network: String,
    contract_address: Option<String>,
    tx_hash: Option<String>,
    block_number: Option<i64>,
    gas_used: Option<i64>,
    deployer_address: String,
    eigenda_commitment: Option<String>,
    status: String,
    submitted_at: DateTime<Utc>,
    confirmed_at: Option<DateTime<Utc>>,
}

fn parse_status(status: &str) -> DeploymentStatus {
    match status {
        "confirmed" => DeploymentStatus::Confirmed,
        "failed" => DeploymentStatus::Failed,
        _ => DeploymentStatus::Pending,
    }
}

fn status_str(status: DeploymentStatus) -> &'static str {
    match status {
        DeploymentStatus::Pending => "pending",
        DeploymentStatus::Confirmed => "confirmed",
        DeploymentStatus::Failed => "failed",
    }
}

impl From<DeploymentRecordRow> for DeploymentRecord {
    fn from(row: DeploymentRecordRow) -> Self {
        DeploymentRecord {
            id: row.id,
            contract_id: row.contract_id,
            network: row.network,
            contract_address: row.contract_address,
            tx_hash: row.tx_hash,
            block_number: row.block_number.map(|n| n as u64),
            gas_used: row.gas_used.map(|n| n as u64),
            deployer_address: row.deployer_address,
            eigenda_commitment: row.eigenda_commitment,
            status: parse_status(&row.status),
            submitted_at: row.submitted_at,
            confirmed_at: row.confirmed_at,
        }
    }
}

pub struct DeploymentRepository;

impl DeploymentRepository {
    pub async fn upsert(pool: &PgPool, record: &DeploymentRecord) -> Result<(), PersistenceError> {
        sqlx::query(
            r#"
            INSERT INTO deployment_records
                (id, contract_id, network, contract_address, tx_hash, block_number,
                 gas_used, deployer_address, eigenda_commitment, status, submitted_at, confirmed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (id) DO UPDATE SET
                contract_address = EXCLUDED.contract_address,
                tx_hash = EXCLUDED.tx_hash,
                block_number = EXCLUDED.block_number,
                gas_used = EXCLUDED.gas_used,
                eigenda_commitment = EXCLUDED.eigenda_commitment,
                status = EXCLUDED.status,
                confirmed_at = EXCLUDED.confirmed_at
            "#,
        )
        .bind(record.id)
        .bind(record.contract_id)
        .bind(&record.network)
        .bind(&record.contract_address)
        .bind(&record.tx_hash)
        .bind(record.block_number.map(|n| n as i64))
        .bind(record.gas_used.map(|n| n as i64))
        .bind(&record.deployer_address)
        .bind(&record.eigenda_commitment)
        .bind(status_str(record.status))
        .bind(record.submitted_at)
        .bind(record.confirmed_at)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn list_for_workflow_contracts(
        pool: &PgPool,
        contract_ids: &[Uuid],
    ) -> Result<Vec<DeploymentRecord>, PersistenceError> {
        let rows = sqlx::query_as::<_, DeploymentRecordRow>(
            "SELECT * FROM deployment_records WHERE contract_id = ANY($1) ORDER BY submitted_at",
        )
        .bind(contract_ids)
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}
