//! Generated Contract Repository

use chrono::{DateTime, Utc};
use ctforge_types::contract::ConstructorParam;
use ctforge_types::GeneratedContract;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::PersistenceError;

#[derive(Debug, sqlx::FromRow)]
struct GeneratedContractRow {
    id: Uuid,
    workflow_id: Uuid,
    contract_name: String,
    source_code: String,
    source_code_hash: String,
    abi: serde_json::Value,
    bytecode: String,
    deployed_bytecode: String,
    solidity_version: String,
    constructor_params: Json<Vec<ConstructorParam>>,
    created_at: DateTime<Utc>,
}

impl From<GeneratedContractRow> for GeneratedContract {
    fn from(row: GeneratedContractRow) -> Self {
        GeneratedContract {
            id: row.id,
            workflow_id: row.workflow_id,
            contract_name: row.contract_name,
            source_code: row.source_code,
            source_code_hash: row.source_code_hash,
            abi: row.abi,
            bytecode: row.bytecode,
            deployed_bytecode: row.deployed_bytecode,
            solidity_version: row.solidity_version,
            constructor_params: row.constructor_params.0,
            created_at: row.created_at,
        }
    }
}

pub struct ContractRepository;

impl ContractRepository {
    pub async fn insert(pool: &PgPool, contract: &GeneratedContract) -> Result<(), PersistenceError> {
        sqlx::query(
            r#"
            INSERT INTO generated_contracts
                (id, workflow_id, contract_name, source_code, source_code_hash, abi,
                 bytecode, deployed_bytecode, solidity_version, constructor_params, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(contract.id)
        .bind(contract.workflow_id)
        .bind(&contract.contract_name)
        .bind(&contract.source_code)
        .bind(&contract.source_code_hash)
        .bind(&contract.abi)
        .bind(&contract.bytecode)
        .bind(&contract.deployed_bytecode)
        .bind(&contract.solidity_version)
        .bind(Json(&contract.constructor_params))
        .bind(contract.created_at)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn list_for_workflow(
        pool: &PgPool,
        workflow_id: Uuid,
    ) -> Result<Vec<GeneratedContract>, PersistenceError> {
        let rows = sqlx::query_as::<_, GeneratedContractRow>(
            "SELECT * FROM generated_contracts WHERE workflow_id = $1 ORDER BY created_at",
        )
        .bind(workflow_id)
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}
