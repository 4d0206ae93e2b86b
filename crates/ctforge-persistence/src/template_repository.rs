//! Contract Template Repository
//!
//! Backs `ctforge_rag::TemplateStore` in production with a `pgvector`
//! similarity query instead of the brute-force in-memory cosine scan used in
//! tests — the teacher's workspace already carries an optional `pgvector`
//! dependency for exactly this shape of search.

use ctforge_types::ContractTemplate;
use pgvector::Vector;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::PersistenceError;

#[derive(Debug, sqlx::FromRow)]
struct ContractTemplateRow {
    id: Uuid,
    name: String,
    contract_type: String,
    source_code: String,
    embedding: Vector,
    description: String,
    tags: Vec<String>,
    active: bool,
}

impl From<ContractTemplateRow> for ContractTemplate {
    fn from(row: ContractTemplateRow) -> Self {
        ContractTemplate {
            id: row.id,
            name: row.name,
            contract_type: row.contract_type,
            source_code: row.source_code,
            embedding: row.embedding.to_vec(),
            description: row.description,
            tags: row.tags,
            active: row.active,
        }
    }
}

pub struct TemplateRepository;

impl TemplateRepository {
    pub async fn insert(pool: &PgPool, template: &ContractTemplate) -> Result<(), PersistenceError> {
        sqlx::query(
            r#"
            INSERT INTO contract_templates
                (id, name, contract_type, source_code, embedding, description, tags, active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(template.id)
        .bind(&template.name)
        .bind(&template.contract_type)
        .bind(&template.source_code)
        .bind(Vector::from(template.embedding.clone()))
        .bind(&template.description)
        .bind(&template.tags)
        .bind(template.active)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Nearest-neighbor search via `pgvector`'s cosine-distance operator
    /// (`<=>`), restricted to active templates and an optional type filter.
    /// Returns candidates ordered by ascending distance (i.e. descending
    /// similarity); the caller applies the similarity threshold.
    pub async fn search(
        pool: &PgPool,
        query_embedding: &[f32],
        type_filter: Option<&str>,
        limit: i64,
    ) -> Result<Vec<(ContractTemplate, f32)>, PersistenceError> {
        let query_vector = Vector::from(query_embedding.to_vec());
        let rows: Vec<(ContractTemplateRow, f64)> = sqlx::query_as(
            r#"
            SELECT *, 1 - (embedding <=> $1) AS similarity
            FROM contract_templates
            WHERE active
              AND ($2::text IS NULL OR contract_type = $2)
            ORDER BY embedding <=> $1
            LIMIT $3
            "#,
        )
        .bind(&query_vector)
        .bind(type_filter)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(row, similarity)| (row.into(), similarity as f32))
            .collect())
    }
}
