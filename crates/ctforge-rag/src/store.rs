//! Template Store
//!
//! k-nearest-neighbor lookup against the template catalog. Production uses
//! a `pgvector`-backed Postgres table (the teacher's `rust/Cargo.toml`
//! already carries `pgvector` as an optional dependency for this kind of
//! similarity search); `InMemoryTemplateStore` is a brute-force
//! implementation used for tests and for seeding before a database is wired
//! up.

use async_trait::async_trait;
use ctforge_types::ContractTemplate;

#[async_trait]
pub trait TemplateStore: Send + Sync {
    /// Return every active template paired with its cosine similarity to
    /// `embedding`, optionally restricted to `type_filter`. Callers apply
    /// the similarity threshold and result cap; this trait only computes
    /// scores and filters by type.
    async fn search(
        &self,
        embedding: &[f32],
        type_filter: Option<&str>,
    ) -> Vec<(ContractTemplate, f32)>;
}

pub struct InMemoryTemplateStore {
    templates: Vec<ContractTemplate>,
}

impl InMemoryTemplateStore {
    pub fn new(templates: Vec<ContractTemplate>) -> Self {
        Self { templates }
    }
}

#[async_trait]
impl TemplateStore for InMemoryTemplateStore {
    async fn search(
        &self,
        embedding: &[f32],
        type_filter: Option<&str>,
    ) -> Vec<(ContractTemplate, f32)> {
        self.templates
            .iter()
            .filter(|t| t.active)
            .filter(|t| type_filter.map(|f| t.contract_type == f).unwrap_or(true))
            .map(|t| (t.clone(), t.cosine_similarity(embedding)))
            .collect()
    }
}
