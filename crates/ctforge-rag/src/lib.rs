//! RAG Retriever
//!
//! Given a user query and an optional type filter, returns up to 5 templates
//! ordered by descending cosine similarity, filtered to similarity >= 0.7.
//! If the embedding provider fails, returns an empty result rather than
//! failing the caller — the Generation stage proceeds template-free.

mod store;

pub use store::{InMemoryTemplateStore, TemplateStore};

use std::sync::Arc;
use std::time::Duration;

use ctforge_llm::EmbeddingClient;
use ctforge_types::ContractTemplate;
use tracing::warn;

/// Minimum cosine similarity for a template to be considered relevant.
/// A template at exactly this threshold is included (§8 boundary).
pub const SIMILARITY_THRESHOLD: f32 = 0.7;

/// Tolerance absorbing floating-point rounding in the cosine computation
/// itself, not a relaxation of the 0.7 boundary: a similarity whose true
/// value is 0.699 still falls well outside this tolerance.
const THRESHOLD_EPSILON: f32 = 1e-6;

/// Maximum templates ever returned, regardless of how many clear the
/// threshold.
pub const MAX_RESULTS: usize = 5;

/// Default timeout for the single embedding call the retriever issues per
/// query.
const DEFAULT_EMBED_TIMEOUT: Duration = Duration::from_secs(10);

pub struct RagRetriever {
    embedding_client: Arc<dyn EmbeddingClient>,
    store: Arc<dyn TemplateStore>,
    embed_timeout: Duration,
}

impl RagRetriever {
    pub fn new(embedding_client: Arc<dyn EmbeddingClient>, store: Arc<dyn TemplateStore>) -> Self {
        Self {
            embedding_client,
            store,
            embed_timeout: DEFAULT_EMBED_TIMEOUT,
        }
    }

    pub fn with_embed_timeout(mut self, timeout: Duration) -> Self {
        self.embed_timeout = timeout;
        self
    }

    /// Embed `query`, k-NN search the template store, and return up to
    /// `MAX_RESULTS` templates with similarity >= `SIMILARITY_THRESHOLD`,
    /// ordered by descending similarity. Never errors: an embedding-provider
    /// failure yields an empty result, logged as a warning.
    pub async fn retrieve(
        &self,
        query: &str,
        type_filter: Option<&str>,
    ) -> Vec<ContractTemplate> {
        let embedding = match self.embedding_client.embed(query, self.embed_timeout).await {
            Ok(embedding) => embedding,
            Err(err) => {
                warn!(error = %err, "embedding provider failed; proceeding template-free");
                return Vec::new();
            }
        };

        let mut scored = self.store.search(&embedding, type_filter).await;
        scored.retain(|(_, similarity)| *similarity >= SIMILARITY_THRESHOLD - THRESHOLD_EPSILON);
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(MAX_RESULTS);
        scored.into_iter().map(|(template, _)| template).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctforge_llm::LlmError;
    use uuid::Uuid;

    struct FixedEmbeddingClient(Vec<f32>);

    #[async_trait::async_trait]
    impl EmbeddingClient for FixedEmbeddingClient {
        async fn embed(&self, _text: &str, _timeout: Duration) -> Result<Vec<f32>, LlmError> {
            Ok(self.0.clone())
        }
    }

    struct FailingEmbeddingClient;

    #[async_trait::async_trait]
    impl EmbeddingClient for FailingEmbeddingClient {
        async fn embed(&self, _text: &str, _timeout: Duration) -> Result<Vec<f32>, LlmError> {
            Err(LlmError::Timeout {
                provider: "test",
                timeout_secs: 1,
            })
        }
    }

    fn template(name: &str, embedding: Vec<f32>, contract_type: &str) -> ContractTemplate {
        ContractTemplate {
            id: Uuid::new_v4(),
            name: name.into(),
            contract_type: contract_type.into(),
            source_code: "contract X {}".into(),
            embedding,
            description: "".into(),
            tags: vec![],
            active: true,
        }
    }

    #[tokio::test]
    async fn returns_empty_on_embedding_failure() {
        let store = Arc::new(InMemoryTemplateStore::new(vec![template(
            "ERC20",
            vec![1.0, 0.0],
            "ERC20",
        )]));
        let retriever = RagRetriever::new(Arc::new(FailingEmbeddingClient), store);
        let results = retriever.retrieve("make a token", None).await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn filters_below_threshold_and_caps_at_five() {
        let templates: Vec<_> = (0..8)
            .map(|i| template(&format!("t{i}"), vec![1.0, 0.0], "ERC20"))
            .collect();
        let mut with_one_weak = templates;
        with_one_weak.push(template("weak", vec![0.0, 1.0], "ERC20"));
        let store = Arc::new(InMemoryTemplateStore::new(with_one_weak));
        let retriever = RagRetriever::new(Arc::new(FixedEmbeddingClient(vec![1.0, 0.0])), store);
        let results = retriever.retrieve("make a token", None).await;
        assert_eq!(results.len(), MAX_RESULTS);
        assert!(results.iter().all(|t| t.name != "weak"));
    }

    #[tokio::test]
    async fn threshold_boundary_is_inclusive() {
        // cos(theta) = 0.7 exactly, constructed via a 2D vector.
        let angle = SIMILARITY_THRESHOLD.acos();
        let query = vec![1.0, 0.0];
        let boundary = vec![angle.cos(), angle.sin()];
        let store = Arc::new(InMemoryTemplateStore::new(vec![template(
            "boundary", boundary, "ERC20",
        )]));
        let retriever = RagRetriever::new(Arc::new(FixedEmbeddingClient(query)), store);
        let results = retriever.retrieve("q", None).await;
        assert_eq!(results.len(), 1);
    }
}
