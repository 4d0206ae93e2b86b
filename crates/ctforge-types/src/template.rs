//! Contract Template
//!
//! Created offline by a seeding process; read-only to the engine. Templates
//! carry a fixed-dimension embedding vector used by the RAG retriever for
//! cosine-similarity search.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Dimensionality of the embedding vectors used throughout the retriever.
pub const EMBEDDING_DIM: usize = 1536;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractTemplate {
    pub id: Uuid,
    pub name: String,
    pub contract_type: String,
    pub source_code: String,
    pub embedding: Vec<f32>,
    pub description: String,
    pub tags: Vec<String>,
    pub active: bool,
}

impl ContractTemplate {
    /// Cosine similarity between this template's embedding and a query
    /// embedding. Returns 0.0 for mismatched dimensions rather than panicking
    /// — callers should treat that as "no match" and move on.
    pub fn cosine_similarity(&self, query: &[f32]) -> f32 {
        if self.embedding.len() != query.len() || query.is_empty() {
            return 0.0;
        }
        let dot: f32 = self
            .embedding
            .iter()
            .zip(query.iter())
            .map(|(a, b)| a * b)
            .sum();
        let norm_a: f32 = self.embedding.iter().map(|v| v * v).sum::<f32>().sqrt();
        let norm_b: f32 = query.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }
        dot / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_vectors_have_unit_similarity() {
        let template = ContractTemplate {
            id: Uuid::new_v4(),
            name: "ERC20".into(),
            contract_type: "ERC20".into(),
            source_code: "contract Foo {}".into(),
            embedding: vec![1.0, 0.0, 0.0],
            description: "".into(),
            tags: vec![],
            active: true,
        };
        let sim = template.cosine_similarity(&[1.0, 0.0, 0.0]);
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn orthogonal_vectors_have_zero_similarity() {
        let template = ContractTemplate {
            id: Uuid::new_v4(),
            name: "ERC20".into(),
            contract_type: "ERC20".into(),
            source_code: "contract Foo {}".into(),
            embedding: vec![1.0, 0.0],
            description: "".into(),
            tags: vec![],
            active: true,
        };
        let sim = template.cosine_similarity(&[0.0, 1.0]);
        assert!(sim.abs() < 1e-6);
    }
}
