//! LLM Provider Clients
//!
//! A uniform `chat`/`embed` interface over the configured provider, per
//! SPEC_FULL.md's Open Question resolution: the provider is a single
//! configured instance, not automatic Gemini-primary/OpenAI-fallback
//! failover. Concrete clients are grounded on the teacher's
//! `openai_client.rs` / `anthropic_client.rs` pair.

mod anthropic;
mod error;
mod openai;

pub use anthropic::AnthropicClient;
pub use error::LlmError;
pub use openai::OpenAiClient;

use async_trait::async_trait;
use std::time::Duration;

/// Chat/completion provider used by the Generation stage.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Single-turn chat completion with a hard timeout. Implementations
    /// must return `LlmError::Timeout` (not panic or hang) when the
    /// deadline elapses.
    async fn chat(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        temperature: f32,
        timeout: Duration,
    ) -> Result<String, LlmError>;

    fn model_name(&self) -> &str;
    fn provider_name(&self) -> &'static str;
}

/// Embedding provider used by the RAG retriever.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    async fn embed(&self, text: &str, timeout: Duration) -> Result<Vec<f32>, LlmError>;
}
