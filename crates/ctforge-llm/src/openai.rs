//! OpenAI Client
//!
//! LLM client implementation for the OpenAI chat-completions and embeddings
//! APIs, grounded on the teacher's `openai_client.rs`.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::LlmError;
use crate::{EmbeddingClient, LlmClient};

const DEFAULT_MODEL: &str = "gpt-4o";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
const PROVIDER: &str = "OpenAI";

#[derive(Clone)]
pub struct OpenAiClient {
    api_key: String,
    client: reqwest::Client,
    model: String,
    embedding_model: String,
}

impl OpenAiClient {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            client: reqwest::Client::new(),
            model: DEFAULT_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn from_env() -> Result<Self, LlmError> {
        let api_key =
            std::env::var("OPENAI_API_KEY").map_err(|_| LlmError::MissingEnv("OPENAI_API_KEY"))?;
        Ok(Self::new(api_key))
    }

    async fn call_chat(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        temperature: f32,
        timeout: Duration,
    ) -> Result<String, LlmError> {
        let body = serde_json::json!({
            "model": &self.model,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_prompt},
            ],
            "temperature": temperature,
        });

        let request = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send();

        let response = tokio::time::timeout(timeout, request)
            .await
            .map_err(|_| LlmError::Timeout {
                provider: PROVIDER,
                timeout_secs: timeout.as_secs(),
            })?
            .map_err(|e| LlmError::Transport(PROVIDER, e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                provider: PROVIDER,
                status,
                body,
            });
        }

        #[derive(Deserialize)]
        struct Choice {
            message: Message,
        }
        #[derive(Deserialize)]
        struct Message {
            content: String,
        }
        #[derive(Deserialize)]
        struct ApiResponse {
            choices: Vec<Choice>,
        }

        let parsed: ApiResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(PROVIDER, e.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| LlmError::Parse(PROVIDER, "empty choices array".into()))
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn chat(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        temperature: f32,
        timeout: Duration,
    ) -> Result<String, LlmError> {
        self.call_chat(system_prompt, user_prompt, temperature, timeout)
            .await
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}

#[async_trait]
impl EmbeddingClient for OpenAiClient {
    async fn embed(&self, text: &str, timeout: Duration) -> Result<Vec<f32>, LlmError> {
        let body = serde_json::json!({
            "model": &self.embedding_model,
            "input": text,
        });
        let request = self
            .client
            .post("https://api.openai.com/v1/embeddings")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send();

        let response = tokio::time::timeout(timeout, request)
            .await
            .map_err(|_| LlmError::Timeout {
                provider: PROVIDER,
                timeout_secs: timeout.as_secs(),
            })?
            .map_err(|e| LlmError::Transport(PROVIDER, e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                provider: PROVIDER,
                status,
                body,
            });
        }

        #[derive(Deserialize)]
        struct EmbeddingEntry {
            embedding: Vec<f32>,
        }
        #[derive(Deserialize)]
        struct ApiResponse {
            data: Vec<EmbeddingEntry>,
        }

        let parsed: ApiResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(PROVIDER, e.to_string()))?;
        parsed
            .data
            .into_iter()
            .next()
            .map(|e| e.embedding)
            .ok_or_else(|| LlmError::Parse(PROVIDER, "empty embedding data".into()))
    }
}
