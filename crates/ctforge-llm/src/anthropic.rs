//! Anthropic Client
//!
//! LLM client implementation for the Anthropic Messages API, grounded on
//! the teacher's `anthropic_client.rs`.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::LlmError;
use crate::LlmClient;

const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const PROVIDER: &str = "Anthropic";

#[derive(Clone)]
pub struct AnthropicClient {
    api_key: String,
    client: reqwest::Client,
    model: String,
}

impl AnthropicClient {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            client: reqwest::Client::new(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn from_env() -> Result<Self, LlmError> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| LlmError::MissingEnv("ANTHROPIC_API_KEY"))?;
        Ok(Self::new(api_key))
    }

    async fn call_chat(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        temperature: f32,
        timeout: Duration,
    ) -> Result<String, LlmError> {
        let request = self
            .client
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&serde_json::json!({
                "model": &self.model,
                "max_tokens": 4096,
                "temperature": temperature,
                "system": system_prompt,
                "messages": [{"role": "user", "content": user_prompt}],
            }))
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
        struct ContentBlock {
            text: Option<String>,
        }
        #[derive(Deserialize)]
        struct ApiResponse {
            content: Vec<ContentBlock>,
        }

        let parsed: ApiResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(PROVIDER, e.to_string()))?;
        parsed
            .content
            .into_iter()
            .find_map(|c| c.text)
            .ok_or_else(|| LlmError::Parse(PROVIDER, "no text content block".into()))
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_claude_sonnet() {
        let client = AnthropicClient::new("test-key".to_string());
        assert_eq!(client.model_name(), DEFAULT_MODEL);
        assert_eq!(client.provider_name(), "Anthropic");
    }
}
