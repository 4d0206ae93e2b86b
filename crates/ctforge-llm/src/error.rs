//! LLM Error Taxonomy

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("{provider} call timed out after {timeout_secs}s")]
    Timeout { provider: &'static str, timeout_secs: u64 },

    #[error("{provider} API error {status}: {body}")]
    Api {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("{provider} transport error: {0}")]
    Transport(&'static str, String),

    #[error("{provider} returned an unparseable response: {0}")]
    Parse(&'static str, String),

    #[error("missing environment variable: {0}")]
    MissingEnv(&'static str),
}
