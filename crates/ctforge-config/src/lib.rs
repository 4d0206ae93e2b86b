//! Process Configuration
//!
//! Loads typed settings from environment variables with sane defaults,
//! mirroring the teacher's `DATABASE_URL`/`SERVER_PORT`-style env-var
//! conventions in `ob-poc-web::main` and the provider API key lookups in
//! `ob-agentic`'s `openai_client.rs`/`anthropic_client.rs`. Only secrets and
//! binary paths (things that can't have a safe default) are required; every
//! numeric knob falls back to a documented default instead of panicking.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingVar(&'static str),
    #[error("invalid value for {name}: {value:?}")]
    InvalidValue { name: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    OpenAi,
    Anthropic,
}

/// External tool binary paths and URLs the adapters crate shells out to or
/// calls over HTTP.
#[derive(Debug, Clone)]
pub struct ToolConfig {
    pub solc_binary_dir: String,
    pub static_analyzer_bin: String,
    pub symbolic_executor_bin: String,
    pub fuzzer_bin: String,
    pub test_runner_bin: String,
    pub eigenda_disperser_url: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub server_port: u16,
    pub llm_provider: LlmProvider,
    pub llm_api_key: String,
    pub llm_timeout: Duration,
    pub llm_retry_attempts: u32,
    pub max_parallel_deployments: usize,
    pub tools: ToolConfig,
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_parsed<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value: raw }),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Load configuration from the process environment. Fails only when a
    /// value with no safe default (the active provider's API key, or a
    /// present-but-unparseable numeric override) is missing or malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let llm_provider = match env_or("CTFORGE_LLM_PROVIDER", "openai").as_str() {
            "anthropic" => LlmProvider::Anthropic,
            "openai" => LlmProvider::OpenAi,
            other => {
                return Err(ConfigError::InvalidValue {
                    name: "CTFORGE_LLM_PROVIDER",
                    value: other.to_string(),
                })
            }
        };

        let llm_api_key = match llm_provider {
            LlmProvider::OpenAi => {
                std::env::var("OPENAI_API_KEY").map_err(|_| ConfigError::MissingVar("OPENAI_API_KEY"))?
            }
            LlmProvider::Anthropic => std::env::var("ANTHROPIC_API_KEY")
                .map_err(|_| ConfigError::MissingVar("ANTHROPIC_API_KEY"))?,
        };

        Ok(Self {
            database_url: env_or("CTFORGE_DATABASE_URL", "postgresql:///ctforge"),
            server_port: env_parsed("CTFORGE_SERVER_PORT", 8080)?,
            llm_provider,
            llm_api_key,
            llm_timeout: Duration::from_secs(env_parsed("CTFORGE_LLM_TIMEOUT_SECS", 30)?),
            llm_retry_attempts: env_parsed("CTFORGE_LLM_RETRY_ATTEMPTS", 3)?,
            max_parallel_deployments: env_parsed("CTFORGE_MAX_PARALLEL_DEPLOYMENTS", 10)?,
            tools: ToolConfig {
                solc_binary_dir: env_or("CTFORGE_SOLC_BINARY_DIR", "/usr/local/bin"),
                static_analyzer_bin: env_or("CTFORGE_STATIC_ANALYZER_BIN", "/usr/local/bin/slither"),
                symbolic_executor_bin: env_or("CTFORGE_SYMBOLIC_EXECUTOR_BIN", "/usr/local/bin/mythril"),
                fuzzer_bin: env_or("CTFORGE_FUZZER_BIN", "/usr/local/bin/echidna"),
                test_runner_bin: env_or("CTFORGE_TEST_RUNNER_BIN", "/usr/local/bin/forge"),
                eigenda_disperser_url: env_or(
                    "CTFORGE_EIGENDA_DISPERSER_URL",
                    "https://disperser.eigenda.xyz",
                ),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variables are process-global; serialize tests that touch them.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn missing_api_key_is_reported_by_name_not_a_panic() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::remove_var("OPENAI_API_KEY");
        std::env::remove_var("CTFORGE_LLM_PROVIDER");
        let result = Config::from_env();
        assert!(matches!(result, Err(ConfigError::MissingVar("OPENAI_API_KEY"))));
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("CTFORGE_LLM_PROVIDER", "gemini");
        let result = Config::from_env();
        std::env::remove_var("CTFORGE_LLM_PROVIDER");
        assert!(matches!(result, Err(ConfigError::InvalidValue { name: "CTFORGE_LLM_PROVIDER", .. })));
    }

    #[test]
    fn valid_env_produces_expected_defaults() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("CTFORGE_LLM_PROVIDER", "openai");
        std::env::set_var("OPENAI_API_KEY", "test-key");
        let config = Config::from_env().unwrap();
        std::env::remove_var("CTFORGE_LLM_PROVIDER");
        std::env::remove_var("OPENAI_API_KEY");
        assert_eq!(config.server_port, 8080);
        assert_eq!(config.max_parallel_deployments, 10);
    }
}
