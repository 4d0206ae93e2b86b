//! Compilation Stage
//!
//! Invokes a Solidity compiler subprocess for the generated source, per
//! SPEC_FULL.md §4.4.2. The compiler itself is abstracted behind
//! `SolcClient` so tests can substitute a fake binary.

use async_trait::async_trait;
use ctforge_eventbus::EventBus;
use ctforge_types::{Event, EventType, GeneratedContract, WorkflowError};
use regex::Regex;
use tracing::instrument;
use uuid::Uuid;

use crate::context::{CompilationOutput, WorkflowContext};

/// Oldest compiler version the fallback search will accept.
const MIN_FALLBACK_VERSION: &str = "0.8.20";
const DEFAULT_VERSION: &str = ctforge_types::contract::DEFAULT_SOLIDITY_VERSION;

#[derive(Debug, Clone)]
pub struct CompileRequest {
    pub source_code: String,
    pub solidity_version: String,
}

#[derive(Debug, Clone)]
pub struct CompileResult {
    pub contract_name: String,
    pub bytecode: String,
    pub deployed_bytecode: String,
    pub abi: serde_json::Value,
}

#[derive(Debug, thiserror::Error)]
pub enum SolcError {
    #[error("solc syntax error: {0}")]
    Syntax(String),
    #[error("solc binary not found or not executable: {0}")]
    NotFound(String),
    #[error("requested compiler version {0} is not installed and no fallback >= {MIN_FALLBACK_VERSION} is available")]
    VersionUnavailable(String),
}

/// Compiler invocation boundary: a subprocess wrapper in production, a
/// deterministic fake in tests. Mirrors the trait seam the teacher puts
/// around its own LLM HTTP clients.
#[async_trait]
pub trait SolcClient: Send + Sync {
    async fn compile(&self, request: CompileRequest) -> Result<CompileResult, SolcError>;
    /// True when `version` is installed locally.
    fn has_version(&self, version: &str) -> bool;
    /// Newest installed version >= `MIN_FALLBACK_VERSION`, if any.
    fn newest_fallback_version(&self) -> Option<String>;
}

pub struct CompilationStage {
    solc: std::sync::Arc<dyn SolcClient>,
}

impl CompilationStage {
    pub fn new(solc: std::sync::Arc<dyn SolcClient>) -> Self {
        Self { solc }
    }

    /// Extract the pragma-declared version (e.g. `pragma solidity 0.8.27;` or
    /// `pragma solidity ^0.8.20;`), defaulting to `DEFAULT_SOLIDITY_VERSION`
    /// when absent or unparseable.
    pub fn extract_pragma_version(source: &str) -> String {
        let re = Regex::new(r"pragma\s+solidity\s+[\^~>=<]*\s*([0-9]+\.[0-9]+\.[0-9]+)")
            .expect("valid regex");
        re.captures(source)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| DEFAULT_VERSION.to_string())
    }

    async fn resolve_version(&self, requested: &str) -> Result<String, SolcError> {
        if self.solc.has_version(requested) {
            return Ok(requested.to_string());
        }
        self.solc
            .newest_fallback_version()
            .ok_or_else(|| SolcError::VersionUnavailable(requested.to_string()))
    }
}

#[async_trait]
impl super::stage::StageService for CompilationStage {
    fn name(&self) -> &'static str {
        "compilation"
    }

    async fn validate(&self, ctx: &WorkflowContext) -> Result<(), WorkflowError> {
        if ctx.generation.is_none() {
            return Err(WorkflowError::Validation(
                "compilation requires generation output".into(),
            ));
        }
        Ok(())
    }

    #[instrument(skip(self, ctx, events), fields(workflow_id = %workflow_id))]
    async fn process(
        &self,
        workflow_id: Uuid,
        ctx: &mut WorkflowContext,
        events: &EventBus,
    ) -> Result<(), WorkflowError> {
        events
            .publish(Event::new(
                EventType::CompilationStarted,
                workflow_id,
                "compilation",
                serde_json::json!({}),
            ))
            .await
            .ok();

        let generation = ctx
            .generation
            .as_ref()
            .expect("validate ensures generation output is present");
        let source = &generation.contract_code;

        let requested_version = Self::extract_pragma_version(source);
        let version = self
            .resolve_version(&requested_version)
            .await
            .map_err(|err| WorkflowError::Compilation(err.to_string()))?;

        let result = self
            .solc
            .compile(CompileRequest {
                source_code: source.clone(),
                solidity_version: version.clone(),
            })
            .await
            .map_err(|err| WorkflowError::Compilation(err.to_string()))?;

        let source_code_hash = GeneratedContract::source_hash(source);

        ctx.compilation = Some(CompilationOutput {
            contract_name: result.contract_name,
            bytecode: result.bytecode,
            abi: result.abi,
            deployed_bytecode: result.deployed_bytecode,
            source_code_hash,
            solidity_version: version,
        });

        events
            .publish(Event::new(
                EventType::CompilationCompleted,
                workflow_id,
                "compilation",
                serde_json::json!({}),
            ))
            .await
            .ok();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_caret_pragma_version() {
        let source = "pragma solidity ^0.8.20;\ncontract Foo {}";
        assert_eq!(CompilationStage::extract_pragma_version(source), "0.8.20");
    }

    #[test]
    fn defaults_when_pragma_missing() {
        let source = "contract Foo {}";
        assert_eq!(
            CompilationStage::extract_pragma_version(source),
            DEFAULT_VERSION
        );
    }

    struct FakeSolc {
        installed: Vec<&'static str>,
    }

    #[async_trait]
    impl SolcClient for FakeSolc {
        async fn compile(&self, request: CompileRequest) -> Result<CompileResult, SolcError> {
            if request.source_code.contains("!!!syntax!!!") {
                return Err(SolcError::Syntax("unexpected token".into()));
            }
            Ok(CompileResult {
                contract_name: "Foo".into(),
                bytecode: "0x600160015b".into(),
                deployed_bytecode: "0x6001".into(),
                abi: serde_json::json!([]),
            })
        }

        fn has_version(&self, version: &str) -> bool {
            self.installed.contains(&version)
        }

        fn newest_fallback_version(&self) -> Option<String> {
            self.installed.first().map(|v| v.to_string())
        }
    }

    fn context_with_code(code: &str) -> WorkflowContext {
        let mut ctx = WorkflowContext::new(
            "a test contract description".into(),
            "ERC20".into(),
            "hyperion_testnet".into(),
            Default::default(),
        );
        ctx.generation = Some(crate::context::GenerationOutput {
            contract_code: code.into(),
            contract_type: "ERC20".into(),
            constructor_args: vec![],
            optimization_report: Default::default(),
        });
        ctx
    }

    #[tokio::test]
    async fn falls_back_to_newest_installed_version() {
        use crate::stage::StageService;
        let stage = CompilationStage::new(std::sync::Arc::new(FakeSolc {
            installed: vec!["0.8.24"],
        }));
        let mut ctx = context_with_code("pragma solidity 0.8.27;\ncontract Foo {}");
        let bus = EventBus::new(std::sync::Arc::new(ctforge_eventbus::InMemorySink::new()));
        stage
            .process(Uuid::new_v4(), &mut ctx, &bus)
            .await
            .unwrap();
        assert_eq!(ctx.compilation.unwrap().solidity_version, "0.8.24");
    }

    #[tokio::test]
    async fn syntax_error_is_fatal() {
        use crate::stage::StageService;
        let stage = CompilationStage::new(std::sync::Arc::new(FakeSolc {
            installed: vec!["0.8.27"],
        }));
        let mut ctx = context_with_code("pragma solidity 0.8.27;\n!!!syntax!!!");
        let bus = EventBus::new(std::sync::Arc::new(ctforge_eventbus::InMemorySink::new()));
        let result = stage.process(Uuid::new_v4(), &mut ctx, &bus).await;
        assert!(matches!(result, Err(WorkflowError::Compilation(_))));
    }
}
