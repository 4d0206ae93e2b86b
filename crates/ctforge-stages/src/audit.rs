//! Audit Stage
//!
//! Runs static analysis, symbolic execution, and (at `comprehensive` level)
//! fuzzing as isolated subprocess tools in parallel, then aggregates their
//! findings via `ctforge_types::AuditRecord::aggregate`. Per SPEC_FULL.md
//! §4.4.3. Advisory by default: a `failed` audit status does not stop the
//! workflow (Open Question resolution in SPEC_FULL.md §9).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ctforge_eventbus::EventBus;
use ctforge_types::{AuditRecord, Event, EventType, Finding, WorkflowError};
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::context::{AuditLevel, WorkflowContext};
use crate::stage::StageService;

const STATIC_ANALYZER_TIMEOUT: Duration = Duration::from_secs(120);
const SYMBOLIC_EXECUTOR_TIMEOUT: Duration = Duration::from_secs(180);
const FUZZER_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, thiserror::Error)]
pub enum AuditToolError {
    #[error("tool crashed: {0}")]
    Crashed(String),
    #[error("tool timed out after {0:?}")]
    TimedOut(Duration),
}

/// One audit tool, isolated as a subprocess in production. Each
/// implementation owns its own timeout discipline; the stage wraps every
/// call in `tokio::time::timeout` regardless, as a backstop.
#[async_trait]
pub trait AuditTool: Send + Sync {
    fn name(&self) -> &'static str;
    async fn run(&self, source_code: &str, bytecode: Option<&str>) -> Result<Vec<Finding>, AuditToolError>;
}

pub struct AuditStage {
    static_analyzer: Arc<dyn AuditTool>,
    symbolic_executor: Arc<dyn AuditTool>,
    fuzzer: Arc<dyn AuditTool>,
}

impl AuditStage {
    pub fn new(
        static_analyzer: Arc<dyn AuditTool>,
        symbolic_executor: Arc<dyn AuditTool>,
        fuzzer: Arc<dyn AuditTool>,
    ) -> Self {
        Self {
            static_analyzer,
            symbolic_executor,
            fuzzer,
        }
    }

    async fn run_tool(
        tool: Arc<dyn AuditTool>,
        source_code: String,
        bytecode: Option<String>,
        timeout: Duration,
    ) -> (&'static str, Result<Vec<Finding>, AuditToolError>) {
        let name = tool.name();
        match tokio::time::timeout(timeout, tool.run(&source_code, bytecode.as_deref())).await {
            Ok(result) => (name, result),
            Err(_) => (name, Err(AuditToolError::TimedOut(timeout))),
        }
    }
}

#[async_trait]
impl StageService for AuditStage {
    fn name(&self) -> &'static str {
        "audit"
    }

    fn is_fatal(&self) -> bool {
        false
    }

    async fn validate(&self, ctx: &WorkflowContext) -> Result<(), WorkflowError> {
        if ctx.compilation.is_none() {
            return Err(WorkflowError::Validation(
                "audit requires compilation output".into(),
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
                EventType::AuditStarted,
                workflow_id,
                "audit",
                serde_json::json!({}),
            ))
            .await
            .ok();

        let generation = ctx.generation.as_ref().expect("validated by orchestrator");
        let compilation = ctx.compilation.as_ref().expect("validate ensures compilation output is present");
        let source_code = generation.contract_code.clone();
        let bytecode = Some(compilation.bytecode.clone());

        let runs_standard_tools = ctx.audit_level != AuditLevel::Basic;

        let mut tasks = Vec::new();
        if runs_standard_tools {
            tasks.push(Self::run_tool(
                self.static_analyzer.clone(),
                source_code.clone(),
                None,
                STATIC_ANALYZER_TIMEOUT,
            ));
            tasks.push(Self::run_tool(
                self.symbolic_executor.clone(),
                source_code.clone(),
                bytecode,
                SYMBOLIC_EXECUTOR_TIMEOUT,
            ));
        }
        if ctx.audit_level == AuditLevel::Comprehensive {
            tasks.push(Self::run_tool(
                self.fuzzer.clone(),
                source_code.clone(),
                None,
                FUZZER_TIMEOUT,
            ));
        }

        let results = futures::future::join_all(tasks).await;

        let mut findings = Vec::new();
        let mut tool_count = results.len();
        let mut error_count = 0;
        for (name, result) in results {
            match result {
                Ok(tool_findings) => findings.extend(tool_findings),
                Err(err) => {
                    warn!(tool = name, error = %err, "audit tool failed; isolating");
                    error_count += 1;
                }
            }
        }

        if error_count == tool_count && tool_count > 0 {
            let err = WorkflowError::AuditTool("all audit tools failed".into());
            events
                .publish(Event::new(
                    EventType::AuditFailed,
                    workflow_id,
                    "audit",
                    serde_json::json!({"error": err.to_string()}),
                ))
                .await
                .ok();
            return Err(err);
        }
        tool_count -= error_count;
        let _ = tool_count;

        let record = AuditRecord::aggregate(ctx.contract_id, findings);
        let status = record.status;
        let risk_score = record.risk_score;
        ctx.audit = Some(record);

        events
            .publish(Event::new(
                EventType::AuditCompleted,
                workflow_id,
                "audit",
                serde_json::json!({"status": status, "risk_score": risk_score}),
            ))
            .await
            .ok();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctforge_types::Severity;

    struct FixedTool {
        name: &'static str,
        findings: Vec<Finding>,
    }

    #[async_trait]
    impl AuditTool for FixedTool {
        fn name(&self) -> &'static str {
            self.name
        }
        async fn run(&self, _source: &str, _bytecode: Option<&str>) -> Result<Vec<Finding>, AuditToolError> {
            Ok(self.findings.clone())
        }
    }

    struct CrashingTool;

    #[async_trait]
    impl AuditTool for CrashingTool {
        fn name(&self) -> &'static str {
            "crashing"
        }
        async fn run(&self, _source: &str, _bytecode: Option<&str>) -> Result<Vec<Finding>, AuditToolError> {
            Err(AuditToolError::Crashed("boom".into()))
        }
    }

    fn finding(title: &str, severity: Severity) -> Finding {
        Finding {
            tool: "test".into(),
            severity,
            title: title.into(),
            description: "".into(),
            location: None,
        }
    }

    fn ready_context() -> WorkflowContext {
        let mut ctx = WorkflowContext::new(
            "a test contract description".into(),
            "ERC20".into(),
            "hyperion_testnet".into(),
            Default::default(),
        );
        ctx.generation = Some(crate::context::GenerationOutput {
            contract_code: "contract Foo {}".into(),
            contract_type: "ERC20".into(),
            constructor_args: vec![],
            optimization_report: Default::default(),
        });
        ctx.compilation = Some(crate::context::CompilationOutput {
            contract_name: "Foo".into(),
            bytecode: "0x600160015b".into(),
            abi: serde_json::json!([]),
            deployed_bytecode: "0x6001".into(),
            source_code_hash: "deadbeef".into(),
            solidity_version: "0.8.27".into(),
        });
        ctx
    }

    #[tokio::test]
    async fn isolated_tool_failure_does_not_fail_stage() {
        let stage = AuditStage::new(
            Arc::new(FixedTool {
                name: "static",
                findings: vec![finding("reentrancy", Severity::High)],
            }),
            Arc::new(CrashingTool),
            Arc::new(FixedTool {
                name: "fuzzer",
                findings: vec![],
            }),
        );
        let mut ctx = ready_context();
        let bus = EventBus::new(Arc::new(ctforge_eventbus::InMemorySink::new()));
        stage.process(Uuid::new_v4(), &mut ctx, &bus).await.unwrap();
        assert_eq!(ctx.audit.unwrap().findings.len(), 1);
    }

    #[tokio::test]
    async fn all_tools_failing_fails_the_stage() {
        let stage = AuditStage::new(
            Arc::new(CrashingTool),
            Arc::new(CrashingTool),
            Arc::new(CrashingTool),
        );
        let mut ctx = ready_context();
        let bus = EventBus::new(Arc::new(ctforge_eventbus::InMemorySink::new()));
        let result = stage.process(Uuid::new_v4(), &mut ctx, &bus).await;
        assert!(matches!(result, Err(WorkflowError::AuditTool(_))));
    }

    #[test]
    fn audit_stage_is_not_fatal() {
        let stage = AuditStage::new(
            Arc::new(CrashingTool),
            Arc::new(CrashingTool),
            Arc::new(CrashingTool),
        );
        assert!(!stage.is_fatal());
    }
}
