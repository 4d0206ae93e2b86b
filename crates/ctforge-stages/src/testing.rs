//! Testing Stage
//!
//! Runs a test suite against the compiled contract. Per SPEC_FULL.md
//! §4.4.4: advisory by default, fatal only when `strict_test` is set on the
//! workflow's feature toggles.

use std::sync::Arc;

use async_trait::async_trait;
use ctforge_eventbus::EventBus;
use ctforge_types::{Event, EventType, WorkflowError};
use tracing::instrument;
use uuid::Uuid;

use crate::context::{TestingOutput, WorkflowContext};
use crate::stage::StageService;

#[derive(Debug, thiserror::Error)]
pub enum TestRunnerError {
    #[error("test runner crashed: {0}")]
    Crashed(String),
}

/// Test execution boundary, isolated as a subprocess in production (same
/// seam shape as `SolcClient`/`AuditTool`).
#[async_trait]
pub trait TestRunner: Send + Sync {
    async fn run(&self, contract_name: &str, bytecode: &str, abi: &serde_json::Value) -> Result<TestingOutput, TestRunnerError>;
}

pub struct TestingStage {
    runner: Arc<dyn TestRunner>,
}

impl TestingStage {
    pub fn new(runner: Arc<dyn TestRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl StageService for TestingStage {
    fn name(&self) -> &'static str {
        "testing"
    }

    fn is_fatal(&self) -> bool {
        false
    }

    async fn validate(&self, ctx: &WorkflowContext) -> Result<(), WorkflowError> {
        if ctx.compilation.is_none() {
            return Err(WorkflowError::Validation(
                "testing requires compilation output".into(),
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
                EventType::TestingStarted,
                workflow_id,
                "testing",
                serde_json::json!({}),
            ))
            .await
            .ok();

        let compilation = ctx
            .compilation
            .as_ref()
            .expect("validate ensures compilation output is present");

        let strict = ctx.features.strict_test;

        let result = self
            .runner
            .run(&compilation.contract_name, &compilation.bytecode, &compilation.abi)
            .await;

        match result {
            Ok(output) => {
                let failed = output.failed > 0;
                ctx.testing = Some(output);
                events
                    .publish(Event::new(
                        EventType::TestingCompleted,
                        workflow_id,
                        "testing",
                        serde_json::json!({}),
                    ))
                    .await
                    .ok();
                if failed && strict {
                    return Err(WorkflowError::Validation(
                        "strict_test is set and one or more tests failed".into(),
                    ));
                }
                Ok(())
            }
            Err(err) => {
                events
                    .publish(Event::new(
                        EventType::TestingFailed,
                        workflow_id,
                        "testing",
                        serde_json::json!({"error": err.to_string()}),
                    ))
                    .await
                    .ok();
                if strict {
                    Err(WorkflowError::Internal(err.to_string()))
                } else {
                    Ok(())
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedRunner(TestingOutput);

    #[async_trait]
    impl TestRunner for FixedRunner {
        async fn run(&self, _name: &str, _bytecode: &str, _abi: &serde_json::Value) -> Result<TestingOutput, TestRunnerError> {
            Ok(self.0.clone())
        }
    }

    fn ready_context(strict_test: bool) -> WorkflowContext {
        let mut features = ctforge_types::FeatureToggles::default();
        features.strict_test = strict_test;
        let mut ctx = WorkflowContext::new(
            "a test contract description".into(),
            "ERC20".into(),
            "hyperion_testnet".into(),
            features,
        );
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
    async fn failures_are_advisory_without_strict_flag() {
        let stage = TestingStage::new(Arc::new(FixedRunner(TestingOutput {
            passed: 4,
            failed: 1,
            skipped: 0,
            coverage_percent: 80.0,
        })));
        let mut ctx = ready_context(false);
        let bus = EventBus::new(Arc::new(ctforge_eventbus::InMemorySink::new()));
        let result = stage.process(Uuid::new_v4(), &mut ctx, &bus).await;
        assert!(result.is_ok());
        assert_eq!(ctx.testing.unwrap().failed, 1);
    }

    #[tokio::test]
    async fn failures_are_fatal_with_strict_flag() {
        let stage = TestingStage::new(Arc::new(FixedRunner(TestingOutput {
            passed: 4,
            failed: 1,
            skipped: 0,
            coverage_percent: 80.0,
        })));
        let mut ctx = ready_context(true);
        let bus = EventBus::new(Arc::new(ctforge_eventbus::InMemorySink::new()));
        let result = stage.process(Uuid::new_v4(), &mut ctx, &bus).await;
        assert!(result.is_err());
    }
}
