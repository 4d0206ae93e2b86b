//! Workflow Coordinator
//!
//! Exposes `create`/`status`/`cancel`/`contracts`/`deployments` over an
//! in-memory workflow store, mirrored best-effort into Postgres when a pool
//! is configured. `create` validates feature toggles against the Network
//! Feature Registry, inserts the workflow, and spawns its orchestration task
//! via `tokio::spawn` — mirroring the teacher's `tokio::spawn` use for
//! `TaskQueueListener::run` in `listener.rs`.

use std::sync::Arc;

use ctforge_eventbus::EventBus;
use ctforge_registry::NetworkFeatureRegistry;
use ctforge_stages::{ServiceRegistry, WorkflowContext};
use ctforge_types::{
    AuditRecord, DeploymentRecord, Feature, FeatureToggles, GeneratedContract, Workflow,
    WorkflowError, WorkflowStatus,
};
use dashmap::DashMap;
use tokio::sync::watch;
use tracing::{info, warn};
use uuid::Uuid;

use crate::orchestrator::{SequentialOrchestrator, StageOutcome};
use crate::pipeline::pipeline_for;

struct WorkflowEntry {
    workflow: Workflow,
    cancel_tx: watch::Sender<bool>,
}

pub struct WorkflowCoordinator {
    registry: Arc<ServiceRegistry>,
    event_bus: Arc<EventBus>,
    feature_registry: Arc<NetworkFeatureRegistry>,
    workflows: DashMap<Uuid, WorkflowEntry>,
    contracts: DashMap<Uuid, Vec<GeneratedContract>>,
    audits: DashMap<Uuid, AuditRecord>,
    deployments: DashMap<Uuid, Vec<DeploymentRecord>>,
}

impl WorkflowCoordinator {
    pub fn new(
        registry: Arc<ServiceRegistry>,
        event_bus: Arc<EventBus>,
        feature_registry: Arc<NetworkFeatureRegistry>,
    ) -> Self {
        Self {
            registry,
            event_bus,
            feature_registry,
            workflows: DashMap::new(),
            contracts: DashMap::new(),
            audits: DashMap::new(),
            deployments: DashMap::new(),
        }
    }

    /// Disable any requested feature the target network doesn't support,
    /// recording a warning rather than failing the request (§4.7 step 1).
    fn validate_features(&self, network: &str, requested: FeatureToggles) -> (FeatureToggles, Vec<String>) {
        let mut effective = requested;
        let mut warnings = Vec::new();

        let mut disable_if_unsupported = |enabled: &mut bool, feature: Feature, label: &str| {
            if *enabled && !self.feature_registry.supports(network, feature) {
                warnings.push(format!(
                    "{label} requested but unsupported on {network}: {}",
                    self.feature_registry.fallback(network, feature)
                ));
                *enabled = false;
            }
        };

        disable_if_unsupported(&mut effective.optimize_for_metisvm, Feature::MetisVm, "optimize_for_metisvm");
        disable_if_unsupported(&mut effective.enable_floating_point, Feature::FloatingPoint, "enable_floating_point");
        disable_if_unsupported(&mut effective.enable_ai_inference, Feature::AiInference, "enable_ai_inference");
        disable_if_unsupported(&mut effective.enable_eigenda, Feature::EigenDa, "enable_eigenda");
        disable_if_unsupported(&mut effective.enable_pef_batch, Feature::BatchDeployment, "enable_pef_batch");

        (effective, warnings)
    }

    /// Create a workflow, validate/scope its feature toggles, insert it with
    /// status `created`, and spawn its orchestration task. Returns
    /// immediately; the caller observes progress via `status` or the event
    /// bus.
    pub fn create(
        self: &Arc<Self>,
        owner_id: Uuid,
        nlp_description: String,
        network: String,
        requested_features: FeatureToggles,
        deployer_address: Option<String>,
        private_key: Option<String>,
        gas_limit: Option<u64>,
    ) -> Uuid {
        let (features, warnings) = self.validate_features(&network, requested_features);

        let mut workflow = Workflow::new(owner_id, nlp_description.clone(), network.clone(), features);
        for warning in &warnings {
            workflow.warn(warning.clone());
        }
        let workflow_id = workflow.id;

        let (cancel_tx, cancel_rx) = watch::channel(false);
        self.workflows.insert(
            workflow_id,
            WorkflowEntry {
                workflow: workflow.clone(),
                cancel_tx,
            },
        );

        let mut ctx = WorkflowContext::new(nlp_description, "Custom".to_string(), network, features);
        ctx.deployer_address = deployer_address;
        ctx.private_key = private_key;
        ctx.gas_limit = gas_limit;

        let coordinator = self.clone();
        tokio::spawn(async move {
            coordinator.drive(workflow_id, ctx, cancel_rx).await;
        });

        workflow_id
    }

    async fn drive(self: Arc<Self>, workflow_id: Uuid, mut ctx: WorkflowContext, cancel_rx: watch::Receiver<bool>) {
        let orchestrator = SequentialOrchestrator::new(
            self.registry.clone(),
            self.event_bus.clone(),
            pipeline_for(ctx.features.strict_test),
        );

        let result = orchestrator
            .run(workflow_id, &mut ctx, cancel_rx, |outcome| {
                self.apply_outcome(workflow_id, outcome);
            })
            .await;

        if let Some(mut entry) = self.workflows.get_mut(&workflow_id) {
            match result {
                Ok(()) => {
                    entry.workflow.transition(WorkflowStatus::Completed, 100, None);
                    info!(%workflow_id, "workflow completed");
                }
                Err(WorkflowError::Cancelled) => {
                    // already transitioned to Cancelled by apply_outcome
                }
                Err(err) => {
                    entry.workflow.fail(err.to_string(), None);
                    warn!(%workflow_id, error = %err, "workflow failed");
                }
            }
        }

        if let Some(generation) = ctx.generation.take() {
            let contract = GeneratedContract {
                id: ctx.contract_id,
                workflow_id,
                contract_name: ctx
                    .compilation
                    .as_ref()
                    .map(|c| c.contract_name.clone())
                    .unwrap_or_else(|| generation.contract_type.clone()),
                source_code: generation.contract_code,
                source_code_hash: ctx
                    .compilation
                    .as_ref()
                    .map(|c| c.source_code_hash.clone())
                    .unwrap_or_default(),
                abi: ctx.compilation.as_ref().map(|c| c.abi.clone()).unwrap_or(serde_json::Value::Null),
                bytecode: ctx.compilation.as_ref().map(|c| c.bytecode.clone()).unwrap_or_default(),
                deployed_bytecode: ctx
                    .compilation
                    .as_ref()
                    .map(|c| c.deployed_bytecode.clone())
                    .unwrap_or_default(),
                solidity_version: ctx
                    .compilation
                    .as_ref()
                    .map(|c| c.solidity_version.clone())
                    .unwrap_or_default(),
                constructor_params: Vec::new(),
                created_at: chrono::Utc::now(),
            };
            let contract_id = contract.id;
            self.contracts.entry(workflow_id).or_default().push(contract);

            if let Some(audit) = ctx.audit {
                self.audits.insert(contract_id, audit);
            }
            if let Some(deployment) = ctx.deployment {
                self.deployments.entry(workflow_id).or_default().push(deployment);
            }
        }
    }

    fn apply_outcome(&self, workflow_id: Uuid, outcome: StageOutcome) {
        let Some(mut entry) = self.workflows.get_mut(&workflow_id) else {
            return;
        };
        match outcome {
            StageOutcome::Started { status, .. } => {
                entry.workflow.transition(status, entry.workflow.progress, None);
            }
            StageOutcome::Completed { stage_name, progress } => {
                entry.workflow.transition(entry.workflow.status, progress, Some(stage_name));
            }
            StageOutcome::FailedAdvisory { stage_name, error } => {
                entry.workflow.warn(format!("{stage_name} failed (advisory): {error}"));
            }
            StageOutcome::FailedFatal { .. } => {
                // Terminal transition is applied by `drive` once `run` returns.
            }
            StageOutcome::Cancelled => {
                entry.workflow.cancel();
            }
        }
    }

    pub fn status(&self, workflow_id: Uuid) -> Result<Workflow, WorkflowError> {
        self.workflows
            .get(&workflow_id)
            .map(|entry| entry.workflow.clone())
            .ok_or(WorkflowError::NotFound(workflow_id))
    }

    /// Signal cooperative cancellation. Only effective while the workflow is
    /// in a non-terminal state; a no-op otherwise.
    pub fn cancel(&self, workflow_id: Uuid) -> Result<(), WorkflowError> {
        let entry = self
            .workflows
            .get(&workflow_id)
            .ok_or(WorkflowError::NotFound(workflow_id))?;
        if entry.workflow.status.is_terminal() {
            return Ok(());
        }
        entry.cancel_tx.send_replace(true);
        Ok(())
    }

    pub fn contracts(&self, workflow_id: Uuid) -> Vec<GeneratedContract> {
        self.contracts
            .get(&workflow_id)
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    pub fn deployments(&self, workflow_id: Uuid) -> Vec<DeploymentRecord> {
        self.deployments
            .get(&workflow_id)
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    pub fn audit_for_contract(&self, contract_id: Uuid) -> Option<AuditRecord> {
        self.audits.get(&contract_id).map(|entry| entry.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ctforge_eventbus::{EventBus, InMemorySink};
    use ctforge_stages::{CompilationOutput, GenerationOutput, OptimizationReport, StageService, TestingOutput};
    use std::time::Duration;

    struct FakeStage {
        stage_name: &'static str,
        fatal: bool,
        fail: bool,
    }

    #[async_trait]
    impl StageService for FakeStage {
        fn name(&self) -> &'static str {
            self.stage_name
        }

        fn is_fatal(&self) -> bool {
            self.fatal
        }

        async fn validate(&self, _ctx: &WorkflowContext) -> Result<(), WorkflowError> {
            Ok(())
        }

        async fn process(
            &self,
            _workflow_id: Uuid,
            ctx: &mut WorkflowContext,
            _events: &EventBus,
        ) -> Result<(), WorkflowError> {
            if self.fail {
                return Err(WorkflowError::Internal(format!("{} failed", self.stage_name)));
            }
            match self.stage_name {
                "generation" => {
                    ctx.generation = Some(GenerationOutput {
                        contract_code: "pragma solidity 0.8.27; contract Foo {}".into(),
                        contract_type: "ERC20".into(),
                        constructor_args: Vec::new(),
                        optimization_report: OptimizationReport::default(),
                    });
                }
                "compilation" => {
                    ctx.compilation = Some(CompilationOutput {
                        contract_name: "Foo".into(),
                        bytecode: "0x60".into(),
                        abi: serde_json::json!([]),
                        deployed_bytecode: "0x60".into(),
                        source_code_hash: "hash".into(),
                        solidity_version: "0.8.27".into(),
                    });
                }
                "testing" => {
                    ctx.testing = Some(TestingOutput {
                        passed: 3,
                        failed: 0,
                        skipped: 0,
                        coverage_percent: 90.0,
                    });
                }
                _ => {}
            }
            Ok(())
        }
    }

    fn registry_with_all_stages(fail_stage: Option<&'static str>) -> Arc<ServiceRegistry> {
        let mut registry = ServiceRegistry::new();
        for (name, fatal) in [
            ("generation", true),
            ("compilation", true),
            ("audit", false),
            ("testing", false),
            ("deployment", true),
        ] {
            registry.register(Arc::new(FakeStage {
                stage_name: name,
                fatal,
                fail: fail_stage == Some(name),
            }));
        }
        Arc::new(registry)
    }

    fn test_coordinator(fail_stage: Option<&'static str>) -> Arc<WorkflowCoordinator> {
        let registry = registry_with_all_stages(fail_stage);
        let event_bus = Arc::new(EventBus::new(Arc::new(InMemorySink::new())));
        let feature_registry = Arc::new(NetworkFeatureRegistry::new());
        Arc::new(WorkflowCoordinator::new(registry, event_bus, feature_registry))
    }

    #[tokio::test]
    async fn completed_workflow_reaches_full_progress() {
        let coordinator = test_coordinator(None);
        let id = coordinator.create(
            Uuid::new_v4(),
            "Create an ERC20 token".into(),
            "hyperion_testnet".into(),
            FeatureToggles::default(),
            Some("0xdeployer".into()),
            Some("0xkey".into()),
            Some(3_000_000),
        );

        for _ in 0..50 {
            if coordinator.status(id).unwrap().status.is_terminal() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let workflow = coordinator.status(id).unwrap();
        assert_eq!(workflow.status, WorkflowStatus::Completed);
        assert_eq!(workflow.progress, 100);
    }

    #[tokio::test]
    async fn fatal_stage_failure_marks_workflow_failed() {
        let coordinator = test_coordinator(Some("compilation"));
        let id = coordinator.create(
            Uuid::new_v4(),
            "Create an ERC20 token".into(),
            "hyperion_testnet".into(),
            FeatureToggles::default(),
            Some("0xdeployer".into()),
            Some("0xkey".into()),
            Some(3_000_000),
        );

        for _ in 0..50 {
            if coordinator.status(id).unwrap().status.is_terminal() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let workflow = coordinator.status(id).unwrap();
        assert_eq!(workflow.status, WorkflowStatus::Failed);
    }

    #[tokio::test]
    async fn advisory_stage_failure_does_not_halt_pipeline() {
        let coordinator = test_coordinator(Some("audit"));
        let id = coordinator.create(
            Uuid::new_v4(),
            "Create an ERC20 token".into(),
            "hyperion_testnet".into(),
            FeatureToggles::default(),
            Some("0xdeployer".into()),
            Some("0xkey".into()),
            Some(3_000_000),
        );

        for _ in 0..50 {
            if coordinator.status(id).unwrap().status.is_terminal() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let workflow = coordinator.status(id).unwrap();
        assert_eq!(workflow.status, WorkflowStatus::Completed);
        assert!(workflow.warnings.iter().any(|w| w.contains("audit")));
    }

    #[tokio::test]
    async fn unsupported_feature_is_disabled_with_a_warning() {
        let coordinator = test_coordinator(None);
        let mut features = FeatureToggles::default();
        features.optimize_for_metisvm = true;
        let id = coordinator.create(
            Uuid::new_v4(),
            "Create an ERC20 token".into(),
            "mantle_testnet".into(),
            features,
            Some("0xdeployer".into()),
            Some("0xkey".into()),
            Some(3_000_000),
        );

        let workflow = coordinator.status(id).unwrap();
        assert!(!workflow.features.optimize_for_metisvm);
        assert!(workflow
            .warnings
            .iter()
            .any(|w| w.contains("optimize_for_metisvm")));
    }

    #[tokio::test]
    async fn cancel_before_completion_yields_cancelled_status() {
        let coordinator = test_coordinator(None);
        let id = coordinator.create(
            Uuid::new_v4(),
            "Create an ERC20 token".into(),
            "hyperion_testnet".into(),
            FeatureToggles::default(),
            Some("0xdeployer".into()),
            Some("0xkey".into()),
            Some(3_000_000),
        );
        coordinator.cancel(id).unwrap();

        for _ in 0..50 {
            if coordinator.status(id).unwrap().status.is_terminal() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let workflow = coordinator.status(id).unwrap();
        assert_eq!(workflow.status, WorkflowStatus::Cancelled);
    }
}
