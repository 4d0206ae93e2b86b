//! Cross-Stage Context
//!
//! Explicit, named output records per stage rather than a catch-all context
//! dict, per SPEC_FULL.md §4.5. The orchestrator holds one `WorkflowContext`
//! per running workflow and grafts each stage's typed output into it; the
//! next stage's `validate`/`process` reads only the fields it declares.

use ctforge_types::{AuditRecord, DeploymentRecord, FeatureToggles};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OptimizationReport {
    pub metisvm_pragma_added: bool,
    pub floating_point_pragma_added: bool,
    pub ai_inference_pragma_added: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationOutput {
    pub contract_code: String,
    pub contract_type: String,
    pub constructor_args: Vec<serde_json::Value>,
    pub optimization_report: OptimizationReport,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompilationOutput {
    pub contract_name: String,
    pub bytecode: String,
    pub abi: serde_json::Value,
    pub deployed_bytecode: String,
    pub source_code_hash: String,
    pub solidity_version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestingOutput {
    pub passed: u32,
    pub failed: u32,
    pub skipped: u32,
    pub coverage_percent: f32,
}

/// Everything the five stages read from and write to while executing one
/// workflow. Input fields are set once by the Coordinator/Orchestrator at
/// construction; each `Option<...>Output` field is populated in pipeline
/// order as its stage completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowContext {
    /// Id the eventual `GeneratedContract` row will carry, minted up front
    /// so stages that reference "the contract" (the Audit record, in
    /// particular) agree with the Coordinator on what it is.
    pub contract_id: Uuid,
    pub nlp_description: String,
    pub contract_type: String,
    pub network: String,
    pub features: FeatureToggles,
    pub deployer_address: Option<String>,
    #[serde(skip_serializing)]
    pub private_key: Option<String>,
    pub gas_limit: Option<u64>,
    pub audit_level: AuditLevel,
    pub max_parallel: usize,

    pub generation: Option<GenerationOutput>,
    pub compilation: Option<CompilationOutput>,
    pub audit: Option<AuditRecord>,
    pub testing: Option<TestingOutput>,
    pub deployment: Option<DeploymentRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditLevel {
    Basic,
    Standard,
    Comprehensive,
}

impl Default for AuditLevel {
    fn default() -> Self {
        AuditLevel::Standard
    }
}

impl WorkflowContext {
    pub fn new(nlp_description: String, contract_type: String, network: String, features: FeatureToggles) -> Self {
        Self {
            contract_id: Uuid::new_v4(),
            nlp_description,
            contract_type,
            network,
            features,
            deployer_address: None,
            private_key: None,
            gas_limit: None,
            audit_level: AuditLevel::Standard,
            max_parallel: 10,
            generation: None,
            compilation: None,
            audit: None,
            testing: None,
            deployment: None,
        }
    }
}
