//! Generation Stage
//!
//! Retrieves reference templates via RAG, prompts the configured LLM for
//! Solidity source, optionally layers MetisVM pragmas, and derives
//! constructor argument values with a second short LLM call. Per
//! SPEC_FULL.md §4.4.1.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ctforge_eventbus::EventBus;
use ctforge_llm::LlmClient;
use ctforge_rag::RagRetriever;
use ctforge_registry::NetworkFeatureRegistry;
use ctforge_types::{Event, EventType, Feature, WorkflowError};
use regex::Regex;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::context::{GenerationOutput, OptimizationReport, WorkflowContext};
use crate::retry::retry_with_backoff;
use crate::stage::StageService;

const LLM_TIMEOUT: Duration = Duration::from_secs(30);
const CONSTRUCTOR_TIMEOUT: Duration = Duration::from_secs(20);
const TEMPERATURE: f32 = 0.3;
const RETRY_ATTEMPTS: u32 = 3;
const RETRY_BASE: Duration = Duration::from_secs(2);
const MIN_DESCRIPTION_LEN: usize = 10;

/// Hyperion-family network ids; MetisVM pragmas are only ever considered on
/// these.
fn is_hyperion(network: &str) -> bool {
    network.starts_with("hyperion_")
}

pub struct GenerationStage {
    llm: Arc<dyn LlmClient>,
    retriever: Arc<RagRetriever>,
    registry: Arc<NetworkFeatureRegistry>,
}

impl GenerationStage {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        retriever: Arc<RagRetriever>,
        registry: Arc<NetworkFeatureRegistry>,
    ) -> Self {
        Self {
            llm,
            retriever,
            registry,
        }
    }

    fn build_prompt(&self, ctx: &WorkflowContext, templates: &[ctforge_types::ContractTemplate]) -> (String, String) {
        let system = "You are a Solidity smart contract generator. Follow OpenZeppelin \
            conventions, add reentrancy guards where applicable, write NatSpec comments, \
            target EVM, and begin the file with `pragma solidity 0.8.27;`.".to_string();

        let mut user = String::new();
        for (i, template) in templates.iter().take(3).enumerate() {
            user.push_str(&format!(
                "Reference template {} ({}):\n```solidity\n{}\n```\n\n",
                i + 1,
                template.name,
                template.source_code
            ));
        }
        user.push_str(&format!(
            "Contract type: {}\nDescription: {}\n\nWrite the complete Solidity source.",
            ctx.contract_type, ctx.nlp_description
        ));
        (system, user)
    }

    fn extract_solidity(response: &str) -> String {
        let fence = Regex::new(r"(?s)```(?:solidity)?\s*(.*?)```").expect("valid regex");
        match fence.captures(response) {
            Some(caps) => caps.get(1).map(|m| m.as_str().trim().to_string()).unwrap_or_default(),
            None => response.trim().to_string(),
        }
    }

    fn contains_float_indicators(code: &str) -> bool {
        ["float", "fixed", "decimal128", "ufixed"]
            .iter()
            .any(|needle| code.to_lowercase().contains(needle))
    }

    fn contains_ai_indicators(code: &str) -> bool {
        ["inference", "model weights", "onchain ai", "neural"]
            .iter()
            .any(|needle| code.to_lowercase().contains(needle))
    }

    /// Apply the MetisVM pragma rules from §4.4.1 step 5.
    fn apply_metisvm_pragmas(
        &self,
        mut code: String,
        ctx: &WorkflowContext,
    ) -> (String, OptimizationReport) {
        let mut report = OptimizationReport::default();

        let eligible = ctx.features.optimize_for_metisvm
            && is_hyperion(&ctx.network)
            && self.registry.supports(&ctx.network, Feature::MetisVm);

        if !eligible {
            return (code, report);
        }

        let pragma_line_end = code.find('\n').map(|i| i + 1).unwrap_or(0);
        let mut insertions = vec!["pragma metisvm \">=0.1.0\";\n".to_string()];
        report.metisvm_pragma_added = true;

        if ctx.features.enable_floating_point || Self::contains_float_indicators(&code) {
            insertions.push("pragma metisvm_floating_point \">=0.1.0\";\n".to_string());
            report.floating_point_pragma_added = true;
        }
        if ctx.features.enable_ai_inference || Self::contains_ai_indicators(&code) {
            insertions.push("pragma metisvm_ai_quantization \">=0.1.0\";\n".to_string());
            report.ai_inference_pragma_added = true;
        }

        for insertion in insertions.into_iter().rev() {
            code.insert_str(pragma_line_end, &insertion);
        }

        (code, report)
    }

    fn default_constructor_args(contract_type: &str) -> Vec<serde_json::Value> {
        match contract_type {
            "ERC20" => vec![
                serde_json::json!(""),
                serde_json::json!(""),
                serde_json::json!(0),
            ],
            _ => Vec::new(),
        }
    }

    async fn derive_constructor_args(&self, ctx: &WorkflowContext) -> Vec<serde_json::Value> {
        let system = "Given a smart contract description, output a JSON array of concrete \
            constructor argument values, in order, and nothing else.";
        let user = format!(
            "Contract type: {}\nDescription: {}",
            ctx.contract_type, ctx.nlp_description
        );

        match self
            .llm
            .chat(system, &user, 0.0, CONSTRUCTOR_TIMEOUT)
            .await
        {
            Ok(response) => match serde_json::from_str::<Vec<serde_json::Value>>(response.trim()) {
                Ok(args) => args,
                Err(err) => {
                    warn!(error = %err, "constructor arg response was not a JSON array; using defaults");
                    Self::default_constructor_args(&ctx.contract_type)
                }
            },
            Err(err) => {
                warn!(error = %err, "constructor arg derivation timed out or failed; using defaults");
                Self::default_constructor_args(&ctx.contract_type)
            }
        }
    }
}

#[async_trait]
impl StageService for GenerationStage {
    fn name(&self) -> &'static str {
        "generation"
    }

    async fn validate(&self, ctx: &WorkflowContext) -> Result<(), WorkflowError> {
        if ctx.nlp_description.len() < MIN_DESCRIPTION_LEN {
            return Err(WorkflowError::Validation(format!(
                "nlp_description must be at least {MIN_DESCRIPTION_LEN} characters"
            )));
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
                EventType::GenerationStarted,
                workflow_id,
                "generation",
                serde_json::json!({}),
            ))
            .await
            .ok();

        let type_filter = if ctx.contract_type == "Custom" {
            None
        } else {
            Some(ctx.contract_type.as_str())
        };
        let templates = self
            .retriever
            .retrieve(&ctx.nlp_description, type_filter)
            .await;
        info!(template_count = templates.len(), "retrieved reference templates");

        let (system, user) = self.build_prompt(ctx, &templates);

        let llm = self.llm.clone();
        let response = retry_with_backoff(RETRY_ATTEMPTS, RETRY_BASE, "generation.llm", || {
            let llm = llm.clone();
            let system = system.clone();
            let user = user.clone();
            async move { llm.chat(&system, &user, TEMPERATURE, LLM_TIMEOUT).await }
        })
        .await
        .map_err(|err| WorkflowError::Llm(err.to_string()))?;

        let code = Self::extract_solidity(&response);
        let (code, optimization_report) = self.apply_metisvm_pragmas(code, ctx);
        let constructor_args = self.derive_constructor_args(ctx).await;

        ctx.generation = Some(GenerationOutput {
            contract_code: code,
            contract_type: ctx.contract_type.clone(),
            constructor_args,
            optimization_report,
        });

        events
            .publish(Event::new(
                EventType::GenerationCompleted,
                workflow_id,
                "generation",
                serde_json::json!({"template_count": templates.len()}),
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
    fn extracts_fenced_solidity_block() {
        let response = "Here you go:\n```solidity\npragma solidity 0.8.27;\ncontract Foo {}\n```\nEnjoy.";
        let code = GenerationStage::extract_solidity(response);
        assert!(code.starts_with("pragma solidity"));
        assert!(!code.contains("```"));
    }

    #[test]
    fn falls_back_to_trimmed_response_without_fence() {
        let response = "  pragma solidity 0.8.27; contract Foo {}  ";
        let code = GenerationStage::extract_solidity(response);
        assert_eq!(code, "pragma solidity 0.8.27; contract Foo {}");
    }

    #[test]
    fn default_erc20_constructor_args_are_type_appropriate() {
        let args = GenerationStage::default_constructor_args("ERC20");
        assert_eq!(args.len(), 3);
        assert_eq!(args[2], serde_json::json!(0));
    }
}
