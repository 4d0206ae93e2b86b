//! Deployment Stage
//!
//! Submits the compiled contract to an EVM-compatible network. Per
//! SPEC_FULL.md §4.4.5. Batch deployment across many contracts (when the
//! target network supports `PEF`) is delegated to the Parallel Deployment
//! Scheduler, which drives many single-contract deployments through the same
//! `ChainClient` seam used here; it is not reachable from this per-workflow
//! stage, which only ever deploys the one contract in its own context.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ctforge_eventbus::EventBus;
use ctforge_registry::NetworkFeatureRegistry;
use ctforge_types::{DeploymentRecord, Event, EventType, Feature, WorkflowError};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::context::WorkflowContext;
use crate::stage::StageService;

const RECEIPT_TIMEOUT: Duration = Duration::from_secs(300);
const TRANSIENT_RETRY_ATTEMPTS: u32 = 3;
const TRANSIENT_RETRY_BASE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct DeploymentTransaction {
    pub data: String,
    pub nonce: u64,
    pub gas: u64,
    pub gas_price: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct DeploymentReceipt {
    pub contract_address: String,
    pub tx_hash: String,
    pub block_number: u64,
    pub gas_used: u64,
}

/// Failure classification from §4.4.5: validation and gas-estimation errors
/// are fatal with no retry; transient network errors retry; reverts and
/// insufficient balance are fatal.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("gas estimation failed: {0}")]
    GasEstimation(String),
    #[error("transient network error: {0}")]
    Transient(String),
    #[error("transaction reverted: {0}")]
    Reverted(String),
    #[error("insufficient balance: {0}")]
    InsufficientBalance(String),
    #[error("receipt not found within timeout")]
    ReceiptTimeout,
}

impl ChainError {
    fn is_transient(&self) -> bool {
        matches!(self, ChainError::Transient(_))
    }
}

/// RPC/chain boundary: one implementation per network family in production,
/// a deterministic fake in tests. Mirrors the `SolcClient`/`AuditTool` seam.
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn next_nonce(&self, network: &str, deployer: &str) -> Result<u64, ChainError>;
    async fn estimate_gas(&self, network: &str, data: &str) -> Result<u64, ChainError>;
    async fn submit(
        &self,
        network: &str,
        tx: DeploymentTransaction,
        private_key: &str,
    ) -> Result<String, ChainError>;
    async fn poll_receipt(
        &self,
        network: &str,
        tx_hash: &str,
        timeout: Duration,
    ) -> Result<DeploymentReceipt, ChainError>;
}

/// EigenDA metadata archival, submitted in the background after confirmation.
/// Failures never fail the deployment (§4.4.5 step 5).
#[async_trait]
pub trait DataAvailabilityClient: Send + Sync {
    async fn submit_blob(&self, commitment_input: serde_json::Value) -> Result<String, String>;
}

pub struct DeploymentStage {
    chain: Arc<dyn ChainClient>,
    disperser: Arc<dyn DataAvailabilityClient>,
    registry: Arc<NetworkFeatureRegistry>,
}

impl DeploymentStage {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        disperser: Arc<dyn DataAvailabilityClient>,
        registry: Arc<NetworkFeatureRegistry>,
    ) -> Self {
        Self {
            chain,
            disperser,
            registry,
        }
    }

    fn encode_constructor_args(args: &[serde_json::Value]) -> String {
        // ABI encoding is outside this stage's concern; constructor args are
        // appended as an opaque hex-ish fragment for the chain client to
        // decode against the ABI it already has.
        args.iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join("")
    }
}

#[async_trait]
impl StageService for DeploymentStage {
    fn name(&self) -> &'static str {
        "deployment"
    }

    async fn validate(&self, ctx: &WorkflowContext) -> Result<(), WorkflowError> {
        let compilation = ctx
            .compilation
            .as_ref()
            .ok_or_else(|| WorkflowError::Validation("deployment requires compilation output".into()))?;
        if compilation.bytecode.is_empty() || compilation.abi.is_null() {
            return Err(WorkflowError::Validation(
                "compiled_contract must contain both abi and bytecode".into(),
            ));
        }
        if ctx.deployer_address.is_none() || ctx.private_key.is_none() {
            return Err(WorkflowError::Validation(
                "deployment requires deployer_address and private_key".into(),
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
                EventType::DeploymentStarted,
                workflow_id,
                "deployment",
                serde_json::json!({}),
            ))
            .await
            .ok();

        if !self.registry.all().iter().any(|e| e.network_id == ctx.network) {
            return Err(WorkflowError::UnknownNetwork(ctx.network.clone()));
        }

        let compilation = ctx
            .compilation
            .as_ref()
            .expect("validate ensures compilation output is present")
            .clone();
        let deployer = ctx.deployer_address.clone().expect("validated");
        let private_key = ctx.private_key.clone().expect("validated");
        let constructor_args = ctx
            .generation
            .as_ref()
            .map(|g| g.constructor_args.clone())
            .unwrap_or_default();

        let mut record = DeploymentRecord::pending(Uuid::new_v4(), ctx.network.clone(), deployer.clone());

        let result = self
            .deploy_single(&compilation, &constructor_args, &deployer, &private_key, ctx)
            .await;

        match result {
            Ok(receipt) => {
                record.confirm(
                    receipt.contract_address.clone(),
                    receipt.tx_hash.clone(),
                    receipt.block_number,
                    receipt.gas_used,
                );

                if self.registry.supports(&ctx.network, Feature::EigenDa) && ctx.features.enable_eigenda {
                    let disperser = self.disperser.clone();
                    let blob = serde_json::json!({
                        "abi": compilation.abi,
                        "source_code_hash": compilation.source_code_hash,
                        "contract_address": receipt.contract_address,
                        "network": ctx.network,
                    });
                    tokio::spawn(async move {
                        if let Err(err) = disperser.submit_blob(blob).await {
                            warn!(error = %err, "EigenDA blob submission failed; deployment unaffected");
                        }
                    });
                }

                ctx.deployment = Some(record);
                events
                    .publish(Event::new(
                        EventType::DeploymentConfirmed,
                        workflow_id,
                        "deployment",
                        serde_json::json!({"contract_address": receipt.contract_address}),
                    ))
                    .await
                    .ok();
                Ok(())
            }
            Err(err) => {
                record.fail();
                ctx.deployment = Some(record);
                events
                    .publish(Event::new(
                        EventType::DeploymentFailed,
                        workflow_id,
                        "deployment",
                        serde_json::json!({"error": err.to_string()}),
                    ))
                    .await
                    .ok();
                Err(err)
            }
        }
    }
}

impl DeploymentStage {
    async fn deploy_single(
        &self,
        compilation: &crate::context::CompilationOutput,
        constructor_args: &[serde_json::Value],
        deployer: &str,
        private_key: &str,
        ctx: &WorkflowContext,
    ) -> Result<DeploymentReceipt, WorkflowError> {
        let data = format!(
            "{}{}",
            compilation.bytecode,
            Self::encode_constructor_args(constructor_args)
        );

        let nonce = self
            .chain
            .next_nonce(&ctx.network, deployer)
            .await
            .map_err(Self::classify)?;

        let gas = match ctx.gas_limit {
            Some(limit) => limit,
            None => self
                .chain
                .estimate_gas(&ctx.network, &data)
                .await
                .map_err(|err| WorkflowError::NetworkFatal(err.to_string()))?,
        };

        let tx = DeploymentTransaction {
            data,
            nonce,
            gas,
            gas_price: None,
        };

        let tx_hash = Self::submit_with_retry(&self.chain, &ctx.network, tx, private_key)
            .await
            .map_err(Self::classify)?;

        info!(tx_hash = %tx_hash, "deployment transaction submitted");

        let receipt = self
            .chain
            .poll_receipt(&ctx.network, &tx_hash, RECEIPT_TIMEOUT)
            .await
            .map_err(Self::classify)?;

        Ok(receipt)
    }

    /// Submits the signed transaction, retrying only `ChainError::Transient`
    /// failures with backoff; a revert or insufficient-balance error is
    /// fatal and returned on the first attempt (§4.4.5).
    async fn submit_with_retry(
        chain: &Arc<dyn ChainClient>,
        network: &str,
        tx: DeploymentTransaction,
        private_key: &str,
    ) -> Result<String, ChainError> {
        let mut attempt = 0;
        loop {
            match chain.submit(network, tx.clone(), private_key).await {
                Ok(hash) => return Ok(hash),
                Err(err) => {
                    warn!(attempt = attempt + 1, error = %err, "deployment submit attempt failed");
                    if !err.is_transient() || attempt + 1 >= TRANSIENT_RETRY_ATTEMPTS {
                        return Err(err);
                    }
                    attempt += 1;
                    tokio::time::sleep(TRANSIENT_RETRY_BASE * 2u32.pow(attempt - 1)).await;
                }
            }
        }
    }

    fn classify(err: ChainError) -> WorkflowError {
        match err {
            ChainError::GasEstimation(msg) => WorkflowError::NetworkFatal(msg),
            ChainError::Transient(msg) => WorkflowError::NetworkTransient(msg),
            ChainError::Reverted(msg) | ChainError::InsufficientBalance(msg) => {
                WorkflowError::NetworkFatal(msg)
            }
            ChainError::ReceiptTimeout => {
                WorkflowError::NetworkFatal("receipt not found within timeout".into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FakeChain {
        submit_failures_then_success: AtomicU32,
    }

    #[async_trait]
    impl ChainClient for FakeChain {
        async fn next_nonce(&self, _network: &str, _deployer: &str) -> Result<u64, ChainError> {
            Ok(1)
        }
        async fn estimate_gas(&self, _network: &str, _data: &str) -> Result<u64, ChainError> {
            Ok(21000)
        }
        async fn submit(
            &self,
            _network: &str,
            _tx: DeploymentTransaction,
            _private_key: &str,
        ) -> Result<String, ChainError> {
            let remaining = self.submit_failures_then_success.load(Ordering::SeqCst);
            if remaining > 0 {
                self.submit_failures_then_success
                    .fetch_sub(1, Ordering::SeqCst);
                return Err(ChainError::Transient("rate limited".into()));
            }
            Ok("0xabc123".into())
        }
        async fn poll_receipt(
            &self,
            _network: &str,
            tx_hash: &str,
            _timeout: Duration,
        ) -> Result<DeploymentReceipt, ChainError> {
            Ok(DeploymentReceipt {
                contract_address: "0xdeadbeef".into(),
                tx_hash: tx_hash.to_string(),
                block_number: 100,
                gas_used: 21000,
            })
        }
    }

    struct NoopDisperser;

    #[async_trait]
    impl DataAvailabilityClient for NoopDisperser {
        async fn submit_blob(&self, _input: serde_json::Value) -> Result<String, String> {
            Ok("commitment".into())
        }
    }

    fn deployable_context() -> WorkflowContext {
        let mut ctx = WorkflowContext::new(
            "a test contract description".into(),
            "ERC20".into(),
            "hyperion_testnet".into(),
            Default::default(),
        );
        ctx.compilation = Some(crate::context::CompilationOutput {
            contract_name: "Foo".into(),
            bytecode: "0x600160015b".into(),
            abi: serde_json::json!([{"type": "constructor"}]),
            deployed_bytecode: "0x6001".into(),
            source_code_hash: "deadbeef".into(),
            solidity_version: "0.8.27".into(),
        });
        ctx.deployer_address = Some("0xdeployer".into());
        ctx.private_key = Some("0xkey".into());
        ctx
    }

    #[tokio::test]
    async fn successful_deployment_confirms_record() {
        let stage = DeploymentStage::new(
            Arc::new(FakeChain {
                submit_failures_then_success: AtomicU32::new(0),
            }),
            Arc::new(NoopDisperser),
            Arc::new(NetworkFeatureRegistry::new()),
        );
        let mut ctx = deployable_context();
        let bus = EventBus::new(Arc::new(ctforge_eventbus::InMemorySink::new()));
        stage.process(Uuid::new_v4(), &mut ctx, &bus).await.unwrap();
        let deployment = ctx.deployment.unwrap();
        assert_eq!(
            deployment.status,
            ctforge_types::DeploymentStatus::Confirmed
        );
        assert_eq!(deployment.contract_address.unwrap(), "0xdeadbeef");
    }

    #[tokio::test]
    async fn transient_submit_failure_is_retried() {
        let stage = DeploymentStage::new(
            Arc::new(FakeChain {
                submit_failures_then_success: AtomicU32::new(2),
            }),
            Arc::new(NoopDisperser),
            Arc::new(NetworkFeatureRegistry::new()),
        );
        let mut ctx = deployable_context();
        let bus = EventBus::new(Arc::new(ctforge_eventbus::InMemorySink::new()));
        let result = stage.process(Uuid::new_v4(), &mut ctx, &bus).await;
        assert!(result.is_ok());
    }

    struct RevertingChain {
        submit_attempts: AtomicU32,
    }

    #[async_trait]
    impl ChainClient for RevertingChain {
        async fn next_nonce(&self, _network: &str, _deployer: &str) -> Result<u64, ChainError> {
            Ok(1)
        }
        async fn estimate_gas(&self, _network: &str, _data: &str) -> Result<u64, ChainError> {
            Ok(21000)
        }
        async fn submit(
            &self,
            _network: &str,
            _tx: DeploymentTransaction,
            _private_key: &str,
        ) -> Result<String, ChainError> {
            self.submit_attempts.fetch_add(1, Ordering::SeqCst);
            Err(ChainError::Reverted("execution reverted".into()))
        }
        async fn poll_receipt(
            &self,
            _network: &str,
            tx_hash: &str,
            _timeout: Duration,
        ) -> Result<DeploymentReceipt, ChainError> {
            Ok(DeploymentReceipt {
                contract_address: "0xdeadbeef".into(),
                tx_hash: tx_hash.to_string(),
                block_number: 100,
                gas_used: 21000,
            })
        }
    }

    #[tokio::test]
    async fn reverted_submission_fails_on_first_attempt_without_retry() {
        let chain = Arc::new(RevertingChain {
            submit_attempts: AtomicU32::new(0),
        });
        let stage = DeploymentStage::new(chain.clone(), Arc::new(NoopDisperser), Arc::new(NetworkFeatureRegistry::new()));
        let mut ctx = deployable_context();
        let bus = EventBus::new(Arc::new(ctforge_eventbus::InMemorySink::new()));
        let result = stage.process(Uuid::new_v4(), &mut ctx, &bus).await;
        assert!(matches!(result, Err(WorkflowError::NetworkFatal(_))));
        assert_eq!(chain.submit_attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_network_fails_fast() {
        let stage = DeploymentStage::new(
            Arc::new(FakeChain {
                submit_failures_then_success: AtomicU32::new(0),
            }),
            Arc::new(NoopDisperser),
            Arc::new(NetworkFeatureRegistry::new()),
        );
        let mut ctx = deployable_context();
        ctx.network = "unknown_net".into();
        let bus = EventBus::new(Arc::new(ctforge_eventbus::InMemorySink::new()));
        let result = stage.process(Uuid::new_v4(), &mut ctx, &bus).await;
        assert!(matches!(result, Err(WorkflowError::UnknownNetwork(_))));
    }
}
