//! Parallel Deployment Scheduler
//!
//! Deploys a batch of contracts as fast as the target network's `PEF`
//! feature permits while respecting inter-contract dependencies. Per
//! SPEC_FULL.md §4.6. `deploy_batch` checks `Feature::BatchDeployment`
//! against the Network Feature Registry itself and rejects the whole batch
//! (every contract marked `Failed`) rather than trusting callers to only
//! route PEF-capable networks here.

pub mod dependency;

pub use dependency::DeployableContract;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use ctforge_registry::NetworkFeatureRegistry;
use ctforge_stages::{ChainClient, ChainError, DeploymentTransaction};
use ctforge_types::Feature;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::{info, instrument, warn};

/// Default bound on concurrent in-flight deployment tasks when the caller
/// does not specify one.
pub const DEFAULT_MAX_PARALLEL: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployStatus {
    Deployed,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractDeployResult {
    pub contract_name: String,
    pub status: DeployStatus,
    pub contract_address: Option<String>,
    pub tx_hash: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerOutput {
    pub deployments: Vec<ContractDeployResult>,
    pub total_time_ms: u128,
    pub success_count: usize,
    pub failed_count: usize,
    pub batches_deployed: usize,
}

pub struct ParallelDeploymentScheduler {
    chain: Arc<dyn ChainClient>,
    registry: Arc<NetworkFeatureRegistry>,
}

impl ParallelDeploymentScheduler {
    pub fn new(chain: Arc<dyn ChainClient>, registry: Arc<NetworkFeatureRegistry>) -> Self {
        Self { chain, registry }
    }

    #[instrument(skip(self, contracts), fields(network, count = contracts.len()))]
    pub async fn deploy_batch(
        &self,
        contracts: Vec<DeployableContract>,
        network: &str,
        deployer: &str,
        private_key: &str,
        max_parallel: usize,
    ) -> SchedulerOutput {
        let started = Instant::now();

        if !self.registry.supports(network, Feature::BatchDeployment) {
            warn!(network, "batch deployment rejected: network does not support PEF");
            let deployments = contracts
                .into_iter()
                .map(|c| ContractDeployResult {
                    contract_name: c.contract_name,
                    status: DeployStatus::Failed,
                    contract_address: None,
                    tx_hash: None,
                    error: Some(format!(
                        "network {network} does not support PEF batch deployment: {}",
                        self.registry.fallback(network, Feature::BatchDeployment)
                    )),
                })
                .collect::<Vec<_>>();
            let failed_count = deployments.len();
            return SchedulerOutput {
                deployments,
                total_time_ms: started.elapsed().as_millis(),
                success_count: 0,
                failed_count,
                batches_deployed: 0,
            };
        }

        let max_parallel = if max_parallel == 0 {
            DEFAULT_MAX_PARALLEL
        } else {
            max_parallel
        };

        let graph = dependency::resolve_dependencies(&contracts);
        let layers = match dependency::topological_layers(&graph) {
            Some(layers) => layers,
            None => {
                warn!("dependency cycle detected; falling back to sequential deployment in input order");
                contracts.iter().map(|c| vec![c.contract_name.clone()]).collect()
            }
        };

        let by_name: HashMap<String, DeployableContract> = contracts
            .into_iter()
            .map(|c| (c.contract_name.clone(), c))
            .collect();

        let starting_nonce = match self.chain.next_nonce(network, deployer).await {
            Ok(nonce) => nonce,
            Err(err) => {
                let deployments = by_name
                    .into_values()
                    .map(|c| ContractDeployResult {
                        contract_name: c.contract_name,
                        status: DeployStatus::Failed,
                        contract_address: None,
                        tx_hash: None,
                        error: Some(err.to_string()),
                    })
                    .collect();
                return SchedulerOutput {
                    deployments,
                    total_time_ms: started.elapsed().as_millis(),
                    success_count: 0,
                    failed_count: by_name_len_fallback(&graph),
                    batches_deployed: 0,
                };
            }
        };
        let nonce_counter = Arc::new(AtomicU64::new(starting_nonce));

        let semaphore = Arc::new(Semaphore::new(max_parallel));
        let mut results = Vec::new();
        let mut aborted = false;
        let mut batches_deployed = 0;

        let mut remaining: HashMap<String, DeployableContract> = by_name;

        for layer in layers {
            if aborted {
                for name in layer {
                    results.push(ContractDeployResult {
                        contract_name: name,
                        status: DeployStatus::Skipped,
                        contract_address: None,
                        tx_hash: None,
                        error: Some("aborted: a prior layer failed".into()),
                    });
                }
                continue;
            }

            batches_deployed += 1;
            let mut handles = Vec::new();
            for name in layer {
                let Some(contract) = remaining.remove(&name) else {
                    continue;
                };
                let chain = self.chain.clone();
                let network = network.to_string();
                let private_key = private_key.to_string();
                let nonce_counter = nonce_counter.clone();
                let semaphore = semaphore.clone();
                handles.push(tokio::spawn(async move {
                    let _permit = semaphore.acquire_owned().await.expect("semaphore not closed");
                    deploy_one(chain, &network, &private_key, contract, &nonce_counter).await
                }));
            }

            let mut layer_failed = false;
            for handle in handles {
                match handle.await {
                    Ok(result) => {
                        if result.status == DeployStatus::Failed {
                            layer_failed = true;
                        }
                        results.push(result);
                    }
                    Err(join_err) => {
                        layer_failed = true;
                        results.push(ContractDeployResult {
                            contract_name: "<unknown>".into(),
                            status: DeployStatus::Failed,
                            contract_address: None,
                            tx_hash: None,
                            error: Some(join_err.to_string()),
                        });
                    }
                }
            }

            if layer_failed {
                aborted = true;
            }
        }

        let success_count = results.iter().filter(|r| r.status == DeployStatus::Deployed).count();
        let failed_count = results.iter().filter(|r| r.status == DeployStatus::Failed).count();

        info!(
            success_count,
            failed_count,
            batches_deployed,
            "batch deployment finished"
        );

        SchedulerOutput {
            deployments: results,
            total_time_ms: started.elapsed().as_millis(),
            success_count,
            failed_count,
            batches_deployed,
        }
    }
}

async fn deploy_one(
    chain: Arc<dyn ChainClient>,
    network: &str,
    private_key: &str,
    contract: DeployableContract,
    nonce_counter: &AtomicU64,
) -> ContractDeployResult {
    let nonce = nonce_counter.fetch_add(1, Ordering::SeqCst);

    let gas = match chain.estimate_gas(network, &contract.bytecode).await {
        Ok(gas) => gas,
        Err(err) => {
            return ContractDeployResult {
                contract_name: contract.contract_name,
                status: DeployStatus::Failed,
                contract_address: None,
                tx_hash: None,
                error: Some(err.to_string()),
            }
        }
    };

    let tx = DeploymentTransaction {
        data: contract.bytecode.clone(),
        nonce,
        gas,
        gas_price: None,
    };

    let submit_result = chain.submit(network, tx, private_key).await;
    let tx_hash = match submit_result {
        Ok(hash) => hash,
        Err(err) => {
            return ContractDeployResult {
                contract_name: contract.contract_name,
                status: DeployStatus::Failed,
                contract_address: None,
                tx_hash: None,
                error: Some(err.to_string()),
            }
        }
    };

    match chain
        .poll_receipt(network, &tx_hash, Duration::from_secs(300))
        .await
    {
        Ok(receipt) => ContractDeployResult {
            contract_name: contract.contract_name,
            status: DeployStatus::Deployed,
            contract_address: Some(receipt.contract_address),
            tx_hash: Some(receipt.tx_hash),
            error: None,
        },
        Err(err) => ContractDeployResult {
            contract_name: contract.contract_name,
            status: DeployStatus::Failed,
            contract_address: None,
            tx_hash: Some(tx_hash),
            error: Some(err.to_string()),
        },
    }
}

fn by_name_len_fallback(graph: &HashMap<String, std::collections::HashSet<String>>) -> usize {
    graph.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ctforge_stages::DeploymentReceipt;
    use std::sync::Mutex;

    struct RecordingChain {
        nonces_used: Mutex<Vec<u64>>,
        fail_names: Vec<String>,
    }

    #[async_trait]
    impl ChainClient for RecordingChain {
        async fn next_nonce(&self, _network: &str, _deployer: &str) -> Result<u64, ChainError> {
            Ok(0)
        }
        async fn estimate_gas(&self, _network: &str, _data: &str) -> Result<u64, ChainError> {
            Ok(21000)
        }
        async fn submit(
            &self,
            _network: &str,
            tx: DeploymentTransaction,
            _private_key: &str,
        ) -> Result<String, ChainError> {
            self.nonces_used.lock().unwrap().push(tx.nonce);
            if self.fail_names.iter().any(|n| tx.data.contains(n)) {
                return Err(ChainError::Reverted("boom".into()));
            }
            Ok(format!("0xtx{}", tx.nonce))
        }
        async fn poll_receipt(
            &self,
            _network: &str,
            tx_hash: &str,
            _timeout: Duration,
        ) -> Result<DeploymentReceipt, ChainError> {
            Ok(DeploymentReceipt {
                contract_address: format!("0xaddr{tx_hash}"),
                tx_hash: tx_hash.to_string(),
                block_number: 1,
                gas_used: 21000,
            })
        }
    }

    fn contract(name: &str, deps: &[&str]) -> DeployableContract {
        DeployableContract {
            contract_name: name.into(),
            bytecode: format!("0x00{name}"),
            abi: serde_json::json!([]),
            source_code: None,
            dependencies: deps.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn deploys_independent_contracts_concurrently_with_distinct_nonces() {
        let chain = Arc::new(RecordingChain {
            nonces_used: Mutex::new(Vec::new()),
            fail_names: vec![],
        });
        let registry = Arc::new(ctforge_registry::NetworkFeatureRegistry::new());
        let scheduler = ParallelDeploymentScheduler::new(chain.clone(), registry);
        let contracts = vec![contract("A", &[]), contract("B", &[]), contract("C", &[])];
        let output = scheduler
            .deploy_batch(contracts, "hyperion_mainnet", "0xdeployer", "0xkey", 10)
            .await;
        assert_eq!(output.success_count, 3);
        assert_eq!(output.batches_deployed, 1);
        let nonces = chain.nonces_used.lock().unwrap();
        let unique: std::collections::HashSet<_> = nonces.iter().collect();
        assert_eq!(unique.len(), 3);
    }

    #[tokio::test]
    async fn layer_failure_aborts_later_layers() {
        let chain = Arc::new(RecordingChain {
            nonces_used: Mutex::new(Vec::new()),
            fail_names: vec!["Token".to_string()],
        });
        let registry = Arc::new(ctforge_registry::NetworkFeatureRegistry::new());
        let scheduler = ParallelDeploymentScheduler::new(chain, registry);
        let contracts = vec![contract("Token", &[]), contract("Vault", &["Token"])];
        let output = scheduler
            .deploy_batch(contracts, "hyperion_mainnet", "0xdeployer", "0xkey", 10)
            .await;
        assert_eq!(output.failed_count, 1);
        let vault = output
            .deployments
            .iter()
            .find(|d| d.contract_name == "Vault")
            .unwrap();
        assert_eq!(vault.status, DeployStatus::Skipped);
    }

    #[tokio::test]
    async fn cyclic_dependencies_fall_back_to_sequential_input_order() {
        let chain = Arc::new(RecordingChain {
            nonces_used: Mutex::new(Vec::new()),
            fail_names: vec![],
        });
        let registry = Arc::new(ctforge_registry::NetworkFeatureRegistry::new());
        let scheduler = ParallelDeploymentScheduler::new(chain, registry);
        let contracts = vec![contract("A", &["B"]), contract("B", &["A"])];
        let output = scheduler
            .deploy_batch(contracts, "hyperion_mainnet", "0xdeployer", "0xkey", 10)
            .await;
        assert_eq!(output.batches_deployed, 2);
        assert_eq!(output.success_count, 2);
    }

    #[tokio::test]
    async fn network_without_pef_support_rejects_the_whole_batch() {
        let chain = Arc::new(RecordingChain {
            nonces_used: Mutex::new(Vec::new()),
            fail_names: vec![],
        });
        let registry = Arc::new(ctforge_registry::NetworkFeatureRegistry::new());
        let scheduler = ParallelDeploymentScheduler::new(chain, registry);
        let contracts = vec![contract("A", &[]), contract("B", &[])];
        let output = scheduler
            .deploy_batch(contracts, "mantle_testnet", "0xdeployer", "0xkey", 10)
            .await;
        assert_eq!(output.success_count, 0);
        assert_eq!(output.failed_count, 2);
        assert_eq!(output.batches_deployed, 0);
        assert!(output.deployments.iter().all(|d| d.status == DeployStatus::Failed));
    }
}
