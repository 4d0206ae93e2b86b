//! JSON-RPC Chain Client
//!
//! Thin `reqwest`-backed JSON-RPC wrapper implementing `ChainClient` against
//! each network's RPC endpoint (looked up from the Network Feature
//! Registry). Per SPEC_FULL.md §1, the raw RPC transport is an out-of-scope
//! collaborator; this adapter is deliberately thin, translating the four
//! `ChainClient` operations into standard `eth_*` JSON-RPC calls and
//! classifying the result per §4.4.5's failure taxonomy.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ctforge_registry::NetworkFeatureRegistry;
use ctforge_stages::{ChainClient, ChainError, DeploymentReceipt, DeploymentTransaction};
use serde_json::Value;
use tracing::instrument;

pub struct JsonRpcChainClient {
    http: reqwest::Client,
    registry: Arc<NetworkFeatureRegistry>,
}

impl JsonRpcChainClient {
    pub fn new(registry: Arc<NetworkFeatureRegistry>) -> Self {
        Self {
            http: reqwest::Client::new(),
            registry,
        }
    }

    fn endpoint(&self, network: &str) -> Result<String, ChainError> {
        self.registry
            .all()
            .into_iter()
            .find(|entry| entry.network_id == network)
            .map(|entry| entry.rpc_endpoint)
            .ok_or_else(|| ChainError::GasEstimation(format!("unknown network: {network}")))
    }

    async fn call(&self, network: &str, method: &str, params: Value) -> Result<Value, ChainError> {
        let endpoint = self.endpoint(network)?;
        let request = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response = self
            .http
            .post(&endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| classify_transport(&e))?;

        if response.status().is_server_error() || response.status().as_u16() == 429 {
            return Err(ChainError::Transient(format!(
                "RPC {method} returned {}",
                response.status()
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ChainError::Transient(format!("unparseable RPC response: {e}")))?;

        if let Some(error) = body.get("error") {
            let message = error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("RPC error")
                .to_string();
            return Err(classify_rpc_error(&message));
        }

        body.get("result")
            .cloned()
            .ok_or_else(|| ChainError::Transient(format!("RPC {method} response missing result")))
    }
}

fn classify_transport(err: &reqwest::Error) -> ChainError {
    if err.is_timeout() || err.is_connect() {
        ChainError::Transient(err.to_string())
    } else {
        ChainError::Transient(err.to_string())
    }
}

fn classify_rpc_error(message: &str) -> ChainError {
    let lower = message.to_lowercase();
    if lower.contains("revert") {
        ChainError::Reverted(message.to_string())
    } else if lower.contains("insufficient funds") || lower.contains("insufficient balance") {
        ChainError::InsufficientBalance(message.to_string())
    } else if lower.contains("rate limit") || lower.contains("timeout") {
        ChainError::Transient(message.to_string())
    } else {
        ChainError::GasEstimation(message.to_string())
    }
}

fn hex_to_u64(value: &Value) -> Result<u64, ChainError> {
    value
        .as_str()
        .and_then(|s| u64::from_str_radix(s.trim_start_matches("0x"), 16).ok())
        .ok_or_else(|| ChainError::Transient("expected hex quantity in RPC response".into()))
}

#[async_trait]
impl ChainClient for JsonRpcChainClient {
    #[instrument(skip(self))]
    async fn next_nonce(&self, network: &str, deployer: &str) -> Result<u64, ChainError> {
        let result = self
            .call(network, "eth_getTransactionCount", serde_json::json!([deployer, "pending"]))
            .await?;
        hex_to_u64(&result)
    }

    #[instrument(skip(self, data))]
    async fn estimate_gas(&self, network: &str, data: &str) -> Result<u64, ChainError> {
        let result = self
            .call(
                network,
                "eth_estimateGas",
                serde_json::json!([{ "data": data }]),
            )
            .await
            .map_err(|err| match err {
                ChainError::Transient(msg) => ChainError::GasEstimation(msg),
                other => other,
            })?;
        hex_to_u64(&result)
    }

    #[instrument(skip(self, tx, _private_key))]
    async fn submit(
        &self,
        network: &str,
        tx: DeploymentTransaction,
        _private_key: &str,
    ) -> Result<String, ChainError> {
        // Signing happens upstream of this transport-only adapter (§1: raw
        // RPC clients are an out-of-scope collaborator); this call assumes
        // the target node accepts an already-authorized deployer account.
        let result = self
            .call(
                network,
                "eth_sendTransaction",
                serde_json::json!([{
                    "data": tx.data,
                    "nonce": format!("0x{:x}", tx.nonce),
                    "gas": format!("0x{:x}", tx.gas),
                }]),
            )
            .await?;
        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ChainError::Transient("eth_sendTransaction did not return a tx hash".into()))
    }

    #[instrument(skip(self))]
    async fn poll_receipt(
        &self,
        network: &str,
        tx_hash: &str,
        timeout: Duration,
    ) -> Result<DeploymentReceipt, ChainError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let result = self
                .call(network, "eth_getTransactionReceipt", serde_json::json!([tx_hash]))
                .await?;

            if !result.is_null() {
                let contract_address = result
                    .get("contractAddress")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                let block_number = result
                    .get("blockNumber")
                    .map(hex_to_u64)
                    .transpose()?
                    .unwrap_or_default();
                let gas_used = result
                    .get("gasUsed")
                    .map(hex_to_u64)
                    .transpose()?
                    .unwrap_or_default();
                return Ok(DeploymentReceipt {
                    contract_address,
                    tx_hash: tx_hash.to_string(),
                    block_number,
                    gas_used,
                });
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(ChainError::ReceiptTimeout);
            }
            tokio::time::sleep(Duration::from_secs(2)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_quantities_parse() {
        assert_eq!(hex_to_u64(&serde_json::json!("0x2a")).unwrap(), 42);
    }

    #[test]
    fn revert_messages_classify_as_fatal() {
        assert!(matches!(classify_rpc_error("execution reverted: boom"), ChainError::Reverted(_)));
        assert!(matches!(
            classify_rpc_error("insufficient funds for gas"),
            ChainError::InsufficientBalance(_)
        ));
        assert!(matches!(classify_rpc_error("rate limit exceeded"), ChainError::Transient(_)));
    }

    #[tokio::test]
    async fn unknown_network_fails_without_a_request() {
        let client = JsonRpcChainClient::new(Arc::new(NetworkFeatureRegistry::new()));
        let result = client.next_nonce("unknown_net", "0xdeployer").await;
        assert!(result.is_err());
    }
}
