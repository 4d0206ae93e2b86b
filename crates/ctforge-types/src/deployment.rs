//! Deployment Record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    Pending,
    Confirmed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub id: Uuid,
    pub contract_id: Uuid,
    pub network: String,
    /// 20-byte contract address, hex-encoded with `0x` prefix.
    pub contract_address: Option<String>,
    /// 32-byte transaction hash, hex-encoded with `0x` prefix.
    pub tx_hash: Option<String>,
    pub block_number: Option<u64>,
    pub gas_used: Option<u64>,
    pub deployer_address: String,
    pub eigenda_commitment: Option<String>,
    pub status: DeploymentStatus,
    pub submitted_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
}

impl DeploymentRecord {
    pub fn pending(contract_id: Uuid, network: String, deployer_address: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            contract_id,
            network,
            contract_address: None,
            tx_hash: None,
            block_number: None,
            gas_used: None,
            deployer_address,
            eigenda_commitment: None,
            status: DeploymentStatus::Pending,
            submitted_at: Utc::now(),
            confirmed_at: None,
        }
    }

    pub fn confirm(
        &mut self,
        contract_address: String,
        tx_hash: String,
        block_number: u64,
        gas_used: u64,
    ) {
        self.contract_address = Some(contract_address);
        self.tx_hash = Some(tx_hash);
        self.block_number = Some(block_number);
        self.gas_used = Some(gas_used);
        self.status = DeploymentStatus::Confirmed;
        self.confirmed_at = Some(Utc::now());
    }

    pub fn fail(&mut self) {
        self.status = DeploymentStatus::Failed;
        self.confirmed_at = Some(Utc::now());
    }
}
