//! Generated Contract
//!
//! Produced by the Compilation stage; immutable thereafter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Solidity version the generator targets by default; used whenever a
/// pragma is absent or unparseable.
pub const DEFAULT_SOLIDITY_VERSION: &str = "0.8.27";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstructorParam {
    pub name: String,
    pub solidity_type: String,
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedContract {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub contract_name: String,
    pub source_code: String,
    pub source_code_hash: String,
    pub abi: serde_json::Value,
    pub bytecode: String,
    pub deployed_bytecode: String,
    pub solidity_version: String,
    pub constructor_params: Vec<ConstructorParam>,
    pub created_at: DateTime<Utc>,
}

impl GeneratedContract {
    pub fn source_hash(source_code: &str) -> String {
        let digest = Sha256::digest(source_code.as_bytes());
        hex::encode(digest)
    }

    /// True iff `source_code_hash` matches a fresh hash of `source_code`.
    pub fn hash_is_consistent(&self) -> bool {
        self.source_code_hash == Self::source_hash(&self.source_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_hash_round_trips() {
        let source = "pragma solidity 0.8.27; contract Foo {}";
        let hash = GeneratedContract::source_hash(source);
        let contract = GeneratedContract {
            id: Uuid::new_v4(),
            workflow_id: Uuid::new_v4(),
            contract_name: "Foo".into(),
            source_code: source.into(),
            source_code_hash: hash,
            abi: serde_json::json!([]),
            bytecode: "0x".into(),
            deployed_bytecode: "0x".into(),
            solidity_version: DEFAULT_SOLIDITY_VERSION.into(),
            constructor_params: Vec::new(),
            created_at: Utc::now(),
        };
        assert!(contract.hash_is_consistent());
    }
}
