//! Network Feature Entry
//!
//! Immutable after registration. Feature support per network is a dense
//! bit-set, not a polymorphic hierarchy, per the Design Notes' "network
//! registry as a table" guidance.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub type NetworkId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Pef,
    MetisVm,
    EigenDa,
    BatchDeployment,
    FloatingPoint,
    AiInference,
}

impl Feature {
    pub const ALL: [Feature; 6] = [
        Feature::Pef,
        Feature::MetisVm,
        Feature::EigenDa,
        Feature::BatchDeployment,
        Feature::FloatingPoint,
        Feature::AiInference,
    ];
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkFeatureEntry {
    pub network_id: NetworkId,
    pub chain_id: u64,
    pub rpc_endpoint: String,
    pub explorer: String,
    pub features: HashMap<Feature, bool>,
    pub fallbacks: HashMap<Feature, String>,
}

impl NetworkFeatureEntry {
    pub fn supports(&self, feature: Feature) -> bool {
        self.features.get(&feature).copied().unwrap_or(false)
    }

    pub fn fallback(&self, feature: Feature) -> Option<&str> {
        self.fallbacks.get(&feature).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_feature_has_no_fallback_by_default() {
        let entry = NetworkFeatureEntry {
            network_id: "mantle_testnet".into(),
            chain_id: 5003,
            rpc_endpoint: "https://rpc.example".into(),
            explorer: "https://explorer.example".into(),
            features: HashMap::new(),
            fallbacks: HashMap::new(),
        };
        assert!(!entry.supports(Feature::Pef));
        assert_eq!(entry.fallback(Feature::Pef), None);
    }
}
