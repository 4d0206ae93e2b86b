//! Network Feature Registry
//!
//! A read-only table populated at startup from a built-in catalog, with
//! `register` allowed at runtime for custom networks. Flat data, no
//! polymorphism: feature support is a dense map per network, per the Design
//! Notes' "network registry as a table" guidance.

use ctforge_types::{Feature, NetworkFeatureEntry, NetworkId};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::RwLock;

/// The four wire-stable network identifiers from SPEC_FULL.md §6.
pub const HYPERION_TESTNET: &str = "hyperion_testnet";
pub const HYPERION_MAINNET: &str = "hyperion_mainnet";
pub const MANTLE_TESTNET: &str = "mantle_testnet";
pub const MANTLE_MAINNET: &str = "mantle_mainnet";

fn hyperion_entry(network_id: &str, chain_id: u64) -> NetworkFeatureEntry {
    let mut features = HashMap::new();
    for feature in Feature::ALL {
        features.insert(feature, true);
    }
    NetworkFeatureEntry {
        network_id: network_id.to_string(),
        chain_id,
        rpc_endpoint: format!("https://rpc.{network_id}.metisdevops.link"),
        explorer: format!("https://{network_id}.explorer.metisdevops.link"),
        features,
        fallbacks: HashMap::new(),
    }
}

fn mantle_entry(network_id: &str, chain_id: u64) -> NetworkFeatureEntry {
    let mut features = HashMap::new();
    let mut fallbacks = HashMap::new();
    for feature in Feature::ALL {
        features.insert(feature, false);
    }
    fallbacks.insert(
        Feature::MetisVm,
        "MetisVM is only available on Hyperion networks; deploying as standard EVM bytecode."
            .to_string(),
    );
    fallbacks.insert(
        Feature::FloatingPoint,
        "Floating-point pragmas require MetisVM; omitted on this network.".to_string(),
    );
    fallbacks.insert(
        Feature::AiInference,
        "On-chain AI inference pragmas require MetisVM; omitted on this network.".to_string(),
    );
    fallbacks.insert(
        Feature::EigenDa,
        "EigenDA is not wired up for this network; deployment metadata will not be archived."
            .to_string(),
    );
    fallbacks.insert(
        Feature::Pef,
        "No parallel execution framework on this network; deploying sequentially.".to_string(),
    );
    fallbacks.insert(
        Feature::BatchDeployment,
        "Batch deployment is not supported; deploying contracts sequentially in input order."
            .to_string(),
    );
    NetworkFeatureEntry {
        network_id: network_id.to_string(),
        chain_id,
        rpc_endpoint: format!("https://rpc.{network_id}.mantle.xyz"),
        explorer: format!("https://explorer.{network_id}.mantle.xyz"),
        features,
        fallbacks,
    }
}

fn built_in_catalog() -> HashMap<NetworkId, NetworkFeatureEntry> {
    let mut catalog = HashMap::new();
    catalog.insert(
        HYPERION_TESTNET.to_string(),
        hyperion_entry(HYPERION_TESTNET, 133717),
    );
    catalog.insert(
        HYPERION_MAINNET.to_string(),
        hyperion_entry(HYPERION_MAINNET, 133718),
    );
    catalog.insert(
        MANTLE_TESTNET.to_string(),
        mantle_entry(MANTLE_TESTNET, 5003),
    );
    catalog.insert(
        MANTLE_MAINNET.to_string(),
        mantle_entry(MANTLE_MAINNET, 5000),
    );
    catalog
}

static DEFAULT_CATALOG: Lazy<HashMap<NetworkId, NetworkFeatureEntry>> =
    Lazy::new(built_in_catalog);

/// Equality check over the parts of an entry that matter for the
/// "re-registering the same config is a no-op" idempotence property; two
/// entries with the same feature map and fallback text are considered equal
/// regardless of `HashMap` iteration order.
fn entries_equivalent(a: &NetworkFeatureEntry, b: &NetworkFeatureEntry) -> bool {
    a.network_id == b.network_id
        && a.chain_id == b.chain_id
        && a.rpc_endpoint == b.rpc_endpoint
        && a.explorer == b.explorer
        && a.features == b.features
        && a.fallbacks == b.fallbacks
}

pub struct NetworkFeatureRegistry {
    entries: RwLock<HashMap<NetworkId, NetworkFeatureEntry>>,
}

impl Default for NetworkFeatureRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkFeatureRegistry {
    /// Populate from the built-in catalog.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(DEFAULT_CATALOG.clone()),
        }
    }

    /// Total function: unknown networks return all-false. Never panics.
    pub fn features(&self, network: &str) -> HashMap<Feature, bool> {
        let entries = self.entries.read().expect("registry lock poisoned");
        match entries.get(network) {
            Some(entry) => entry.features.clone(),
            None => Feature::ALL.into_iter().map(|f| (f, false)).collect(),
        }
    }

    pub fn supports(&self, network: &str, feature: Feature) -> bool {
        let entries = self.entries.read().expect("registry lock poisoned");
        entries
            .get(network)
            .map(|entry| entry.supports(feature))
            .unwrap_or(false)
    }

    /// Human-readable fallback description. Total: unknown (network, feature)
    /// pairs return a generic message rather than panicking (§8's "Fallback
    /// totality" invariant).
    pub fn fallback(&self, network: &str, feature: Feature) -> String {
        let entries = self.entries.read().expect("registry lock poisoned");
        match entries.get(network) {
            Some(entry) => entry
                .fallback(feature)
                .map(str::to_string)
                .unwrap_or_else(|| format!("{feature:?} has no declared fallback on {network}")),
            None => format!("network {network} is not registered; all features disabled"),
        }
    }

    /// Add or replace a network's feature entry. Idempotent: registering an
    /// identical entry for an already-known network is a no-op.
    pub fn register(&self, entry: NetworkFeatureEntry) {
        let mut entries = self.entries.write().expect("registry lock poisoned");
        if let Some(existing) = entries.get(&entry.network_id) {
            if entries_equivalent(existing, &entry) {
                return;
            }
        }
        entries.insert(entry.network_id.clone(), entry);
    }

    pub fn all(&self) -> Vec<NetworkFeatureEntry> {
        self.entries
            .read()
            .expect("registry lock poisoned")
            .values()
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hyperion_supports_pef_and_mantle_does_not() {
        let registry = NetworkFeatureRegistry::new();
        assert!(registry.supports(HYPERION_TESTNET, Feature::Pef));
        assert!(!registry.supports(MANTLE_TESTNET, Feature::Pef));
        assert!(!registry.supports("unknown_net", Feature::Pef));
    }

    #[test]
    fn unknown_network_and_feature_never_panic() {
        let registry = NetworkFeatureRegistry::new();
        let features = registry.features("unknown_net");
        assert!(features.values().all(|supported| !supported));
        let message = registry.fallback("unknown_net", Feature::MetisVm);
        assert!(!message.is_empty());
    }

    #[test]
    fn registering_same_config_twice_is_a_no_op() {
        let registry = NetworkFeatureRegistry::new();
        let custom = NetworkFeatureEntry {
            network_id: "custom_chain".into(),
            chain_id: 99,
            rpc_endpoint: "https://rpc.custom".into(),
            explorer: "https://explorer.custom".into(),
            features: HashMap::new(),
            fallbacks: HashMap::new(),
        };
        registry.register(custom.clone());
        registry.register(custom.clone());
        assert_eq!(
            registry
                .all()
                .into_iter()
                .filter(|e| e.network_id == "custom_chain")
                .count(),
            1
        );
    }

    #[test]
    fn conflicting_registration_replaces_previous() {
        let registry = NetworkFeatureRegistry::new();
        let mut features = HashMap::new();
        features.insert(Feature::Pef, false);
        registry.register(NetworkFeatureEntry {
            network_id: "custom_chain".into(),
            chain_id: 1,
            rpc_endpoint: "https://a".into(),
            explorer: "https://a".into(),
            features: features.clone(),
            fallbacks: HashMap::new(),
        });
        features.insert(Feature::Pef, true);
        registry.register(NetworkFeatureEntry {
            network_id: "custom_chain".into(),
            chain_id: 1,
            rpc_endpoint: "https://a".into(),
            explorer: "https://a".into(),
            features,
            fallbacks: HashMap::new(),
        });
        assert!(registry.supports("custom_chain", Feature::Pef));
    }
}
