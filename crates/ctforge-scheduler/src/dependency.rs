//! Dependency Analysis
//!
//! Builds a DAG over a batch of contracts from explicit `dependencies` plus
//! names textually referenced via `import` statements in `source_code`, per
//! SPEC_FULL.md §4.6 step 1.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployableContract {
    pub contract_name: String,
    pub bytecode: String,
    pub abi: serde_json::Value,
    pub source_code: Option<String>,
    pub dependencies: Vec<String>,
}

/// Merge explicit dependencies with names found via `import "X.sol"` or a
/// bare reference to another batch member's contract name in the source.
/// Only dependencies on contracts present in this same batch are kept;
/// external/unknown imports are ignored (nothing to order them against).
pub fn resolve_dependencies(contracts: &[DeployableContract]) -> HashMap<String, HashSet<String>> {
    let import_re = Regex::new(r#"import\s+(?:\{[^}]*\}\s+from\s+)?"([^"]+)""#).expect("valid regex");
    let known: HashSet<&str> = contracts.iter().map(|c| c.contract_name.as_str()).collect();

    let mut graph = HashMap::new();
    for contract in contracts {
        let mut deps: HashSet<String> = contract.dependencies.iter().cloned().collect();

        if let Some(source) = &contract.source_code {
            for caps in import_re.captures_iter(source) {
                if let Some(path) = caps.get(1) {
                    let stem = path
                        .as_str()
                        .rsplit('/')
                        .next()
                        .unwrap_or(path.as_str())
                        .trim_end_matches(".sol");
                    if known.contains(stem) && stem != contract.contract_name {
                        deps.insert(stem.to_string());
                    }
                }
            }
            for name in &known {
                if *name != contract.contract_name
                    && source.contains(&format!("new {}", name))
                {
                    deps.insert(name.to_string());
                }
            }
        }

        deps.remove(&contract.contract_name);
        graph.insert(contract.contract_name.clone(), deps);
    }
    graph
}

/// Partition `graph` into topological layers (Kahn's algorithm): layer 0 is
/// every node with no unmet dependencies, layer k+1 is every node whose
/// dependencies all lie in layers `0..=k`. Returns `None` if a cycle is
/// detected, in which case the caller falls back to sequential deployment.
pub fn topological_layers(graph: &HashMap<String, HashSet<String>>) -> Option<Vec<Vec<String>>> {
    let mut remaining: HashMap<String, HashSet<String>> = graph.clone();
    let mut layers = Vec::new();
    let mut placed: HashSet<String> = HashSet::new();

    while !remaining.is_empty() {
        let mut layer: Vec<String> = remaining
            .iter()
            .filter(|(_, deps)| deps.iter().all(|d| placed.contains(d)))
            .map(|(name, _)| name.clone())
            .collect();

        if layer.is_empty() {
            return None;
        }
        layer.sort();

        for name in &layer {
            remaining.remove(name);
            placed.insert(name.clone());
        }
        layers.push(layer);
    }
    Some(layers)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contract(name: &str, deps: &[&str]) -> DeployableContract {
        DeployableContract {
            contract_name: name.into(),
            bytecode: "0x00".into(),
            abi: serde_json::json!([]),
            source_code: None,
            dependencies: deps.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn explicit_dependencies_form_layers() {
        let contracts = vec![
            contract("Token", &[]),
            contract("Vault", &["Token"]),
            contract("Router", &["Vault", "Token"]),
        ];
        let graph = resolve_dependencies(&contracts);
        let layers = topological_layers(&graph).unwrap();
        assert_eq!(layers, vec![vec!["Token"], vec!["Vault"], vec!["Router"]]);
    }

    #[test]
    fn import_statements_are_parsed_as_dependencies() {
        let contracts = vec![
            contract("Token", &[]),
            DeployableContract {
                contract_name: "Vault".into(),
                bytecode: "0x00".into(),
                abi: serde_json::json!([]),
                source_code: Some(r#"import "./Token.sol"; contract Vault {}"#.into()),
                dependencies: vec![],
            },
        ];
        let graph = resolve_dependencies(&contracts);
        assert!(graph["Vault"].contains("Token"));
    }

    #[test]
    fn cycle_is_detected() {
        let contracts = vec![contract("A", &["B"]), contract("B", &["A"])];
        let graph = resolve_dependencies(&contracts);
        assert!(topological_layers(&graph).is_none());
    }

    #[test]
    fn independent_contracts_share_a_layer() {
        let contracts = vec![contract("A", &[]), contract("B", &[]), contract("C", &[])];
        let graph = resolve_dependencies(&contracts);
        let layers = topological_layers(&graph).unwrap();
        assert_eq!(layers.len(), 1);
        assert_eq!(layers[0].len(), 3);
    }
}
