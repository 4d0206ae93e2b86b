//! Solidity Compiler Adapter
//!
//! Shells out to a local `solc` binary per SPEC_FULL.md's "binary `solc` or
//! equivalent, configurable path, compiled with JSON-stdin input and
//! JSON-stdout output." One binary per installed version, named
//! `solc-<version>` under `binary_dir`, mirroring how `solc-select` lays out
//! its shims. Grounded on the teacher's `tokio::process::Command` subprocess
//! pattern (`domain_ops/agent_ops.rs`).

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use ctforge_stages::{CompileRequest, CompileResult, SolcClient, SolcError};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{instrument, warn};

pub struct ProcessSolcClient {
    binary_dir: PathBuf,
}

impl ProcessSolcClient {
    pub fn new(binary_dir: impl Into<PathBuf>) -> Self {
        Self {
            binary_dir: binary_dir.into(),
        }
    }

    fn binary_path(&self, version: &str) -> PathBuf {
        self.binary_dir.join(format!("solc-{version}"))
    }

    fn installed_versions(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(&self.binary_dir) else {
            return Vec::new();
        };
        entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter_map(|name| name.strip_prefix("solc-").map(str::to_string))
            .collect()
    }

    fn standard_json_input(source_code: &str) -> serde_json::Value {
        serde_json::json!({
            "language": "Solidity",
            "sources": {
                "Contract.sol": { "content": source_code }
            },
            "settings": {
                "outputSelection": {
                    "*": {
                        "*": ["abi", "evm.bytecode.object", "evm.deployedBytecode.object"]
                    }
                }
            }
        })
    }
}

fn parse_max_version(versions: &[String]) -> Option<(u32, u32, u32, String)> {
    versions
        .iter()
        .filter_map(|v| {
            let mut parts = v.split('.');
            let major: u32 = parts.next()?.parse().ok()?;
            let minor: u32 = parts.next()?.parse().ok()?;
            let patch: u32 = parts.next()?.parse().ok()?;
            Some((major, minor, patch, v.clone()))
        })
        .max_by_key(|(maj, min, pat, _)| (*maj, *min, *pat))
}

fn at_least_min_fallback(version: &(u32, u32, u32, String), min: &str) -> bool {
    let min_parts: Vec<u32> = min.split('.').filter_map(|p| p.parse().ok()).collect();
    if min_parts.len() != 3 {
        return true;
    }
    (version.0, version.1, version.2) >= (min_parts[0], min_parts[1], min_parts[2])
}

const MIN_FALLBACK_VERSION: &str = "0.8.20";

#[async_trait]
impl SolcClient for ProcessSolcClient {
    #[instrument(skip(self, request), fields(version = %request.solidity_version))]
    async fn compile(&self, request: CompileRequest) -> Result<CompileResult, SolcError> {
        let binary = self.binary_path(&request.solidity_version);
        if !binary.exists() {
            return Err(SolcError::NotFound(binary.display().to_string()));
        }

        let mut child = Command::new(&binary)
            .arg("--standard-json")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| SolcError::NotFound(e.to_string()))?;

        let input = Self::standard_json_input(&request.source_code).to_string();
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(input.as_bytes())
                .await
                .map_err(|e| SolcError::Syntax(format!("failed writing solc stdin: {e}")))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| SolcError::Syntax(format!("solc process error: {e}")))?;

        let stdout: serde_json::Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| SolcError::Syntax(format!("unparseable solc output: {e}")))?;

        if let Some(errors) = stdout.get("errors").and_then(|e| e.as_array()) {
            let fatal: Vec<&str> = errors
                .iter()
                .filter(|e| e.get("severity").and_then(|s| s.as_str()) == Some("error"))
                .filter_map(|e| e.get("formattedMessage").and_then(|m| m.as_str()))
                .collect();
            if !fatal.is_empty() {
                return Err(SolcError::Syntax(fatal.join("\n")));
            }
        }

        let contracts = stdout
            .get("contracts")
            .and_then(|c| c.get("Contract.sol"))
            .ok_or_else(|| SolcError::Syntax("no contracts in solc output".to_string()))?;

        let (contract_name, contract_json) = contracts
            .as_object()
            .and_then(|obj| obj.iter().next())
            .ok_or_else(|| SolcError::Syntax("no named contract in solc output".to_string()))?;

        let abi = contract_json.get("abi").cloned().unwrap_or(serde_json::json!([]));
        let bytecode = contract_json
            .pointer("/evm/bytecode/object")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let deployed_bytecode = contract_json
            .pointer("/evm/deployedBytecode/object")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        Ok(CompileResult {
            contract_name: contract_name.clone(),
            bytecode: format!("0x{bytecode}"),
            deployed_bytecode: format!("0x{deployed_bytecode}"),
            abi,
        })
    }

    fn has_version(&self, version: &str) -> bool {
        self.binary_path(version).exists()
    }

    fn newest_fallback_version(&self) -> Option<String> {
        let versions = self.installed_versions();
        let parsed = parse_max_version(&versions)?;
        if at_least_min_fallback(&parsed, MIN_FALLBACK_VERSION) {
            Some(parsed.3)
        } else {
            warn!("no installed solc version meets the minimum fallback floor");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_parsing_picks_the_newest() {
        let versions = vec!["0.8.19".to_string(), "0.8.27".to_string(), "0.8.2".to_string()];
        let parsed = parse_max_version(&versions).unwrap();
        assert_eq!(parsed.3, "0.8.27");
    }

    #[test]
    fn missing_binary_directory_yields_no_versions() {
        let client = ProcessSolcClient::new(Path::new("/nonexistent/solc/dir"));
        assert!(client.installed_versions().is_empty());
        assert!(client.newest_fallback_version().is_none());
    }
}
