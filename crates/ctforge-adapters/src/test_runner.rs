//! Test Runner Subprocess Adapter
//!
//! Executes a test suite against the compiled contract, isolated per call
//! the same way the audit tool subprocesses are (own working directory,
//! explicit argument array, absolute binary path).

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use ctforge_stages::{TestRunner, TestRunnerError, TestingOutput};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::instrument;

#[derive(serde::Deserialize)]
struct RawTestResult {
    passed: u32,
    failed: u32,
    #[serde(default)]
    skipped: u32,
    #[serde(default)]
    coverage_percent: f32,
}

pub struct ProcessTestRunner {
    binary: PathBuf,
}

impl ProcessTestRunner {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self { binary: binary.into() }
    }
}

#[async_trait]
impl TestRunner for ProcessTestRunner {
    #[instrument(skip(self, bytecode, abi), fields(contract_name))]
    async fn run(
        &self,
        contract_name: &str,
        bytecode: &str,
        abi: &serde_json::Value,
    ) -> Result<TestingOutput, TestRunnerError> {
        let workdir = tempfile::tempdir()
            .map_err(|e| TestRunnerError::Crashed(format!("failed to create isolated workdir: {e}")))?;

        let mut child = Command::new(&self.binary)
            .args(["--contract", contract_name, "--format", "json"])
            .current_dir(workdir.path())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| TestRunnerError::Crashed(format!("failed to spawn test runner: {e}")))?;

        let payload = serde_json::json!({ "bytecode": bytecode, "abi": abi }).to_string();
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(payload.as_bytes())
                .await
                .map_err(|e| TestRunnerError::Crashed(format!("failed writing test runner stdin: {e}")))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| TestRunnerError::Crashed(format!("test runner process error: {e}")))?;

        if !output.status.success() {
            return Err(TestRunnerError::Crashed(format!(
                "test runner exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        let raw: RawTestResult = serde_json::from_slice(&output.stdout)
            .map_err(|e| TestRunnerError::Crashed(format!("unparseable test runner output: {e}")))?;

        Ok(TestingOutput {
            passed: raw.passed,
            failed: raw.failed,
            skipped: raw.skipped,
            coverage_percent: raw.coverage_percent,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_binary_reports_crashed_not_panic() {
        let runner = ProcessTestRunner::new("/nonexistent/bin/test-runner");
        let result = runner.run("Foo", "0x00", &serde_json::json!([])).await;
        assert!(matches!(result, Err(TestRunnerError::Crashed(_))));
    }
}
