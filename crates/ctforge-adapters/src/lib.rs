//! Stage-Trait Adapters
//!
//! Concrete implementations of the trait seams each stage is built behind:
//! a `solc` subprocess, isolated audit-tool subprocesses, a test-runner
//! subprocess, a JSON-RPC chain client, and an EigenDA disperser HTTP
//! client. Each lives behind a `working_dir`-per-call or HTTP-client seam so
//! tests can substitute fakes without touching the stage implementations
//! they back.

mod audit_tools;
mod chain_client;
mod eigenda;
mod solc;
mod test_runner;

pub use audit_tools::{ProcessFuzzer, ProcessStaticAnalyzer, ProcessSymbolicExecutor};
pub use chain_client::JsonRpcChainClient;
pub use eigenda::HttpEigenDaClient;
pub use solc::ProcessSolcClient;
pub use test_runner::ProcessTestRunner;
