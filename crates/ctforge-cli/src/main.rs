//! Local Smoke-Testing CLI
//!
//! Builds the same engine `ctforge-api` serves, in-process, and drives it
//! directly through `WorkflowCoordinator`/`ParallelDeploymentScheduler` —
//! no HTTP round-trip. Grounded in the teacher's `agentic_server` bin: a
//! small `clap` surface wired straight to the library it's testing.
//!
//! Each invocation is its own process with its own in-memory coordinator, so
//! `status`/`contracts` only see workflows created earlier in the *same*
//! invocation. `generate` accounts for this by polling to a terminal state
//! before the process exits rather than returning a bare workflow id.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use ctforge_adapters::{
    HttpEigenDaClient, JsonRpcChainClient, ProcessFuzzer, ProcessSolcClient, ProcessStaticAnalyzer,
    ProcessSymbolicExecutor, ProcessTestRunner,
};
use ctforge_config::{Config, LlmProvider};
use ctforge_eventbus::{EventBus, InMemorySink};
use ctforge_llm::{AnthropicClient, LlmClient, OpenAiClient};
use ctforge_orchestrator::WorkflowCoordinator;
use ctforge_rag::{InMemoryTemplateStore, RagRetriever};
use ctforge_registry::NetworkFeatureRegistry;
use ctforge_scheduler::{DeployableContract, ParallelDeploymentScheduler, DEFAULT_MAX_PARALLEL};
use ctforge_stages::{AuditStage, CompilationStage, DeploymentStage, GenerationStage, ServiceRegistry, TestingStage};
use ctforge_types::{FeatureToggles, WorkflowStatus};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "ctforge")]
#[command(author = "ctforge")]
#[command(version = "0.1.0")]
#[command(about = "Local smoke-testing CLI over the contract-forge Workflow Coordinator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, short = 'o', global = true, default_value = "pretty", value_enum)]
    format: OutputFormat,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Pretty,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a contract from a natural-language description and poll to completion.
    Generate {
        /// Natural-language contract description.
        description: String,

        /// Target network id (e.g. hyperion_testnet, mantle_testnet).
        #[arg(long, default_value = "hyperion_testnet")]
        network: String,

        #[arg(long)]
        metisvm: bool,
        #[arg(long)]
        floating_point: bool,
        #[arg(long)]
        ai_inference: bool,
        #[arg(long)]
        eigenda: bool,
        #[arg(long)]
        pef_batch: bool,
        #[arg(long)]
        strict_test: bool,

        #[arg(long)]
        deployer_address: Option<String>,
        #[arg(long)]
        private_key: Option<String>,

        /// Maximum seconds to poll before giving up on a terminal status.
        #[arg(long, default_value_t = 120)]
        timeout_secs: u64,
    },

    /// Look up a workflow's current status. Only finds workflows created
    /// earlier in this same process invocation.
    Status {
        workflow_id: Uuid,
    },

    /// Deploy a batch of already-compiled contracts described by a JSON file.
    BatchDeploy {
        /// Path to a JSON array of `DeployableContract` objects.
        #[arg(long)]
        file: PathBuf,

        #[arg(long, default_value = "hyperion_testnet")]
        network: String,
        #[arg(long)]
        deployer_address: String,
        #[arg(long)]
        private_key: String,
        #[arg(long, default_value_t = DEFAULT_MAX_PARALLEL)]
        max_parallel: usize,
        /// Run the batch in PEF-parallel layers instead of strictly
        /// sequential deployment (which ignores `--max-parallel`).
        #[arg(long)]
        use_pef: bool,
    },
}

struct Engine {
    coordinator: Arc<WorkflowCoordinator>,
    scheduler: Arc<ParallelDeploymentScheduler>,
}

fn build_engine(config: &Config) -> Engine {
    let event_bus = Arc::new(EventBus::new(Arc::new(InMemorySink::new())));
    let feature_registry = Arc::new(NetworkFeatureRegistry::new());

    let llm: Arc<dyn LlmClient> = match config.llm_provider {
        LlmProvider::OpenAi => Arc::new(OpenAiClient::new(config.llm_api_key.clone())),
        LlmProvider::Anthropic => Arc::new(AnthropicClient::new(config.llm_api_key.clone())),
    };
    let embedding_client = Arc::new(OpenAiClient::new(config.llm_api_key.clone()));
    let template_store = Arc::new(InMemoryTemplateStore::new(Vec::new()));
    let retriever = Arc::new(RagRetriever::new(embedding_client, template_store));

    let chain_client = Arc::new(JsonRpcChainClient::new(feature_registry.clone()));
    let disperser = Arc::new(HttpEigenDaClient::new(config.tools.eigenda_disperser_url.clone()));

    let mut registry = ServiceRegistry::new();
    registry.register(Arc::new(GenerationStage::new(llm, retriever, feature_registry.clone())));
    registry.register(Arc::new(CompilationStage::new(Arc::new(ProcessSolcClient::new(
        config.tools.solc_binary_dir.clone(),
    )))));
    registry.register(Arc::new(AuditStage::new(
        Arc::new(ProcessStaticAnalyzer::new(config.tools.static_analyzer_bin.clone())),
        Arc::new(ProcessSymbolicExecutor::new(config.tools.symbolic_executor_bin.clone())),
        Arc::new(ProcessFuzzer::new(config.tools.fuzzer_bin.clone())),
    )));
    registry.register(Arc::new(TestingStage::new(Arc::new(ProcessTestRunner::new(
        config.tools.test_runner_bin.clone(),
    )))));
    registry.register(Arc::new(DeploymentStage::new(
        chain_client.clone(),
        disperser,
        feature_registry.clone(),
    )));

    let coordinator = Arc::new(WorkflowCoordinator::new(
        Arc::new(registry),
        event_bus,
        feature_registry.clone(),
    ));
    let scheduler = Arc::new(ParallelDeploymentScheduler::new(chain_client, feature_registry));

    Engine { coordinator, scheduler }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let rt = tokio::runtime::Runtime::new().expect("failed to start tokio runtime");

    let result = rt.block_on(async {
        let config = Config::from_env().map_err(|e| e.to_string())?;
        match cli.command {
            Commands::Generate {
                description,
                network,
                metisvm,
                floating_point,
                ai_inference,
                eigenda,
                pef_batch,
                strict_test,
                deployer_address,
                private_key,
                timeout_secs,
            } => {
                let engine = build_engine(&config);
                cmd_generate(
                    &engine,
                    description,
                    network,
                    FeatureToggles {
                        optimize_for_metisvm: metisvm,
                        enable_floating_point: floating_point,
                        enable_ai_inference: ai_inference,
                        enable_eigenda: eigenda,
                        enable_pef_batch: pef_batch,
                        strict_test,
                    },
                    deployer_address,
                    private_key,
                    Duration::from_secs(timeout_secs),
                    cli.format,
                )
                .await
            }
            Commands::Status { workflow_id } => {
                let engine = build_engine(&config);
                cmd_status(&engine, workflow_id, cli.format)
            }
            Commands::BatchDeploy {
                file,
                network,
                deployer_address,
                private_key,
                max_parallel,
                use_pef,
            } => {
                let engine = build_engine(&config);
                let max_parallel = if use_pef { max_parallel } else { 1 };
                cmd_batch_deploy(&engine, file, network, deployer_address, private_key, max_parallel, cli.format).await
            }
        }
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            if cli.format == OutputFormat::Json {
                println!("{}", serde_json::json!({"error": message}));
            } else {
                eprintln!("{}: {}", "error".red().bold(), message);
            }
            ExitCode::FAILURE
        }
    }
}

async fn cmd_generate(
    engine: &Engine,
    description: String,
    network: String,
    features: FeatureToggles,
    deployer_address: Option<String>,
    private_key: Option<String>,
    timeout: Duration,
    format: OutputFormat,
) -> Result<(), String> {
    let owner_id = Uuid::new_v4();
    let workflow_id = engine.coordinator.create(
        owner_id,
        description,
        network,
        features,
        deployer_address,
        private_key,
        None,
    );

    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let workflow = engine
            .coordinator
            .status(workflow_id)
            .map_err(|e| e.to_string())?;

        if workflow.status.is_terminal() || tokio::time::Instant::now() >= deadline {
            print_workflow(&workflow, format);
            if workflow.status == WorkflowStatus::Failed {
                return Err(workflow.error_message.unwrap_or_else(|| "workflow failed".to_string()));
            }
            return Ok(());
        }

        tokio::time::sleep(Duration::from_millis(500)).await;
    }
}

fn cmd_status(engine: &Engine, workflow_id: Uuid, format: OutputFormat) -> Result<(), String> {
    let workflow = engine.coordinator.status(workflow_id).map_err(|e| e.to_string())?;
    print_workflow(&workflow, format);
    Ok(())
}

async fn cmd_batch_deploy(
    engine: &Engine,
    file: PathBuf,
    network: String,
    deployer_address: String,
    private_key: String,
    max_parallel: usize,
    format: OutputFormat,
) -> Result<(), String> {
    let raw = std::fs::read_to_string(&file).map_err(|e| format!("reading {}: {e}", file.display()))?;
    let contracts: Vec<DeployableContract> =
        serde_json::from_str(&raw).map_err(|e| format!("parsing {}: {e}", file.display()))?;

    let output = engine
        .scheduler
        .deploy_batch(contracts, &network, &deployer_address, &private_key, max_parallel)
        .await;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&output).map_err(|e| e.to_string())?);
        }
        OutputFormat::Pretty => {
            println!(
                "{} {} deployed, {} failed, {} batches, {}ms",
                "done".green().bold(),
                output.success_count,
                output.failed_count,
                output.batches_deployed,
                output.total_time_ms
            );
            for deployment in &output.deployments {
                let marker = match deployment.status {
                    ctforge_scheduler::DeployStatus::Deployed => "ok".green(),
                    ctforge_scheduler::DeployStatus::Failed => "fail".red(),
                    ctforge_scheduler::DeployStatus::Skipped => "skip".yellow(),
                };
                println!("  [{marker}] {}", deployment.contract_name);
            }
        }
    }

    Ok(())
}

fn print_workflow(workflow: &ctforge_types::Workflow, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(workflow).unwrap_or_default());
        }
        OutputFormat::Pretty => {
            println!(
                "{} workflow {} [{}] {}%",
                "status".cyan().bold(),
                workflow.id,
                workflow.status,
                workflow.progress
            );
            for warning in &workflow.warnings {
                println!("  {} {}", "warn".yellow(), warning);
            }
        }
    }
}
