//! HTTP/WebSocket Server Binary
//!
//! Wires up the Event Bus, Network Feature Registry, the five stage
//! services (backed by the subprocess/JSON-RPC adapters), the Workflow
//! Coordinator, and the Parallel Deployment Scheduler, then serves them
//! over the axum router in `lib`. Mirrors the teacher's `ob-poc-web::main`
//! startup shape: `tracing_subscriber` init, env-based config, `tokio::main`,
//! `axum::serve`.

use std::net::SocketAddr;
use std::sync::Arc;

use ctforge_adapters::{
    HttpEigenDaClient, JsonRpcChainClient, ProcessFuzzer, ProcessSolcClient, ProcessStaticAnalyzer,
    ProcessSymbolicExecutor, ProcessTestRunner,
};
use ctforge_api::events::WsHub;
use ctforge_api::{build_router, AppState};
use ctforge_config::{Config, LlmProvider};
use ctforge_eventbus::{EventBus, InMemorySink};
use ctforge_llm::{AnthropicClient, LlmClient, OpenAiClient};
use ctforge_orchestrator::WorkflowCoordinator;
use ctforge_rag::{InMemoryTemplateStore, RagRetriever};
use ctforge_registry::NetworkFeatureRegistry;
use ctforge_scheduler::ParallelDeploymentScheduler;
use ctforge_stages::{AuditStage, CompilationStage, DeploymentStage, GenerationStage, ServiceRegistry, TestingStage};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ctforge_api=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().expect("invalid configuration");
    tracing::info!(provider = ?config.llm_provider, "starting ctforge-api");

    let event_bus = Arc::new(EventBus::new(Arc::new(InMemorySink::new())));
    let feature_registry = Arc::new(NetworkFeatureRegistry::new());

    let ws_hub = Arc::new(WsHub::new());
    ws_hub.attach(&event_bus);

    let llm: Arc<dyn LlmClient> = match config.llm_provider {
        LlmProvider::OpenAi => Arc::new(OpenAiClient::new(config.llm_api_key.clone())),
        LlmProvider::Anthropic => Arc::new(AnthropicClient::new(config.llm_api_key.clone())),
    };
    // Embeddings require a provider that implements `EmbeddingClient`; only
    // the OpenAI client does today, regardless of the chat provider chosen.
    let embedding_client = Arc::new(OpenAiClient::new(config.llm_api_key.clone()));
    let template_store = Arc::new(InMemoryTemplateStore::new(Vec::new()));
    let retriever = Arc::new(RagRetriever::new(embedding_client, template_store));

    let chain_client = Arc::new(JsonRpcChainClient::new(feature_registry.clone()));
    let disperser = Arc::new(HttpEigenDaClient::new(config.tools.eigenda_disperser_url.clone()));

    let mut registry = ServiceRegistry::new();
    registry.register(Arc::new(GenerationStage::new(
        llm,
        retriever,
        feature_registry.clone(),
    )));
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
    let scheduler = Arc::new(ParallelDeploymentScheduler::new(chain_client, feature_registry.clone()));

    let state = AppState {
        coordinator,
        feature_registry,
        scheduler,
        ws_hub,
    };

    let app = build_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!(%addr, "ctforge-api listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind server address");
    axum::serve(listener, app).await.expect("server error");
}
