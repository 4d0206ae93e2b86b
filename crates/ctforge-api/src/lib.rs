//! HTTP/WebSocket Collaborator
//!
//! Thin axum surface over the orchestration engine: every handler in
//! `routes/` does request mapping only, delegating all behavior to
//! `WorkflowCoordinator`, `ParallelDeploymentScheduler`, and
//! `NetworkFeatureRegistry`. Mirrors the teacher's `ob-poc-web` crate split
//! of `state.rs` + `routes/*.rs` + a `build_router` assembly function.

pub mod events;
pub mod routes;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health::health))
        .route("/health/detailed", get(routes::health::health_detailed))
        .route("/networks", get(routes::networks::list_networks))
        .route("/networks/:network/features", get(routes::networks::network_features))
        .route("/workflows/generate", post(routes::workflows::generate))
        .route("/workflows/:id", get(routes::workflows::get_workflow))
        .route("/workflows/:id/cancel", post(routes::workflows::cancel_workflow))
        .route("/workflows/:id/contracts", get(routes::workflows::list_contracts))
        .route("/workflows/:id/deployments", get(routes::workflows::list_deployments))
        .route("/deployments/batch", post(routes::deployments::batch_deploy))
        .route("/ws/workflow/:id", get(routes::ws::workflow_events))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use ctforge_eventbus::{EventBus, InMemorySink};
    use ctforge_orchestrator::WorkflowCoordinator;
    use ctforge_registry::NetworkFeatureRegistry;
    use ctforge_scheduler::ParallelDeploymentScheduler;
    use ctforge_stages::ServiceRegistry;
    use events::WsHub;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn empty_state() -> AppState {
        let event_bus = Arc::new(EventBus::new(Arc::new(InMemorySink::new())));
        let feature_registry = Arc::new(NetworkFeatureRegistry::new());
        let ws_hub = Arc::new(WsHub::new());
        ws_hub.attach(&event_bus);

        let registry = Arc::new(ServiceRegistry::new());
        let coordinator = Arc::new(WorkflowCoordinator::new(
            registry,
            event_bus,
            feature_registry.clone(),
        ));

        struct NullChain;
        #[async_trait::async_trait]
        impl ctforge_stages::ChainClient for NullChain {
            async fn next_nonce(&self, _network: &str, _deployer: &str) -> Result<u64, ctforge_stages::ChainError> {
                Ok(0)
            }

            async fn estimate_gas(&self, _network: &str, _data: &str) -> Result<u64, ctforge_stages::ChainError> {
                Ok(21_000)
            }

            async fn submit(
                &self,
                _network: &str,
                _tx: ctforge_stages::DeploymentTransaction,
                _private_key: &str,
            ) -> Result<String, ctforge_stages::ChainError> {
                Ok("0xdead".to_string())
            }

            async fn poll_receipt(
                &self,
                _network: &str,
                _tx_hash: &str,
                _timeout: std::time::Duration,
            ) -> Result<ctforge_stages::DeploymentReceipt, ctforge_stages::ChainError> {
                Err(ctforge_stages::ChainError::ReceiptTimeout)
            }
        }

        let scheduler = Arc::new(ParallelDeploymentScheduler::new(
            Arc::new(NullChain),
            feature_registry.clone(),
        ));

        AppState {
            coordinator,
            feature_registry,
            scheduler,
            ws_hub,
        }
    }

    #[tokio::test]
    async fn health_endpoint_reports_ok() {
        let router = build_router(empty_state());
        let response = router
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_workflow_returns_404() {
        let router = build_router(empty_state());
        let response = router
            .oneshot(
                Request::builder()
                    .uri(format!("/workflows/{}", uuid::Uuid::new_v4()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::NOT_FOUND);
    }
}
