//! Shared Application State
//!
//! Everything a route handler needs: the Coordinator (workflow
//! create/status/cancel/contracts/deployments), the Network Feature
//! Registry, the Parallel Deployment Scheduler for the batch endpoint, and
//! the event hub feeding `/ws/workflow/{id}`.

use std::sync::Arc;

use ctforge_orchestrator::WorkflowCoordinator;
use ctforge_registry::NetworkFeatureRegistry;
use ctforge_scheduler::ParallelDeploymentScheduler;

use crate::events::WsHub;

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<WorkflowCoordinator>,
    pub feature_registry: Arc<NetworkFeatureRegistry>,
    pub scheduler: Arc<ParallelDeploymentScheduler>,
    pub ws_hub: Arc<WsHub>,
}
