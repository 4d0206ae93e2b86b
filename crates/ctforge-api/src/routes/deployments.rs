//! `/deployments/*` Routes

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use ctforge_scheduler::{DeployableContract, SchedulerOutput, DEFAULT_MAX_PARALLEL};
use serde::Deserialize;

use crate::state::AppState;

fn default_use_pef() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct BatchDeployRequest {
    pub network: String,
    pub deployer_address: String,
    pub private_key: String,
    pub contracts: Vec<DeployableContract>,
    #[serde(default)]
    pub max_parallel: Option<usize>,
    /// Caller's request to run the batch in PEF-parallel layers. `false`
    /// forces strictly sequential deployment (`max_parallel = 1`)
    /// regardless of `max_parallel`, independent of whether the network
    /// actually supports PEF (checked separately by the scheduler itself).
    #[serde(default = "default_use_pef")]
    pub use_pef: bool,
}

pub async fn batch_deploy(
    State(state): State<AppState>,
    Json(request): Json<BatchDeployRequest>,
) -> Result<Json<SchedulerOutput>, (StatusCode, Json<serde_json::Value>)> {
    if request.contracts.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "contracts must not be empty"})),
        ));
    }

    let max_parallel = if request.use_pef {
        request.max_parallel.unwrap_or(DEFAULT_MAX_PARALLEL)
    } else {
        1
    };
    let output = state
        .scheduler
        .deploy_batch(
            request.contracts,
            &request.network,
            &request.deployer_address,
            &request.private_key,
            max_parallel,
        )
        .await;

    Ok(Json(output))
}
