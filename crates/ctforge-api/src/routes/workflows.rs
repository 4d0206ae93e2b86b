//! `/workflows/*` Routes
//!
//! Request/response mapping only; all business logic lives behind
//! `WorkflowCoordinator`. Shapes follow the wire schema in SPEC_FULL.md §6.

use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use ctforge_types::{DeploymentRecord, FeatureToggles, GeneratedContract, Workflow, WorkflowError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub nlp_input: String,
    pub network: String,
    #[serde(default)]
    pub optimize_for_metisvm: bool,
    #[serde(default)]
    pub enable_floating_point: bool,
    #[serde(default)]
    pub enable_ai_inference: bool,
    #[serde(default)]
    pub enable_eigenda: bool,
    #[serde(default)]
    pub enable_pef_batch: bool,
    #[serde(default)]
    pub strict_test: bool,
    /// Not part of the collaborator's auth surface (out of scope per §1);
    /// accepted here so the Deployment stage has something to sign with.
    #[serde(default)]
    pub deployer_address: Option<String>,
    #[serde(default)]
    pub private_key: Option<String>,
    #[serde(default)]
    pub gas_limit: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub workflow_id: Uuid,
    pub status: String,
    pub warnings: Vec<String>,
    pub features_used: HashMap<&'static str, bool>,
}

fn error_status(err: &WorkflowError) -> StatusCode {
    match err {
        WorkflowError::NotFound(_) | WorkflowError::UnknownNetwork(_) => StatusCode::NOT_FOUND,
        WorkflowError::Validation(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub async fn generate(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, (StatusCode, Json<serde_json::Value>)> {
    if request.nlp_input.trim().len() < 10 {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "nlp_input must be at least 10 characters"})),
        ));
    }

    let features = FeatureToggles {
        optimize_for_metisvm: request.optimize_for_metisvm,
        enable_floating_point: request.enable_floating_point,
        enable_ai_inference: request.enable_ai_inference,
        enable_eigenda: request.enable_eigenda,
        enable_pef_batch: request.enable_pef_batch,
        strict_test: request.strict_test,
    };

    let owner_id = Uuid::new_v4();
    let workflow_id = state.coordinator.create(
        owner_id,
        request.nlp_input,
        request.network.clone(),
        features,
        request.deployer_address,
        request.private_key,
        request.gas_limit,
    );

    let workflow = state
        .coordinator
        .status(workflow_id)
        .map_err(|err| (error_status(&err), Json(serde_json::json!({"error": err.to_string()}))))?;

    let mut features_used = HashMap::new();
    features_used.insert("metisvm", workflow.features.optimize_for_metisvm);
    features_used.insert("floating_point", workflow.features.enable_floating_point);
    features_used.insert("ai_inference", workflow.features.enable_ai_inference);
    features_used.insert("eigenda", workflow.features.enable_eigenda);
    features_used.insert("pef_batch", workflow.features.enable_pef_batch);

    Ok(Json(GenerateResponse {
        workflow_id,
        status: workflow.status.as_str().to_string(),
        warnings: workflow.warnings,
        features_used,
    }))
}

pub async fn get_workflow(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Workflow>, (StatusCode, Json<serde_json::Value>)> {
    state
        .coordinator
        .status(id)
        .map(Json)
        .map_err(|err| (error_status(&err), Json(serde_json::json!({"error": err.to_string()}))))
}

pub async fn cancel_workflow(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, Json<serde_json::Value>)> {
    state
        .coordinator
        .cancel(id)
        .map(|_| StatusCode::ACCEPTED)
        .map_err(|err| (error_status(&err), Json(serde_json::json!({"error": err.to_string()}))))
}

pub async fn list_contracts(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Json<Vec<GeneratedContract>> {
    Json(state.coordinator.contracts(id))
}

pub async fn list_deployments(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Json<Vec<DeploymentRecord>> {
    Json(state.coordinator.deployments(id))
}
