//! `/networks/*` Routes

use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use ctforge_types::{Feature, NetworkFeatureEntry};
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct NetworkSummary {
    pub network_id: String,
    pub chain_id: u64,
    pub rpc_endpoint: String,
    pub explorer: String,
}

impl From<NetworkFeatureEntry> for NetworkSummary {
    fn from(entry: NetworkFeatureEntry) -> Self {
        Self {
            network_id: entry.network_id,
            chain_id: entry.chain_id,
            rpc_endpoint: entry.rpc_endpoint,
            explorer: entry.explorer,
        }
    }
}

pub async fn list_networks(State(state): State<AppState>) -> Json<Vec<NetworkSummary>> {
    let mut entries: Vec<NetworkSummary> = state
        .feature_registry
        .all()
        .into_iter()
        .map(NetworkSummary::from)
        .collect();
    entries.sort_by(|a, b| a.network_id.cmp(&b.network_id));
    Json(entries)
}

pub async fn network_features(
    State(state): State<AppState>,
    Path(network): Path<String>,
) -> Result<Json<HashMap<String, bool>>, (StatusCode, Json<serde_json::Value>)> {
    let known = state.feature_registry.all().iter().any(|entry| entry.network_id == network);
    if !known {
        return Err((
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": format!("unknown network: {network}")})),
        ));
    }

    let features = state.feature_registry.features(&network);
    let by_name = features
        .into_iter()
        .map(|(feature, supported)| (feature_label(feature).to_string(), supported))
        .collect();
    Ok(Json(by_name))
}

fn feature_label(feature: Feature) -> &'static str {
    match feature {
        Feature::Pef => "pef",
        Feature::MetisVm => "metisvm",
        Feature::EigenDa => "eigenda",
        Feature::BatchDeployment => "batch_deployment",
        Feature::FloatingPoint => "floating_point",
        Feature::AiInference => "ai_inference",
    }
}
