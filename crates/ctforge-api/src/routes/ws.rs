//! `/ws/workflow/{id}` Route
//!
//! Streams every event for one workflow as JSON text frames, closing once
//! the workflow reaches a terminal status. Lagging clients (the broadcast
//! channel dropped frames behind them) are told to reconnect rather than
//! silently resynced, since there's no replay log to catch them up from.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::state::AppState;

pub async fn workflow_events(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(workflow_id): Path<Uuid>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| stream_workflow(socket, state, workflow_id))
}

async fn stream_workflow(mut socket: WebSocket, state: AppState, workflow_id: Uuid) {
    let mut receiver = state.ws_hub.subscribe();

    if let Ok(workflow) = state.coordinator.status(workflow_id) {
        if socket
            .send(Message::Text(serde_json::to_string(&workflow).unwrap_or_default()))
            .await
            .is_err()
        {
            return;
        }
        if workflow.status.is_terminal() {
            let _ = socket.close().await;
            return;
        }
    }

    loop {
        tokio::select! {
            frame = receiver.recv() => {
                match frame {
                    Ok(event) if event.workflow_id == workflow_id => {
                        let payload = serde_json::to_string(&event).unwrap_or_default();
                        if socket.send(Message::Text(payload)).await.is_err() {
                            break;
                        }
                        if event_closes_stream(&state, workflow_id) {
                            break;
                        }
                    }
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(%workflow_id, skipped, "client lagged behind event stream");
                        let _ = socket
                            .send(Message::Text(
                                serde_json::json!({"error": "lagged", "skipped": skipped}).to_string(),
                            ))
                            .await;
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            incoming = socket.recv() => {
                if incoming.is_none() {
                    break;
                }
            }
        }
    }

    let _ = socket.close().await;
}

fn event_closes_stream(state: &AppState, workflow_id: Uuid) -> bool {
    state
        .coordinator
        .status(workflow_id)
        .map(|w| w.status.is_terminal())
        .unwrap_or(true)
}
