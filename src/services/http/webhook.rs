use axum::{body::Bytes, extract::State, http::StatusCode};

use super::AppState;
use crate::models::telegram::Update;
use crate::services::webhook::WebhookRequest;

/// Acknowledges every delivery. Processing happens on the webhook service,
/// the platform only needs to know the update arrived.
pub async fn receive_update(State(state): State<AppState>, body: Bytes) -> StatusCode {
    let update: Update = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(e) => {
            log::warn!("Discarding malformed update: {}", e);
            return StatusCode::OK;
        }
    };

    if let Err(e) = state
        .webhook_channel
        .send(WebhookRequest::Update { update })
        .await
    {
        log::error!("Webhook service is unavailable: {}", e);
    }

    StatusCode::OK
}
