//! Liveness endpoint. No identity required.

use axum::Json;
use axum::extract::State;
use serde_json::{Value, json};

use crate::state::AppState;

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "webhook_configured": state.webhook_configured(),
        "transcription_configured": state.transcription.is_configured(),
    }))
}
