use std::sync::Arc;

use axum::extract::State;
use axum::response::Json;
use serde_json::{json, Value};

use crate::state::AppState;

/// Health check handler.
/// Returns JSON with status and a config summary (never secrets).
pub fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let config = &state.config;
    Json(json!({
        "status": "chatstream is running",
        "config": {
            "model": state.provider.model(),
            "provider_configured": state.provider.is_configured(),
            "search_configured": state.search.is_configured(),
            "max_continuations": config.continuation.max_continuations,
            "sessions": config.sessions.len(),
        }
    }))
}
