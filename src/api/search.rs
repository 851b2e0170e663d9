//! `POST /api/search`.

use std::sync::Arc;

use axum::response::{IntoResponse, Json, Response};
use bytes::Bytes;
use serde_json::json;

use crate::error::ChatError;
use crate::state::AppState;

use super::{into_response, parse_json_object, string_field};

pub async fn handler(state: Arc<AppState>, headers: &http::HeaderMap, body: Bytes) -> Response {
    into_response("search", run(&state, headers, &body).await)
}

async fn run(state: &AppState, headers: &http::HeaderMap, body: &[u8]) -> Result<Response, ChatError> {
    state.authenticate(headers)?;
    let request = parse_json_object(body)?;
    let query = string_field(&request, "query")
        .ok_or_else(|| ChatError::InvalidRequest("Query is required".to_string()))?;

    match state.search.search(&state.provider, query).await {
        Ok(found) => Ok(Json(found).into_response()),
        Err(err) => {
            tracing::error!(error = %err, "search failed");
            Ok(search_failed())
        }
    }
}

fn search_failed() -> Response {
    (
        http::StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": "Search failed",
            "results": [],
            "images": [],
            "summary": "Sorry, I encountered an error while searching. Please try again.",
        })),
    )
        .into_response()
}
