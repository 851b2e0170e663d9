//! `POST /api/messages`.

use std::sync::Arc;

use axum::response::{IntoResponse, Json, Response};
use bytes::Bytes;
use serde_json::json;

use crate::error::ChatError;
use crate::state::AppState;
use crate::store::NewMessage;

use super::{into_response, parse_json_object, string_field};

pub fn save(state: &Arc<AppState>, headers: &http::HeaderMap, body: &Bytes) -> Response {
    into_response("messages.save", save_message(state, headers, body))
}

fn save_message(state: &AppState, headers: &http::HeaderMap, body: &[u8]) -> Result<Response, ChatError> {
    let session = state.authenticate(headers)?;
    let request = parse_json_object(body)?;
    if string_field(&request, "conversationId").is_none() {
        return Err(ChatError::InvalidRequest("conversationId is required".to_string()));
    }
    let message: NewMessage = serde_json::from_value(request)
        .map_err(|err| ChatError::InvalidRequest(format!("Invalid message: {err}")))?;

    let user = state.store().upsert_user(&session);
    let saved = state.store().save_message(&user.id, message)?;
    Ok(Json(json!({ "message": saved })).into_response())
}
