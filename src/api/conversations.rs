//! `/api/conversations` and `/api/conversations/{id}`.

use std::sync::Arc;

use axum::response::{IntoResponse, Json, Response};
use bytes::Bytes;
use serde_json::json;

use crate::error::ChatError;
use crate::state::AppState;
use crate::store::UserRecord;

use super::{into_response, parse_json_object, string_field};

fn current_user(state: &AppState, headers: &http::HeaderMap) -> Result<UserRecord, ChatError> {
    let session = state.authenticate(headers)?;
    Ok(state.store().upsert_user(&session))
}

pub fn list(state: &Arc<AppState>, headers: &http::HeaderMap) -> Response {
    let result = current_user(state, headers).map(|user| {
        let conversations = state.store().list_conversations(&user.id);
        Json(json!({ "conversations": conversations })).into_response()
    });
    into_response("conversations.list", result)
}

pub fn create(state: &Arc<AppState>, headers: &http::HeaderMap, body: &Bytes) -> Response {
    into_response("conversations.create", create_conversation(state, headers, body))
}

fn create_conversation(
    state: &AppState,
    headers: &http::HeaderMap,
    body: &[u8],
) -> Result<Response, ChatError> {
    let user = current_user(state, headers)?;
    let request = parse_json_object(body)?;
    let title = string_field(&request, "title").map(str::to_string);
    let conversation = state.store().create_conversation(&user.id, title);
    tracing::debug!(conversation_id = %conversation.id, "conversation created");
    Ok(Json(json!({ "conversation": conversation })).into_response())
}

pub fn get(state: &Arc<AppState>, headers: &http::HeaderMap, id: &str) -> Response {
    let result = current_user(state, headers).and_then(|user| {
        state
            .store()
            .get_conversation(&user.id, id)
            .map(|conversation| Json(json!({ "conversation": conversation })).into_response())
            .ok_or_else(|| ChatError::NotFound("Conversation not found".to_string()))
    });
    into_response("conversations.get", result)
}

pub fn delete(state: &Arc<AppState>, headers: &http::HeaderMap, id: &str) -> Response {
    let result = current_user(state, headers).map(|user| {
        if state.store().delete_conversation(&user.id, id) {
            tracing::debug!(conversation_id = %id, "conversation deleted");
        }
        Json(json!({ "success": true })).into_response()
    });
    into_response("conversations.delete", result)
}
