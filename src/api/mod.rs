pub mod chat;
pub mod conversations;
pub mod health;
pub mod messages;
pub mod search;

use axum::response::{IntoResponse, Response};
use serde_json::Value;

use crate::error::{ChatError, ErrorCategory};

/// Parse a request body as a JSON object. An empty body reads as `{}`.
pub(crate) fn parse_json_object(body: &[u8]) -> Result<Value, ChatError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(serde_json::Map::new()));
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(value @ Value::Object(_)) => Ok(value),
        Ok(_) => Err(ChatError::InvalidRequest("Request body must be a JSON object".to_string())),
        Err(err) => Err(ChatError::InvalidRequest(format!("Invalid JSON body: {err}"))),
    }
}

/// A non-blank string field, or `None`.
pub(crate) fn string_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

/// Render a handler result, logging server-side failures.
pub(crate) fn into_response(route: &'static str, result: Result<Response, ChatError>) -> Response {
    match result {
        Ok(response) => response,
        Err(err) => {
            match err.category() {
                ErrorCategory::ServerError => tracing::error!(route, error = %err, "request failed"),
                ErrorCategory::Configuration => tracing::warn!(route, error = %err, "request rejected"),
                _ => tracing::debug!(route, error = %err, "request rejected"),
            }
            err.into_response()
        }
    }
}
