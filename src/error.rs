use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Crate-wide error type.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// A required credential or setting is missing. Never retried.
    #[error("{0}")]
    Config(String),
    #[error("Unauthorized: {0}")]
    Auth(String),
    #[error("{0}")]
    InvalidRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("Upstream error: status={status}, message={message}")]
    Upstream { status: u16, message: String },
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Broad error category for status code selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    InvalidRequest,
    Authentication,
    NotFound,
    ServerError,
}

impl ChatError {
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            ChatError::Config(_) => ErrorCategory::Configuration,
            ChatError::Auth(_) => ErrorCategory::Authentication,
            ChatError::InvalidRequest(_) => ErrorCategory::InvalidRequest,
            ChatError::NotFound(_) => ErrorCategory::NotFound,
            ChatError::Upstream { .. } | ChatError::Transport(_) | ChatError::Internal(_) => {
                ErrorCategory::ServerError
            }
        }
    }

    #[must_use]
    pub fn status(&self) -> http::StatusCode {
        http_status_for_category(self.category())
    }
}

fn http_status_for_category(cat: ErrorCategory) -> http::StatusCode {
    match cat {
        ErrorCategory::Configuration => http::StatusCode::SERVICE_UNAVAILABLE,
        ErrorCategory::InvalidRequest => http::StatusCode::BAD_REQUEST,
        ErrorCategory::Authentication => http::StatusCode::UNAUTHORIZED,
        ErrorCategory::NotFound => http::StatusCode::NOT_FOUND,
        ErrorCategory::ServerError => http::StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Format an error for the browser, returning (`status_code`, JSON body).
///
/// Server-side failures are collapsed into a generic message; the detail
/// only goes to the log.
#[must_use]
pub fn format_error(err: &ChatError) -> (http::StatusCode, serde_json::Value) {
    let status = err.status();
    let message = match err.category() {
        ErrorCategory::ServerError => "Internal server error".to_string(),
        ErrorCategory::Authentication => "Unauthorized".to_string(),
        _ => err.to_string(),
    };
    (status, json!({ "error": message }))
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let (status, body) = format_error(&self);
        (status, axum::Json(body)).into_response()
    }
}
