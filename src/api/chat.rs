//! `POST /api/chat`: one streamed, auto-continued assistant turn.

use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::response::Response;
use bytes::Bytes;
use serde_json::Value;

use crate::chat::orchestrator::ContinuationEngine;
use crate::chat::{build_messages, HistoryEntry};
use crate::error::ChatError;
use crate::observability::log_turn_complete;
use crate::state::AppState;
use crate::stream::sink::DEFAULT_SINK_CAPACITY;
use crate::stream::sse::sse_ok_response;
use crate::stream::client_channel;

use super::{into_response, parse_json_object};

struct ChatRequest {
    message: String,
    history: Vec<HistoryEntry>,
}

fn parse_chat_request(body: &[u8]) -> Result<ChatRequest, ChatError> {
    let mut value = parse_json_object(body)?;
    let message = match value.get("message") {
        Some(Value::String(message)) if !message.is_empty() => message.clone(),
        _ => return Err(ChatError::InvalidRequest("Message is required".to_string())),
    };
    // A malformed history degrades to no history rather than failing the turn.
    let history = match value.get_mut("history").map(Value::take) {
        Some(raw @ Value::Array(_)) => serde_json::from_value(raw).unwrap_or_else(|err| {
            tracing::debug!(error = %err, "ignoring malformed chat history");
            Vec::new()
        }),
        _ => Vec::new(),
    };
    Ok(ChatRequest { message, history })
}

pub async fn handler(state: Arc<AppState>, headers: &http::HeaderMap, body: Bytes) -> Response {
    into_response("chat", start_turn(state, headers, &body).await)
}

/// Open the first upstream call, then hand the turn to a background task
/// that feeds the event-stream body.
async fn start_turn(
    state: Arc<AppState>,
    headers: &http::HeaderMap,
    body: &[u8],
) -> Result<Response, ChatError> {
    let user = state.authenticate(headers)?;
    let request = parse_chat_request(body)?;
    let started = Instant::now();
    let turn_id = state.next_turn_id();
    tracing::debug!(
        turn_id = %turn_id,
        user = %user.email,
        history = request.history.len(),
        "chat turn starting"
    );

    let messages = build_messages(
        &state.config.continuation.system_prompt,
        &request.history,
        &request.message,
    );
    let engine = ContinuationEngine::new(&state.provider, &state.detector, &state.policy);
    let turn = engine.start(messages, request.message.chars().count()).await?;

    let (mut sink, stream) = client_channel(DEFAULT_SINK_CAPACITY);
    let cancel = state.shutdown_token().child_token();
    let task_state = Arc::clone(&state);
    tokio::spawn(async move {
        let state = task_state;
        let engine = ContinuationEngine::new(&state.provider, &state.detector, &state.policy);
        match engine.drive(turn, &mut sink, &cancel).await {
            Ok(outcome) => log_turn_complete(&turn_id, &outcome, started),
            Err(err) => {
                tracing::error!(turn_id = %turn_id, error = %err, "chat stream failed");
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => {}
                    () = sink.fail(err.to_string()) => {}
                }
            }
        }
    });

    Ok(sse_ok_response(Body::from_stream(stream)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_is_required() {
        for body in [
            &b"{}"[..],
            b"{\"message\":\"\"}",
            b"{\"message\":42}",
            b"{\"message\":null}",
        ] {
            match parse_chat_request(body) {
                Err(ChatError::InvalidRequest(msg)) => assert_eq!(msg, "Message is required"),
                other => panic!("expected 400, got {:?}", other.map(|r| r.message)),
            }
        }
    }

    #[test]
    fn test_history_is_parsed_or_ignored() {
        let request = parse_chat_request(
            br#"{"message":"hi","history":[{"role":"user","content":"a"},{"role":"assistant","content":"b"}]}"#,
        )
        .unwrap();
        assert_eq!(request.message, "hi");
        assert_eq!(request.history.len(), 2);

        let request = parse_chat_request(br#"{"message":"hi","history":"nope"}"#).unwrap();
        assert!(request.history.is_empty());

        let request = parse_chat_request(br#"{"message":"hi","history":[1,2]}"#).unwrap();
        assert!(request.history.is_empty());
    }
}
