//! Browser-facing SSE framing.

use axum::response::Response;
use bytes::Bytes;
use serde::Serialize;

/// Terminal frame sent once per successful turn.
pub const DONE_FRAME: &str = "data: [DONE]\n\n";

#[derive(Serialize)]
struct ContentFrame<'a> {
    content: &'a str,
}

/// Frame one content delta as `data: {"content": ...}\n\n`.
#[must_use]
pub fn content_frame(content: &str) -> Bytes {
    let json = serde_json::to_string(&ContentFrame { content })
        .unwrap_or_else(|_| String::from("{\"content\":\"\"}"));
    let mut out = String::with_capacity(8 + json.len());
    out.push_str("data: ");
    out.push_str(&json);
    out.push_str("\n\n");
    Bytes::from(out)
}

#[must_use]
pub fn done_frame() -> Bytes {
    Bytes::from_static(DONE_FRAME.as_bytes())
}

/// 200 response with the event-stream headers.
#[must_use]
pub fn sse_ok_response(body: axum::body::Body) -> Response {
    let mut response = Response::new(body);
    *response.status_mut() = http::StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(
        http::header::CONTENT_TYPE,
        http::HeaderValue::from_static("text/event-stream"),
    );
    headers.insert(
        http::header::CACHE_CONTROL,
        http::HeaderValue::from_static("no-cache"),
    );
    headers.insert(
        http::header::CONNECTION,
        http::HeaderValue::from_static("keep-alive"),
    );
    response
}
