use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use chatstream::config::{AppConfig, SessionConfig};
use chatstream::routing::dispatch::dispatch_request;
use chatstream::state::AppState;
use serde_json::{json, Value};

fn build_state() -> Arc<AppState> {
    let config = AppConfig {
        sessions: vec![
            SessionConfig {
                token: "session-alice".to_string(),
                email: "alice@example.com".to_string(),
                name: Some("Alice".to_string()),
            },
            SessionConfig {
                token: "session-bob".to_string(),
                email: "bob@example.com".to_string(),
                name: None,
            },
        ],
        ..AppConfig::default()
    };
    Arc::new(AppState::with_memory_store(config))
}

async fn call(
    state: &Arc<AppState>,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let body = body.map_or_else(Body::empty, |value| Body::from(value.to_string()));
    let request = builder.body(body).expect("build request");
    dispatch_request(Arc::clone(state), Arc::<str>::from(""), request)
        .await
        .expect("dispatch")
}

async fn json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

#[tokio::test]
async fn test_conversation_lifecycle() {
    let state = build_state();
    let alice = Some("session-alice");

    let response = call(&state, "POST", "/api/conversations", alice, Some(json!({}))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let created = json_body(response).await;
    let id = created["conversation"]["id"]
        .as_str()
        .expect("conversation id")
        .to_string();
    assert!(created["conversation"]["title"].is_null());
    assert_eq!(created["conversation"]["mode"], "chat");

    let question = "q".repeat(120);
    let response = call(
        &state,
        "POST",
        "/api/messages",
        alice,
        Some(json!({"conversationId": id, "role": "user", "content": question, "mode": "search"})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let saved = json_body(response).await;
    assert_eq!(saved["message"]["conversationId"], id.as_str());
    assert_eq!(saved["message"]["role"], "user");
    assert_eq!(saved["message"]["mode"], "search");

    let response = call(
        &state,
        "POST",
        "/api/messages",
        alice,
        Some(json!({
            "conversationId": id,
            "role": "assistant",
            "content": "Found it",
            "searchResults": [{"title": "T", "link": "https://e.com", "snippet": "S"}],
            "images": [{"url": "https://e.com/i.png"}]
        })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = call(&state, "GET", &format!("/api/conversations/{id}"), alice, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let loaded = json_body(response).await;
    let conversation = &loaded["conversation"];
    assert_eq!(
        conversation["title"].as_str().expect("title"),
        format!("{}...", "q".repeat(100))
    );
    assert_eq!(conversation["mode"], "search");
    let messages = conversation["messages"].as_array().expect("messages");
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1]["content"], "Found it");
    assert_eq!(messages[1]["searchResults"][0]["link"], "https://e.com");
    assert_eq!(messages[1]["images"][0]["url"], "https://e.com/i.png");

    let response = call(&state, "GET", "/api/conversations", alice, None).await;
    let listed = json_body(response).await;
    let conversations = listed["conversations"].as_array().expect("list");
    assert_eq!(conversations.len(), 1);
    assert_eq!(conversations[0]["messages"].as_array().expect("preview").len(), 1);

    let response = call(&state, "DELETE", &format!("/api/conversations/{id}"), alice, None).await;
    assert_eq!(json_body(response).await["success"], true);

    let response = call(&state, "GET", &format!("/api/conversations/{id}"), alice, None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["error"], "Conversation not found");
}

#[tokio::test]
async fn test_conversations_are_private() {
    let state = build_state();
    let response = call(
        &state,
        "POST",
        "/api/conversations",
        Some("session-alice"),
        Some(json!({"title": "Alice only"})),
    )
    .await;
    let created = json_body(response).await;
    let id = created["conversation"]["id"].as_str().expect("id").to_string();
    assert_eq!(created["conversation"]["title"], "Alice only");

    let bob = Some("session-bob");
    let response = call(&state, "GET", &format!("/api/conversations/{id}"), bob, None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = call(
        &state,
        "POST",
        "/api/messages",
        bob,
        Some(json!({"conversationId": id, "role": "user", "content": "hi"})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = call(&state, "DELETE", &format!("/api/conversations/{id}"), bob, None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = call(&state, "GET", "/api/conversations", bob, None).await;
    assert!(json_body(response).await["conversations"]
        .as_array()
        .expect("list")
        .is_empty());

    let response = call(
        &state,
        "GET",
        &format!("/api/conversations/{id}"),
        Some("session-alice"),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_message_requires_conversation_id() {
    let state = build_state();
    let response = call(
        &state,
        "POST",
        "/api/messages",
        Some("session-alice"),
        Some(json!({"role": "user", "content": "orphan"})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "conversationId is required");
}

#[tokio::test]
async fn test_conversation_routes_require_session() {
    let state = build_state();
    for (method, uri) in [
        ("GET", "/api/conversations"),
        ("POST", "/api/conversations"),
        ("GET", "/api/conversations/abc"),
        ("DELETE", "/api/conversations/abc"),
        ("POST", "/api/messages"),
    ] {
        let response = call(&state, method, uri, None, None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{method} {uri}");
    }
}
