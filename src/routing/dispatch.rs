use std::convert::Infallible;
use std::sync::Arc;

use axum::body::{self, Body};
use axum::extract::State;
use axum::http::{Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::api::{chat, conversations, health, messages, search};
use crate::state::AppState;

const DEFAULT_BODY_LIMIT_BYTES: usize = 2 * 1024 * 1024;

#[derive(Debug, PartialEq, Eq)]
enum RouteMatch<'a> {
    Health,
    Chat,
    Search,
    ListConversations,
    CreateConversation,
    GetConversation { id: &'a str },
    DeleteConversation { id: &'a str },
    SaveMessage,
    MethodNotAllowed,
    NotFound,
}

/// Dispatch a raw HTTP request to the matching handler.
///
/// # Errors
///
/// This function currently never returns `Err` and uses `Infallible`.
pub async fn dispatch_request(
    state: Arc<AppState>,
    base_path: Arc<str>,
    request: Request<Body>,
) -> Result<Response, Infallible> {
    let (parts, body) = request.into_parts();
    let route = match_route(&parts.method, parts.uri.path(), base_path.as_ref());

    let response = match route {
        RouteMatch::Health => health::health_handler(State(state)).into_response(),
        RouteMatch::Chat => {
            let body_bytes = match read_request_body(body).await {
                Ok(bytes) => bytes,
                Err(response) => return Ok(response),
            };
            chat::handler(state, &parts.headers, body_bytes).await
        }
        RouteMatch::Search => {
            let body_bytes = match read_request_body(body).await {
                Ok(bytes) => bytes,
                Err(response) => return Ok(response),
            };
            search::handler(state, &parts.headers, body_bytes).await
        }
        RouteMatch::ListConversations => conversations::list(&state, &parts.headers),
        RouteMatch::CreateConversation => {
            let body_bytes = match read_request_body(body).await {
                Ok(bytes) => bytes,
                Err(response) => return Ok(response),
            };
            conversations::create(&state, &parts.headers, &body_bytes)
        }
        RouteMatch::GetConversation { id } => conversations::get(&state, &parts.headers, id),
        RouteMatch::DeleteConversation { id } => {
            conversations::delete(&state, &parts.headers, id)
        }
        RouteMatch::SaveMessage => {
            let body_bytes = match read_request_body(body).await {
                Ok(bytes) => bytes,
                Err(response) => return Ok(response),
            };
            messages::save(&state, &parts.headers, &body_bytes)
        }
        RouteMatch::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED.into_response(),
        RouteMatch::NotFound => StatusCode::NOT_FOUND.into_response(),
    };

    Ok(response)
}

#[must_use]
pub fn normalize_base_path(base_path: &str) -> String {
    let trimmed = base_path.trim();
    if trimmed.is_empty() || trimmed == "/" {
        String::new()
    } else if trimmed.starts_with('/') {
        trimmed.trim_end_matches('/').to_string()
    } else {
        format!("/{}", trimmed.trim_end_matches('/'))
    }
}

async fn read_request_body(body: Body) -> Result<bytes::Bytes, Response> {
    body::to_bytes(body, DEFAULT_BODY_LIMIT_BYTES)
        .await
        .map_err(|_| {
            (
                StatusCode::PAYLOAD_TOO_LARGE,
                "Request body too large (max 2MiB)",
            )
                .into_response()
        })
}

fn match_route<'a>(method: &Method, path: &'a str, base_path: &str) -> RouteMatch<'a> {
    let Some(path) = strip_base_path(path, base_path) else {
        return RouteMatch::NotFound;
    };

    match path {
        "/" => {
            if method == Method::GET {
                RouteMatch::Health
            } else {
                RouteMatch::MethodNotAllowed
            }
        }
        "/api/chat" => {
            if method == Method::POST {
                RouteMatch::Chat
            } else {
                RouteMatch::MethodNotAllowed
            }
        }
        "/api/search" => {
            if method == Method::POST {
                RouteMatch::Search
            } else {
                RouteMatch::MethodNotAllowed
            }
        }
        "/api/messages" => {
            if method == Method::POST {
                RouteMatch::SaveMessage
            } else {
                RouteMatch::MethodNotAllowed
            }
        }
        "/api/conversations" => {
            if method == Method::GET {
                RouteMatch::ListConversations
            } else if method == Method::POST {
                RouteMatch::CreateConversation
            } else {
                RouteMatch::MethodNotAllowed
            }
        }
        _ => {
            if let Some(id) = path.strip_prefix("/api/conversations/") {
                if id.is_empty() || id.contains('/') {
                    RouteMatch::NotFound
                } else if method == Method::GET {
                    RouteMatch::GetConversation { id }
                } else if method == Method::DELETE {
                    RouteMatch::DeleteConversation { id }
                } else {
                    RouteMatch::MethodNotAllowed
                }
            } else {
                RouteMatch::NotFound
            }
        }
    }
}

fn strip_base_path<'a>(path: &'a str, base_path: &str) -> Option<&'a str> {
    if base_path.is_empty() {
        return Some(path);
    }

    let remainder = path.strip_prefix(base_path)?;
    if remainder.is_empty() {
        Some("/")
    } else if remainder.starts_with('/') {
        Some(remainder)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_base_path() {
        assert_eq!(normalize_base_path(""), "");
        assert_eq!(normalize_base_path("/"), "");
        assert_eq!(normalize_base_path("chat/"), "/chat");
        assert_eq!(normalize_base_path("/chat"), "/chat");
    }

    #[test]
    fn test_match_routes() {
        assert_eq!(match_route(&Method::GET, "/", ""), RouteMatch::Health);
        assert_eq!(match_route(&Method::POST, "/api/chat", ""), RouteMatch::Chat);
        assert_eq!(match_route(&Method::GET, "/api/chat", ""), RouteMatch::MethodNotAllowed);
        assert_eq!(
            match_route(&Method::GET, "/api/conversations", ""),
            RouteMatch::ListConversations
        );
        assert_eq!(
            match_route(&Method::DELETE, "/api/conversations/abc", ""),
            RouteMatch::DeleteConversation { id: "abc" }
        );
        assert_eq!(
            match_route(&Method::PUT, "/api/conversations/abc", ""),
            RouteMatch::MethodNotAllowed
        );
        assert_eq!(
            match_route(&Method::GET, "/api/conversations/a/b", ""),
            RouteMatch::NotFound
        );
        assert_eq!(match_route(&Method::GET, "/nope", ""), RouteMatch::NotFound);
    }

    #[test]
    fn test_base_path_is_required_when_set() {
        assert_eq!(match_route(&Method::GET, "/chat", "/chat"), RouteMatch::Health);
        assert_eq!(match_route(&Method::POST, "/chat/api/chat", "/chat"), RouteMatch::Chat);
        assert_eq!(match_route(&Method::POST, "/api/chat", "/chat"), RouteMatch::NotFound);
        assert_eq!(match_route(&Method::POST, "/chatty/api/chat", "/chat"), RouteMatch::NotFound);
    }
}
