use std::sync::Arc;

use http::header::AUTHORIZATION;
use rustc_hash::FxHashMap;

use crate::config::AppConfig;
use crate::error::ChatError;

/// Identity attached to an authenticated request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUser {
    pub email: String,
    pub name: Option<String>,
}

/// Token index used on every request.
pub enum SessionIndex {
    Empty,
    Single {
        token: Box<str>,
        user: Arc<SessionUser>,
    },
    Multiple(FxHashMap<String, Arc<SessionUser>>),
}

/// Extract the bearer token from request headers.
///
/// # Errors
///
/// Returns `ChatError::Auth` when no `Authorization: Bearer` header is present.
pub fn extract_session_token(headers: &http::HeaderMap) -> Result<&str, ChatError> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ChatError::Auth("Missing session token".to_string()))
}

/// Resolve the request's session against the configured index.
///
/// # Errors
///
/// Returns `ChatError::Auth` when the token is missing or unknown.
pub fn authenticate(
    headers: &http::HeaderMap,
    sessions: &SessionIndex,
) -> Result<Arc<SessionUser>, ChatError> {
    let token = extract_session_token(headers)?;
    let user = match sessions {
        SessionIndex::Single {
            token: known,
            user,
        } if known.as_ref() == token => Some(user),
        SessionIndex::Multiple(index) => index.get(token),
        SessionIndex::Single { .. } | SessionIndex::Empty => None,
    };
    user.cloned()
        .ok_or_else(|| ChatError::Auth("Invalid session".to_string()))
}

/// Build the token index from the configured sessions.
#[must_use]
pub fn build_session_index(config: &AppConfig) -> SessionIndex {
    let mut index: FxHashMap<String, Arc<SessionUser>> = config
        .sessions
        .iter()
        .map(|session| {
            (
                session.token.trim().to_string(),
                Arc::new(SessionUser {
                    email: session.email.trim().to_string(),
                    name: session.name.clone(),
                }),
            )
        })
        .collect();

    match index.len() {
        0 => SessionIndex::Empty,
        1 => match index.drain().next() {
            Some((token, user)) => SessionIndex::Single {
                token: token.into_boxed_str(),
                user,
            },
            None => SessionIndex::Empty,
        },
        _ => SessionIndex::Multiple(index),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;

    fn make_config(tokens: &[(&str, &str)]) -> AppConfig {
        let mut config = AppConfig::default();
        config.sessions = tokens
            .iter()
            .map(|(token, email)| SessionConfig {
                token: (*token).to_string(),
                email: (*email).to_string(),
                name: None,
            })
            .collect();
        config
    }

    #[test]
    fn test_extract_bearer() {
        let mut headers = http::HeaderMap::new();
        headers.insert("authorization", "Bearer tok-123".parse().unwrap());
        assert_eq!(extract_session_token(&headers).unwrap(), "tok-123");
    }

    #[test]
    fn test_extract_missing_or_blank() {
        let headers = http::HeaderMap::new();
        assert!(matches!(
            extract_session_token(&headers),
            Err(ChatError::Auth(_))
        ));

        let mut headers = http::HeaderMap::new();
        headers.insert("authorization", "Bearer ".parse().unwrap());
        assert!(extract_session_token(&headers).is_err());
    }

    #[test]
    fn test_authenticate_single() {
        let index = build_session_index(&make_config(&[("tok", "a@example.com")]));
        assert!(matches!(index, SessionIndex::Single { .. }));

        let mut headers = http::HeaderMap::new();
        headers.insert("authorization", "Bearer tok".parse().unwrap());
        let user = authenticate(&headers, &index).unwrap();
        assert_eq!(user.email, "a@example.com");

        headers.insert("authorization", "Bearer other".parse().unwrap());
        assert!(matches!(
            authenticate(&headers, &index),
            Err(ChatError::Auth(_))
        ));
    }

    #[test]
    fn test_authenticate_multiple() {
        let index = build_session_index(&make_config(&[
            ("t1", "a@example.com"),
            ("t2", "b@example.com"),
        ]));
        let mut headers = http::HeaderMap::new();
        headers.insert("authorization", "Bearer t2".parse().unwrap());
        assert_eq!(authenticate(&headers, &index).unwrap().email, "b@example.com");
    }

    #[test]
    fn test_empty_index_rejects_everything() {
        let index = build_session_index(&make_config(&[]));
        let mut headers = http::HeaderMap::new();
        headers.insert("authorization", "Bearer anything".parse().unwrap());
        assert!(authenticate(&headers, &index).is_err());
    }
}
