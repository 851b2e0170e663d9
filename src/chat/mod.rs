//! Conversation context assembly for one chat turn.

pub mod detector;
pub mod orchestrator;

use serde::{Deserialize, Serialize};

/// Base output budget for a turn, before scaling with the prompt length.
pub const BASE_MAX_TOKENS: u32 = 500;
/// Upper bound on the output budget for a turn.
pub const MAX_TOKENS_CAP: u32 = 1500;

/// Speaker of a [`ChatMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    /// Roles accepted from browser-supplied history; `system` is server-owned.
    #[must_use]
    pub fn from_history(role: &str) -> Option<Self> {
        match role {
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            _ => None,
        }
    }
}

/// One entry of the ordered context sent to the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// A history entry as the browser sends it; unknown roles are dropped.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryEntry {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub content: String,
}

/// Build the context for a new turn: system prompt, accepted history, then the
/// current user message.
///
/// The user message is not appended again when the history already ends with it.
#[must_use]
pub fn build_messages(system_prompt: &str, history: &[HistoryEntry], message: &str) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::new(Role::System, system_prompt));
    messages.extend(history.iter().filter_map(|entry| {
        Role::from_history(&entry.role).map(|role| ChatMessage::new(role, entry.content.as_str()))
    }));

    let already_present = messages
        .last()
        .is_some_and(|last| last.role == Role::User && last.content == message);
    if !already_present {
        messages.push(ChatMessage::new(Role::User, message));
    }
    messages
}

/// Build the context for a continuation round.
///
/// The last assistant entry of `messages` takes the accumulated text (one is
/// appended when there is none), followed by the continuation instruction.
#[must_use]
pub fn build_continuation_messages(
    messages: &[ChatMessage],
    accumulated: &str,
    continuation_prompt: &str,
) -> Vec<ChatMessage> {
    let mut continuation = Vec::with_capacity(messages.len() + 2);
    continuation.extend_from_slice(messages);

    match continuation
        .iter_mut()
        .rev()
        .find(|message| message.role == Role::Assistant)
    {
        Some(last_assistant) => accumulated.clone_into(&mut last_assistant.content),
        None => continuation.push(ChatMessage::new(Role::Assistant, accumulated)),
    }

    continuation.push(ChatMessage::new(Role::User, continuation_prompt));
    continuation
}

/// Output token budget for a turn: `min(500 + floor(len / 2), 1500)`.
///
/// `message_len` is the user message length in characters.
#[must_use]
pub fn calculate_max_tokens(message_len: usize) -> u32 {
    let scaled = u32::try_from(message_len / 2).unwrap_or(u32::MAX);
    BASE_MAX_TOKENS.saturating_add(scaled).min(MAX_TOKENS_CAP)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(role: &str, content: &str) -> HistoryEntry {
        HistoryEntry {
            role: role.to_string(),
            content: content.to_string(),
        }
    }

    #[test]
    fn test_calculate_max_tokens() {
        assert_eq!(calculate_max_tokens(0), 500);
        assert_eq!(calculate_max_tokens(1), 500);
        assert_eq!(calculate_max_tokens(100), 550);
        assert_eq!(calculate_max_tokens(2000), 1500);
        assert_eq!(calculate_max_tokens(10_000), 1500);
        assert_eq!(calculate_max_tokens(usize::MAX), 1500);
    }

    #[test]
    fn test_build_messages_filters_roles_and_keeps_order() {
        let history = vec![
            entry("user", "hi"),
            entry("tool", "ignored"),
            entry("assistant", "hello"),
            entry("system", "also ignored"),
        ];
        let messages = build_messages("sys", &history, "how are you?");
        let roles: Vec<Role> = messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::User]
        );
        assert_eq!(messages[0].content, "sys");
        assert_eq!(messages[3].content, "how are you?");
    }

    #[test]
    fn test_build_messages_does_not_duplicate_current_message() {
        let history = vec![entry("user", "first"), entry("assistant", "a"), entry("user", "again")];
        let messages = build_messages("sys", &history, "again");
        assert_eq!(messages.len(), 4);
        assert_eq!(messages.last().unwrap().content, "again");
    }

    #[test]
    fn test_continuation_replaces_last_assistant() {
        let messages = vec![
            ChatMessage::new(Role::System, "sys"),
            ChatMessage::new(Role::Assistant, "old one"),
            ChatMessage::new(Role::User, "q"),
            ChatMessage::new(Role::Assistant, "old two"),
        ];
        let continued = build_continuation_messages(&messages, "partial", "go on");
        assert_eq!(continued.len(), 5);
        assert_eq!(continued[1].content, "old one");
        assert_eq!(continued[3].content, "partial");
        assert_eq!(continued[4], ChatMessage::new(Role::User, "go on"));
        // the input is left untouched
        assert_eq!(messages[3].content, "old two");
    }

    #[test]
    fn test_continuation_appends_assistant_when_missing() {
        let messages = vec![
            ChatMessage::new(Role::System, "sys"),
            ChatMessage::new(Role::User, "write a story"),
        ];
        let continued = build_continuation_messages(&messages, "Once upon", "go on");
        assert_eq!(
            continued,
            vec![
                ChatMessage::new(Role::System, "sys"),
                ChatMessage::new(Role::User, "write a story"),
                ChatMessage::new(Role::Assistant, "Once upon"),
                ChatMessage::new(Role::User, "go on"),
            ]
        );
    }

    #[test]
    fn test_role_serde() {
        assert_eq!(serde_json::to_string(&Role::Assistant).unwrap(), "\"assistant\"");
        let role: Role = serde_json::from_str("\"system\"").unwrap();
        assert_eq!(role, Role::System);
    }
}
