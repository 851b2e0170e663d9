//! Conversation persistence.
//!
//! Storage sits behind [`ConversationStore`] so the HTTP layer never sees a
//! concrete backend. Ownership is always checked against the caller's user id.

mod memory;

pub use memory::MemoryStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::SessionUser;
use crate::error::ChatError;

/// Max characters of the first user message used as a conversation title.
pub const TITLE_MAX_CHARS: usize = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatMode {
    #[default]
    Chat,
    Search,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub link: String,
    pub snippet: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageResult {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredMessage {
    pub id: String,
    pub conversation_id: String,
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<ChatMode>,
    pub search_results: Vec<SearchResult>,
    pub images: Vec<ImageResult>,
}

/// Payload of `POST /api/messages`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    #[serde(default)]
    pub conversation_id: String,
    pub role: MessageRole,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub mode: Option<ChatMode>,
    #[serde(default)]
    pub search_results: Option<Vec<SearchResult>>,
    #[serde(default)]
    pub images: Option<Vec<ImageResult>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessagePreview {
    pub id: String,
    pub content: String,
}

/// List entry: the conversation plus its first message.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub id: String,
    pub user_id: String,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub messages: Vec<MessagePreview>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub user_id: String,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub mode: ChatMode,
    pub messages: Vec<StoredMessage>,
}

pub trait ConversationStore: Send + Sync {
    /// Find the user by email, creating a record on first sight.
    fn upsert_user(&self, user: &SessionUser) -> UserRecord;

    /// Most recently updated first.
    fn list_conversations(&self, user_id: &str) -> Vec<ConversationSummary>;

    fn create_conversation(&self, user_id: &str, title: Option<String>) -> Conversation;

    /// `None` when absent or owned by someone else.
    fn get_conversation(&self, user_id: &str, conversation_id: &str) -> Option<Conversation>;

    /// Returns whether anything was removed. Absent or foreign ids are a no-op.
    fn delete_conversation(&self, user_id: &str, conversation_id: &str) -> bool;

    /// # Errors
    ///
    /// `ChatError::NotFound` unless the conversation exists and belongs to `user_id`.
    fn save_message(&self, user_id: &str, message: NewMessage) -> Result<StoredMessage, ChatError>;
}

/// Mode of the latest message that carries one, `Chat` otherwise.
#[must_use]
pub fn derive_mode(messages: &[StoredMessage]) -> ChatMode {
    messages
        .iter()
        .rev()
        .find_map(|message| message.mode)
        .unwrap_or_default()
}

/// Title derived from a first user message.
#[must_use]
pub fn title_from_content(content: &str) -> String {
    match content.char_indices().nth(TITLE_MAX_CHARS) {
        Some((cut, _)) => format!("{}...", &content[..cut]),
        None => content.to_string(),
    }
}
