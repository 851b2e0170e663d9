use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use super::{
    derive_mode, title_from_content, Conversation, ConversationStore, ConversationSummary,
    MessagePreview, MessageRole, NewMessage, StoredMessage, UserRecord,
};
use crate::auth::SessionUser;
use crate::error::ChatError;

struct ConversationRecord {
    id: String,
    user_id: String,
    title: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    // Tie-breaker for updates within the same clock tick.
    revision: u64,
    messages: Vec<StoredMessage>,
}

impl ConversationRecord {
    fn owned_by(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }

    fn snapshot(&self) -> Conversation {
        Conversation {
            id: self.id.clone(),
            user_id: self.user_id.clone(),
            title: self.title.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            mode: derive_mode(&self.messages),
            messages: self.messages.clone(),
        }
    }

    fn summary(&self) -> ConversationSummary {
        ConversationSummary {
            id: self.id.clone(),
            user_id: self.user_id.clone(),
            title: self.title.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            messages: self
                .messages
                .first()
                .map(|first| MessagePreview {
                    id: first.id.clone(),
                    content: first.content.clone(),
                })
                .into_iter()
                .collect(),
        }
    }
}

#[derive(Default)]
struct Inner {
    users: FxHashMap<String, UserRecord>,
    conversations: FxHashMap<String, ConversationRecord>,
    revision: u64,
}

impl Inner {
    fn next_revision(&mut self) -> u64 {
        self.revision += 1;
        self.revision
    }
}

/// Process-local store. Contents are lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

impl ConversationStore for MemoryStore {
    fn upsert_user(&self, user: &SessionUser) -> UserRecord {
        if let Some(existing) = self.inner.read().users.get(&user.email) {
            return existing.clone();
        }
        let mut inner = self.inner.write();
        inner
            .users
            .entry(user.email.clone())
            .or_insert_with(|| {
                tracing::debug!(email = %user.email, "creating user record");
                UserRecord {
                    id: new_id(),
                    email: user.email.clone(),
                    name: user.name.clone(),
                }
            })
            .clone()
    }

    fn list_conversations(&self, user_id: &str) -> Vec<ConversationSummary> {
        let inner = self.inner.read();
        let mut owned: Vec<&ConversationRecord> = inner
            .conversations
            .values()
            .filter(|record| record.owned_by(user_id))
            .collect();
        owned.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| b.revision.cmp(&a.revision))
        });
        owned.into_iter().map(ConversationRecord::summary).collect()
    }

    fn create_conversation(&self, user_id: &str, title: Option<String>) -> Conversation {
        let now = Utc::now();
        let mut inner = self.inner.write();
        let revision = inner.next_revision();
        let record = ConversationRecord {
            id: new_id(),
            user_id: user_id.to_string(),
            title: title.filter(|t| !t.trim().is_empty()),
            created_at: now,
            updated_at: now,
            revision,
            messages: Vec::new(),
        };
        let snapshot = record.snapshot();
        inner.conversations.insert(record.id.clone(), record);
        snapshot
    }

    fn get_conversation(&self, user_id: &str, conversation_id: &str) -> Option<Conversation> {
        self.inner
            .read()
            .conversations
            .get(conversation_id)
            .filter(|record| record.owned_by(user_id))
            .map(ConversationRecord::snapshot)
    }

    fn delete_conversation(&self, user_id: &str, conversation_id: &str) -> bool {
        let mut inner = self.inner.write();
        let owned = inner
            .conversations
            .get(conversation_id)
            .is_some_and(|record| record.owned_by(user_id));
        owned && inner.conversations.remove(conversation_id).is_some()
    }

    fn save_message(&self, user_id: &str, message: NewMessage) -> Result<StoredMessage, ChatError> {
        let mut inner = self.inner.write();
        let revision = inner.next_revision();
        let record = inner
            .conversations
            .get_mut(&message.conversation_id)
            .filter(|record| record.owned_by(user_id))
            .ok_or_else(|| ChatError::NotFound("Conversation not found".to_string()))?;

        let first_user_message = message.role == MessageRole::User
            && !record
                .messages
                .iter()
                .any(|existing| existing.role == MessageRole::User);
        if first_user_message && record.title.is_none() {
            record.title = Some(title_from_content(&message.content));
        }

        let now = Utc::now();
        let stored = StoredMessage {
            id: new_id(),
            conversation_id: record.id.clone(),
            role: message.role,
            content: message.content,
            timestamp: now,
            mode: message.mode,
            search_results: message.search_results.unwrap_or_default(),
            images: message.images.unwrap_or_default(),
        };
        record.messages.push(stored.clone());
        record.updated_at = now;
        record.revision = revision;
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ChatMode, SearchResult};

    fn alice() -> SessionUser {
        SessionUser {
            email: "alice@example.com".to_string(),
            name: Some("Alice".to_string()),
        }
    }

    fn new_message(conversation_id: &str, role: MessageRole, content: &str) -> NewMessage {
        NewMessage {
            conversation_id: conversation_id.to_string(),
            role,
            content: content.to_string(),
            mode: None,
            search_results: None,
            images: None,
        }
    }

    #[test]
    fn test_upsert_user_is_stable() {
        let store = MemoryStore::new();
        let first = store.upsert_user(&alice());
        let second = store.upsert_user(&alice());
        assert_eq!(first, second);
        assert_eq!(first.name.as_deref(), Some("Alice"));
    }

    #[test]
    fn test_first_user_message_sets_title() {
        let store = MemoryStore::new();
        let user = store.upsert_user(&alice());
        let conversation = store.create_conversation(&user.id, None);
        assert_eq!(conversation.title, None);

        store
            .save_message(&user.id, new_message(&conversation.id, MessageRole::Assistant, "greeting"))
            .unwrap();
        let long = "x".repeat(150);
        store
            .save_message(&user.id, new_message(&conversation.id, MessageRole::User, &long))
            .unwrap();
        store
            .save_message(&user.id, new_message(&conversation.id, MessageRole::User, "second"))
            .unwrap();

        let loaded = store.get_conversation(&user.id, &conversation.id).unwrap();
        assert_eq!(loaded.title, Some(format!("{}...", "x".repeat(100))));
        assert_eq!(loaded.messages.len(), 3);
        assert_eq!(loaded.messages[2].content, "second");
    }

    #[test]
    fn test_explicit_title_is_kept() {
        let store = MemoryStore::new();
        let conversation = store.create_conversation("u1", Some("Trip plans".to_string()));
        store
            .save_message("u1", new_message(&conversation.id, MessageRole::User, "hello"))
            .unwrap();
        let loaded = store.get_conversation("u1", &conversation.id).unwrap();
        assert_eq!(loaded.title.as_deref(), Some("Trip plans"));

        let blank = store.create_conversation("u1", Some("  ".to_string()));
        assert_eq!(blank.title, None);
    }

    #[test]
    fn test_ownership_is_enforced() {
        let store = MemoryStore::new();
        let conversation = store.create_conversation("owner", None);

        assert!(store.get_conversation("intruder", &conversation.id).is_none());
        let err = store
            .save_message("intruder", new_message(&conversation.id, MessageRole::User, "hi"))
            .unwrap_err();
        assert!(matches!(err, ChatError::NotFound(_)));
        assert!(!store.delete_conversation("intruder", &conversation.id));
        assert!(store.get_conversation("owner", &conversation.id).is_some());

        assert!(store.delete_conversation("owner", &conversation.id));
        assert!(!store.delete_conversation("owner", &conversation.id));
        assert!(store.get_conversation("owner", &conversation.id).is_none());
    }

    #[test]
    fn test_list_orders_by_recent_update_with_preview() {
        let store = MemoryStore::new();
        let older = store.create_conversation("u1", None);
        let newer = store.create_conversation("u1", None);
        store.create_conversation("u2", None);

        let listed = store.list_conversations("u1");
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, newer.id);

        store
            .save_message("u1", new_message(&older.id, MessageRole::User, "first words"))
            .unwrap();
        store
            .save_message("u1", new_message(&older.id, MessageRole::Assistant, "reply"))
            .unwrap();
        let listed = store.list_conversations("u1");
        assert_eq!(listed[0].id, older.id);
        assert_eq!(listed[0].messages.len(), 1);
        assert_eq!(listed[0].messages[0].content, "first words");
        assert!(listed[1].messages.is_empty());
    }

    #[test]
    fn test_mode_and_attachments_round_trip() {
        let store = MemoryStore::new();
        let conversation = store.create_conversation("u1", None);
        let mut message = new_message(&conversation.id, MessageRole::Assistant, "found");
        message.mode = Some(ChatMode::Search);
        message.search_results = Some(vec![SearchResult {
            title: "Rust".to_string(),
            link: "https://www.rust-lang.org".to_string(),
            snippet: "A language".to_string(),
        }]);
        store.save_message("u1", message).unwrap();

        let loaded = store.get_conversation("u1", &conversation.id).unwrap();
        assert_eq!(loaded.mode, ChatMode::Search);
        assert_eq!(loaded.messages[0].search_results.len(), 1);
        assert!(loaded.messages[0].images.is_empty());
    }
}
