use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::{error::Result, turn::TurnResult};

/// Ordered, append-only log of the turns of one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    turns: Vec<TurnResult>,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4())
    }

    pub fn with_id(id: Uuid) -> Self {
        Self {
            id,
            turns: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Appends a finished turn
    pub fn record(&mut self, turn: TurnResult) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[TurnResult] {
        &self.turns
    }

    pub fn last_turn(&self) -> Option<&TurnResult> {
        self.turns.last()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

/// Trait for storing and retrieving conversations
#[async_trait]
pub trait ConversationStorage: Send + Sync {
    async fn save(&self, conversation: Conversation) -> Result<()>;
    async fn get(&self, id: Uuid) -> Result<Option<Conversation>>;
    async fn delete(&self, id: Uuid) -> Result<()>;
}

/// In-memory implementation of ConversationStorage
#[derive(Default)]
pub struct InMemoryConversationStorage {
    conversations: Arc<DashMap<Uuid, Conversation>>,
}

impl InMemoryConversationStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationStorage for InMemoryConversationStorage {
    async fn save(&self, conversation: Conversation) -> Result<()> {
        self.conversations.insert(conversation.id, conversation);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Conversation>> {
        Ok(self.conversations.get(&id).map(|entry| entry.clone()))
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.conversations.remove(&id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::turn::TurnDraft;

    #[tokio::test]
    async fn test_turns_keep_insertion_order() {
        let storage = InMemoryConversationStorage::new();
        let mut conversation = Conversation::new();
        for text in ["first", "second", "third"] {
            conversation.record(TurnDraft::begin(text).finish(text.to_uppercase(), None));
        }
        storage.save(conversation.clone()).await.unwrap();

        let loaded = storage.get(conversation.id).await.unwrap().unwrap();
        let texts: Vec<_> = loaded.turns().iter().map(|t| t.user_text.as_str()).collect();
        assert_eq!(texts, ["first", "second", "third"]);
        assert_eq!(loaded.last_turn().unwrap().message, "THIRD");

        storage.delete(conversation.id).await.unwrap();
        assert!(storage.get(conversation.id).await.unwrap().is_none());
    }

    #[test]
    fn test_conversation_serializes_turns() {
        let mut conversation = Conversation::new();
        conversation.record(TurnDraft::begin("hi").finish("hello".to_string(), None));
        let value = serde_json::to_value(&conversation).unwrap();
        assert_eq!(value["turns"][0]["user_text"], "hi");
        assert_eq!(value["turns"].as_array().unwrap().len(), 1);
    }
}
