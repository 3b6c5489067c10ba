//! Conversation persistence

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::message::{Conversation, Message};
use crate::error::{AgentError, Result};

/// Storage backend for conversations, keyed by conversation id
///
/// The default backend keeps everything in process memory; a durable
/// backend can be substituted without touching the orchestrator.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Fetch a conversation, if present
    async fn get(&self, id: &str) -> Result<Option<Conversation>>;

    /// Insert or replace a conversation
    async fn put(&self, conversation: Conversation) -> Result<()>;

    /// Remove a conversation, returning whether it existed
    async fn delete(&self, id: &str) -> Result<bool>;

    /// Append messages to an existing conversation
    async fn append(&self, id: &str, messages: Vec<Message>) -> Result<()> {
        let mut conversation = self
            .get(id)
            .await?
            .ok_or_else(|| AgentError::NotFound(id.to_string()))?;
        conversation.extend(messages);
        self.put(conversation).await
    }
}

/// Process-local store; entries are lost on restart
#[derive(Default)]
pub struct InMemoryStore {
    conversations: RwLock<HashMap<String, Conversation>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationStore for InMemoryStore {
    async fn get(&self, id: &str) -> Result<Option<Conversation>> {
        Ok(self.conversations.read().await.get(id).cloned())
    }

    async fn put(&self, conversation: Conversation) -> Result<()> {
        self.conversations
            .write()
            .await
            .insert(conversation.id.clone(), conversation);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.conversations.write().await.remove(id).is_some())
    }

    async fn append(&self, id: &str, messages: Vec<Message>) -> Result<()> {
        let mut conversations = self.conversations.write().await;
        let conversation = conversations
            .get_mut(id)
            .ok_or_else(|| AgentError::NotFound(id.to_string()))?;
        conversation.extend(messages);
        Ok(())
    }
}
