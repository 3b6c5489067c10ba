//! Conversation manager

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::message::{Conversation, Message};
use super::store::{ConversationStore, InMemoryStore};
use crate::error::{AgentError, Result};

/// Owns all conversations and serializes turns per conversation id
pub struct ConversationManager {
    store: Arc<dyn ConversationStore>,
    /// One turn lock per conversation id
    turn_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ConversationManager {
    pub fn new(store: Arc<dyn ConversationStore>) -> Self {
        Self {
            store,
            turn_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryStore::new()))
    }

    /// Create an empty conversation with a fresh id
    pub async fn create(&self) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        self.store.put(Conversation::new(id.clone())).await?;
        tracing::debug!("Created conversation: {}", id);
        Ok(id)
    }

    /// Resolve the conversation for a turn, creating it when the id is absent
    /// or unknown
    pub async fn ensure(&self, id: Option<&str>) -> Result<String> {
        let Some(id) = id.map(str::trim).filter(|id| !id.is_empty()) else {
            return self.create().await;
        };

        if self.store.get(id).await?.is_none() {
            self.store.put(Conversation::new(id)).await?;
            tracing::debug!("Created conversation on first turn: {}", id);
        }
        Ok(id.to_string())
    }

    pub async fn fetch(&self, id: &str) -> Result<Conversation> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| AgentError::NotFound(id.to_string()))
    }

    pub async fn append(&self, id: &str, messages: Vec<Message>) -> Result<()> {
        self.store.append(id, messages).await
    }

    /// Remove a conversation; removing an unknown id is not an error
    pub async fn delete(&self, id: &str) -> Result<()> {
        let existed = self.store.delete(id).await?;
        {
            // A lock still held or awaited by a turn stays in place
            let mut locks = self.turn_locks.lock().await;
            if locks.get(id).is_some_and(|l| Arc::strong_count(l) == 1) {
                locks.remove(id);
            }
        }
        if existed {
            tracing::debug!("Deleted conversation: {}", id);
        }
        Ok(())
    }

    /// Acquire the turn lock for a conversation
    ///
    /// Turns on the same id run one at a time; different ids do not contend.
    pub async fn lock(&self, id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.turn_locks.lock().await;
            locks
                .entry(id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}
