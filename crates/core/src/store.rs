use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::domain::conversation::{ConversationId, ConversationState};
use crate::errors::ApplicationError;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(String),
    #[error("could not decode stored conversation `{conversation_id}`: {message}")]
    Decode { conversation_id: String, message: String },
    #[error("could not encode conversation `{conversation_id}` for storage: {message}")]
    Encode { conversation_id: String, message: String },
}

impl From<StoreError> for ApplicationError {
    fn from(error: StoreError) -> Self {
        ApplicationError::Persistence(error.to_string())
    }
}

/// Durable home of per-conversation dialog state between turns.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    fn backend(&self) -> &'static str;

    async fn load(&self, id: &ConversationId) -> Result<Option<ConversationState>, StoreError>;
    async fn save(&self, state: &ConversationState) -> Result<(), StoreError>;
    async fn remove(&self, id: &ConversationId) -> Result<bool, StoreError>;
    async fn conversation_ids(&self) -> Result<Vec<ConversationId>, StoreError>;
}

#[derive(Default)]
pub struct InMemoryConversationStore {
    conversations: RwLock<HashMap<ConversationId, ConversationState>>,
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn load(&self, id: &ConversationId) -> Result<Option<ConversationState>, StoreError> {
        let conversations = self.conversations.read().await;
        Ok(conversations.get(id).cloned())
    }

    async fn save(&self, state: &ConversationState) -> Result<(), StoreError> {
        let mut conversations = self.conversations.write().await;
        conversations.insert(state.conversation_id.clone(), state.clone());
        Ok(())
    }

    async fn remove(&self, id: &ConversationId) -> Result<bool, StoreError> {
        let mut conversations = self.conversations.write().await;
        Ok(conversations.remove(id).is_some())
    }

    async fn conversation_ids(&self) -> Result<Vec<ConversationId>, StoreError> {
        let conversations = self.conversations.read().await;
        let mut ids = conversations.keys().cloned().collect::<Vec<_>>();
        ids.sort();
        Ok(ids)
    }
}
