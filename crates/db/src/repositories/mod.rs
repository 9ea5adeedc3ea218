use thiserror::Error;

use corebot_core::store::StoreError;

pub mod conversation;

pub use conversation::SqlConversationStore;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error for `{conversation_id}`: {message}")]
    Decode { conversation_id: String, message: String },
    #[error("encode error for `{conversation_id}`: {message}")]
    Encode { conversation_id: String, message: String },
}

impl From<RepositoryError> for StoreError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::Database(error) => StoreError::Backend(error.to_string()),
            RepositoryError::Decode { conversation_id, message } => {
                StoreError::Decode { conversation_id, message }
            }
            RepositoryError::Encode { conversation_id, message } => {
                StoreError::Encode { conversation_id, message }
            }
        }
    }
}
