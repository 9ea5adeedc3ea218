use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};
use tracing::debug;

use corebot_core::dialog::stack::DialogStack;
use corebot_core::domain::conversation::{ConversationId, ConversationState};
use corebot_core::store::{ConversationStore, StoreError};

use super::RepositoryError;
use crate::DbPool;

/// Conversation state persisted as one row per conversation; the dialog
/// stack is stored as JSON. `active_task` and `depth` are denormalised for
/// inspection and are never read back.
pub struct SqlConversationStore {
    pool: DbPool,
}

impl SqlConversationStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    async fn find(&self, id: &ConversationId) -> Result<Option<ConversationState>, RepositoryError> {
        let row = sqlx::query(
            "SELECT
                conversation_id,
                stack_json,
                turn_count,
                updated_at
             FROM conversation_state
             WHERE conversation_id = ?",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(state_from_row).transpose()
    }

    async fn upsert(&self, state: &ConversationState) -> Result<(), RepositoryError> {
        let encode_error = |message: String| RepositoryError::Encode {
            conversation_id: state.conversation_id.to_string(),
            message,
        };
        let stack_json = serde_json::to_string(&state.stack)
            .map_err(|error| encode_error(format!("stack_json: {error}")))?;
        let turn_count = i64::try_from(state.turn_count).map_err(|_| {
            encode_error(format!("turn_count {} does not fit in INTEGER", state.turn_count))
        })?;
        let depth = i64::try_from(state.stack.depth()).unwrap_or(i64::MAX);

        sqlx::query(
            "INSERT INTO conversation_state (
                conversation_id,
                stack_json,
                active_task,
                depth,
                turn_count,
                updated_at
             ) VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(conversation_id) DO UPDATE SET
                stack_json = excluded.stack_json,
                active_task = excluded.active_task,
                depth = excluded.depth,
                turn_count = excluded.turn_count,
                updated_at = excluded.updated_at",
        )
        .bind(state.conversation_id.as_str())
        .bind(stack_json)
        .bind(state.active_task().map(|task| task.as_str()))
        .bind(depth)
        .bind(turn_count)
        .bind(state.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        debug!(
            conversation_id = %state.conversation_id,
            depth = state.stack.depth(),
            "conversation state saved"
        );
        Ok(())
    }
}

#[async_trait]
impl ConversationStore for SqlConversationStore {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    async fn load(&self, id: &ConversationId) -> Result<Option<ConversationState>, StoreError> {
        Ok(self.find(id).await?)
    }

    async fn save(&self, state: &ConversationState) -> Result<(), StoreError> {
        Ok(self.upsert(state).await?)
    }

    async fn remove(&self, id: &ConversationId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM conversation_state WHERE conversation_id = ?")
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(RepositoryError::from)?;
        Ok(result.rows_affected() > 0)
    }

    async fn conversation_ids(&self) -> Result<Vec<ConversationId>, StoreError> {
        let rows = sqlx::query(
            "SELECT conversation_id FROM conversation_state ORDER BY conversation_id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        rows.into_iter()
            .map(|row| {
                row.try_get::<String, _>("conversation_id")
                    .map(ConversationId)
                    .map_err(|error| RepositoryError::from(error).into())
            })
            .collect()
    }
}

fn state_from_row(row: SqliteRow) -> Result<ConversationState, RepositoryError> {
    let conversation_id: String = row.try_get("conversation_id")?;
    let decode_error = |message: String| RepositoryError::Decode {
        conversation_id: conversation_id.clone(),
        message,
    };

    let stack_json: String = row.try_get("stack_json")?;
    let stack = serde_json::from_str::<DialogStack>(&stack_json)
        .map_err(|error| decode_error(format!("stack_json: {error}")))?;
    let turn_count = u64::try_from(row.try_get::<i64, _>("turn_count")?)
        .map_err(|error| decode_error(format!("turn_count: {error}")))?;
    let updated_at_raw: String = row.try_get("updated_at")?;
    let updated_at = DateTime::parse_from_rfc3339(&updated_at_raw)
        .map(|timestamp| timestamp.with_timezone(&Utc))
        .map_err(|error| decode_error(format!("updated_at `{updated_at_raw}`: {error}")))?;

    Ok(ConversationState {
        conversation_id: ConversationId(conversation_id),
        stack,
        turn_count,
        updated_at,
    })
}
