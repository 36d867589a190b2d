use sqlx::Row;

use alexandra_core::domain::conversation::ConversationState;
use alexandra_core::domain::session::SessionId;

use super::{decode_json, encode_json, ConversationStateRepository, RepositoryError};
use crate::DbPool;

pub struct SqlConversationStateRepository {
    pool: DbPool,
}

impl SqlConversationStateRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ConversationStateRepository for SqlConversationStateRepository {
    async fn find(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<ConversationState>, RepositoryError> {
        let row = sqlx::query(
            "SELECT payload_json
             FROM conversation_state
             WHERE session_id = ?",
        )
        .bind(session_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let payload: String = row.try_get("payload_json")?;
        let state: ConversationState = decode_json("payload_json", &payload)?;
        if state.session_id != *session_id {
            return Err(RepositoryError::Decode(format!(
                "conversation payload belongs to `{}`, expected `{session_id}`",
                state.session_id
            )));
        }
        Ok(Some(state))
    }

    async fn save(&self, state: &ConversationState) -> Result<(), RepositoryError> {
        let payload = encode_json("payload_json", state)?;

        sqlx::query(
            "INSERT INTO conversation_state (session_id, phase, payload_json, updated_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(session_id) DO UPDATE SET
                phase = excluded.phase,
                payload_json = excluded.payload_json,
                updated_at = excluded.updated_at",
        )
        .bind(state.session_id.as_str())
        .bind(state.phase.as_str())
        .bind(payload)
        .bind(state.last_activity.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
