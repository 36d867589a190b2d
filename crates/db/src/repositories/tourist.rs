use sqlx::Row;

use alexandra_core::domain::memory::SessionData;
use alexandra_core::domain::session::SessionId;

use super::{decode_json, encode_json, RepositoryError, SessionDataRepository};
use crate::DbPool;

pub struct SqlSessionDataRepository {
    pool: DbPool,
}

impl SqlSessionDataRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl SessionDataRepository for SqlSessionDataRepository {
    async fn find(&self, session_id: &SessionId) -> Result<Option<SessionData>, RepositoryError> {
        let row = sqlx::query(
            "SELECT payload_json
             FROM tourist_session
             WHERE session_id = ?",
        )
        .bind(session_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            let payload: String = row.try_get("payload_json")?;
            decode_json::<SessionData>("payload_json", &payload)
        })
        .transpose()
    }

    async fn save(&self, data: &SessionData) -> Result<(), RepositoryError> {
        let payload = encode_json("payload_json", data)?;

        sqlx::query(
            "INSERT INTO tourist_session (session_id, tier, email, payload_json, updated_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(session_id) DO UPDATE SET
                tier = excluded.tier,
                email = excluded.email,
                payload_json = excluded.payload_json,
                updated_at = excluded.updated_at",
        )
        .bind(data.session_id.as_str())
        .bind(data.tier.as_str())
        .bind(data.email.as_deref())
        .bind(payload)
        .bind(data.last_interaction.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, session_id: &SessionId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM tourist_session WHERE session_id = ?")
            .bind(session_id.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
