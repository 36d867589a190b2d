use chrono::{DateTime, Utc};
use sqlx::Row;

use alexandra_core::domain::session::SessionId;

use super::{EmailIndexRepository, RepositoryError};
use crate::DbPool;

/// Email to session mapping used to recover a premium session on another device.
pub struct SqlEmailIndexRepository {
    pool: DbPool,
}

impl SqlEmailIndexRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl EmailIndexRepository for SqlEmailIndexRepository {
    async fn link(
        &self,
        email: &str,
        session_id: &SessionId,
        linked_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO email_index (email, session_id, linked_at)
             VALUES (?, ?, ?)
             ON CONFLICT(email) DO UPDATE SET
                session_id = excluded.session_id,
                linked_at = excluded.linked_at",
        )
        .bind(email)
        .bind(session_id.as_str())
        .bind(linked_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn lookup(&self, email: &str) -> Result<Option<SessionId>, RepositoryError> {
        let row = sqlx::query("SELECT session_id FROM email_index WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| row.try_get::<String, _>("session_id").map(SessionId))
            .transpose()
            .map_err(RepositoryError::from)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use alexandra_core::domain::session::SessionId;

    use super::SqlEmailIndexRepository;
    use crate::migrations;
    use crate::repositories::EmailIndexRepository;
    use crate::{connect_with_settings, DbPool};

    #[tokio::test]
    async fn relinking_an_email_points_to_latest_session() {
        let pool = setup_pool().await;
        let repo = SqlEmailIndexRepository::new(pool.clone());

        repo.link("ana@example.com", &SessionId::from("phone"), Utc::now()).await.expect("link");
        repo.link("ana@example.com", &SessionId::from("laptop"), Utc::now()).await.expect("relink");

        assert_eq!(
            repo.lookup("ana@example.com").await.expect("lookup"),
            Some(SessionId::from("laptop"))
        );
        assert_eq!(repo.lookup("nobody@example.com").await.expect("lookup"), None);

        pool.close().await;
    }

    async fn setup_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect test pool");
        migrations::run_pending(&pool).await.expect("run migrations");
        pool
    }
}
