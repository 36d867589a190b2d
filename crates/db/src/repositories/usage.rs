use std::str::FromStr;

use rust_decimal::Decimal;
use sqlx::{sqlite::SqliteRow, Row};

use alexandra_core::domain::session::{SessionId, Tier};
use alexandra_core::domain::usage::{SessionUsage, UsageItem};

use super::{parse_timestamp, parse_u32, RepositoryError, UsageRepository};
use crate::DbPool;

pub struct SqlUsageRepository {
    pool: DbPool,
}

impl SqlUsageRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl UsageRepository for SqlUsageRepository {
    async fn find(&self, session_id: &SessionId) -> Result<Option<SessionUsage>, RepositoryError> {
        let header = sqlx::query(
            "SELECT
                session_id,
                tier,
                created_at,
                last_active,
                total_cost,
                interaction_count
             FROM session_usage
             WHERE session_id = ?",
        )
        .bind(session_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        let Some(header) = header else {
            return Ok(None);
        };

        let history = sqlx::query(
            "SELECT occurred_at, service, action, cost, cached
             FROM usage_history
             WHERE session_id = ?
             ORDER BY id ASC",
        )
        .bind(session_id.as_str())
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(item_from_row)
        .collect::<Result<Vec<_>, _>>()?;

        usage_from_row(header, history).map(Some)
    }

    async fn persist(
        &self,
        usage: &SessionUsage,
        new_items: &[UsageItem],
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO session_usage (
                session_id,
                tier,
                created_at,
                last_active,
                total_cost,
                interaction_count
             ) VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(session_id) DO UPDATE SET
                tier = excluded.tier,
                last_active = excluded.last_active,
                total_cost = excluded.total_cost,
                interaction_count = excluded.interaction_count",
        )
        .bind(usage.session_id.as_str())
        .bind(usage.tier.as_str())
        .bind(usage.created_at.to_rfc3339())
        .bind(usage.last_active.to_rfc3339())
        .bind(usage.total_cost.to_string())
        .bind(i64::from(usage.interaction_count))
        .execute(&mut *tx)
        .await?;

        for item in new_items {
            sqlx::query(
                "INSERT INTO usage_history (session_id, occurred_at, service, action, cost, cached)
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(usage.session_id.as_str())
            .bind(item.timestamp.to_rfc3339())
            .bind(&item.service)
            .bind(&item.action)
            .bind(item.cost.to_string())
            .bind(item.cached)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

fn usage_from_row(row: SqliteRow, history: Vec<UsageItem>) -> Result<SessionUsage, RepositoryError> {
    let tier_raw = row.try_get::<String, _>("tier")?;
    let tier = Tier::from_str(&tier_raw).map_err(RepositoryError::Decode)?;

    Ok(SessionUsage {
        session_id: SessionId(row.try_get("session_id")?),
        tier,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        last_active: parse_timestamp("last_active", row.try_get("last_active")?)?,
        total_cost: parse_decimal("total_cost", row.try_get("total_cost")?)?,
        interaction_count: parse_u32("interaction_count", row.try_get("interaction_count")?)?,
        history,
    })
}

fn item_from_row(row: SqliteRow) -> Result<UsageItem, RepositoryError> {
    Ok(UsageItem {
        timestamp: parse_timestamp("occurred_at", row.try_get("occurred_at")?)?,
        service: row.try_get("service")?,
        action: row.try_get("action")?,
        cost: parse_decimal("cost", row.try_get("cost")?)?,
        cached: row.try_get("cached")?,
    })
}

fn parse_decimal(column: &str, value: String) -> Result<Decimal, RepositoryError> {
    Decimal::from_str(&value).map_err(|error| {
        RepositoryError::Decode(format!("invalid decimal in `{column}`: `{value}` ({error})"))
    })
}
