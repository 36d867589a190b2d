use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use alexandra_core::domain::conversation::ConversationState;
use alexandra_core::domain::memory::SessionData;
use alexandra_core::domain::session::SessionId;
use alexandra_core::domain::usage::{SessionUsage, UsageItem};

pub mod conversation;
pub mod email_index;
pub mod memory;
pub mod tourist;
pub mod usage;

pub use conversation::SqlConversationStateRepository;
pub use email_index::SqlEmailIndexRepository;
pub use memory::{
    InMemoryConversationStateRepository, InMemoryEmailIndexRepository,
    InMemorySessionDataRepository, InMemoryUsageRepository,
};
pub use tourist::SqlSessionDataRepository;
pub use usage::SqlUsageRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl RepositoryError {
    /// True when the stored record is unreadable but the medium itself works.
    pub fn is_corrupt_record(&self) -> bool {
        matches!(self, Self::Decode(_))
    }
}

#[async_trait]
pub trait ConversationStateRepository: Send + Sync {
    async fn find(&self, session_id: &SessionId)
        -> Result<Option<ConversationState>, RepositoryError>;
    async fn save(&self, state: &ConversationState) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait UsageRepository: Send + Sync {
    async fn find(&self, session_id: &SessionId) -> Result<Option<SessionUsage>, RepositoryError>;

    /// Upserts the usage header and appends `new_items` to the history atomically.
    async fn persist(
        &self,
        usage: &SessionUsage,
        new_items: &[UsageItem],
    ) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait SessionDataRepository: Send + Sync {
    async fn find(&self, session_id: &SessionId) -> Result<Option<SessionData>, RepositoryError>;
    async fn save(&self, data: &SessionData) -> Result<(), RepositoryError>;
    async fn delete(&self, session_id: &SessionId) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait EmailIndexRepository: Send + Sync {
    async fn link(
        &self,
        email: &str,
        session_id: &SessionId,
        linked_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;
    async fn lookup(&self, email: &str) -> Result<Option<SessionId>, RepositoryError>;
}

pub(crate) fn parse_timestamp(column: &str, value: String) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value).map(|timestamp| timestamp.with_timezone(&Utc)).map_err(
        |error| {
            RepositoryError::Decode(format!("invalid timestamp in `{column}`: `{value}` ({error})"))
        },
    )
}

pub(crate) fn parse_u32(column: &str, value: i64) -> Result<u32, RepositoryError> {
    u32::try_from(value).map_err(|_| {
        RepositoryError::Decode(format!(
            "invalid value for `{column}` (expected non-negative u32): {value}"
        ))
    })
}

pub(crate) fn decode_json<T: serde::de::DeserializeOwned>(
    column: &str,
    value: &str,
) -> Result<T, RepositoryError> {
    serde_json::from_str(value)
        .map_err(|error| RepositoryError::Decode(format!("invalid json in `{column}`: {error}")))
}

pub(crate) fn encode_json<T: serde::Serialize>(
    column: &str,
    value: &T,
) -> Result<String, RepositoryError> {
    serde_json::to_string(value)
        .map_err(|error| RepositoryError::Decode(format!("could not encode `{column}`: {error}")))
}
