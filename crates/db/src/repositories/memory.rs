use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use alexandra_core::domain::conversation::ConversationState;
use alexandra_core::domain::memory::SessionData;
use alexandra_core::domain::session::SessionId;
use alexandra_core::domain::usage::{SessionUsage, UsageItem};

use super::{
    ConversationStateRepository, EmailIndexRepository, RepositoryError, SessionDataRepository,
    UsageRepository,
};

#[derive(Default)]
pub struct InMemoryConversationStateRepository {
    states: RwLock<HashMap<String, ConversationState>>,
}

#[async_trait::async_trait]
impl ConversationStateRepository for InMemoryConversationStateRepository {
    async fn find(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<ConversationState>, RepositoryError> {
        let states = self.states.read().await;
        Ok(states.get(session_id.as_str()).cloned())
    }

    async fn save(&self, state: &ConversationState) -> Result<(), RepositoryError> {
        let mut states = self.states.write().await;
        states.insert(state.session_id.0.clone(), state.clone());
        Ok(())
    }
}

/// Keeps the header and an append-only history per session, like the SQL tables.
#[derive(Default)]
pub struct InMemoryUsageRepository {
    usage: RwLock<HashMap<String, SessionUsage>>,
}

#[async_trait::async_trait]
impl UsageRepository for InMemoryUsageRepository {
    async fn find(&self, session_id: &SessionId) -> Result<Option<SessionUsage>, RepositoryError> {
        let usage = self.usage.read().await;
        Ok(usage.get(session_id.as_str()).cloned())
    }

    async fn persist(
        &self,
        usage: &SessionUsage,
        new_items: &[UsageItem],
    ) -> Result<(), RepositoryError> {
        let mut stored = self.usage.write().await;
        let entry = stored
            .entry(usage.session_id.0.clone())
            .or_insert_with(|| SessionUsage { history: Vec::new(), ..usage.clone() });

        let history = std::mem::take(&mut entry.history);
        *entry = SessionUsage { history, ..usage.clone() };
        entry.history.extend(new_items.iter().cloned());
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemorySessionDataRepository {
    sessions: RwLock<HashMap<String, SessionData>>,
}

#[async_trait::async_trait]
impl SessionDataRepository for InMemorySessionDataRepository {
    async fn find(&self, session_id: &SessionId) -> Result<Option<SessionData>, RepositoryError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(session_id.as_str()).cloned())
    }

    async fn save(&self, data: &SessionData) -> Result<(), RepositoryError> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(data.session_id.0.clone(), data.clone());
        Ok(())
    }

    async fn delete(&self, session_id: &SessionId) -> Result<bool, RepositoryError> {
        let mut sessions = self.sessions.write().await;
        Ok(sessions.remove(session_id.as_str()).is_some())
    }
}

#[derive(Default)]
pub struct InMemoryEmailIndexRepository {
    index: RwLock<HashMap<String, SessionId>>,
}

#[async_trait::async_trait]
impl EmailIndexRepository for InMemoryEmailIndexRepository {
    async fn link(
        &self,
        email: &str,
        session_id: &SessionId,
        _linked_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut index = self.index.write().await;
        index.insert(email.to_string(), session_id.clone());
        Ok(())
    }

    async fn lookup(&self, email: &str) -> Result<Option<SessionId>, RepositoryError> {
        let index = self.index.read().await;
        Ok(index.get(email).cloned())
    }
}
