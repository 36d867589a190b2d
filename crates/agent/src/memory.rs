//! Long-horizon tourist memory: interaction log, learned preferences, places.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use alexandra_core::errors::ApplicationError;
use alexandra_core::memory::LearnedPreferences;
use alexandra_core::{
    ContextRenderer, PlaceVisit, PreferenceLearner, Role, SessionData, SessionId, Tier,
};
use alexandra_db::repositories::SessionDataRepository;

use crate::locks::SessionLocks;
use crate::storage::{storage_failure, tolerate_corrupt, Store};

pub struct TouristMemory {
    repository: Arc<dyn SessionDataRepository>,
    learner: PreferenceLearner,
    renderer: ContextRenderer,
    locks: SessionLocks,
}

impl TouristMemory {
    pub fn new(repository: Arc<dyn SessionDataRepository>) -> Self {
        Self {
            repository,
            learner: PreferenceLearner::new(),
            renderer: ContextRenderer::new(),
            locks: SessionLocks::new(),
        }
    }

    /// Current record, or a fresh one when none is stored. Nothing is written.
    pub async fn load(&self, session_id: &SessionId) -> Result<SessionData, ApplicationError> {
        let _guard = self.locks.acquire(session_id).await;
        self.load_locked(session_id, Utc::now()).await
    }

    /// Appends to the log. Only guest messages feed the preference learner.
    pub async fn add_interaction(
        &self,
        session_id: &SessionId,
        role: Role,
        content: &str,
        intent: Option<&str>,
    ) -> Result<LearnedPreferences, ApplicationError> {
        let learner = &self.learner;
        let learned = self
            .mutate(session_id, |data, now| {
                let learned = match role {
                    Role::User => learner.learn(content, &mut data.preferences),
                    Role::Assistant | Role::System => LearnedPreferences::default(),
                };
                data.push_interaction(role, content, intent.map(str::to_owned), now);
                learned
            })
            .await?;

        if !learned.is_empty() {
            debug!(
                event_name = "memory.preferences_learned",
                session_id = %session_id,
                food_types = ?learned.food_types,
                interests = ?learned.interests,
                "preferences updated from message"
            );
        }
        Ok(learned)
    }

    pub async fn update_place_status(
        &self,
        session_id: &SessionId,
        place: &str,
        status: PlaceVisit,
    ) -> Result<(), ApplicationError> {
        let place = place.trim();
        if place.is_empty() {
            return Err(ApplicationError::invalid_input("place name is required"));
        }

        self.mutate(session_id, |data, now| data.mark_place(place, status, now)).await
    }

    /// Fixed-layout summary for the reasoning prompt.
    pub async fn context(&self, session_id: &SessionId) -> Result<String, ApplicationError> {
        let data = self.load(session_id).await?;
        Ok(self.renderer.render(&data))
    }

    pub async fn set_email(&self, session_id: &SessionId, email: &str) -> Result<(), ApplicationError> {
        self.mutate(session_id, |data, _| data.email = Some(email.to_owned())).await
    }

    pub async fn set_tier(&self, session_id: &SessionId, tier: Tier) -> Result<(), ApplicationError> {
        self.mutate(session_id, |data, _| data.tier = tier).await
    }

    pub async fn delete_session(&self, session_id: &SessionId) -> Result<bool, ApplicationError> {
        let _guard = self.locks.acquire(session_id).await;
        let deleted = self
            .repository
            .delete(session_id)
            .await
            .map_err(|error| storage_failure(Store::Memory, session_id.as_str(), error))?;

        info!(
            event_name = "memory.session_deleted",
            session_id = %session_id,
            deleted,
            "memory erased"
        );
        Ok(deleted)
    }

    pub fn evict_idle(&self, idle: Duration) -> usize {
        self.locks.evict_idle(idle)
    }

    async fn mutate<T>(
        &self,
        session_id: &SessionId,
        apply: impl FnOnce(&mut SessionData, DateTime<Utc>) -> T,
    ) -> Result<T, ApplicationError> {
        let _guard = self.locks.acquire(session_id).await;
        let now = Utc::now();
        let mut data = self.load_locked(session_id, now).await?;

        let outcome = apply(&mut data, now);
        self.repository
            .save(&data)
            .await
            .map_err(|error| storage_failure(Store::Memory, session_id.as_str(), error))?;
        Ok(outcome)
    }

    async fn load_locked(
        &self,
        session_id: &SessionId,
        now: DateTime<Utc>,
    ) -> Result<SessionData, ApplicationError> {
        let found = tolerate_corrupt(
            Store::Memory,
            session_id.as_str(),
            self.repository.find(session_id).await,
        )?;
        Ok(found.unwrap_or_else(|| SessionData::new(session_id.clone(), now)))
    }
}
