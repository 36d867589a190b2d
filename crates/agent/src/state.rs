//! Explicit owner of per-session conversation state.
//!
//! States are created lazily on first reference, cached in-process and written
//! through to the repository on every mutation. The cache and the lock registry
//! support idle eviction; durable records survive eviction.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::info;

use alexandra_core::errors::{ApplicationError, DomainError};
use alexandra_core::{
    ConversationState, Course, OrderLine, Phase, PhaseEvent, PhaseMachine, PhaseTransition,
    SessionId, SignalDetector, SignalKind,
};
use alexandra_db::repositories::ConversationStateRepository;

use crate::locks::SessionLocks;
use crate::storage::{storage_failure, tolerate_corrupt, Store};

struct CachedState {
    state: ConversationState,
    touched: Instant,
}

/// State after an utterance was folded in, plus the signals it raised.
#[derive(Clone, Debug, PartialEq)]
pub struct ObservedUtterance {
    pub state: ConversationState,
    pub signals: Vec<SignalKind>,
}

pub struct ConversationStateStore {
    repository: Arc<dyn ConversationStateRepository>,
    cache: RwLock<HashMap<String, CachedState>>,
    locks: SessionLocks,
    detector: SignalDetector,
    machine: PhaseMachine,
}

impl ConversationStateStore {
    pub fn new(repository: Arc<dyn ConversationStateRepository>) -> Self {
        Self::with_detector(repository, SignalDetector::default())
    }

    pub fn with_detector(
        repository: Arc<dyn ConversationStateRepository>,
        detector: SignalDetector,
    ) -> Self {
        Self {
            repository,
            cache: RwLock::new(HashMap::new()),
            locks: SessionLocks::new(),
            detector,
            machine: PhaseMachine::new(),
        }
    }

    pub async fn get_or_create(
        &self,
        session_id: &SessionId,
    ) -> Result<ConversationState, ApplicationError> {
        let _guard = self.locks.acquire(session_id).await;
        self.load_or_create(session_id, Utc::now()).await
    }

    /// Full overwrite of the stored record with `last_activity` set to now.
    pub async fn update(
        &self,
        mut state: ConversationState,
    ) -> Result<ConversationState, ApplicationError> {
        let _guard = self.locks.acquire(&state.session_id).await;
        state.last_activity = Utc::now();
        self.store(&state).await?;
        Ok(state)
    }

    pub async fn set_phase(
        &self,
        session_id: &SessionId,
        phase: Phase,
    ) -> Result<PhaseTransition, ApplicationError> {
        let machine = &self.machine;
        let (_, transition) = self
            .mutate(session_id, |state, now| {
                machine
                    .apply(state, PhaseEvent::Set(phase), now)
                    .map_err(|error| ApplicationError::from(DomainError::from(error)))
            })
            .await?;

        if transition.changed() {
            info!(
                event_name = "session.phase_changed",
                session_id = %session_id,
                from = transition.from.as_str(),
                to = transition.to.as_str(),
                "conversation phase set"
            );
        }
        Ok(transition)
    }

    /// Runs signal detection on `text` and persists the result.
    pub async fn observe_utterance(
        &self,
        session_id: &SessionId,
        text: &str,
    ) -> Result<ObservedUtterance, ApplicationError> {
        let detector = &self.detector;
        let (state, signals) = self
            .mutate(session_id, |state, now| Ok(detector.apply_at(text, state, now)))
            .await?;
        Ok(ObservedUtterance { state, signals })
    }

    pub async fn add_order_line(
        &self,
        session_id: &SessionId,
        course: Course,
        line: OrderLine,
    ) -> Result<ConversationState, ApplicationError> {
        if line.item.trim().is_empty() {
            return Err(ApplicationError::invalid_input("order line needs an item name"));
        }
        if line.quantity == 0 {
            return Err(ApplicationError::invalid_input("order line quantity must be positive"));
        }
        if line.unit_price.is_sign_negative() {
            return Err(ApplicationError::invalid_input("order line price cannot be negative"));
        }
        let Some(subtotal) = line.subtotal() else {
            return Err(ApplicationError::invalid_input("order line total is out of range"));
        };

        let (state, ()) = self
            .mutate(session_id, |state, _| {
                if state.order.total().and_then(|total| total.checked_add(subtotal)).is_none() {
                    return Err(ApplicationError::invalid_input("order total is out of range"));
                }
                state.order.add(course, line);
                Ok(())
            })
            .await?;
        Ok(state)
    }

    pub async fn record_suggestion(
        &self,
        session_id: &SessionId,
        item: &str,
        accepted: bool,
    ) -> Result<ConversationState, ApplicationError> {
        let (state, ()) = self
            .mutate(session_id, |state, now| {
                state.record_suggestion(item, accepted, now);
                Ok(())
            })
            .await?;
        Ok(state)
    }

    /// Drops cached states and lock slots untouched for at least `idle`.
    pub async fn evict_idle(&self, idle: Duration) -> usize {
        let mut cache = self.cache.write().await;
        let before = cache.len();
        cache.retain(|_, cached| cached.touched.elapsed() < idle);
        let evicted = before - cache.len();
        drop(cache);

        self.locks.evict_idle(idle);
        evicted
    }

    pub async fn cached_sessions(&self) -> usize {
        self.cache.read().await.len()
    }

    async fn mutate<T>(
        &self,
        session_id: &SessionId,
        apply: impl FnOnce(&mut ConversationState, DateTime<Utc>) -> Result<T, ApplicationError>,
    ) -> Result<(ConversationState, T), ApplicationError> {
        let _guard = self.locks.acquire(session_id).await;
        let now = Utc::now();
        let mut state = self.load_or_create(session_id, now).await?;

        let outcome = apply(&mut state, now)?;
        state.last_activity = now;
        self.store(&state).await?;
        Ok((state, outcome))
    }

    async fn load_or_create(
        &self,
        session_id: &SessionId,
        now: DateTime<Utc>,
    ) -> Result<ConversationState, ApplicationError> {
        if let Some(cached) = self.cache.read().await.get(session_id.as_str()) {
            return Ok(cached.state.clone());
        }

        let found = tolerate_corrupt(
            Store::ConversationState,
            session_id.as_str(),
            self.repository.find(session_id).await,
        )?;

        match found {
            Some(state) => {
                self.remember(&state).await;
                Ok(state)
            }
            None => {
                let state = ConversationState::new(session_id.clone(), now);
                self.store(&state).await?;
                info!(
                    event_name = "session.state.created",
                    session_id = %session_id,
                    phase = state.phase.as_str(),
                    "conversation state created"
                );
                Ok(state)
            }
        }
    }

    async fn store(&self, state: &ConversationState) -> Result<(), ApplicationError> {
        self.repository
            .save(state)
            .await
            .map_err(|error| {
                storage_failure(Store::ConversationState, state.session_id.as_str(), error)
            })?;
        self.remember(state).await;
        Ok(())
    }

    async fn remember(&self, state: &ConversationState) {
        self.cache.write().await.insert(
            state.session_id.as_str().to_owned(),
            CachedState { state: state.clone(), touched: Instant::now() },
        );
    }
}
