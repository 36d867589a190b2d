use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Timelike, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use alexandra_core::config::AppConfig;
use alexandra_core::errors::ApplicationError;
use alexandra_core::ledger::REASONING_SERVICE;
use alexandra_core::{
    AdvisorEnvironment, FixedWeather, FlowAdvisor, FlowHint, IntentOptimizer, OptimizerDecision,
    Phase, QuotaPolicy, QuotaStatus, Role, SessionId, SignalKind, Tier, TimeOfDayWeather,
    UsageStats, WeatherProvider, WeatherReport,
};
use alexandra_db::repositories::{
    ConversationStateRepository, EmailIndexRepository, InMemoryConversationStateRepository,
    InMemoryEmailIndexRepository, InMemorySessionDataRepository, InMemoryUsageRepository,
    SessionDataRepository, SqlConversationStateRepository, SqlEmailIndexRepository,
    SqlSessionDataRepository, SqlUsageRepository, UsageRepository,
};
use alexandra_db::DbPool;

use crate::gate::{GateDecision, RateGate};
use crate::ledger::UsageLedger;
use crate::locks::SessionLocks;
use crate::memory::TouristMemory;
use crate::metrics::{MetricsSnapshot, RuntimeMetrics};
use crate::state::ConversationStateStore;
use crate::storage::{storage_failure, tolerate_corrupt, Store};

const WEATHER_SERVICE: &str = "weather";
const WEATHER_ACTION: &str = "current_weather";
const REASONING_ACTION: &str = "completion";

/// Storage backing the three session aggregates and the email index.
#[derive(Clone)]
pub struct Repositories {
    pub conversation: Arc<dyn ConversationStateRepository>,
    pub usage: Arc<dyn UsageRepository>,
    pub sessions: Arc<dyn SessionDataRepository>,
    pub email_index: Arc<dyn EmailIndexRepository>,
}

impl Repositories {
    pub fn sql(pool: DbPool) -> Self {
        Self {
            conversation: Arc::new(SqlConversationStateRepository::new(pool.clone())),
            usage: Arc::new(SqlUsageRepository::new(pool.clone())),
            sessions: Arc::new(SqlSessionDataRepository::new(pool.clone())),
            email_index: Arc::new(SqlEmailIndexRepository::new(pool)),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            conversation: Arc::new(InMemoryConversationStateRepository::default()),
            usage: Arc::new(InMemoryUsageRepository::default()),
            sessions: Arc::new(InMemorySessionDataRepository::default()),
            email_index: Arc::new(InMemoryEmailIndexRepository::default()),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RuntimeSettings {
    pub default_city: String,
    pub quota: QuotaPolicy,
    pub idle_eviction: Duration,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            default_city: "Madrid".to_string(),
            quota: QuotaPolicy::default(),
            idle_eviction: Duration::from_secs(3_600),
        }
    }
}

impl RuntimeSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            default_city: config.weather.default_city.clone(),
            quota: QuotaPolicy::new(config.billing.free_interaction_cap),
            idle_eviction: config.idle_eviction(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnRequest {
    pub session_id: SessionId,
    pub text: String,
    pub last_response: Option<String>,
    pub city: Option<String>,
}

impl TurnRequest {
    pub fn new(session_id: impl Into<SessionId>, text: impl Into<String>) -> Self {
        Self { session_id: session_id.into(), text: text.into(), last_response: None, city: None }
    }

    pub fn with_last_response(mut self, last_response: impl Into<String>) -> Self {
        self.last_response = Some(last_response.into());
        self
    }

    pub fn with_city(mut self, city: impl Into<String>) -> Self {
        self.city = Some(city.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TurnReport {
    pub session_id: SessionId,
    pub correlation_id: String,
    pub phase: Phase,
    pub signals: Vec<SignalKind>,
    pub hint: FlowHint,
    pub decision: OptimizerDecision,
    pub weather: WeatherReport,
    pub quota: QuotaStatus,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TurnOutcome {
    Blocked { correlation_id: String, decision: GateDecision },
    Completed(TurnReport),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UpgradeReceipt {
    pub session_id: SessionId,
    pub email: String,
    pub tier: Tier,
    /// False when the ledger was already premium.
    pub upgraded: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecoveryOutcome {
    Found { session_id: SessionId, tier: Tier },
    NotFound,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct EvictionReport {
    pub states: usize,
    pub locks: usize,
}

/// Chains one utterance through gate, state, advisor, optimizer, memory and ledger.
pub struct SessionRuntime {
    states: ConversationStateStore,
    ledger: Arc<UsageLedger>,
    memory: TouristMemory,
    gate: RateGate,
    email_index: Arc<dyn EmailIndexRepository>,
    weather: Arc<dyn WeatherProvider>,
    fallback_weather: TimeOfDayWeather,
    advisor: FlowAdvisor,
    optimizer: IntentOptimizer,
    metrics: RuntimeMetrics,
    /// Held from the quota check until the turn is booked.
    turns: SessionLocks,
    default_city: String,
    idle_eviction: Duration,
}

impl SessionRuntime {
    pub fn new(
        repositories: Repositories,
        weather: Arc<dyn WeatherProvider>,
        settings: RuntimeSettings,
    ) -> Self {
        let ledger = Arc::new(UsageLedger::new(repositories.usage, settings.quota));
        Self {
            states: ConversationStateStore::new(repositories.conversation),
            gate: RateGate::new(Arc::clone(&ledger)),
            ledger,
            memory: TouristMemory::new(repositories.sessions),
            email_index: repositories.email_index,
            weather,
            fallback_weather: TimeOfDayWeather::new(),
            advisor: FlowAdvisor::new(),
            optimizer: IntentOptimizer::new(),
            metrics: RuntimeMetrics::default(),
            turns: SessionLocks::new(),
            default_city: settings.default_city,
            idle_eviction: settings.idle_eviction,
        }
    }

    /// SQL-backed runtime; a configured fixed temperature replaces the time-of-day provider.
    pub fn from_config(config: &AppConfig, pool: DbPool) -> Self {
        let weather: Arc<dyn WeatherProvider> = match config.weather.fixed_temperature_c {
            Some(temperature_c) => Arc::new(FixedWeather::new(temperature_c)),
            None => Arc::new(TimeOfDayWeather::new()),
        };
        Self::new(Repositories::sql(pool), weather, RuntimeSettings::from_config(config))
    }

    pub fn states(&self) -> &ConversationStateStore {
        &self.states
    }

    pub fn ledger(&self) -> &UsageLedger {
        &self.ledger
    }

    pub fn memory(&self) -> &TouristMemory {
        &self.memory
    }

    pub fn gate(&self) -> &RateGate {
        &self.gate
    }

    pub fn optimizer(&self) -> &IntentOptimizer {
        &self.optimizer
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub async fn handle_turn(&self, request: TurnRequest) -> Result<TurnOutcome, ApplicationError> {
        let session_id = &request.session_id;
        if session_id.is_blank() {
            return Err(ApplicationError::invalid_input("session id is required"));
        }
        let correlation_id = Uuid::new_v4().to_string();
        let _turn = self.turns.acquire(session_id).await;

        let gate = self.gate.check(session_id).await?;
        if !gate.allowed() {
            self.metrics.record_blocked();
            info!(
                event_name = "runtime.turn_blocked",
                correlation_id = %correlation_id,
                session_id = %session_id,
                reason_code = gate.reason_code().unwrap_or_default(),
                "turn blocked by quota"
            );
            return Ok(TurnOutcome::Blocked { correlation_id, decision: gate });
        }

        let text = self.optimizer.sanitize(&request.text);
        let observed = self.states.observe_utterance(session_id, &text).await?;

        let now = Utc::now();
        let city = request
            .city
            .as_deref()
            .map(str::trim)
            .filter(|city| !city.is_empty())
            .unwrap_or(&self.default_city);
        let weather = self.current_weather(city, now, &correlation_id).await;

        let environment = AdvisorEnvironment::at(weather.temperature_c, now.hour(), now);
        let hint = self.advisor.suggest(&observed.state, &environment);
        let decision = self.optimizer.classify_and_optimize(&text, request.last_response.as_deref());

        let intent = Some(decision.intent.as_str());
        if !text.trim().is_empty() {
            self.memory.add_interaction(session_id, Role::User, &text, intent).await?;
        }
        if let Some(reply) = decision.suggested_response.as_deref() {
            self.memory.add_interaction(session_id, Role::Assistant, reply, intent).await?;
        }

        self.ledger.record_usage(session_id, WEATHER_SERVICE, WEATHER_ACTION, None, false).await?;
        self.ledger
            .record_usage(session_id, REASONING_SERVICE, REASONING_ACTION, None, decision.bypass)
            .await?;
        let quota = self.ledger.check_limit(session_id).await?;

        self.metrics.record_turn(decision.bypass);
        info!(
            event_name = "runtime.turn_completed",
            correlation_id = %correlation_id,
            session_id = %session_id,
            phase = observed.state.phase.as_str(),
            intent = decision.intent.as_str(),
            bypass = decision.bypass,
            hint = hint.action.as_str(),
            "turn completed"
        );

        Ok(TurnOutcome::Completed(TurnReport {
            session_id: session_id.clone(),
            correlation_id,
            phase: observed.state.phase,
            signals: observed.signals,
            hint,
            decision,
            weather,
            quota,
        }))
    }

    /// Links the email, marks memory and ledger premium and indexes the email.
    pub async fn complete_upgrade(
        &self,
        session_id: &SessionId,
        email: &str,
    ) -> Result<UpgradeReceipt, ApplicationError> {
        if session_id.is_blank() || session_id.is_anonymous() {
            return Err(ApplicationError::invalid_input("an identified session is required"));
        }
        let email = normalize_email(email)?;

        self.memory.set_email(session_id, &email).await?;
        self.memory.set_tier(session_id, Tier::Premium).await?;
        let upgraded = self.ledger.upgrade_tier(session_id).await?;
        self.email_index
            .link(&email, session_id, Utc::now())
            .await
            .map_err(|error| storage_failure(Store::EmailIndex, session_id.as_str(), error))?;

        info!(
            event_name = "runtime.upgrade_completed",
            session_id = %session_id,
            upgraded,
            "premium upgrade completed"
        );
        Ok(UpgradeReceipt { session_id: session_id.clone(), email, tier: Tier::Premium, upgraded })
    }

    pub async fn recover_session(&self, email: &str) -> Result<RecoveryOutcome, ApplicationError> {
        let email = normalize_email(email)?;
        let lookup = self.email_index.lookup(&email).await;
        let Some(session_id) = tolerate_corrupt(Store::EmailIndex, "email", lookup)? else {
            return Ok(RecoveryOutcome::NotFound);
        };

        let tier = self.memory.load(&session_id).await?.tier;
        info!(
            event_name = "runtime.session_recovered",
            session_id = %session_id,
            tier = tier.as_str(),
            "session recovered"
        );
        Ok(RecoveryOutcome::Found { session_id, tier })
    }

    /// Erases tourist memory. The usage ledger is an audit trail and is kept.
    pub async fn forget(&self, session_id: &SessionId) -> Result<bool, ApplicationError> {
        if session_id.is_blank() {
            return Err(ApplicationError::invalid_input("session id is required"));
        }
        self.memory.delete_session(session_id).await
    }

    pub async fn usage_stats(&self, session_id: &SessionId) -> Result<UsageStats, ApplicationError> {
        self.ledger.usage_stats(session_id).await
    }

    pub async fn evict_idle(&self, idle: Duration) -> EvictionReport {
        let states = self.states.evict_idle(idle).await;
        let locks = self.turns.evict_idle(idle)
            + self.ledger.evict_idle(idle)
            + self.memory.evict_idle(idle);
        if states > 0 || locks > 0 {
            info!(event_name = "runtime.sessions_evicted", states, locks, "idle sessions evicted");
        }
        EvictionReport { states, locks }
    }

    /// Sweeps entries idle for longer than the configured threshold.
    pub async fn evict_expired(&self) -> EvictionReport {
        self.evict_idle(self.idle_eviction).await
    }

    async fn current_weather(
        &self,
        city: &str,
        now: DateTime<Utc>,
        correlation_id: &str,
    ) -> WeatherReport {
        match self.weather.current(city, now).await {
            Ok(report) => report,
            Err(error) => {
                warn!(
                    event_name = "runtime.weather_degraded",
                    correlation_id,
                    city,
                    error = %error,
                    "weather provider failed; using time-of-day estimate"
                );
                self.fallback_weather.report_for_hour(city, now.hour())
            }
        }
    }
}

fn normalize_email(email: &str) -> Result<String, ApplicationError> {
    let email = email.trim().to_lowercase();
    if email.is_empty() {
        return Err(ApplicationError::invalid_input("email is required"));
    }
    if !email.contains('@') {
        return Err(ApplicationError::invalid_input("email must contain '@'"));
    }
    Ok(email)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use rust_decimal::Decimal;

    use alexandra_core::environment::WeatherError;
    use alexandra_db::{connect_with_settings, migrations};
    use alexandra_core::errors::{ApplicationError, DomainError};
    use alexandra_core::{
        FixedWeather, FlowAction, Intent, Phase, QuotaPolicy, SessionId, Tier, Urgency,
        WeatherProvider, WeatherReport,
    };

    use super::{
        EvictionReport, RecoveryOutcome, Repositories, RuntimeSettings, SessionRuntime,
        TurnOutcome, TurnReport, TurnRequest,
    };

    fn runtime(temperature_c: f64, cap: u32) -> SessionRuntime {
        SessionRuntime::new(
            Repositories::in_memory(),
            Arc::new(FixedWeather::new(temperature_c)),
            RuntimeSettings { quota: QuotaPolicy::new(cap), ..RuntimeSettings::default() },
        )
    }

    fn completed(outcome: TurnOutcome) -> TurnReport {
        match outcome {
            TurnOutcome::Completed(report) => report,
            TurnOutcome::Blocked { decision, .. } => {
                panic!("turn unexpectedly blocked: {decision:?}")
            }
        }
    }

    #[tokio::test]
    async fn greeting_is_bypassed_and_not_counted() {
        let runtime = runtime(20.0, 30);
        let report = completed(
            runtime.handle_turn(TurnRequest::new("tourist-1", "Hola")).await.expect("turn"),
        );

        assert!(report.decision.bypass);
        assert_eq!(report.decision.intent, Intent::Greeting);
        assert_eq!(report.quota.interaction_count, 0);
        assert_eq!(report.weather.city, "Madrid");

        let usage = runtime.ledger().usage(&SessionId::from("tourist-1")).await.expect("usage");
        assert_eq!(usage.history.len(), 2);
        assert_eq!(usage.total_cost, Decimal::new(1, 4));

        let memory = runtime.memory().load(&SessionId::from("tourist-1")).await.expect("memory");
        assert_eq!(memory.interactions.len(), 2);

        let metrics = runtime.metrics();
        assert_eq!(metrics.turns, 1);
        assert_eq!(metrics.bypassed, 1);
    }

    #[tokio::test]
    async fn planning_request_is_billed_as_reasoning() {
        let runtime = runtime(20.0, 30);
        let request = TurnRequest::new(
            "tourist-2",
            "Quiero un itinerario para tres días en Madrid con museos, tapas y algo de música en vivo por la noche",
        )
        .with_city("Sevilla");

        let report = completed(runtime.handle_turn(request).await.expect("turn"));

        assert!(!report.decision.bypass);
        assert_eq!(report.decision.intent, Intent::HighCost);
        assert_eq!(report.quota.interaction_count, 1);
        assert_eq!(report.quota.remaining, Some(29));
        assert_eq!(report.weather.city, "Sevilla");

        let memory = runtime.memory().load(&SessionId::from("tourist-2")).await.expect("memory");
        assert!(memory.preferences.interests.contains("art"));
        assert_eq!(memory.interactions.len(), 1);
    }

    #[tokio::test]
    async fn bill_request_beats_hot_weather() {
        let runtime = runtime(35.0, 30);
        let report = completed(
            runtime
                .handle_turn(TurnRequest::new("mesa-3", "<b>La cuenta</b>, por favor"))
                .await
                .expect("turn"),
        );

        assert_eq!(report.phase, Phase::Bill);
        assert_eq!(report.hint.action, FlowAction::ProcessBill);
        assert_eq!(report.hint.urgency, Urgency::High);
        assert!(!report.hint.can_skip);
    }

    #[tokio::test]
    async fn hot_greeting_suggests_cold_drink() {
        let runtime = runtime(31.0, 30);
        let report = completed(
            runtime.handle_turn(TurnRequest::new("mesa-4", "Buenas tardes")).await.expect("turn"),
        );

        assert_eq!(report.phase, Phase::Greeting);
        assert_eq!(report.hint.action, FlowAction::WeatherDrink);
    }

    #[tokio::test]
    async fn repeat_echoes_last_response() {
        let runtime = runtime(20.0, 30);
        let request =
            TurnRequest::new("tourist-5", "Cómo").with_last_response("El Prado abre a las 10.");
        let report = completed(runtime.handle_turn(request).await.expect("turn"));

        assert_eq!(report.decision.intent, Intent::Repeat);
        assert_eq!(report.decision.suggested_response.as_deref(), Some("El Prado abre a las 10."));
    }

    #[tokio::test]
    async fn exhausted_free_session_is_blocked() {
        let runtime = runtime(20.0, 2);
        let session = SessionId::from("tourist-6");
        for _ in 0..2 {
            completed(
                runtime
                    .handle_turn(TurnRequest::new(session.clone(), "¿Dónde como paella cerca?"))
                    .await
                    .expect("turn"),
            );
        }

        let outcome = runtime
            .handle_turn(TurnRequest::new(session.clone(), "¿Y de postre?"))
            .await
            .expect("turn");

        match outcome {
            TurnOutcome::Blocked { decision, .. } => {
                assert_eq!(decision.reason_code(), Some("limit_reached"));
            }
            TurnOutcome::Completed(report) => panic!("expected block, got {report:?}"),
        }
        assert_eq!(runtime.metrics().blocked, 1);

        runtime.complete_upgrade(&session, "ana@example.com").await.expect("upgrade");
        let outcome = runtime
            .handle_turn(TurnRequest::new(session, "¿Y de postre?"))
            .await
            .expect("turn");
        assert!(matches!(outcome, TurnOutcome::Completed(_)));
    }

    #[tokio::test]
    async fn upgrade_then_recover_by_email() {
        let runtime = runtime(20.0, 30);
        let session = SessionId::from("phone-session");

        let receipt =
            runtime.complete_upgrade(&session, "  Lucia@Example.com ").await.expect("upgrade");
        assert!(receipt.upgraded);
        assert_eq!(receipt.email, "lucia@example.com");

        let again = runtime.complete_upgrade(&session, "lucia@example.com").await.expect("again");
        assert!(!again.upgraded);

        let recovered = runtime.recover_session("LUCIA@example.com").await.expect("recover");
        assert_eq!(
            recovered,
            RecoveryOutcome::Found { session_id: session.clone(), tier: Tier::Premium }
        );

        let usage = runtime.ledger().usage(&session).await.expect("usage");
        assert_eq!(usage.history.len(), 1);

        let missing = runtime.recover_session("nobody@example.com").await.expect("recover");
        assert_eq!(missing, RecoveryOutcome::NotFound);
    }

    #[tokio::test]
    async fn upgrade_and_recovery_validate_input() {
        let runtime = runtime(20.0, 30);

        let blank_email = runtime
            .complete_upgrade(&SessionId::from("tourist-7"), "   ")
            .await
            .expect_err("blank email");
        assert!(matches!(blank_email, ApplicationError::Domain(DomainError::InvalidInput(_))));

        let blank_session = runtime
            .complete_upgrade(&SessionId::from(""), "a@b.es")
            .await
            .expect_err("blank session");
        assert!(matches!(blank_session, ApplicationError::Domain(DomainError::InvalidInput(_))));

        let recovery = runtime.recover_session("").await.expect_err("blank email");
        assert!(matches!(recovery, ApplicationError::Domain(DomainError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn forget_erases_memory_but_keeps_ledger() {
        let runtime = runtime(20.0, 30);
        let session = SessionId::from("tourist-8");
        completed(
            runtime
                .handle_turn(TurnRequest::new(session.clone(), "Recomiéndame un museo"))
                .await
                .expect("turn"),
        );

        assert!(runtime.forget(&session).await.expect("forget"));
        let memory = runtime.memory().load(&session).await.expect("memory");
        assert!(memory.interactions.is_empty());

        let stats = runtime.usage_stats(&session).await.expect("stats");
        assert_eq!(stats.interaction_count, 1);
    }

    #[tokio::test]
    async fn eviction_drops_cached_state_only() {
        let runtime = runtime(20.0, 30);
        let session = SessionId::from("mesa-9");
        runtime.states().set_phase(&session, Phase::Mains).await.expect("phase");

        let report = runtime.evict_idle(Duration::ZERO).await;
        assert_eq!(report.states, 1);

        let state = runtime.states().get_or_create(&session).await.expect("reload");
        assert_eq!(state.phase, Phase::Mains);
    }

    #[tokio::test]
    async fn configured_sweep_keeps_recent_sessions() {
        let runtime = runtime(20.0, 30);
        let session = SessionId::from("mesa-10");
        runtime.states().get_or_create(&session).await.expect("create");

        let report = runtime.evict_expired().await;
        assert_eq!(report, EvictionReport::default());
        assert_eq!(runtime.states().cached_sessions().await, 1);
    }

    struct BrokenWeather;

    #[async_trait]
    impl WeatherProvider for BrokenWeather {
        async fn current(
            &self,
            _city: &str,
            _now: DateTime<Utc>,
        ) -> Result<WeatherReport, WeatherError> {
            Err(WeatherError::Unavailable("timeout".to_string()))
        }
    }

    #[tokio::test]
    async fn weather_failure_falls_back_to_estimate() {
        let runtime = SessionRuntime::new(
            Repositories::in_memory(),
            Arc::new(BrokenWeather),
            RuntimeSettings::default(),
        );

        let request = TurnRequest::new("tourist-10", "Hola");
        let report = completed(runtime.handle_turn(request).await.expect("turn"));
        assert!(report.weather.simulated);
        assert_eq!(report.weather.city, "Madrid");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_turns_count_exactly() {
        let runtime = Arc::new(runtime(20.0, 100));
        let session = SessionId::from("tourist-11");

        let mut handles = Vec::new();
        for _ in 0..12 {
            let runtime = Arc::clone(&runtime);
            let session = session.clone();
            handles.push(tokio::spawn(async move {
                runtime.handle_turn(TurnRequest::new(session, "¿Qué museo me recomiendas?")).await
            }));
        }
        for handle in handles {
            handle.await.expect("task").expect("turn");
        }

        let usage = runtime.ledger().usage(&session).await.expect("usage");
        assert_eq!(usage.interaction_count, 12);
        assert_eq!(usage.history.len(), 24);
        assert!(usage.is_consistent());

        let memory = runtime.memory().load(&session).await.expect("memory");
        assert_eq!(memory.interactions.len(), 12);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_turns_respect_the_free_cap() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");
        let runtime = Arc::new(SessionRuntime::new(
            Repositories::sql(pool.clone()),
            Arc::new(FixedWeather::new(20.0)),
            RuntimeSettings { quota: QuotaPolicy::new(1), ..RuntimeSettings::default() },
        ));
        let session = SessionId::from("tourist-12");

        let mut handles = Vec::new();
        for _ in 0..16 {
            let runtime = Arc::clone(&runtime);
            let session = session.clone();
            handles.push(tokio::spawn(async move {
                runtime.handle_turn(TurnRequest::new(session, "¿Dónde como paella cerca?")).await
            }));
        }

        let mut completed_turns = 0;
        for handle in handles {
            if let TurnOutcome::Completed(_) = handle.await.expect("task").expect("turn") {
                completed_turns += 1;
            }
        }

        assert_eq!(completed_turns, 1);
        let usage = runtime.ledger().usage(&session).await.expect("usage");
        assert_eq!(usage.interaction_count, 1);
        assert_eq!(runtime.metrics().blocked, 15);

        pool.close().await;
    }
}
