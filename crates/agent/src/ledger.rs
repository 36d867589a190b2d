//! Durable per-session billing and quota ledger.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info};

use alexandra_core::errors::ApplicationError;
use alexandra_core::{
    PriceTable, QuotaPolicy, QuotaStatus, SessionId, SessionUsage, Tier, UsageItem, UsageStats,
};
use alexandra_db::repositories::UsageRepository;

use crate::locks::SessionLocks;
use crate::storage::{storage_failure, tolerate_corrupt, Store};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Anonymous sessions are never billed.
    Excluded,
    Recorded { item: UsageItem, counted: bool, interaction_count: u32, total_cost: Decimal },
}

pub struct UsageLedger {
    repository: Arc<dyn UsageRepository>,
    prices: PriceTable,
    policy: QuotaPolicy,
    locks: SessionLocks,
}

impl UsageLedger {
    pub fn new(repository: Arc<dyn UsageRepository>, policy: QuotaPolicy) -> Self {
        Self::with_prices(repository, policy, PriceTable::default())
    }

    pub fn with_prices(
        repository: Arc<dyn UsageRepository>,
        policy: QuotaPolicy,
        prices: PriceTable,
    ) -> Self {
        Self { repository, prices, policy, locks: SessionLocks::new() }
    }

    pub fn policy(&self) -> &QuotaPolicy {
        &self.policy
    }

    /// Appends one event and flushes it before returning.
    ///
    /// A missing cost is priced from the table; cached events are kept for audit
    /// but never move the cost or the interaction count.
    pub async fn record_usage(
        &self,
        session_id: &SessionId,
        service: &str,
        action: &str,
        cost: Option<Decimal>,
        cached: bool,
    ) -> Result<RecordOutcome, ApplicationError> {
        if session_id.is_anonymous() {
            debug!(session_id = %session_id, service, "anonymous usage not billed");
            return Ok(RecordOutcome::Excluded);
        }
        if session_id.is_blank() {
            return Err(ApplicationError::invalid_input("session id is required"));
        }
        if service.trim().is_empty() {
            return Err(ApplicationError::invalid_input("usage service is required"));
        }
        if cost.is_some_and(|cost| cost.is_sign_negative()) {
            return Err(ApplicationError::invalid_input("usage cost cannot be negative"));
        }

        let service = service.trim().to_lowercase();
        let _guard = self.locks.acquire(session_id).await;
        let now = Utc::now();
        let mut usage = self.load(session_id, now).await?;

        let cost = self.prices.resolve(&service, action, cost, cached);
        let item = UsageItem::new(service.as_str(), action, cost, cached, now);
        let counted = usage.record(item.clone());
        self.persist(&usage, std::slice::from_ref(&item)).await?;

        info!(
            event_name = "ledger.usage_recorded",
            session_id = %session_id,
            service = %service,
            action,
            cost = %cost,
            cached,
            counted,
            interaction_count = usage.interaction_count,
            "usage recorded"
        );

        Ok(RecordOutcome::Recorded {
            item,
            counted,
            interaction_count: usage.interaction_count,
            total_cost: usage.total_cost,
        })
    }

    pub async fn check_limit(&self, session_id: &SessionId) -> Result<QuotaStatus, ApplicationError> {
        if session_id.is_anonymous() {
            return Ok(self.policy.check(&SessionUsage::new(session_id.clone(), Utc::now())));
        }

        let _guard = self.locks.acquire(session_id).await;
        let usage = self.load(session_id, Utc::now()).await?;
        Ok(self.policy.check(&usage))
    }

    /// One-directional and idempotent: returns `false` when already premium.
    pub async fn upgrade_tier(&self, session_id: &SessionId) -> Result<bool, ApplicationError> {
        if session_id.is_anonymous() || session_id.is_blank() {
            return Err(ApplicationError::invalid_input(
                "an identified session is required to upgrade",
            ));
        }

        let _guard = self.locks.acquire(session_id).await;
        let now = Utc::now();
        let mut usage = self.load(session_id, now).await?;

        let Some(audit) = usage.upgrade(now) else {
            debug!(session_id = %session_id, "session already premium");
            return Ok(false);
        };
        self.persist(&usage, std::slice::from_ref(&audit)).await?;

        info!(
            event_name = "ledger.tier_upgraded",
            session_id = %session_id,
            tier = Tier::Premium.as_str(),
            "session upgraded"
        );
        Ok(true)
    }

    pub async fn usage(&self, session_id: &SessionId) -> Result<SessionUsage, ApplicationError> {
        let _guard = self.locks.acquire(session_id).await;
        self.load(session_id, Utc::now()).await
    }

    pub async fn usage_stats(&self, session_id: &SessionId) -> Result<UsageStats, ApplicationError> {
        let usage = self.usage(session_id).await?;
        Ok(UsageStats::from_usage(&usage, &self.policy))
    }

    pub fn evict_idle(&self, idle: Duration) -> usize {
        self.locks.evict_idle(idle)
    }

    async fn load(
        &self,
        session_id: &SessionId,
        now: DateTime<Utc>,
    ) -> Result<SessionUsage, ApplicationError> {
        let found = tolerate_corrupt(
            Store::Usage,
            session_id.as_str(),
            self.repository.find(session_id).await,
        )?;
        Ok(found.unwrap_or_else(|| SessionUsage::new(session_id.clone(), now)))
    }

    async fn persist(
        &self,
        usage: &SessionUsage,
        new_items: &[UsageItem],
    ) -> Result<(), ApplicationError> {
        self.repository
            .persist(usage, new_items)
            .await
            .map_err(|error| storage_failure(Store::Usage, usage.session_id.as_str(), error))
    }
}
