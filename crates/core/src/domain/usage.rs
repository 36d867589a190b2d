use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::session::{SessionId, Tier};

/// Services whose non-cached calls count as a billable interaction.
pub const PRIMARY_SERVICES: [&str; 2] = ["claude", "elevenlabs"];

pub const BILLING_SERVICE: &str = "billing";
pub const TIER_UPGRADE_ACTION: &str = "tier_upgrade";

pub fn is_primary_service(service: &str) -> bool {
    PRIMARY_SERVICES.contains(&service)
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageItem {
    pub timestamp: DateTime<Utc>,
    pub service: String,
    pub action: String,
    pub cost: Decimal,
    pub cached: bool,
}

impl UsageItem {
    pub fn new(
        service: impl Into<String>,
        action: impl Into<String>,
        cost: Decimal,
        cached: bool,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self { timestamp, service: service.into(), action: action.into(), cost, cached }
    }

    pub fn counts_as_interaction(&self) -> bool {
        !self.cached && is_primary_service(&self.service)
    }
}

/// Billing ledger for one session.
///
/// `total_cost` always equals the sum of non-cached history costs and
/// `interaction_count` the number of non-cached primary-service entries.
/// History is append-only.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUsage {
    pub session_id: SessionId,
    pub tier: Tier,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    pub total_cost: Decimal,
    pub interaction_count: u32,
    pub history: Vec<UsageItem>,
}

impl SessionUsage {
    pub fn new(session_id: SessionId, now: DateTime<Utc>) -> Self {
        Self {
            session_id,
            tier: Tier::Free,
            created_at: now,
            last_active: now,
            total_cost: Decimal::ZERO,
            interaction_count: 0,
            history: Vec::new(),
        }
    }

    /// Appends an entry and returns whether it counted as an interaction.
    pub fn record(&mut self, item: UsageItem) -> bool {
        let counted = item.counts_as_interaction();
        if !item.cached {
            self.total_cost += item.cost;
        }
        if counted {
            self.interaction_count = self.interaction_count.saturating_add(1);
        }
        self.last_active = item.timestamp;
        self.history.push(item);
        counted
    }

    /// Moves a free session to premium. Returns the audit entry that was appended,
    /// or `None` when the session was already premium.
    pub fn upgrade(&mut self, now: DateTime<Utc>) -> Option<UsageItem> {
        if !self.tier.can_upgrade_to(Tier::Premium) {
            return None;
        }

        self.tier = Tier::Premium;
        let item = UsageItem::new(BILLING_SERVICE, TIER_UPGRADE_ACTION, Decimal::ZERO, false, now);
        self.record(item.clone());
        Some(item)
    }

    pub fn billed_history_cost(&self) -> Decimal {
        self.history.iter().filter(|item| !item.cached).map(|item| item.cost).sum()
    }

    pub fn is_consistent(&self) -> bool {
        let interactions =
            self.history.iter().filter(|item| item.counts_as_interaction()).count();
        self.total_cost == self.billed_history_cost()
            && u32::try_from(interactions).map_or(false, |count| count == self.interaction_count)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;

    use super::{SessionUsage, UsageItem};
    use crate::domain::session::{SessionId, Tier};

    #[test]
    fn primary_service_counts_once() {
        let now = Utc::now();
        let mut usage = SessionUsage::new(SessionId::from("sess-1"), now);

        let counted = usage.record(UsageItem::new(
            "claude",
            "completion",
            Decimal::new(8, 3),
            false,
            now + Duration::seconds(1),
        ));

        assert!(counted);
        assert_eq!(usage.interaction_count, 1);
        assert_eq!(usage.total_cost, Decimal::new(8, 3));
        assert_eq!(usage.last_active, now + Duration::seconds(1));
        assert!(usage.is_consistent());
    }

    #[test]
    fn cached_and_secondary_entries_do_not_count() {
        let now = Utc::now();
        let mut usage = SessionUsage::new(SessionId::from("sess-1"), now);

        assert!(!usage.record(UsageItem::new("claude", "completion", Decimal::new(8, 3), true, now)));
        assert!(!usage.record(UsageItem::new("weather", "lookup", Decimal::new(1, 4), false, now)));

        assert_eq!(usage.interaction_count, 0);
        assert_eq!(usage.total_cost, Decimal::new(1, 4));
        assert_eq!(usage.history.len(), 2);
        assert!(usage.is_consistent());
    }

    #[test]
    fn upgrade_is_one_way_and_idempotent() {
        let now = Utc::now();
        let mut usage = SessionUsage::new(SessionId::from("sess-1"), now);

        let first = usage.upgrade(now).expect("first upgrade appends audit entry");
        assert_eq!(first.service, "billing");
        assert_eq!(usage.tier, Tier::Premium);

        assert!(usage.upgrade(now).is_none());
        assert_eq!(usage.history.len(), 1);
        assert_eq!(usage.total_cost, Decimal::ZERO);
        assert_eq!(usage.interaction_count, 0);
    }
}
