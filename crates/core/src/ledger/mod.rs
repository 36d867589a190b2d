//! Pricing and quota rules for the per-session usage ledger.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::session::{SessionId, Tier};
use crate::domain::usage::{SessionUsage, UsageItem};

/// Authoritative free-tier cap on billable interactions.
pub const DEFAULT_FREE_INTERACTION_CAP: u32 = 30;

/// Informational card hold for premium sessions, in EUR.
pub const PREMIUM_HOLD_EUR: Decimal = Decimal::TEN;

pub const REASONING_SERVICE: &str = "claude";
pub const VOICE_SERVICE: &str = "elevenlabs";

/// Static EUR price per call, keyed by service (and action for voice).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceTable {
    pub reasoning: Decimal,
    pub voice_synthesis: Decimal,
    pub voice_transcription: Decimal,
    pub weather: Decimal,
    pub maps: Decimal,
    pub places: Decimal,
    pub fallback: Decimal,
}

impl Default for PriceTable {
    fn default() -> Self {
        Self {
            reasoning: Decimal::new(8, 3),
            voice_synthesis: Decimal::new(6, 3),
            voice_transcription: Decimal::new(2, 3),
            weather: Decimal::new(1, 4),
            maps: Decimal::new(5, 3),
            places: Decimal::new(17, 3),
            fallback: Decimal::new(2, 3),
        }
    }
}

impl PriceTable {
    /// Unknown services fall back to the nominal default instead of failing.
    pub fn lookup(&self, service: &str, action: &str) -> Decimal {
        match service.trim().to_ascii_lowercase().as_str() {
            REASONING_SERVICE | "llm" => self.reasoning,
            VOICE_SERVICE if action.eq_ignore_ascii_case("tts") => self.voice_synthesis,
            VOICE_SERVICE | "stt" => self.voice_transcription,
            "tts" => self.voice_synthesis,
            "weather" => self.weather,
            "maps" => self.maps,
            "places" => self.places,
            _ => self.fallback,
        }
    }

    /// Cost to book for an event: explicit cost wins; cached events without a
    /// cost are free; everything else is looked up.
    pub fn resolve(&self, service: &str, action: &str, cost: Option<Decimal>, cached: bool) -> Decimal {
        match cost {
            Some(cost) => cost,
            None if cached => Decimal::ZERO,
            None => self.lookup(service, action),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaPolicy {
    pub free_interaction_cap: u32,
}

impl Default for QuotaPolicy {
    fn default() -> Self {
        Self { free_interaction_cap: DEFAULT_FREE_INTERACTION_CAP }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaStatus {
    pub allowed: bool,
    pub tier: Tier,
    pub interaction_count: u32,
    pub limit: Option<u32>,
    pub remaining: Option<u32>,
}

impl QuotaPolicy {
    pub fn new(free_interaction_cap: u32) -> Self {
        Self { free_interaction_cap }
    }

    pub fn limit_for(&self, tier: Tier) -> Option<u32> {
        match tier {
            Tier::Free => Some(self.free_interaction_cap),
            Tier::Premium => None,
        }
    }

    pub fn check(&self, usage: &SessionUsage) -> QuotaStatus {
        let limit = self.limit_for(usage.tier);
        let allowed = limit.map_or(true, |limit| usage.interaction_count < limit);
        QuotaStatus {
            allowed,
            tier: usage.tier,
            interaction_count: usage.interaction_count,
            limit,
            remaining: limit.map(|limit| limit.saturating_sub(usage.interaction_count)),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub voice: Decimal,
    pub intelligence: Decimal,
    pub context: Decimal,
}

impl CostBreakdown {
    pub fn from_history(history: &[UsageItem]) -> Self {
        let mut breakdown = history.iter().filter(|item| !item.cached).fold(
            Self::default(),
            |mut acc, item| {
                match item.service.as_str() {
                    VOICE_SERVICE => acc.voice += item.cost,
                    REASONING_SERVICE => acc.intelligence += item.cost,
                    _ => acc.context += item.cost,
                }
                acc
            },
        );
        breakdown.voice = breakdown.voice.round_dp(4);
        breakdown.intelligence = breakdown.intelligence.round_dp(4);
        breakdown.context = breakdown.context.round_dp(4);
        breakdown
    }
}

/// Billing summary reported back to callers and the operator CLI.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageStats {
    pub session_id: SessionId,
    pub tier: Tier,
    pub total_cost: Decimal,
    pub interaction_count: u32,
    pub limit_reached: bool,
    pub max_interactions: Option<u32>,
    pub remaining: Option<u32>,
    pub premium_hold: Decimal,
    pub period_start: DateTime<Utc>,
    pub breakdown: CostBreakdown,
}

impl UsageStats {
    pub fn from_usage(usage: &SessionUsage, policy: &QuotaPolicy) -> Self {
        let quota = policy.check(usage);
        Self {
            session_id: usage.session_id.clone(),
            tier: usage.tier,
            total_cost: usage.total_cost.round_dp(4),
            interaction_count: usage.interaction_count,
            limit_reached: !quota.allowed,
            max_interactions: quota.limit,
            remaining: quota.remaining,
            premium_hold: PREMIUM_HOLD_EUR,
            period_start: usage.created_at,
            breakdown: CostBreakdown::from_history(&usage.history),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::{PriceTable, QuotaPolicy, UsageStats, DEFAULT_FREE_INTERACTION_CAP};
    use crate::domain::session::{SessionId, Tier};
    use crate::domain::usage::{SessionUsage, UsageItem};

    #[test]
    fn price_lookup_covers_known_and_unknown_services() {
        let prices = PriceTable::default();

        assert_eq!(prices.lookup("claude", "completion"), Decimal::new(8, 3));
        assert_eq!(prices.lookup("elevenlabs", "tts"), Decimal::new(6, 3));
        assert_eq!(prices.lookup("elevenlabs", "stt"), Decimal::new(2, 3));
        assert_eq!(prices.lookup("places", "search"), Decimal::new(17, 3));
        assert_eq!(prices.lookup("weather", "lookup"), Decimal::new(1, 4));
        assert_eq!(prices.lookup("telepathy", "read"), Decimal::new(2, 3));
    }

    #[test]
    fn resolve_prefers_explicit_cost_and_zeroes_cached() {
        let prices = PriceTable::default();

        assert_eq!(prices.resolve("claude", "x", Some(Decimal::new(5, 2)), false), Decimal::new(5, 2));
        assert_eq!(prices.resolve("claude", "x", None, true), Decimal::ZERO);
        assert_eq!(prices.resolve("claude", "x", None, false), Decimal::new(8, 3));
    }

    #[test]
    fn free_tier_blocks_at_cap() {
        let now = Utc::now();
        let policy = QuotaPolicy::default();
        let mut usage = SessionUsage::new(SessionId::from("sess-1"), now);

        for _ in 0..DEFAULT_FREE_INTERACTION_CAP - 1 {
            usage.record(UsageItem::new("claude", "completion", Decimal::new(8, 3), false, now));
        }
        let status = policy.check(&usage);
        assert!(status.allowed);
        assert_eq!(status.remaining, Some(1));

        usage.record(UsageItem::new("claude", "completion", Decimal::new(8, 3), false, now));
        let status = policy.check(&usage);
        assert!(!status.allowed);
        assert_eq!(status.remaining, Some(0));
    }

    #[test]
    fn premium_is_unbounded() {
        let now = Utc::now();
        let policy = QuotaPolicy::new(1);
        let mut usage = SessionUsage::new(SessionId::from("sess-1"), now);
        usage.record(UsageItem::new("claude", "completion", Decimal::new(8, 3), false, now));
        assert!(!policy.check(&usage).allowed);

        usage.upgrade(now);
        let status = policy.check(&usage);
        assert!(status.allowed);
        assert_eq!(status.tier, Tier::Premium);
        assert_eq!(status.limit, None);
    }

    #[test]
    fn stats_split_cost_by_service_family() {
        let now = Utc::now();
        let mut usage = SessionUsage::new(SessionId::from("sess-1"), now);
        usage.record(UsageItem::new("claude", "completion", Decimal::new(8, 3), false, now));
        usage.record(UsageItem::new("elevenlabs", "tts", Decimal::new(6, 3), false, now));
        usage.record(UsageItem::new("weather", "lookup", Decimal::new(1, 4), false, now));
        usage.record(UsageItem::new("claude", "completion", Decimal::new(8, 3), true, now));

        let stats = UsageStats::from_usage(&usage, &QuotaPolicy::default());

        assert_eq!(stats.total_cost, Decimal::new(141, 4));
        assert_eq!(stats.interaction_count, 2);
        assert_eq!(stats.breakdown.intelligence, Decimal::new(8, 3));
        assert_eq!(stats.breakdown.voice, Decimal::new(6, 3));
        assert_eq!(stats.breakdown.context, Decimal::new(1, 4));
        assert_eq!(stats.max_interactions, Some(30));
        assert_eq!(stats.remaining, Some(28));
        assert!(!stats.limit_reached);
        assert_eq!(stats.premium_hold, Decimal::new(10, 0));
    }
}
