use std::sync::Arc;

use serde::Serialize;

use alexandra_core::errors::ApplicationError;
use alexandra_core::{QuotaStatus, SessionId};

use crate::ledger::UsageLedger;

pub const LIMIT_REACHED: &str = "limit_reached";

/// Quota outcome handed to the caller. A denial is a normal result, not an error.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum GateDecision {
    Allow {
        remaining: Option<u32>,
    },
    Deny {
        reason_code: &'static str,
        user_message: String,
        /// Set only for time-boxed limits.
        reset_after_secs: Option<u64>,
    },
}

impl GateDecision {
    pub fn allowed(&self) -> bool {
        matches!(self, Self::Allow { .. })
    }

    pub fn reason_code(&self) -> Option<&'static str> {
        match self {
            Self::Allow { .. } => None,
            Self::Deny { reason_code, .. } => Some(reason_code),
        }
    }

    pub fn user_message(&self) -> Option<&str> {
        match self {
            Self::Allow { .. } => None,
            Self::Deny { user_message, .. } => Some(user_message),
        }
    }
}

/// Thin policy facade over the ledger's quota state.
#[derive(Clone)]
pub struct RateGate {
    ledger: Arc<UsageLedger>,
}

impl RateGate {
    pub fn new(ledger: Arc<UsageLedger>) -> Self {
        Self { ledger }
    }

    pub fn evaluate(&self, status: &QuotaStatus) -> GateDecision {
        if status.allowed {
            return GateDecision::Allow { remaining: status.remaining };
        }

        let limit = status.limit.unwrap_or(status.interaction_count);
        GateDecision::Deny {
            reason_code: LIMIT_REACHED,
            user_message: format!(
                "Has alcanzado el límite gratuito ({}/{limit}). Pásate a Premium para continuar.",
                status.interaction_count
            ),
            reset_after_secs: None,
        }
    }

    pub async fn check(&self, session_id: &SessionId) -> Result<GateDecision, ApplicationError> {
        let status = self.ledger.check_limit(session_id).await?;
        Ok(self.evaluate(&status))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use alexandra_core::{QuotaPolicy, QuotaStatus, SessionId, Tier};
    use alexandra_db::repositories::InMemoryUsageRepository;

    use super::{GateDecision, RateGate, LIMIT_REACHED};
    use crate::ledger::UsageLedger;

    fn gate(cap: u32) -> (RateGate, Arc<UsageLedger>) {
        let ledger = Arc::new(UsageLedger::new(
            Arc::new(InMemoryUsageRepository::default()),
            QuotaPolicy::new(cap),
        ));
        (RateGate::new(Arc::clone(&ledger)), ledger)
    }

    #[tokio::test]
    async fn fresh_session_is_allowed_with_full_quota() {
        let (gate, _) = gate(30);
        let decision = gate.check(&SessionId::from("tourist-1")).await.expect("check");

        assert_eq!(decision, GateDecision::Allow { remaining: Some(30) });
        assert!(decision.allowed());
        assert_eq!(decision.reason_code(), None);
    }

    #[tokio::test]
    async fn exhausted_free_session_is_denied_with_message() {
        let (gate, ledger) = gate(2);
        let session = SessionId::from("tourist-2");
        for _ in 0..2 {
            ledger.record_usage(&session, "claude", "completion", None, false).await.expect("record");
        }

        let decision = gate.check(&session).await.expect("check");

        let (reason_code, user_message, reset_after_secs) = match decision {
            GateDecision::Deny { reason_code, user_message, reset_after_secs } => {
                (reason_code, user_message, reset_after_secs)
            }
            _ => ("", String::new(), Some(0)),
        };
        assert_eq!(reason_code, LIMIT_REACHED);
        assert!(user_message.contains("(2/2)"));
        assert!(user_message.contains("Premium"));
        assert_eq!(reset_after_secs, None);
    }

    #[test]
    fn premium_status_always_allows() {
        let (gate, _) = gate(1);
        let status = QuotaStatus {
            allowed: true,
            tier: Tier::Premium,
            interaction_count: 500,
            limit: None,
            remaining: None,
        };

        assert_eq!(gate.evaluate(&status), GateDecision::Allow { remaining: None });
    }

    #[test]
    fn decision_serializes_with_tag() {
        let (gate, _) = gate(1);
        let status = QuotaStatus {
            allowed: false,
            tier: Tier::Free,
            interaction_count: 1,
            limit: Some(1),
            remaining: Some(0),
        };

        let json = serde_json::to_value(gate.evaluate(&status)).expect("serialize");
        assert_eq!(json["decision"], "deny");
        assert_eq!(json["reason_code"], "limit_reached");
    }
}
