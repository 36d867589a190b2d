use std::fmt;

use serde::{Deserialize, Serialize};

/// Session id that is never billed and never persisted by the usage ledger.
pub const ANONYMOUS_SESSION: &str = "anonymous";

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_anonymous(&self) -> bool {
        self.0 == ANONYMOUS_SESSION
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    #[default]
    Free,
    Premium,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Premium => "premium",
        }
    }

    /// Tiers only move upwards; a premium session never returns to free.
    pub fn can_upgrade_to(&self, next: Tier) -> bool {
        matches!((self, next), (Self::Free, Self::Premium))
    }
}

impl std::str::FromStr for Tier {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "free" => Ok(Self::Free),
            "premium" => Ok(Self::Premium),
            other => Err(format!("unsupported tier `{other}` (expected free|premium)")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{SessionId, Tier};

    #[test]
    fn anonymous_session_is_detected() {
        assert!(SessionId::from("anonymous").is_anonymous());
        assert!(!SessionId::from("sess-1").is_anonymous());
        assert!(SessionId::from("   ").is_blank());
    }

    #[test]
    fn tier_upgrade_is_one_directional() {
        assert!(Tier::Free.can_upgrade_to(Tier::Premium));
        assert!(!Tier::Premium.can_upgrade_to(Tier::Free));
        assert!(!Tier::Premium.can_upgrade_to(Tier::Premium));
        assert_eq!("Premium".parse::<Tier>(), Ok(Tier::Premium));
        assert!("gold".parse::<Tier>().is_err());
    }
}
