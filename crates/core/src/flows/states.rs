use serde::{Deserialize, Serialize};

/// Conversation phases in the order a table is normally served.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Greeting,
    Drinks,
    Tapas,
    Mains,
    Check,
    Dessert,
    Coffee,
    Bill,
    Farewell,
}

impl Phase {
    pub const ORDERED: [Phase; 9] = [
        Phase::Greeting,
        Phase::Drinks,
        Phase::Tapas,
        Phase::Mains,
        Phase::Check,
        Phase::Dessert,
        Phase::Coffee,
        Phase::Bill,
        Phase::Farewell,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Greeting => "greeting",
            Self::Drinks => "drinks",
            Self::Tapas => "tapas",
            Self::Mains => "mains",
            Self::Check => "check",
            Self::Dessert => "dessert",
            Self::Coffee => "coffee",
            Self::Bill => "bill",
            Self::Farewell => "farewell",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Farewell)
    }

    /// The phase that usually follows this one, `None` once the table has said goodbye.
    pub fn next(&self) -> Option<Phase> {
        let index = Self::ORDERED.iter().position(|phase| phase == self)?;
        Self::ORDERED.get(index + 1).copied()
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Phase {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ORDERED
            .iter()
            .find(|phase| phase.as_str() == normalized)
            .copied()
            .ok_or_else(|| format!("unknown conversation phase `{normalized}`"))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseEvent {
    /// External caller moves the table to a specific phase.
    Set(Phase),
    /// A bill request was detected in the guest's words.
    BillRequested,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseTransition {
    pub from: Phase,
    pub to: Phase,
    pub event: PhaseEvent,
}

impl PhaseTransition {
    pub fn changed(&self) -> bool {
        self.from != self.to
    }
}
