use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::session::SessionId;
use crate::flows::states::Phase;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Course {
    Drinks,
    Tapas,
    Mains,
    Desserts,
    Coffee,
}

impl Course {
    pub const ALL: [Course; 5] =
        [Course::Drinks, Course::Tapas, Course::Mains, Course::Desserts, Course::Coffee];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Drinks => "drinks",
            Self::Tapas => "tapas",
            Self::Mains => "mains",
            Self::Desserts => "desserts",
            Self::Coffee => "coffee",
        }
    }
}

impl std::str::FromStr for Course {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .find(|course| course.as_str() == normalized)
            .copied()
            .ok_or_else(|| format!("unknown course `{normalized}`"))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub item: String,
    pub quantity: u32,
    pub unit_price: Decimal,
}

impl OrderLine {
    pub fn new(item: impl Into<String>, quantity: u32, unit_price: Decimal) -> Self {
        Self { item: item.into(), quantity, unit_price }
    }

    /// `None` when the line's value does not fit in a `Decimal`.
    pub fn subtotal(&self) -> Option<Decimal> {
        self.unit_price.checked_mul(Decimal::from(self.quantity))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub drinks: Vec<OrderLine>,
    pub tapas: Vec<OrderLine>,
    pub mains: Vec<OrderLine>,
    pub desserts: Vec<OrderLine>,
    pub coffee: Vec<OrderLine>,
}

impl Order {
    pub fn lines(&self, course: Course) -> &[OrderLine] {
        match course {
            Course::Drinks => &self.drinks,
            Course::Tapas => &self.tapas,
            Course::Mains => &self.mains,
            Course::Desserts => &self.desserts,
            Course::Coffee => &self.coffee,
        }
    }

    pub fn add(&mut self, course: Course, line: OrderLine) {
        let lines = match course {
            Course::Drinks => &mut self.drinks,
            Course::Tapas => &mut self.tapas,
            Course::Mains => &mut self.mains,
            Course::Desserts => &mut self.desserts,
            Course::Coffee => &mut self.coffee,
        };
        lines.push(line);
    }

    pub fn has_food(&self) -> bool {
        !self.tapas.is_empty() || !self.mains.is_empty()
    }

    pub fn total(&self) -> Option<Decimal> {
        Course::ALL
            .iter()
            .flat_map(|course| self.lines(*course))
            .try_fold(Decimal::ZERO, |acc, line| acc.checked_add(line.subtotal()?))
            .map(|total| total.round_dp(2))
    }

    pub fn summary(&self) -> Vec<String> {
        Course::ALL
            .iter()
            .flat_map(|course| self.lines(*course))
            .map(|line| format!("{}x {} ({}€)", line.quantity, line.item, line.unit_price))
            .collect()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartyType {
    #[default]
    Couple,
    Friends,
    Family,
    Business,
    Solo,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpiceTolerance {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetSensitivity {
    Low,
    #[default]
    Normal,
    High,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pace {
    Quick,
    #[default]
    Normal,
    Relaxed,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiningPreferences {
    pub dietary: BTreeSet<String>,
    pub allergies: BTreeSet<String>,
    pub spice_tolerance: SpiceTolerance,
    pub budget_sensitivity: BudgetSensitivity,
    pub pace: Pace,
}

/// Boolean facts inferred from the guest's words. Flags only ever go from false to true.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signals {
    pub asked_for_bill: bool,
    pub mentioned_hurry: bool,
    pub mentioned_celebration: bool,
    pub mentioned_dietary: bool,
    pub budget_sensitive: bool,
    pub asked_for_recommendations: bool,
    pub praised_food: bool,
    pub complained: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionRecord {
    pub item: String,
    pub accepted: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationState {
    pub session_id: SessionId,
    pub table_id: String,
    pub started_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub phase: Phase,
    pub phase_started_at: DateTime<Utc>,
    pub order: Order,
    pub party_size: u32,
    pub party_type: PartyType,
    pub preferences: DiningPreferences,
    pub signals: Signals,
    pub suggestions: Vec<SuggestionRecord>,
    pub suggestions_rejected: u32,
    pub language: String,
}

impl ConversationState {
    pub fn new(session_id: SessionId, now: DateTime<Utc>) -> Self {
        Self {
            session_id,
            table_id: "mesa_01".to_string(),
            started_at: now,
            last_activity: now,
            phase: Phase::Greeting,
            phase_started_at: now,
            order: Order::default(),
            party_size: 2,
            party_type: PartyType::default(),
            preferences: DiningPreferences::default(),
            signals: Signals::default(),
            suggestions: Vec::new(),
            suggestions_rejected: 0,
            language: "es".to_string(),
        }
    }

    /// Moves to `phase`; the phase clock restarts only when the phase actually changes.
    pub fn enter_phase(&mut self, phase: Phase, now: DateTime<Utc>) -> bool {
        if self.phase == phase {
            return false;
        }
        self.phase = phase;
        self.phase_started_at = now;
        true
    }

    pub fn time_in_phase(&self, now: DateTime<Utc>) -> Duration {
        (now - self.phase_started_at).max(Duration::zero())
    }

    pub fn minutes_in_phase(&self, now: DateTime<Utc>) -> f64 {
        self.time_in_phase(now).num_milliseconds() as f64 / 60_000.0
    }

    pub fn record_suggestion(&mut self, item: impl Into<String>, accepted: bool, now: DateTime<Utc>) {
        self.suggestions.push(SuggestionRecord { item: item.into(), accepted, timestamp: now });
        if !accepted {
            self.suggestions_rejected = self.suggestions_rejected.saturating_add(1);
        }
    }
}
