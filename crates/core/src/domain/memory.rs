use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::session::{SessionId, Tier};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Assistant => "Assistant",
            Self::System => "System",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            "system" => Ok(Self::System),
            other => Err(format!("unsupported role `{other}`")),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceRange {
    Low,
    #[default]
    Medium,
    High,
}

impl PriceRange {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TripType {
    #[default]
    Solo,
    Couple,
    Group,
    Family,
}

impl TripType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Solo => "solo",
            Self::Couple => "couple",
            Self::Group => "group",
            Self::Family => "family",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TouristPreferences {
    pub food_types: BTreeSet<String>,
    pub interests: BTreeSet<String>,
    pub price_range: PriceRange,
    pub trip_type: TripType,
    pub language: String,
}

impl Default for TouristPreferences {
    fn default() -> Self {
        Self {
            food_types: BTreeSet::new(),
            interests: BTreeSet::new(),
            price_range: PriceRange::default(),
            trip_type: TripType::default(),
            language: "es".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interaction {
    pub timestamp: DateTime<Utc>,
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub intent: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaceVisit {
    Recommended,
    Visited,
    Rejected,
}

impl PlaceVisit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Recommended => "recommended",
            Self::Visited => "visited",
            Self::Rejected => "rejected",
        }
    }
}

impl std::str::FromStr for PlaceVisit {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "recommended" => Ok(Self::Recommended),
            "visited" => Ok(Self::Visited),
            "rejected" => Ok(Self::Rejected),
            other => {
                Err(format!("unsupported place status `{other}` (expected recommended|visited|rejected)"))
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceStatus {
    pub status: PlaceVisit,
    pub timestamp: DateTime<Utc>,
}

/// Long-horizon memory of one tourist session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    pub session_id: SessionId,
    pub created_at: DateTime<Utc>,
    pub last_interaction: DateTime<Utc>,
    pub tier: Tier,
    pub email: Option<String>,
    pub preferences: TouristPreferences,
    pub interactions: Vec<Interaction>,
    pub places_discussed: BTreeMap<String, PlaceStatus>,
    pub context_summary: String,
}

impl SessionData {
    pub fn new(session_id: SessionId, now: DateTime<Utc>) -> Self {
        Self {
            session_id,
            created_at: now,
            last_interaction: now,
            tier: Tier::Free,
            email: None,
            preferences: TouristPreferences::default(),
            interactions: Vec::new(),
            places_discussed: BTreeMap::new(),
            context_summary: String::new(),
        }
    }

    pub fn push_interaction(
        &mut self,
        role: Role,
        content: impl Into<String>,
        intent: Option<String>,
        now: DateTime<Utc>,
    ) {
        self.interactions.push(Interaction { timestamp: now, role, content: content.into(), intent });
        self.last_interaction = now;
    }

    pub fn mark_place(&mut self, name: impl Into<String>, status: PlaceVisit, now: DateTime<Utc>) {
        self.places_discussed.insert(name.into(), PlaceStatus { status, timestamp: now });
        self.last_interaction = now;
    }

    pub fn recent_interactions(&self, limit: usize) -> &[Interaction] {
        let start = self.interactions.len().saturating_sub(limit);
        &self.interactions[start..]
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::{PlaceVisit, Role, SessionData};
    use crate::domain::session::SessionId;

    #[test]
    fn recent_interactions_keeps_tail() {
        let now = Utc::now();
        let mut data = SessionData::new(SessionId::from("sess-1"), now);
        for index in 0..7 {
            data.push_interaction(Role::User, format!("msg {index}"), None, now);
        }

        let recent = data.recent_interactions(5);
        assert_eq!(recent.len(), 5);
        assert_eq!(recent[0].content, "msg 2");
        assert_eq!(data.recent_interactions(50).len(), 7);
    }

    #[test]
    fn marking_a_place_overwrites_previous_status() {
        let now = Utc::now();
        let mut data = SessionData::new(SessionId::from("sess-1"), now);
        data.mark_place("Casa Batlló", PlaceVisit::Recommended, now);
        data.mark_place("Casa Batlló", PlaceVisit::Visited, now + Duration::hours(2));

        assert_eq!(data.places_discussed.len(), 1);
        assert_eq!(data.places_discussed["Casa Batlló"].status, PlaceVisit::Visited);
        assert_eq!(data.last_interaction, now + Duration::hours(2));
    }

    #[test]
    fn json_roundtrip_preserves_every_field() {
        let now = Utc::now();
        let mut data = SessionData::new(SessionId::from("sess-1"), now);
        data.email = Some("ana@example.com".to_string());
        data.preferences.food_types.insert("vegan".to_string());
        data.preferences.interests.insert("art".to_string());
        data.push_interaction(Role::User, "Me encanta el arte", Some("medium_cost".into()), now);
        data.mark_place("MNAC", PlaceVisit::Recommended, now);

        let encoded = serde_json::to_string(&data).expect("encode");
        let decoded: SessionData = serde_json::from_str(&encoded).expect("decode");

        assert_eq!(decoded, data);
    }
}
