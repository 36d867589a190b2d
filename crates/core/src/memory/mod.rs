//! Keyword preference learning and the fixed-layout context block handed to the LLM.

use crate::domain::memory::{PriceRange, SessionData, TouristPreferences, TripType};

pub const RECENT_INTERACTIONS: usize = 5;
pub const MESSAGE_CHAR_BUDGET: usize = 100;

const INTEREST_KEYWORDS: &[(&str, &str)] = &[
    ("arte", "art"),
    ("museo", "art"),
    ("historia", "history"),
    ("antiguo", "history"),
    ("jazz", "music"),
    ("música", "music"),
    ("fiesta", "nightlife"),
    ("copas", "nightlife"),
    ("playa", "beach"),
];

/// Ordered: the first matching row decides the trip type.
const TRIP_KEYWORDS: &[(&[&str], TripType)] = &[
    (&["niños", "familia"], TripType::Family),
    (&["pareja", "novio", "novia"], TripType::Couple),
    (&["amigos", "grupo"], TripType::Group),
];

const PRICE_KEYWORDS: &[(&[&str], PriceRange)] = &[
    (&["barato", "económico"], PriceRange::Low),
    (&["lujo", "caro"], PriceRange::High),
];

/// What one message taught us.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LearnedPreferences {
    pub food_types: Vec<&'static str>,
    pub interests: Vec<&'static str>,
    pub trip_type: Option<TripType>,
    pub price_range: Option<PriceRange>,
}

impl LearnedPreferences {
    pub fn is_empty(&self) -> bool {
        self.food_types.is_empty()
            && self.interests.is_empty()
            && self.trip_type.is_none()
            && self.price_range.is_none()
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct PreferenceLearner;

impl PreferenceLearner {
    pub fn new() -> Self {
        Self
    }

    pub fn extract(&self, content: &str) -> LearnedPreferences {
        let content = content.to_lowercase();
        let mut learned = LearnedPreferences::default();

        if content.contains("vegano") || content.contains("vegana") {
            learned.food_types.push("vegan");
        }
        if content.contains("vegetariano") || content.contains("vegetariana") {
            learned.food_types.push("vegetarian");
        }
        let negated = content.split(|c: char| !c.is_alphanumeric()).any(|word| word == "no");
        if content.contains("carne") && !negated {
            learned.food_types.push("meat");
        }

        for (keyword, interest) in INTEREST_KEYWORDS {
            if content.contains(keyword) && !learned.interests.contains(interest) {
                learned.interests.push(interest);
            }
        }

        learned.trip_type = TRIP_KEYWORDS
            .iter()
            .find(|(keywords, _)| keywords.iter().any(|keyword| content.contains(keyword)))
            .map(|(_, trip_type)| *trip_type);
        learned.price_range = PRICE_KEYWORDS
            .iter()
            .find(|(keywords, _)| keywords.iter().any(|keyword| content.contains(keyword)))
            .map(|(_, price)| *price);

        learned
    }

    /// Sets accumulate idempotently; trip type and price range are overwritten.
    pub fn learn(&self, content: &str, preferences: &mut TouristPreferences) -> LearnedPreferences {
        let learned = self.extract(content);
        preferences.food_types.extend(learned.food_types.iter().map(|food| food.to_string()));
        preferences.interests.extend(learned.interests.iter().map(|interest| interest.to_string()));
        if let Some(trip_type) = learned.trip_type {
            preferences.trip_type = trip_type;
        }
        if let Some(price_range) = learned.price_range {
            preferences.price_range = price_range;
        }
        learned
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ContextRenderer;

impl ContextRenderer {
    pub fn new() -> Self {
        Self
    }

    pub fn render(&self, data: &SessionData) -> String {
        [self.profile_block(&data.preferences), self.places_block(data), self.history_block(data)]
            .join("\n\n")
    }

    fn profile_block(&self, preferences: &TouristPreferences) -> String {
        let interests = join_or(&preferences.interests, "Aún no definidos");
        let food = join_or(&preferences.food_types, "Sin restricciones");
        format!(
            "[PERFIL]\n- Viaje: {}\n- Precio: {}\n- Intereses: {interests}\n- Comida: {food}",
            preferences.trip_type.as_str(),
            preferences.price_range.as_str(),
        )
    }

    fn places_block(&self, data: &SessionData) -> String {
        let mut block = String::from("[LUGARES MENCIONADOS]");
        if data.places_discussed.is_empty() {
            block.push_str("\n(Ninguno aún)");
        }
        for (name, status) in &data.places_discussed {
            block.push_str(&format!("\n- {name} ({})", status.status.as_str()));
        }
        block
    }

    fn history_block(&self, data: &SessionData) -> String {
        let mut block = String::from("[HISTORIAL RECIENTE]");
        for interaction in data.recent_interactions(RECENT_INTERACTIONS) {
            block.push_str(&format!(
                "\n{}: {}",
                interaction.role.label(),
                truncate_message(&interaction.content)
            ));
        }
        block
    }
}

fn join_or<'a>(values: impl IntoIterator<Item = &'a String>, empty: &str) -> String {
    let joined = values.into_iter().map(String::as_str).collect::<Vec<_>>().join(", ");
    if joined.is_empty() {
        empty.to_string()
    } else {
        joined
    }
}

/// Cuts on a character boundary; the ellipsis marks truncated messages only.
pub fn truncate_message(content: &str) -> String {
    let mut chars = content.chars();
    let head: String = chars.by_ref().take(MESSAGE_CHAR_BUDGET).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}
