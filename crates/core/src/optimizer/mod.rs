//! Cheap pre-reasoning decisions: which utterances can skip the LLM, and how
//! much points-of-interest context is worth sending when they cannot.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::place::Place;
use crate::domain::session::Tier;
use crate::signals::compile_patterns;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Greeting,
    Confirm,
    Deny,
    Repeat,
    Gratitude,
    MediumCost,
    HighCost,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Greeting => "greeting",
            Self::Confirm => "confirm",
            Self::Deny => "deny",
            Self::Repeat => "repeat",
            Self::Gratitude => "gratitude",
            Self::MediumCost => "medium_cost",
            Self::HighCost => "high_cost",
        }
    }

    pub fn is_bypass_eligible(&self) -> bool {
        !matches!(self, Self::MediumCost | Self::HighCost)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizerDecision {
    pub bypass: bool,
    pub intent: Intent,
    pub instruction: String,
    pub suggested_response: Option<String>,
}

/// Short-utterance patterns, tested in this order against normalized text.
const SHORT_INTENTS: &[(Intent, &str)] = &[
    (Intent::Greeting, r"^(hola|hi|hello|buenos|buenas|hey|bonjour|ciao)\b"),
    (Intent::Confirm, r"^(s[ií]|yes|ok|vale|genial|perfecto|sure|yep|da|oui)$"),
    (Intent::Deny, r"^(no|nope|nan|non)$"),
    (Intent::Repeat, r"^(repite|repeat|c[oó]mo|pardon|what)$"),
    (Intent::Gratitude, r"^(gracias|thanks|merci|danke|grazie)\b"),
];

const HESITATION_PATTERN: &str = r"\b(eh|hmm|uh|um|estee|bueno)\b";
const MARKUP_PATTERN: &str = r"<[^>]*>";

/// Planning and comparison vocabulary, matched on whole words only.
const PLANNING_PATTERN: &str = r"\b(itinerario|itinerary|planear|planificar|plan|ruta|route|comparar|compara|compare|comparison|versus|vs|mejor opción|best option|varios días|several days)\b";

const MAX_MEDIUM_WORDS: usize = 15;
pub const MAX_CONTEXT_PLACES: usize = 3;

const GREETING_REPLY: &str = "¡Hola! ¿En qué te puedo ayudar hoy? / Hello! How can I help you?";
const CONFIRM_REPLY: &str = "Perfecto. / Perfect.";
const DENY_REPLY: &str = "De acuerdo, sin problema. / Alright, no problem.";
const GRATITUDE_REPLY: &str = "¡De nada! / You're welcome.";

/// Topic categories used to prune points-of-interest context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicCategory {
    Food,
    Culture,
    Outdoors,
    Nightlife,
}

const TOPIC_KEYWORDS: &[(TopicCategory, &[&str])] = &[
    (
        TopicCategory::Food,
        &["restaurante", "tapas", "food", "eat", "cena", "dinner", "lunch", "hambre"],
    ),
    (TopicCategory::Culture, &["museo", "arte", "museum", "art", "cultura", "history"]),
    (TopicCategory::Outdoors, &["parque", "playa", "park", "beach", "walk", "caminar"]),
    (TopicCategory::Nightlife, &["bar", "club", "copas", "drink", "party", "fiesta"]),
];

#[derive(Clone, Debug)]
pub struct IntentOptimizer {
    short_intents: Vec<(Intent, Regex)>,
    hesitation: Vec<Regex>,
    planning: Vec<Regex>,
    markup: Vec<Regex>,
}

impl Default for IntentOptimizer {
    fn default() -> Self {
        Self::new()
    }
}

impl IntentOptimizer {
    pub fn new() -> Self {
        let short_intents = SHORT_INTENTS
            .iter()
            .filter_map(|(intent, pattern)| {
                compile_patterns([*pattern]).into_iter().next().map(|regex| (*intent, regex))
            })
            .collect();

        Self {
            short_intents,
            hesitation: compile_patterns([HESITATION_PATTERN]),
            planning: compile_patterns([PLANNING_PATTERN]),
            markup: compile_patterns([MARKUP_PATTERN]),
        }
    }

    /// Removes markup tags so rule evaluation never sees injected HTML.
    pub fn sanitize(&self, text: &str) -> String {
        self.markup
            .iter()
            .fold(text.to_string(), |acc, pattern| pattern.replace_all(&acc, "").into_owned())
    }

    /// Lowercases, trims, strips hesitation sounds and collapses whitespace.
    pub fn normalize(&self, text: &str) -> String {
        let lowered = text.trim().to_lowercase();
        let stripped = self
            .hesitation
            .iter()
            .fold(lowered, |acc, pattern| pattern.replace_all(&acc, "").into_owned());
        stripped.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    pub fn classify(&self, text: &str) -> Intent {
        let normalized = self.normalize(text);
        self.classify_normalized(&normalized)
    }

    fn classify_normalized(&self, normalized: &str) -> Intent {
        if let Some((intent, _)) =
            self.short_intents.iter().find(|(_, pattern)| pattern.is_match(normalized))
        {
            return *intent;
        }

        let word_count = normalized.split_whitespace().count();
        let planning = self.planning.iter().any(|pattern| pattern.is_match(normalized));

        if planning || word_count > MAX_MEDIUM_WORDS {
            Intent::HighCost
        } else {
            Intent::MediumCost
        }
    }

    pub fn classify_and_optimize(&self, text: &str, last_response: Option<&str>) -> OptimizerDecision {
        let intent = self.classify(text);
        let (instruction, suggested_response) = match intent {
            Intent::Greeting => (
                "DETECTED_INTENT: Greeting. ACTION: Reply slightly enthusiastically with a short greeting in the user's language. Do NOT ask complex questions yet.".to_string(),
                Some(GREETING_REPLY.to_string()),
            ),
            Intent::Confirm => (
                "DETECTED_INTENT: Confirmation. ACTION: Acknowledge briefly (e.g., 'Great', 'Okay').".to_string(),
                Some(CONFIRM_REPLY.to_string()),
            ),
            Intent::Deny => (
                "DETECTED_INTENT: Denial. ACTION: Accept the answer briefly and wait for the guest.".to_string(),
                Some(DENY_REPLY.to_string()),
            ),
            Intent::Repeat => {
                let last = last_response.unwrap_or_default();
                (
                    format!("DETECTED_INTENT: Request Repeat. ACTION: Repeat the previous information: '{last}'"),
                    last_response.map(str::to_string),
                )
            }
            Intent::Gratitude => (
                "DETECTED_INTENT: Gratitude. ACTION: Say 'You're welcome' briefly.".to_string(),
                Some(GRATITUDE_REPLY.to_string()),
            ),
            Intent::MediumCost => (
                "Responde de forma concisa (máx 2 frases). Si das opciones, da máximo 2. / Reply concisely (max 2 sentences). If offering options, give max 2.".to_string(),
                None,
            ),
            Intent::HighCost => (
                "Planifica con detalle pero sin relleno: máximo 3 opciones ordenadas. / Plan carefully without filler: at most 3 ordered options.".to_string(),
                None,
            ),
        };

        OptimizerDecision { bypass: intent.is_bypass_eligible(), intent, instruction, suggested_response }
    }

    pub fn topic_categories(&self, query: &str) -> Vec<TopicCategory> {
        let query = query.to_lowercase();
        TOPIC_KEYWORDS
            .iter()
            .filter(|(_, keywords)| keywords.iter().any(|keyword| query.contains(keyword)))
            .map(|(category, _)| *category)
            .collect()
    }

    /// Keeps at most three places relevant to the query; without a topic match
    /// the first three candidates are returned unchanged.
    pub fn filter_places(&self, query: &str, places: &[Place]) -> Vec<Place> {
        let categories = self.topic_categories(query);
        if categories.is_empty() {
            return places.iter().take(MAX_CONTEXT_PLACES).cloned().collect();
        }

        let keywords: Vec<&str> = TOPIC_KEYWORDS
            .iter()
            .filter(|(category, _)| categories.contains(category))
            .flat_map(|(_, keywords)| keywords.iter().copied())
            .collect();

        places
            .iter()
            .filter(|place| {
                let haystack = place.descriptive_text();
                keywords.iter().any(|keyword| haystack.contains(keyword))
            })
            .take(MAX_CONTEXT_PLACES)
            .cloned()
            .collect()
    }
}

/// Response budget granted to each tier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseProfile {
    pub max_places: usize,
    pub max_response_tokens: u32,
    pub include_tips: bool,
    pub include_booking_links: bool,
    pub include_events: bool,
    pub persona: String,
}

impl ResponseProfile {
    pub fn for_tier(tier: Tier) -> Self {
        match tier {
            Tier::Free => Self {
                max_places: 3,
                max_response_tokens: 100,
                include_tips: false,
                include_booking_links: false,
                include_events: false,
                persona: "concise".to_string(),
            },
            Tier::Premium => Self {
                max_places: 10,
                max_response_tokens: 300,
                include_tips: true,
                include_booking_links: true,
                include_events: true,
                persona: "detailed".to_string(),
            },
        }
    }
}
