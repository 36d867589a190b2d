use chrono::{DateTime, Utc};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::domain::conversation::{BudgetSensitivity, ConversationState, Pace};
use crate::flows::engine::PhaseMachine;
use crate::flows::states::PhaseEvent;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    BillRequest,
    Hurry,
    Celebration,
    Dietary,
    BudgetSensitive,
    RecommendationRequest,
    Praise,
    Complaint,
}

impl SignalKind {
    pub const ALL: [SignalKind; 8] = [
        SignalKind::BillRequest,
        SignalKind::Hurry,
        SignalKind::Celebration,
        SignalKind::Dietary,
        SignalKind::BudgetSensitive,
        SignalKind::RecommendationRequest,
        SignalKind::Praise,
        SignalKind::Complaint,
    ];
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalRule {
    pub kind: SignalKind,
    pub patterns: Vec<String>,
}

impl SignalRule {
    fn new(kind: SignalKind, patterns: &[&str]) -> Self {
        Self { kind, patterns: patterns.iter().map(|pattern| pattern.to_string()).collect() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalDetectorConfig {
    pub rules: Vec<SignalRule>,
    /// Dietary words and the preference tag each one records.
    pub dietary_tags: Vec<(String, String)>,
    pub allergy_tags: Vec<(String, String)>,
}

impl Default for SignalDetectorConfig {
    fn default() -> Self {
        Self {
            rules: vec![
                SignalRule::new(
                    SignalKind::BillRequest,
                    &[r"\bcuenta\b", r"\bpagar\b", r"\bcobrar\b", r"\bcu(á|a)nto es\b", r"\bdolorosa\b"],
                ),
                SignalRule::new(
                    SignalKind::Hurry,
                    &[r"\bprisa\b", r"\br(á|a)pido\b", r"\birnos\b", r"\btiempo\b"],
                ),
                SignalRule::new(
                    SignalKind::Celebration,
                    &[r"\bcumplea(ñ|n)os\b", r"\baniversario\b", r"\bcelebrar\b", r"\bespecial\b"],
                ),
                SignalRule::new(
                    SignalKind::Dietary,
                    &[
                        r"\bvegetarian[oa]s?\b",
                        r"\bvegan[oa]s?\b",
                        r"\bcarne\b",
                        r"\bal(é|e)rgic[oa]s?\b",
                        r"\balergia\b",
                        r"\bcel(í|i)ac[oa]s?\b",
                        r"\bsin gluten\b",
                    ],
                ),
                SignalRule::new(
                    SignalKind::BudgetSensitive,
                    &[r"\bbarato\b", r"\becon(ó|o)mico\b", r"\bprecio\b", r"\bcuesta\b"],
                ),
                SignalRule::new(
                    SignalKind::RecommendationRequest,
                    &[r"\brecomienda(s|n)?\b", r"\bsugiere(s|n)?\b", r"\bbueno\b", r"\bespecialidad\b"],
                ),
                SignalRule::new(
                    SignalKind::Praise,
                    &[r"\bbuen(í|i)simo\b", r"\bincre(í|i)ble\b", r"\bdelicioso\b", r"\bespectacular\b"],
                ),
                SignalRule::new(
                    SignalKind::Complaint,
                    &[r"\bfr(í|i)o\b", r"\btarda\b", r"\bmal\b", r"\bfe(o|a)\b"],
                ),
            ],
            dietary_tags: vec![
                (r"\bvegetarian[oa]s?\b".to_string(), "vegetarian".to_string()),
                (r"\bvegan[oa]s?\b".to_string(), "vegan".to_string()),
            ],
            allergy_tags: vec![
                (r"\bcel(í|i)ac[oa]s?\b".to_string(), "gluten".to_string()),
                (r"\bsin gluten\b".to_string(), "gluten".to_string()),
                (r"\bfrutos secos\b".to_string(), "nuts".to_string()),
                (r"\bmarisco\b".to_string(), "shellfish".to_string()),
                (r"\blactosa\b".to_string(), "lactose".to_string()),
            ],
        }
    }
}

/// Compiles case-insensitive patterns, skipping any that fail to parse.
pub(crate) fn compile_patterns<'a>(patterns: impl IntoIterator<Item = &'a str>) -> Vec<Regex> {
    patterns
        .into_iter()
        .filter_map(|pattern| RegexBuilder::new(pattern).case_insensitive(true).build().ok())
        .collect()
}

#[derive(Clone, Debug)]
struct CompiledRule {
    kind: SignalKind,
    patterns: Vec<Regex>,
}

#[derive(Clone, Debug)]
struct CompiledTag {
    pattern: Regex,
    tag: String,
}

/// Extracts waiter-relevant signals from one guest utterance.
///
/// Each category is tested independently, so one sentence may raise several
/// signals. Unmatched or empty text leaves the state untouched.
#[derive(Clone, Debug)]
pub struct SignalDetector {
    config: SignalDetectorConfig,
    rules: Vec<CompiledRule>,
    dietary_tags: Vec<CompiledTag>,
    allergy_tags: Vec<CompiledTag>,
    machine: PhaseMachine,
}

impl Default for SignalDetector {
    fn default() -> Self {
        Self::new(SignalDetectorConfig::default())
    }
}

impl SignalDetector {
    pub fn new(config: SignalDetectorConfig) -> Self {
        let rules = config
            .rules
            .iter()
            .map(|rule| CompiledRule {
                kind: rule.kind,
                patterns: compile_patterns(rule.patterns.iter().map(String::as_str)),
            })
            .collect();
        let dietary_tags = compile_tags(&config.dietary_tags);
        let allergy_tags = compile_tags(&config.allergy_tags);

        Self { config, rules, dietary_tags, allergy_tags, machine: PhaseMachine::new() }
    }

    pub fn config(&self) -> &SignalDetectorConfig {
        &self.config
    }

    pub fn detect(&self, text: &str) -> Vec<SignalKind> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let normalized = text.to_lowercase();
        self.rules
            .iter()
            .filter(|rule| rule.patterns.iter().any(|pattern| pattern.is_match(&normalized)))
            .map(|rule| rule.kind)
            .collect()
    }

    /// Folds the signals found in `text` into `state`.
    pub fn apply(&self, text: &str, mut state: ConversationState) -> ConversationState {
        self.apply_at(text, &mut state, Utc::now());
        state
    }

    pub fn apply_at(
        &self,
        text: &str,
        state: &mut ConversationState,
        now: DateTime<Utc>,
    ) -> Vec<SignalKind> {
        let detected = self.detect(text);
        if detected.is_empty() {
            return detected;
        }

        let normalized = text.to_lowercase();
        for kind in &detected {
            match kind {
                SignalKind::BillRequest => {
                    state.signals.asked_for_bill = true;
                    // The bill override is valid from every phase.
                    if let Ok(transition) = self.machine.transition(state.phase, PhaseEvent::BillRequested) {
                        state.enter_phase(transition.to, now);
                    }
                }
                SignalKind::Hurry => {
                    state.signals.mentioned_hurry = true;
                    state.preferences.pace = Pace::Quick;
                }
                SignalKind::Celebration => state.signals.mentioned_celebration = true,
                SignalKind::Dietary => {
                    state.signals.mentioned_dietary = true;
                    state.preferences.dietary.extend(matching_tags(&self.dietary_tags, &normalized));
                    state.preferences.allergies.extend(matching_tags(&self.allergy_tags, &normalized));
                }
                SignalKind::BudgetSensitive => {
                    state.signals.budget_sensitive = true;
                    state.preferences.budget_sensitivity = BudgetSensitivity::High;
                }
                SignalKind::RecommendationRequest => state.signals.asked_for_recommendations = true,
                SignalKind::Praise => state.signals.praised_food = true,
                SignalKind::Complaint => state.signals.complained = true,
            }
        }

        detected
    }
}

fn compile_tags(tags: &[(String, String)]) -> Vec<CompiledTag> {
    tags.iter()
        .filter_map(|(pattern, tag)| {
            compile_patterns([pattern.as_str()])
                .into_iter()
                .next()
                .map(|pattern| CompiledTag { pattern, tag: tag.clone() })
        })
        .collect()
}

fn matching_tags(tags: &[CompiledTag], normalized: &str) -> Vec<String> {
    tags.iter().filter(|tag| tag.pattern.is_match(normalized)).map(|tag| tag.tag.clone()).collect()
}
