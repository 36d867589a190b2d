use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::conversation::{ConversationState, OrderLine};
use crate::flows::states::Phase;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    None,
    Low,
    Medium,
    High,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowAction {
    ProcessBill,
    BeQuick,
    SuggestTapas,
    SuggestMains,
    SuggestDessert,
    UpsellWine,
    WeatherDrink,
    WeatherFood,
    Listen,
}

impl FlowAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProcessBill => "process_bill",
            Self::BeQuick => "be_quick",
            Self::SuggestTapas => "suggest_tapas",
            Self::SuggestMains => "suggest_mains",
            Self::SuggestDessert => "suggest_dessert",
            Self::UpsellWine => "upsell_wine",
            Self::WeatherDrink => "weather_drink",
            Self::WeatherFood => "weather_food",
            Self::Listen => "listen",
        }
    }
}

/// Advisory next step handed to the conversational agent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowHint {
    pub action: FlowAction,
    pub suggestion: Option<String>,
    pub urgency: Urgency,
    pub can_skip: bool,
}

impl FlowHint {
    fn new(action: FlowAction, suggestion: Option<&str>, urgency: Urgency, can_skip: bool) -> Self {
        Self { action, suggestion: suggestion.map(str::to_string), urgency, can_skip }
    }

    pub fn listen() -> Self {
        Self::new(FlowAction::Listen, None, Urgency::None, true)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AdvisorEnvironment {
    pub temperature_c: f64,
    pub hour: u32,
    pub now: DateTime<Utc>,
}

impl AdvisorEnvironment {
    pub fn new(temperature_c: f64, hour: u32) -> Self {
        Self { temperature_c, hour, now: Utc::now() }
    }

    pub fn at(temperature_c: f64, hour: u32, now: DateTime<Utc>) -> Self {
        Self { temperature_c, hour, now }
    }
}

type RulePredicate = fn(&ConversationState, &AdvisorEnvironment) -> bool;

/// One row of the advisory table: when `applies` holds, `hint` is the answer.
pub struct FlowRule {
    pub name: &'static str,
    pub applies: RulePredicate,
    pub hint: fn() -> FlowHint,
}

const RED_MEAT_MAINS: &[&str] = &["entrecot", "solomillo", "secreto", "presa"];
const WINE_MARKERS: &[&str] = &["vino", "rioja", "ribera", "wine"];

const DRINKS_IDLE_MINUTES: f64 = 5.0;
const TAPAS_IDLE_MINUTES: f64 = 15.0;
const CHECK_IDLE_MINUTES: f64 = 20.0;
const HOT_ABOVE_C: f64 = 28.0;
const COLD_BELOW_C: f64 = 15.0;

/// Evaluated top to bottom; the first matching rule wins.
pub const FLOW_RULES: &[FlowRule] = &[
    FlowRule {
        name: "bill_requested",
        applies: |state, _| state.signals.asked_for_bill || state.phase == Phase::Bill,
        hint: || {
            FlowHint::new(
                FlowAction::ProcessBill,
                Some("Aquí tenéis la cuenta. ¿Os cobro con tarjeta?"),
                Urgency::High,
                false,
            )
        },
    },
    FlowRule {
        name: "guest_in_a_hurry",
        applies: |state, _| state.signals.mentioned_hurry,
        hint: || FlowHint::new(FlowAction::BeQuick, None, Urgency::High, true),
    },
    FlowRule {
        name: "drinks_without_food",
        applies: |state, env| {
            state.phase == Phase::Drinks
                && !state.order.has_food()
                && state.minutes_in_phase(env.now) > DRINKS_IDLE_MINUTES
        },
        hint: || {
            FlowHint::new(
                FlowAction::SuggestTapas,
                Some("¿Queréis algo para picar? Las bravas vuelan hoy."),
                Urgency::Low,
                true,
            )
        },
    },
    FlowRule {
        name: "tapas_without_mains",
        applies: |state, env| {
            state.phase == Phase::Tapas
                && state.order.mains.is_empty()
                && state.minutes_in_phase(env.now) > TAPAS_IDLE_MINUTES
        },
        hint: || {
            FlowHint::new(
                FlowAction::SuggestMains,
                Some("¿Vemos algo más contundente? El solomillo al whisky es especialidad."),
                Urgency::Low,
                true,
            )
        },
    },
    FlowRule {
        name: "check_ready_for_dessert",
        applies: |state, env| {
            state.phase == Phase::Check && state.minutes_in_phase(env.now) > CHECK_IDLE_MINUTES
        },
        hint: || {
            FlowHint::new(
                FlowAction::SuggestDessert,
                Some("¿Habéis dejado hueco para el postre? La tarta de queso es casera."),
                Urgency::Low,
                true,
            )
        },
    },
    FlowRule {
        name: "red_meat_without_wine",
        applies: |state, _| {
            matches!(state.phase, Phase::Tapas | Phase::Mains)
                && state.order.mains.iter().any(is_red_meat)
                && !state.order.drinks.iter().any(is_wine)
        },
        hint: || {
            FlowHint::new(
                FlowAction::UpsellWine,
                Some("¿Os apetece un Ribera para acompañar esa carne? Tenemos uno por copas muy bueno."),
                Urgency::Medium,
                true,
            )
        },
    },
    FlowRule {
        name: "hot_day_greeting",
        applies: |state, env| state.phase == Phase::Greeting && env.temperature_c > HOT_ABOVE_C,
        hint: || {
            FlowHint::new(
                FlowAction::WeatherDrink,
                Some("Hace un calor terrible fuera. ¿Un tinto de verano bien frío?"),
                Urgency::Medium,
                false,
            )
        },
    },
    FlowRule {
        name: "cold_day_comfort_food",
        applies: |state, env| {
            matches!(state.phase, Phase::Greeting | Phase::Drinks) && env.temperature_c < COLD_BELOW_C
        },
        hint: || {
            FlowHint::new(
                FlowAction::WeatherFood,
                Some("Con este frío entra genial el guiso del día (Carrillada)."),
                Urgency::Medium,
                true,
            )
        },
    },
];

fn is_red_meat(line: &OrderLine) -> bool {
    let item = line.item.to_lowercase();
    RED_MEAT_MAINS.iter().any(|cut| item.contains(cut))
}

fn is_wine(line: &OrderLine) -> bool {
    let item = line.item.to_lowercase();
    WINE_MARKERS.iter().any(|marker| item.contains(marker))
}

#[derive(Clone, Copy, Debug)]
pub struct FlowAdvisor {
    rules: &'static [FlowRule],
}

impl Default for FlowAdvisor {
    fn default() -> Self {
        Self { rules: FLOW_RULES }
    }
}

impl FlowAdvisor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rules(&self) -> &'static [FlowRule] {
        self.rules
    }

    pub fn suggest(&self, state: &ConversationState, environment: &AdvisorEnvironment) -> FlowHint {
        self.matching_rule(state, environment).map(|rule| (rule.hint)()).unwrap_or_else(FlowHint::listen)
    }

    pub fn suggest_flow(&self, state: &ConversationState, temperature_c: f64, hour: u32) -> FlowHint {
        self.suggest(state, &AdvisorEnvironment::new(temperature_c, hour))
    }

    /// Name of the rule that decided the hint, `None` when the advisor falls back to listening.
    pub fn matching_rule(
        &self,
        state: &ConversationState,
        environment: &AdvisorEnvironment,
    ) -> Option<&'static FlowRule> {
        self.rules.iter().find(|rule| (rule.applies)(state, environment))
    }
}

impl std::fmt::Debug for FlowRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowRule").field("name", &self.name).finish()
    }
}
