pub mod advisor;
pub mod config;
pub mod domain;
pub mod environment;
pub mod errors;
pub mod flows;
pub mod ledger;
pub mod memory;
pub mod optimizer;
pub mod signals;

pub use advisor::{AdvisorEnvironment, FlowAction, FlowAdvisor, FlowHint, Urgency};
pub use domain::conversation::{ConversationState, Course, Order, OrderLine};
pub use domain::memory::{PlaceVisit, Role, SessionData, TouristPreferences};
pub use domain::place::Place;
pub use domain::session::{SessionId, Tier};
pub use domain::usage::{SessionUsage, UsageItem};
pub use environment::{FixedWeather, TimeOfDayWeather, WeatherProvider, WeatherReport};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use flows::{Phase, PhaseEvent, PhaseMachine, PhaseTransition};
pub use ledger::{PriceTable, QuotaPolicy, QuotaStatus, UsageStats};
pub use memory::{ContextRenderer, PreferenceLearner};
pub use optimizer::{Intent, IntentOptimizer, OptimizerDecision, ResponseProfile};
pub use signals::{SignalDetector, SignalDetectorConfig, SignalKind};
