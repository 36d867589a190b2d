pub mod engine;
pub mod states;

pub use engine::{PhaseMachine, PhaseTransitionError};
pub use states::{Phase, PhaseEvent, PhaseTransition};
