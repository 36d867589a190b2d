use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::conversation::ConversationState;
use crate::flows::states::{Phase, PhaseEvent, PhaseTransition};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PhaseTransitionError {
    #[error("conversation already reached terminal phase {phase}; cannot move to {requested}")]
    TerminalPhase { phase: Phase, requested: Phase },
}

/// Phase state machine for a table conversation.
///
/// The only automatic move is the bill override; every other advance is an
/// explicit [`PhaseEvent::Set`] from the surrounding agent.
#[derive(Clone, Debug, Default)]
pub struct PhaseMachine;

impl PhaseMachine {
    pub fn new() -> Self {
        Self
    }

    pub fn initial_phase(&self) -> Phase {
        Phase::Greeting
    }

    pub fn transition(
        &self,
        current: Phase,
        event: PhaseEvent,
    ) -> Result<PhaseTransition, PhaseTransitionError> {
        let to = match event {
            PhaseEvent::BillRequested => Phase::Bill,
            PhaseEvent::Set(requested) if current.is_terminal() && requested != current => {
                return Err(PhaseTransitionError::TerminalPhase { phase: current, requested });
            }
            PhaseEvent::Set(requested) => requested,
        };

        Ok(PhaseTransition { from: current, to, event })
    }

    pub fn apply(
        &self,
        state: &mut ConversationState,
        event: PhaseEvent,
        now: DateTime<Utc>,
    ) -> Result<PhaseTransition, PhaseTransitionError> {
        let transition = self.transition(state.phase, event)?;
        state.enter_phase(transition.to, now);
        Ok(transition)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use crate::domain::conversation::ConversationState;
    use crate::domain::session::SessionId;
    use crate::flows::engine::{PhaseMachine, PhaseTransitionError};
    use crate::flows::states::{Phase, PhaseEvent};

    #[test]
    fn happy_path_walks_every_phase_in_order() {
        let machine = PhaseMachine::new();
        let mut phase = machine.initial_phase();
        let mut visited = vec![phase];

        while let Some(next) = phase.next() {
            phase = machine.transition(phase, PhaseEvent::Set(next)).expect("advance").to;
            visited.push(phase);
        }

        assert_eq!(visited, Phase::ORDERED.to_vec());
        assert!(phase.is_terminal());
    }

    #[test]
    fn bill_request_overrides_any_phase() {
        let machine = PhaseMachine::new();
        for phase in Phase::ORDERED {
            let outcome = machine.transition(phase, PhaseEvent::BillRequested).expect("bill");
            assert_eq!(outcome.to, Phase::Bill);
        }
    }

    #[test]
    fn farewell_rejects_explicit_moves() {
        let machine = PhaseMachine::new();
        let error = machine
            .transition(Phase::Farewell, PhaseEvent::Set(Phase::Mains))
            .expect_err("farewell is terminal");

        assert_eq!(
            error,
            PhaseTransitionError::TerminalPhase { phase: Phase::Farewell, requested: Phase::Mains }
        );
        assert!(machine.transition(Phase::Farewell, PhaseEvent::Set(Phase::Farewell)).is_ok());
    }

    #[test]
    fn applying_a_transition_restarts_phase_clock() {
        let machine = PhaseMachine::new();
        let start = Utc::now();
        let later = start + Duration::minutes(3);
        let mut state = ConversationState::new(SessionId::from("sess-1"), start);

        let outcome =
            machine.apply(&mut state, PhaseEvent::Set(Phase::Drinks), later).expect("advance");

        assert!(outcome.changed());
        assert_eq!(state.phase, Phase::Drinks);
        assert_eq!(state.phase_started_at, later);
    }

    #[test]
    fn explicit_set_can_leave_bill() {
        let machine = PhaseMachine::new();
        let outcome = machine.transition(Phase::Bill, PhaseEvent::Set(Phase::Dessert)).expect("set");
        assert_eq!(outcome.to, Phase::Dessert);
    }
}
