use alexandra_agent::{TurnOutcome, TurnRequest};
use alexandra_core::config::LoadOptions;

use crate::commands::session::run_with_runtime;
use crate::commands::CommandResult;

pub fn run(
    options: &LoadOptions,
    session: &str,
    text: &str,
    last_response: Option<String>,
    city: Option<String>,
) -> CommandResult {
    let mut request = TurnRequest::new(session, text);
    if let Some(last_response) = last_response {
        request = request.with_last_response(last_response);
    }
    if let Some(city) = city {
        request = request.with_city(city);
    }

    run_with_runtime("turn", options, |runtime| async move {
        let outcome = runtime.handle_turn(request).await?;
        let message = match &outcome {
            TurnOutcome::Blocked { .. } => "turn blocked by the free interaction limit",
            TurnOutcome::Completed(_) => "turn processed",
        };
        Ok(CommandResult::success_with_data("turn", message, &outcome))
    })
}
