use alexandra_agent::RecoveryOutcome;
use alexandra_core::config::LoadOptions;

use crate::commands::session::run_with_runtime;
use crate::commands::CommandResult;

pub fn run(options: &LoadOptions, email: &str) -> CommandResult {
    let email = email.to_string();
    run_with_runtime("recover", options, |runtime| async move {
        let outcome = runtime.recover_session(&email).await?;
        let message = match outcome {
            RecoveryOutcome::Found { .. } => "session recovered",
            RecoveryOutcome::NotFound => "no session linked to this email",
        };
        Ok(CommandResult::success_with_data("recover", message, &outcome))
    })
}
