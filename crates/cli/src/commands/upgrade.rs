use alexandra_core::config::LoadOptions;
use alexandra_core::SessionId;

use crate::commands::session::run_with_runtime;
use crate::commands::CommandResult;

pub fn run(options: &LoadOptions, session: &str, email: &str) -> CommandResult {
    let session_id = SessionId::from(session);
    let email = email.to_string();
    run_with_runtime("upgrade", options, |runtime| async move {
        let receipt = runtime.complete_upgrade(&session_id, &email).await?;
        let message = if receipt.upgraded { "session upgraded to premium" } else { "session already premium" };
        Ok(CommandResult::success_with_data("upgrade", message, &receipt))
    })
}
