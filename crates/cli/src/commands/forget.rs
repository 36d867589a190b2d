use alexandra_core::config::LoadOptions;
use alexandra_core::SessionId;
use serde_json::json;

use crate::commands::session::run_with_runtime;
use crate::commands::CommandResult;

pub fn run(options: &LoadOptions, session: &str) -> CommandResult {
    let session_id = SessionId::from(session);
    run_with_runtime("forget", options, |runtime| async move {
        let deleted = runtime.forget(&session_id).await?;
        let message = if deleted { "tourist memory erased" } else { "no tourist memory stored" };
        Ok(CommandResult::success_with_data("forget", message, &json!({ "deleted": deleted })))
    })
}
