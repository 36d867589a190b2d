use alexandra_core::config::LoadOptions;
use alexandra_core::SessionId;

use crate::commands::session::run_with_runtime;
use crate::commands::CommandResult;

pub fn run(options: &LoadOptions, session: &str) -> CommandResult {
    let session_id = SessionId::from(session);
    run_with_runtime("usage", options, |runtime| async move {
        let stats = runtime.usage_stats(&session_id).await?;
        Ok(CommandResult::success_with_data("usage", "usage loaded", &stats))
    })
}
