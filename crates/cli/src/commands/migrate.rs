use alexandra_core::config::LoadOptions;

use crate::commands::session::{build_runtime, load_config, open_pool};
use crate::commands::CommandResult;

pub fn run(options: &LoadOptions) -> CommandResult {
    let config = match load_config("migrate", options) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match build_runtime("migrate") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    runtime.block_on(async {
        match open_pool(&config).await {
            Ok(pool) => {
                pool.close().await;
                CommandResult::success("migrate", "applied pending migrations")
            }
            Err(failure) => failure.into_result("migrate"),
        }
    })
}
