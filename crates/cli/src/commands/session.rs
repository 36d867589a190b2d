//! Shared plumbing for commands that drive a [`SessionRuntime`] against the configured database.

use std::future::Future;

use alexandra_agent::SessionRuntime;
use alexandra_core::config::{AppConfig, LoadOptions};
use alexandra_core::errors::ApplicationError;
use alexandra_db::{connect_with_settings, migrations, DbPool};
use anyhow::Context;
use tracing::debug;

use crate::commands::CommandResult;

/// A preflight stage that failed before any session work ran.
#[derive(Debug)]
pub struct StageFailure {
    pub error_class: &'static str,
    pub exit_code: u8,
    pub error: anyhow::Error,
}

impl StageFailure {
    fn new(error_class: &'static str, exit_code: u8, error: anyhow::Error) -> Self {
        Self { error_class, exit_code, error }
    }

    pub fn into_result(self, command: &str) -> CommandResult {
        CommandResult::failure(command, self.error_class, format!("{:#}", self.error), self.exit_code)
    }
}

pub fn load_config(command: &str, options: &LoadOptions) -> Result<AppConfig, CommandResult> {
    AppConfig::load(options.clone()).map_err(|error| {
        CommandResult::failure(
            command,
            "config_validation",
            format!("configuration issue: {error}"),
            2,
        )
    })
}

pub fn build_runtime(command: &str) -> Result<tokio::runtime::Runtime, CommandResult> {
    tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
        CommandResult::failure(
            command,
            "runtime_init",
            format!("failed to initialize async runtime: {error}"),
            3,
        )
    })
}

/// Connects and brings the schema up to date.
pub async fn open_pool(config: &AppConfig) -> Result<DbPool, StageFailure> {
    let pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .context("failed to connect to database")
    .map_err(|error| StageFailure::new("db_connectivity", 4, error))?;

    if let Err(error) = migrations::run_pending(&pool)
        .await
        .context("failed to apply pending migrations")
    {
        pool.close().await;
        return Err(StageFailure::new("migration", 5, error));
    }

    Ok(pool)
}

/// Runs one operation against a freshly wired runtime and closes the pool afterwards.
pub fn run_with_runtime<F, Fut>(command: &str, options: &LoadOptions, operation: F) -> CommandResult
where
    F: FnOnce(SessionRuntime) -> Fut,
    Fut: Future<Output = Result<CommandResult, ApplicationError>>,
{
    let config = match load_config(command, options) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match build_runtime(command) {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let correlation_id = uuid::Uuid::new_v4().to_string();
    runtime.block_on(async {
        let pool = match open_pool(&config).await {
            Ok(pool) => pool,
            Err(failure) => return failure.into_result(command),
        };

        debug!(
            event_name = "cli.command_started",
            command,
            correlation_id = %correlation_id,
            "running session command"
        );
        let session_runtime = SessionRuntime::from_config(&config, pool.clone());
        let result = operation(session_runtime).await;
        pool.close().await;

        result.unwrap_or_else(|error| {
            CommandResult::from_application_error(command, error, &correlation_id)
        })
    })
}
