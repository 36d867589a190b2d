pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use alexandra_core::config::{AppConfig, LoadOptions, LogFormat};
use clap::{Parser, Subcommand};
use tracing::Level;

#[derive(Debug, Parser)]
#[command(
    name = "alexandra",
    about = "Alexandra operator CLI",
    long_about = "Operate the Alexandra session runtime: migrations, readiness checks, config inspection, and per-session turns, usage, upgrades, and recovery.",
    after_help = "Examples:\n  alexandra doctor --json\n  alexandra turn --session mesa-4 --text \"Hola, ¿qué me recomiendas?\"\n  alexandra usage --session mesa-4"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Read configuration from this TOML file instead of alexandra.toml")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Validate config, DB connectivity, and migration state")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Process one guest utterance through the session runtime")]
    Turn {
        #[arg(long)]
        session: String,
        #[arg(long)]
        text: String,
        #[arg(long, help = "Previous assistant reply, echoed back on repeat requests")]
        last_response: Option<String>,
        #[arg(long, help = "City for the weather lookup (defaults to weather.default_city)")]
        city: Option<String>,
    },
    #[command(about = "Show billing totals and remaining free interactions for a session")]
    Usage {
        #[arg(long)]
        session: String,
    },
    #[command(about = "Record a completed premium purchase and link the session to an email")]
    Upgrade {
        #[arg(long)]
        session: String,
        #[arg(long)]
        email: String,
    },
    #[command(about = "Find the session previously linked to an email")]
    Recover {
        #[arg(long)]
        email: String,
    },
    #[command(about = "Erase the tourist memory for a session (the usage ledger is kept)")]
    Forget {
        #[arg(long)]
        session: String,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = load_options(cli.config);

    init_logging(&AppConfig::load(options.clone()).unwrap_or_default());

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(&options),
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(&options, json) }
        }
        Command::Config => commands::config::run(&options),
        Command::Turn { session, text, last_response, city } => {
            commands::turn::run(&options, &session, &text, last_response, city)
        }
        Command::Usage { session } => commands::usage::run(&options, &session),
        Command::Upgrade { session, email } => commands::upgrade::run(&options, &session, &email),
        Command::Recover { email } => commands::recover::run(&options, &email),
        Command::Forget { session } => commands::forget::run(&options, &session),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

fn load_options(config_path: Option<PathBuf>) -> LoadOptions {
    match config_path {
        Some(path) => {
            LoadOptions { config_path: Some(path), require_file: true, ..LoadOptions::default() }
        }
        None => LoadOptions::default(),
    }
}

/// Logs go to stderr so stdout stays a single JSON document.
fn init_logging(config: &AppConfig) {
    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    match config.logging.format {
        LogFormat::Compact => tracing_subscriber::fmt()
            .with_target(false)
            .with_max_level(log_level)
            .with_writer(std::io::stderr)
            .compact()
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_target(false)
            .with_max_level(log_level)
            .with_writer(std::io::stderr)
            .pretty()
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .with_target(false)
            .with_max_level(log_level)
            .with_writer(std::io::stderr)
            .json()
            .init(),
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Cli, Command};

    #[test]
    fn turn_accepts_optional_city_and_last_response() {
        let cli = Cli::parse_from([
            "alexandra",
            "turn",
            "--session",
            "mesa-4",
            "--text",
            "¿Cómo?",
            "--last-response",
            "Te recomiendo el salmorejo",
        ]);

        match cli.command {
            Command::Turn { session, last_response, city, .. } => {
                assert_eq!(session, "mesa-4");
                assert_eq!(last_response.as_deref(), Some("Te recomiendo el salmorejo"));
                assert_eq!(city, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn config_flag_is_global() {
        let cli = Cli::parse_from(["alexandra", "usage", "--session", "mesa-4", "--config", "ops.toml"]);
        assert_eq!(cli.config.as_deref(), Some(std::path::Path::new("ops.toml")));
        assert!(matches!(cli.command, Command::Usage { .. }));
    }
}
