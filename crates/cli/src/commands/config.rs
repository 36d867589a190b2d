use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use alexandra_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

use crate::commands::CommandResult;

/// One reported setting and the environment variables that can override it.
struct Field {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

pub fn run(options: &LoadOptions) -> CommandResult {
    let config = match AppConfig::load(options.clone()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                format!("config validation failed: {error}"),
                2,
            );
        }
    };

    let config_file_path = options.config_path.clone().or_else(detect_config_path);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in effective_fields(&config) {
        let source = field_source(
            field.key,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key, &field.value, source));
    }

    CommandResult { exit_code: 0, output: lines.join("\n") }
}

fn effective_fields(config: &AppConfig) -> Vec<Field> {
    let weather_api_key = config
        .weather
        .api_key
        .as_ref()
        .map(|key| redact_secret(key.expose_secret()))
        .unwrap_or_else(|| "<unset>".to_string());
    let fixed_temperature = config
        .weather
        .fixed_temperature_c
        .map(|celsius| format!("{celsius:.1}"))
        .unwrap_or_else(|| "<unset>".to_string());

    vec![
        Field {
            key: "database.url",
            value: config.database.url.clone(),
            env_keys: &["ALEXANDRA_DATABASE_URL"],
        },
        Field {
            key: "database.max_connections",
            value: config.database.max_connections.to_string(),
            env_keys: &["ALEXANDRA_DATABASE_MAX_CONNECTIONS"],
        },
        Field {
            key: "database.timeout_secs",
            value: config.database.timeout_secs.to_string(),
            env_keys: &["ALEXANDRA_DATABASE_TIMEOUT_SECS"],
        },
        Field {
            key: "sessions.idle_eviction_secs",
            value: config.sessions.idle_eviction_secs.to_string(),
            env_keys: &["ALEXANDRA_SESSIONS_IDLE_EVICTION_SECS"],
        },
        Field {
            key: "billing.free_interaction_cap",
            value: config.billing.free_interaction_cap.to_string(),
            env_keys: &["ALEXANDRA_BILLING_FREE_INTERACTION_CAP"],
        },
        Field {
            key: "weather.default_city",
            value: config.weather.default_city.clone(),
            env_keys: &["ALEXANDRA_WEATHER_DEFAULT_CITY"],
        },
        Field {
            key: "weather.api_key",
            value: weather_api_key,
            env_keys: &["ALEXANDRA_WEATHER_API_KEY"],
        },
        Field {
            key: "weather.fixed_temperature_c",
            value: fixed_temperature,
            env_keys: &["ALEXANDRA_WEATHER_FIXED_TEMPERATURE_C"],
        },
        Field {
            key: "logging.level",
            value: config.logging.level.clone(),
            env_keys: &["ALEXANDRA_LOGGING_LEVEL", "ALEXANDRA_LOG_LEVEL"],
        },
        Field {
            key: "logging.format",
            value: config.logging.format.as_str().to_string(),
            env_keys: &["ALEXANDRA_LOGGING_FORMAT", "ALEXANDRA_LOG_FORMAT"],
        },
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    ["alexandra.toml", "config/alexandra.toml"].into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keeps a short prefix so operators can tell keys apart without exposing them.
fn redact_secret(secret: &str) -> String {
    let trimmed = secret.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    match trimmed.split_once('-') {
        Some((prefix, _)) if prefix.len() <= 4 => format!("{prefix}-***"),
        _ => "<redacted>".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use toml::Value;

    use super::{contains_path, redact_secret};

    #[test]
    fn redaction_never_echoes_the_secret_body() {
        assert_eq!(redact_secret("wk-secret-value"), "wk-***");
        assert_eq!(redact_secret("plainsecret"), "<redacted>");
        assert_eq!(redact_secret("   "), "<empty>");
    }

    #[test]
    fn nested_keys_are_resolved_in_the_file_document() {
        let doc: Value = "[billing]\nfree_interaction_cap = 10\n".parse().expect("toml");
        assert!(contains_path(&doc, "billing.free_interaction_cap"));
        assert!(!contains_path(&doc, "weather.default_city"));
    }
}
