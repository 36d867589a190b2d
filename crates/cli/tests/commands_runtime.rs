use std::env;
use std::sync::{Mutex, OnceLock};

use alexandra_cli::commands::{config, doctor, forget, migrate, recover, turn, upgrade, usage};
use alexandra_core::config::LoadOptions;
use serde_json::Value;
use tempfile::TempDir;

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(&[("ALEXANDRA_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run(&LoadOptions::default());
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn migrate_returns_config_failure_for_invalid_cap() {
    with_env(
        &[
            ("ALEXANDRA_DATABASE_URL", "sqlite::memory:"),
            ("ALEXANDRA_BILLING_FREE_INTERACTION_CAP", "0"),
        ],
        || {
            let result = migrate::run(&LoadOptions::default());
            assert_eq!(result.exit_code, 2, "expected config validation failure code");

            let payload = parse_payload(&result.output);
            assert_eq!(payload["command"], "migrate");
            assert_eq!(payload["status"], "error");
            assert_eq!(payload["error_class"], "config_validation");
        },
    );
}

#[test]
fn turn_reports_db_connectivity_failure() {
    let dir = TempDir::new().expect("tempdir");
    let missing = format!("sqlite://{}", dir.path().join("missing").join("alexandra.db").display());
    with_env(&[("ALEXANDRA_DATABASE_URL", &missing)], || {
        let result = turn::run(&LoadOptions::default(), "mesa-1", "Hola", None, None);
        assert_eq!(result.exit_code, 4);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "db_connectivity");
    });
}

#[test]
fn turn_processes_greeting_and_bills_the_session() {
    let db = TestDatabase::new();
    with_env(&db.env(&[("ALEXANDRA_WEATHER_FIXED_TEMPERATURE_C", "22")]), || {
        let options = LoadOptions::default();
        let result = turn::run(&options, "mesa-2", "Hola", None, Some("Sevilla".to_string()));
        assert_eq!(result.exit_code, 0, "unexpected output: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "turn");
        assert_eq!(payload["data"]["outcome"], "completed");
        assert_eq!(payload["data"]["session_id"], "mesa-2");
        assert_eq!(payload["data"]["weather"]["city"], "Sevilla");
        assert_eq!(payload["data"]["decision"]["bypass"], true);

        let stats = parse_payload(&usage::run(&options, "mesa-2").output);
        assert_eq!(stats["status"], "ok");
        assert_eq!(stats["data"]["interaction_count"], 0);
    });
}

#[test]
fn turn_is_blocked_once_the_free_cap_is_spent() {
    let db = TestDatabase::new();
    with_env(&db.env(&[("ALEXANDRA_BILLING_FREE_INTERACTION_CAP", "1")]), || {
        let options = LoadOptions::default();
        let first = turn::run(&options, "mesa-3", "¿Dónde como paella cerca?", None, None);
        assert_eq!(parse_payload(&first.output)["data"]["outcome"], "completed");

        let second = turn::run(&options, "mesa-3", "¿Y de postre?", None, None);
        assert_eq!(second.exit_code, 0);
        let payload = parse_payload(&second.output);
        assert_eq!(payload["data"]["outcome"], "blocked");
        assert_eq!(payload["data"]["decision"]["reason_code"], "limit_reached");
    });
}

#[test]
fn upgrade_links_email_for_later_recovery() {
    let db = TestDatabase::new();
    with_env(&db.env(&[]), || {
        let options = LoadOptions::default();
        let receipt = parse_payload(&upgrade::run(&options, "mesa-4", " Lucia@Example.com ").output);
        assert_eq!(receipt["status"], "ok");
        assert_eq!(receipt["data"]["email"], "lucia@example.com");
        assert_eq!(receipt["data"]["upgraded"], true);

        let again = parse_payload(&upgrade::run(&options, "mesa-4", "lucia@example.com").output);
        assert_eq!(again["data"]["upgraded"], false);

        let recovered = parse_payload(&recover::run(&options, "LUCIA@example.com").output);
        assert_eq!(recovered["data"]["status"], "found");
        assert_eq!(recovered["data"]["session_id"], "mesa-4");
        assert_eq!(recovered["data"]["tier"], "premium");

        let unknown = parse_payload(&recover::run(&options, "nadie@example.com").output);
        assert_eq!(unknown["data"]["status"], "not_found");
    });
}

#[test]
fn upgrade_rejects_invalid_email() {
    let db = TestDatabase::new();
    with_env(&db.env(&[]), || {
        let result = upgrade::run(&LoadOptions::default(), "mesa-5", "not-an-email");
        assert_eq!(result.exit_code, 6);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "invalid_input");
        assert!(payload["correlation_id"].is_string());
    });
}

#[test]
fn forget_erases_memory_but_keeps_usage() {
    let db = TestDatabase::new();
    with_env(&db.env(&[]), || {
        let options = LoadOptions::default();
        turn::run(&options, "mesa-6", "¿Dónde como paella cerca?", None, None);

        let erased = parse_payload(&forget::run(&options, "mesa-6").output);
        assert_eq!(erased["data"]["deleted"], true);
        let again = parse_payload(&forget::run(&options, "mesa-6").output);
        assert_eq!(again["data"]["deleted"], false);

        let stats = parse_payload(&usage::run(&options, "mesa-6").output);
        assert_eq!(stats["data"]["interaction_count"], 1);
    });
}

#[test]
fn doctor_passes_against_a_reachable_database() {
    let db = TestDatabase::new();
    with_env(&db.env(&[]), || {
        let report: Value = serde_json::from_str(&doctor::run(&LoadOptions::default(), true))
            .expect("doctor output should be valid JSON");
        assert_eq!(report["overall_status"], "pass");
        assert_eq!(report["checks"][2]["name"], "migrations");
    });
}

#[test]
fn doctor_skips_database_checks_when_config_is_invalid() {
    with_env(&[("ALEXANDRA_LOG_FORMAT", "xml")], || {
        let report: Value = serde_json::from_str(&doctor::run(&LoadOptions::default(), true))
            .expect("doctor output should be valid JSON");
        assert_eq!(report["overall_status"], "fail");
        assert_eq!(report["checks"][0]["status"], "fail");
        assert_eq!(report["checks"][1]["status"], "skipped");
    });
}

#[test]
fn config_attributes_sources_and_redacts_keys() {
    with_env(
        &[
            ("ALEXANDRA_WEATHER_API_KEY", "wk-secret-value"),
            ("ALEXANDRA_LOG_LEVEL", "debug"),
        ],
        || {
            let result = config::run(&LoadOptions::default());
            assert_eq!(result.exit_code, 0);
            assert!(result.output.contains(
                "- weather.api_key = wk-*** (source: env (ALEXANDRA_WEATHER_API_KEY))"
            ));
            assert!(result
                .output
                .contains("- logging.level = debug (source: env (ALEXANDRA_LOG_LEVEL))"));
            assert!(result.output.contains("- billing.free_interaction_cap = 30 (source: default)"));
            assert!(!result.output.contains("secret-value"));
        },
    );
}

struct TestDatabase {
    _dir: TempDir,
    url: String,
}

impl TestDatabase {
    fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("alexandra.db").display());
        Self { _dir: dir, url }
    }

    fn env<'a>(&'a self, extra: &[(&'a str, &'a str)]) -> Vec<(&'a str, &'a str)> {
        let mut vars = vec![("ALEXANDRA_DATABASE_URL", self.url.as_str())];
        vars.extend_from_slice(extra);
        vars
    }
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "ALEXANDRA_DATABASE_URL",
        "ALEXANDRA_DATABASE_MAX_CONNECTIONS",
        "ALEXANDRA_DATABASE_TIMEOUT_SECS",
        "ALEXANDRA_SESSIONS_IDLE_EVICTION_SECS",
        "ALEXANDRA_BILLING_FREE_INTERACTION_CAP",
        "ALEXANDRA_WEATHER_DEFAULT_CITY",
        "ALEXANDRA_WEATHER_API_KEY",
        "ALEXANDRA_WEATHER_FIXED_TEMPERATURE_C",
        "ALEXANDRA_LOGGING_LEVEL",
        "ALEXANDRA_LOGGING_FORMAT",
        "ALEXANDRA_LOG_LEVEL",
        "ALEXANDRA_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
