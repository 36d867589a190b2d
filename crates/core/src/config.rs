use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub sessions: SessionsConfig,
    pub billing: BillingConfig,
    pub weather: WeatherConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct SessionsConfig {
    pub idle_eviction_secs: u64,
}

#[derive(Clone, Debug)]
pub struct BillingConfig {
    pub free_interaction_cap: u32,
}

#[derive(Clone, Debug)]
pub struct WeatherConfig {
    pub default_city: String,
    pub api_key: Option<SecretString>,
    /// Pins the reported temperature instead of deriving it from the hour.
    pub fixed_temperature_c: Option<f64>,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compact => "compact",
            Self::Pretty => "pretty",
            Self::Json => "json",
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
    pub free_interaction_cap: Option<u32>,
    pub default_city: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://alexandra.db?mode=rwc".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            sessions: SessionsConfig { idle_eviction_secs: 3_600 },
            billing: BillingConfig {
                free_interaction_cap: crate::ledger::DEFAULT_FREE_INTERACTION_CAP,
            },
            weather: WeatherConfig {
                default_city: "Madrid".to_string(),
                api_key: None,
                fixed_temperature_c: None,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("alexandra.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    /// Idle duration after which in-process session entries may be evicted.
    pub fn idle_eviction(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.sessions.idle_eviction_secs)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(sessions) = patch.sessions {
            if let Some(idle_eviction_secs) = sessions.idle_eviction_secs {
                self.sessions.idle_eviction_secs = idle_eviction_secs;
            }
        }

        if let Some(billing) = patch.billing {
            if let Some(cap) = billing.free_interaction_cap {
                self.billing.free_interaction_cap = cap;
            }
        }

        if let Some(weather) = patch.weather {
            if let Some(default_city) = weather.default_city {
                self.weather.default_city = default_city;
            }
            if let Some(api_key) = weather.api_key {
                self.weather.api_key = Some(api_key.into());
            }
            if let Some(fixed_temperature_c) = weather.fixed_temperature_c {
                self.weather.fixed_temperature_c = Some(fixed_temperature_c);
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("ALEXANDRA_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("ALEXANDRA_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_env("ALEXANDRA_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("ALEXANDRA_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_env("ALEXANDRA_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("ALEXANDRA_SESSIONS_IDLE_EVICTION_SECS") {
            self.sessions.idle_eviction_secs =
                parse_env("ALEXANDRA_SESSIONS_IDLE_EVICTION_SECS", &value)?;
        }

        if let Some(value) = read_env("ALEXANDRA_BILLING_FREE_INTERACTION_CAP") {
            self.billing.free_interaction_cap =
                parse_env("ALEXANDRA_BILLING_FREE_INTERACTION_CAP", &value)?;
        }

        if let Some(value) = read_env("ALEXANDRA_WEATHER_DEFAULT_CITY") {
            self.weather.default_city = value;
        }
        if let Some(value) = read_env("ALEXANDRA_WEATHER_API_KEY") {
            self.weather.api_key = Some(value.into());
        }
        if let Some(value) = read_env("ALEXANDRA_WEATHER_FIXED_TEMPERATURE_C") {
            self.weather.fixed_temperature_c =
                Some(parse_env("ALEXANDRA_WEATHER_FIXED_TEMPERATURE_C", &value)?);
        }

        let log_level =
            read_env("ALEXANDRA_LOGGING_LEVEL").or_else(|| read_env("ALEXANDRA_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("ALEXANDRA_LOGGING_FORMAT").or_else(|| read_env("ALEXANDRA_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
        if let Some(cap) = overrides.free_interaction_cap {
            self.billing.free_interaction_cap = cap;
        }
        if let Some(default_city) = overrides.default_city {
            self.weather.default_city = default_city;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_sessions(&self.sessions)?;
        validate_billing(&self.billing)?;
        validate_weather(&self.weather)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("alexandra.toml"), PathBuf::from("config/alexandra.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_sessions(sessions: &SessionsConfig) -> Result<(), ConfigError> {
    if sessions.idle_eviction_secs == 0 {
        return Err(ConfigError::Validation(
            "sessions.idle_eviction_secs must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn validate_billing(billing: &BillingConfig) -> Result<(), ConfigError> {
    if billing.free_interaction_cap == 0 {
        return Err(ConfigError::Validation(
            "billing.free_interaction_cap must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn validate_weather(weather: &WeatherConfig) -> Result<(), ConfigError> {
    if weather.default_city.trim().is_empty() {
        return Err(ConfigError::Validation("weather.default_city must not be empty".to_string()));
    }

    let blank_key =
        weather.api_key.as_ref().map(|key| key.expose_secret().trim().is_empty()).unwrap_or(false);
    if blank_key {
        return Err(ConfigError::Validation(
            "weather.api_key is set but empty; remove it or provide a key".to_string(),
        ));
    }

    if let Some(temperature) = weather.fixed_temperature_c {
        if !(-60.0..=60.0).contains(&temperature) {
            return Err(ConfigError::Validation(
                "weather.fixed_temperature_c must be in range -60..=60".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    sessions: Option<SessionsPatch>,
    billing: Option<BillingPatch>,
    weather: Option<WeatherPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct SessionsPatch {
    idle_eviction_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct BillingPatch {
    free_interaction_cap: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct WeatherPatch {
    default_city: Option<String>,
    api_key: Option<String>,
    fixed_temperature_c: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
