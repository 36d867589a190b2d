pub mod config;
pub mod doctor;
pub mod forget;
pub mod migrate;
pub mod recover;
pub mod session;
pub mod turn;
pub mod upgrade;
pub mod usage;

use alexandra_core::errors::{ApplicationError, InterfaceError};
use serde::Serialize;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    correlation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<serde_json::Value>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            correlation_id: None,
            data: None,
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn success_with_data(
        command: &str,
        message: impl Into<String>,
        data: &impl Serialize,
    ) -> Self {
        let data = match serde_json::to_value(data) {
            Ok(data) => data,
            Err(error) => {
                return Self::failure(
                    command,
                    "serialization",
                    format!("failed to serialize result: {error}"),
                    9,
                );
            }
        };

        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            correlation_id: None,
            data: Some(data),
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            correlation_id: None,
            data: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    /// Maps a runtime error through the interface taxonomy so callers see a stable class.
    pub fn from_application_error(
        command: &str,
        error: ApplicationError,
        correlation_id: &str,
    ) -> Self {
        let interface = error.into_interface(correlation_id);
        let (error_class, exit_code, detail) = match &interface {
            InterfaceError::BadRequest { message, .. } => ("invalid_input", 6, message),
            InterfaceError::ServiceUnavailable { message, .. } => ("persistence", 7, message),
            InterfaceError::Internal { message, .. } => ("internal", 8, message),
        };

        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: format!("{} ({detail})", interface.user_message()),
            correlation_id: Some(interface.correlation_id().to_string()),
            data: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

#[cfg(test)]
mod tests {
    use alexandra_core::errors::ApplicationError;
    use serde_json::{json, Value};

    use super::CommandResult;

    fn parse(result: &CommandResult) -> Value {
        serde_json::from_str(&result.output).expect("valid json")
    }

    #[test]
    fn success_omits_correlation_and_data() {
        let payload = parse(&CommandResult::success("migrate", "applied pending migrations"));
        assert_eq!(payload["status"], "ok");
        assert_eq!(payload["error_class"], Value::Null);
        assert!(payload.get("data").is_none());
        assert!(payload.get("correlation_id").is_none());
    }

    #[test]
    fn data_is_embedded_verbatim() {
        let result = CommandResult::success_with_data("usage", "usage loaded", &json!({"remaining": 28}));
        assert_eq!(parse(&result)["data"]["remaining"], 28);
    }

    #[test]
    fn application_errors_map_to_stable_classes() {
        let invalid = CommandResult::from_application_error(
            "upgrade",
            ApplicationError::invalid_input("email must contain `@`"),
            "req-1",
        );
        assert_eq!(invalid.exit_code, 6);
        let payload = parse(&invalid);
        assert_eq!(payload["error_class"], "invalid_input");
        assert_eq!(payload["correlation_id"], "req-1");

        let storage = CommandResult::from_application_error(
            "turn",
            ApplicationError::Persistence("usage store failed".to_string()),
            "req-2",
        );
        assert_eq!(storage.exit_code, 7);
        assert_eq!(parse(&storage)["error_class"], "persistence");
    }
}
