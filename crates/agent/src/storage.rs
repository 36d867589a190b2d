use tracing::{error, warn};

use alexandra_core::errors::ApplicationError;
use alexandra_db::RepositoryError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Store {
    ConversationState,
    Usage,
    Memory,
    EmailIndex,
}

impl Store {
    fn as_str(&self) -> &'static str {
        match self {
            Self::ConversationState => "conversation_state",
            Self::Usage => "usage",
            Self::Memory => "memory",
            Self::EmailIndex => "email_index",
        }
    }

    fn degraded_event(&self) -> &'static str {
        match self {
            Self::ConversationState => "session.state.record_degraded",
            Self::Usage => "ledger.record_degraded",
            Self::Memory => "memory.record_degraded",
            Self::EmailIndex => "recovery.record_degraded",
        }
    }
}

/// Corrupt records read as absent so callers fall back to a fresh default.
/// Medium failures are surfaced.
pub(crate) fn tolerate_corrupt<T>(
    store: Store,
    key: &str,
    result: Result<Option<T>, RepositoryError>,
) -> Result<Option<T>, ApplicationError> {
    match result {
        Ok(found) => Ok(found),
        Err(error) if error.is_corrupt_record() => {
            warn!(
                event_name = store.degraded_event(),
                store = store.as_str(),
                key,
                error = %error,
                "unreadable record replaced with a fresh default"
            );
            Ok(None)
        }
        Err(error) => Err(storage_failure(store, key, error)),
    }
}

pub(crate) fn storage_failure(store: Store, key: &str, error: RepositoryError) -> ApplicationError {
    error!(
        event_name = "storage.failure",
        store = store.as_str(),
        key,
        error = %error,
        "durable store failed"
    );
    ApplicationError::Persistence(format!("{} store failed: {error}", store.as_str()))
}
