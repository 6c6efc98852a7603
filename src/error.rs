//! Error types for the wellness engine

use thiserror::Error;

/// Errors that can occur around the scoring and notification engine.
///
/// The pure components (score, streak, risk, composer) never produce these;
/// they come from the validation boundary, the stateful decider and the
/// store/sink collaborators.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid entry: {field} {reason}")]
    InvalidEntry { field: &'static str, reason: String },

    #[error("State conflict for user {user_id}: expected version {expected}, found {actual}")]
    StateConflict {
        user_id: String,
        expected: u64,
        actual: u64,
    },

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

impl EngineError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        EngineError::InvalidEntry {
            field,
            reason: reason.into(),
        }
    }

    /// Whether the caller should retry the whole decide-and-persist operation.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::StateConflict { .. } | EngineError::UpstreamUnavailable(_)
        )
    }
}
