/*!
 * Error types for the cyber range core
 */

use crate::backend::BackendError;
use crate::lifecycle::SessionPhase;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RangeError>;

/// Exit code constants for the operator CLI
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_PARTIAL: i32 = 1;
pub const EXIT_FATAL: i32 = 2;
pub const EXIT_BACKEND: i32 = 3;

/// Errors crossing the core boundary.
///
/// Backend transport failures never escape as raw `reqwest` errors; they are
/// folded into [`BackendError`] by the client and wrapped here.
#[derive(Debug, Error)]
pub enum RangeError {
    #[error("Scenario {0} not found")]
    ScenarioNotFound(i64),

    /// Absent, or owned by somebody else. Callers cannot tell the two apart.
    #[error("Session {0} not found")]
    SessionNotFound(i64),

    #[error("An active session already exists for scenario {scenario_id}")]
    SessionAlreadyActive { user_id: String, scenario_id: i64 },

    /// The template project could not be duplicated; nothing was recorded.
    #[error("Failed to provision lab: {0}")]
    ProvisioningFailed(#[source] BackendError),

    #[error("{0}")]
    Backend(#[from] BackendError),

    /// The registry update went through but backend cleanup did not.
    #[error("Session {session_id} ended, but backend cleanup failed: {detail}")]
    PartialFailure { session_id: i64, detail: String },

    #[error("Invalid session transition: {from} -> {to}")]
    InvalidTransition { from: SessionPhase, to: SessionPhase },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Coarse classification used by the HTTP layer and the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Conflict,
    BackendUnavailable,
    BackendRejected,
    PartialFailure,
    Invalid,
    Internal,
}

impl RangeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RangeError::ScenarioNotFound(_) | RangeError::SessionNotFound(_) => {
                ErrorKind::NotFound
            }
            RangeError::SessionAlreadyActive { .. } => ErrorKind::Conflict,
            RangeError::ProvisioningFailed(err) | RangeError::Backend(err) => err.kind(),
            RangeError::PartialFailure { .. } => ErrorKind::PartialFailure,
            RangeError::InvalidInput(_) => ErrorKind::Invalid,
            RangeError::InvalidTransition { .. }
            | RangeError::Database(_)
            | RangeError::Config(_) => ErrorKind::Internal,
        }
    }

    /// Message suitable for end users; never generic.
    pub fn user_message(&self) -> String {
        match self.kind() {
            ErrorKind::BackendUnavailable => {
                "The lab backend is unavailable, please try again shortly".to_string()
            }
            ErrorKind::Internal => "Internal error, the operation was not completed".to_string(),
            _ => self.to_string(),
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self.kind() {
            ErrorKind::BackendUnavailable | ErrorKind::BackendRejected => EXIT_BACKEND,
            ErrorKind::PartialFailure => EXIT_PARTIAL,
            _ => EXIT_FATAL,
        }
    }
}

impl From<toml::de::Error> for RangeError {
    fn from(err: toml::de::Error) -> Self {
        RangeError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(RangeError::ScenarioNotFound(1).kind(), ErrorKind::NotFound);
        assert_eq!(RangeError::SessionNotFound(7).kind(), ErrorKind::NotFound);
        assert_eq!(
            RangeError::SessionAlreadyActive {
                user_id: "u".into(),
                scenario_id: 1
            }
            .kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            RangeError::ProvisioningFailed(BackendError::Unavailable("timeout".into())).kind(),
            ErrorKind::BackendUnavailable
        );
        assert_eq!(
            RangeError::Backend(BackendError::Rejected {
                status: 409,
                message: "busy".into()
            })
            .kind(),
            ErrorKind::BackendRejected
        );
    }

    #[test]
    fn test_not_found_hides_ownership() {
        let msg = RangeError::SessionNotFound(42).user_message();
        assert_eq!(msg, "Session 42 not found");
        assert!(!msg.contains("owner"));
    }

    #[test]
    fn test_unavailable_message_suggests_retry() {
        let err = RangeError::Backend(BackendError::Unavailable("connect refused".into()));
        assert!(err.user_message().contains("try again"));
        assert_eq!(err.exit_code(), EXIT_BACKEND);
    }
}
