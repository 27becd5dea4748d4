//! Error types for lab backend calls

use crate::error::ErrorKind;
use thiserror::Error;

/// Result type alias for backend operations
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Uniform failure of a single backend call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// Transport failure: unreachable, refused, timed out, or an unreadable body
    #[error("Lab backend unavailable: {0}")]
    Unavailable(String),

    /// The server answered with a non-success status
    #[error("Lab backend rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
}

impl BackendError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, BackendError::Rejected { status: 404, .. })
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            BackendError::Unavailable(_) => ErrorKind::BackendUnavailable,
            BackendError::Rejected { .. } => ErrorKind::BackendRejected,
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BackendError::Unavailable(format!("request timed out: {}", err))
        } else if err.is_decode() {
            BackendError::Unavailable(format!("unreadable response: {}", err))
        } else {
            BackendError::Unavailable(err.to_string())
        }
    }
}
