//! Error types for the web API
//!
//! Core errors are mapped by [`ErrorKind`] so every failure reaches the client
//! as a specific status with a JSON `{ "error", "kind" }` body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use cyberrange::{ErrorKind, RangeError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WebError {
    #[error(transparent)]
    Range(#[from] RangeError),

    #[error("Authentication required: {0}")]
    Unauthorized(String),

    #[error("Insufficient permissions")]
    Forbidden,

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for WebError {
    fn from(err: sqlx::Error) -> Self {
        WebError::Range(RangeError::Database(err))
    }
}

impl From<argon2::password_hash::Error> for WebError {
    fn from(err: argon2::password_hash::Error) -> Self {
        WebError::Internal(format!("Password hashing failed: {}", err))
    }
}

impl From<jsonwebtoken::errors::Error> for WebError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        WebError::Internal(format!("Token signing failed: {}", err))
    }
}

/// HTTP status for a core error class
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::BackendUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::BackendRejected => StatusCode::BAD_GATEWAY,
        ErrorKind::PartialFailure => StatusCode::MULTI_STATUS,
        ErrorKind::Invalid => StatusCode::BAD_REQUEST,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl WebError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            WebError::Range(err) => {
                let kind = err.kind();
                if kind == ErrorKind::Internal {
                    tracing::error!("Request failed: {}", err);
                }
                (status_for(kind), kind_name(kind), err.user_message())
            }
            WebError::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, "unauthorized", msg.clone())
            }
            WebError::Forbidden => (StatusCode::FORBIDDEN, "forbidden", self.to_string()),
            WebError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "invalid", msg.clone()),
            WebError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg.clone()),
            WebError::Internal(msg) => {
                tracing::error!("Request failed: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal",
                    "Internal error, the operation was not completed".to_string(),
                )
            }
        }
    }
}

fn kind_name(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::NotFound => "not_found",
        ErrorKind::Conflict => "conflict",
        ErrorKind::BackendUnavailable => "backend_unavailable",
        ErrorKind::BackendRejected => "backend_rejected",
        ErrorKind::PartialFailure => "partial_failure",
        ErrorKind::Invalid => "invalid",
        ErrorKind::Internal => "internal",
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let (status, kind, message) = self.parts();
        let body = serde_json::json!({
            "error": message,
            "kind": kind,
        });
        (status, Json(body)).into_response()
    }
}

pub type WebResult<T> = Result<T, WebError>;

#[cfg(test)]
mod tests {
    use super::*;
    use cyberrange::BackendError;

    #[test]
    fn test_core_errors_map_to_status() {
        let cases = [
            (RangeError::SessionNotFound(3), StatusCode::NOT_FOUND),
            (
                RangeError::SessionAlreadyActive {
                    user_id: "u".into(),
                    scenario_id: 1,
                },
                StatusCode::CONFLICT,
            ),
            (
                RangeError::ProvisioningFailed(BackendError::Unavailable("refused".into())),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                RangeError::Backend(BackendError::Rejected {
                    status: 409,
                    message: "locked".into(),
                }),
                StatusCode::BAD_GATEWAY,
            ),
            (
                RangeError::PartialFailure {
                    session_id: 1,
                    detail: "delete: timeout".into(),
                },
                StatusCode::MULTI_STATUS,
            ),
            (RangeError::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
        ];
        for (err, status) in cases {
            assert_eq!(WebError::from(err).into_response().status(), status);
        }
    }

    #[test]
    fn test_kind_names_match_serde() {
        for kind in [ErrorKind::NotFound, ErrorKind::BackendUnavailable, ErrorKind::PartialFailure] {
            let serialized = serde_json::to_value(kind).unwrap();
            assert_eq!(serialized, kind_name(kind));
        }
    }
}
