//! Unified error handling for Encounter Core
//!
//! [`ServiceError`] is the only failure the encounter service surfaces. The
//! transport rendering in this module is derived from the error kind alone,
//! so nothing carried in an error's internal message can reach a caller.

use crate::audit::AuditError;
use crate::domain::{AuthorityError, EncounterStatus, IdentifierError, InvalidTransition};
use crate::repository::StoreError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Service-wide result type
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Closed taxonomy of failure kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    NotFound,
    Forbidden,
    InvalidState,
    Conflict,
    SystemError,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 5] = [
        ErrorKind::NotFound,
        ErrorKind::Forbidden,
        ErrorKind::InvalidState,
        ErrorKind::Conflict,
        ErrorKind::SystemError,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Forbidden => "FORBIDDEN",
            ErrorKind::InvalidState => "INVALID_STATE",
            ErrorKind::Conflict => "CONFLICT",
            ErrorKind::SystemError => "SYSTEM_ERROR",
        }
    }
}

impl std::str::FromStr for ErrorKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "NOT_FOUND" => Ok(ErrorKind::NotFound),
            "FORBIDDEN" => Ok(ErrorKind::Forbidden),
            "INVALID_STATE" => Ok(ErrorKind::InvalidState),
            "CONFLICT" => Ok(ErrorKind::Conflict),
            "SYSTEM_ERROR" => Ok(ErrorKind::SystemError),
            _ => Err(format!("Unknown error kind: {}", s)),
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Service error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(InvalidTransition),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("System error: {0}")]
    System(String),
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::NotFound(_) => ErrorKind::NotFound,
            ServiceError::Forbidden(_) => ErrorKind::Forbidden,
            ServiceError::InvalidState(_) | ServiceError::InvalidTransition(_) => {
                ErrorKind::InvalidState
            }
            ServiceError::Conflict(_) => ErrorKind::Conflict,
            ServiceError::System(_) => ErrorKind::SystemError,
        }
    }
}

impl From<InvalidTransition> for ServiceError {
    fn from(err: InvalidTransition) -> Self {
        ServiceError::InvalidTransition(err)
    }
}

impl From<AuthorityError> for ServiceError {
    fn from(err: AuthorityError) -> Self {
        tracing::warn!(reason = %err, "Rejected authority claims");
        ServiceError::Forbidden("Authority rejected".to_string())
    }
}

impl From<IdentifierError> for ServiceError {
    fn from(err: IdentifierError) -> Self {
        ServiceError::InvalidState(err.to_string())
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateKey => {
                ServiceError::Conflict("Encounter already exists".to_string())
            }
            StoreError::StaleWrite { .. } => {
                ServiceError::Conflict("Encounter was modified concurrently".to_string())
            }
            other => {
                tracing::error!("Record store error: {:?}", other);
                ServiceError::System("Record store failure".to_string())
            }
        }
    }
}

impl From<AuditError> for ServiceError {
    fn from(err: AuditError) -> Self {
        tracing::error!("Audit sink error: {:?}", err);
        ServiceError::System("Audit emission failure".to_string())
    }
}

/// Transport-safe error response
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorResponse {
    #[serde(skip)]
    pub status: StatusCode,
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    /// Render the fixed response for an error kind.
    pub fn from_kind(kind: ErrorKind) -> Self {
        let (status, error, message) = match kind {
            ErrorKind::NotFound => (StatusCode::NOT_FOUND, "not_found", "Resource not found"),
            ErrorKind::Forbidden => (StatusCode::FORBIDDEN, "forbidden", "Access denied"),
            ErrorKind::InvalidState => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "invalid_state",
                "Invalid state",
            ),
            ErrorKind::Conflict => (StatusCode::CONFLICT, "conflict", "Resource conflict"),
            ErrorKind::SystemError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "An internal error occurred",
            ),
        };
        Self {
            status,
            error: error.to_string(),
            message: message.to_string(),
        }
    }

    /// Render a service error. Only a rejected transition adds detail, and
    /// that detail is limited to the two status names.
    pub fn from_error(err: &ServiceError) -> Self {
        let mut response = Self::from_kind(err.kind());
        if let ServiceError::InvalidTransition(InvalidTransition { from, to }) = err {
            response.message = transition_message(*from, *to);
        }
        response
    }
}

fn transition_message(from: EncounterStatus, to: EncounterStatus) -> String {
    format!("Invalid state transition: {} -> {}", from, to)
}

/// Map a wire error code to its response; unknown codes render as a system
/// error.
pub fn map_error_code(code: &str) -> ErrorResponse {
    match code.parse::<ErrorKind>() {
        Ok(kind) => ErrorResponse::from_kind(kind),
        Err(_) => {
            tracing::warn!("Unrecognized error kind mapped to internal error");
            ErrorResponse::from_kind(ErrorKind::SystemError)
        }
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        if self.kind() == ErrorKind::SystemError {
            tracing::error!("Internal error: {}", self);
        }
        ErrorResponse::from_error(&self).into_response()
    }
}
