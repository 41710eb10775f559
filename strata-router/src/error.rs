//! Error taxonomy and HTTP response conversion
//!
//! Every failure that escapes an orchestrator is an [`Error`] carrying an
//! [`ErrorKind`]. The kind alone determines the HTTP status; orchestrators
//! never pick status codes themselves.
//!
//! # Example
//!
//! ```rust
//! use strata_router::error::{Error, ErrorKind};
//!
//! let error = Error::unknown_operation("archive");
//! assert_eq!(error.kind, ErrorKind::UnknownOperation);
//! assert_eq!(error.kind.status_code().as_u16(), 400);
//! ```

use std::fmt;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::store::StoreError;

/// Result type for router operations
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Constant message returned to clients for validation failures.
///
/// Field-level validation detail is store-internal and deliberately not
/// echoed to the transport layer.
pub const VALIDATION_MESSAGE: &str = "Invalid data supplied";

/// Constant message returned to clients for unclassified failures.
pub const INTERNAL_MESSAGE: &str = "An internal error occurred";

/// Category of request-handling error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Client-supplied data failed store or translator rules
    Validation,
    /// Unparseable request input (e.g. `finderParams` JSON)
    MalformedRequest,
    /// Referenced key or parent location absent
    NotFound,
    /// No handler, router-level or store-level, matches the operation name
    UnknownOperation,
    /// Anything else, including unclassified store failures
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::MalformedRequest => write!(f, "malformed_request"),
            Self::NotFound => write!(f, "not_found"),
            Self::UnknownOperation => write!(f, "unknown_operation"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

impl ErrorKind {
    /// Get the HTTP status code for this error kind
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation | Self::MalformedRequest | Self::UnknownOperation => {
                StatusCode::BAD_REQUEST
            }
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code string for this error kind
    #[must_use]
    pub fn error_code(&self) -> String {
        format!("{}", self).to_uppercase()
    }
}

/// Request-scoped error with a kind and an internal message
///
/// The internal message is logged in full; [`Error::client_message`] decides
/// what the client sees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    /// The category of error
    pub kind: ErrorKind,
    /// Internal, full-fidelity message
    pub message: String,
}

impl Error {
    /// Create an error with an explicit kind
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Client-supplied data failed validation rules
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// Request input could not be parsed
    pub fn malformed_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedRequest, message)
    }

    /// Referenced key or parent location is absent
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// No handler layer recognizes the operation name
    pub fn unknown_operation(name: impl AsRef<str>) -> Self {
        Self::new(
            ErrorKind::UnknownOperation,
            format!("no handler registered for operation '{}'", name.as_ref()),
        )
    }

    /// Unclassified failure
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// The message sent to the client.
    ///
    /// Validation and internal detail is flattened to a constant; not-found,
    /// malformed-request, and unknown-operation messages pass through.
    #[must_use]
    pub fn client_message(&self) -> &str {
        match self.kind {
            ErrorKind::Validation => VALIDATION_MESSAGE,
            ErrorKind::Internal => INTERNAL_MESSAGE,
            _ => &self.message,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error: {}", self.kind, self.message)
    }
}

impl std::error::Error for Error {}

/// Response body for request errors
#[derive(Debug, Serialize, Deserialize)]
struct ErrorResponse {
    error: String,
    code: String,
    status: u16,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.kind.status_code();

        tracing::error!(
            kind = %self.kind,
            status = status.as_u16(),
            "request failed: {}", self.message
        );

        let response = ErrorResponse {
            error: self.client_message().to_string(),
            code: self.kind.error_code(),
            status: status.as_u16(),
        };

        (status, Json(response)).into_response()
    }
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(message) => Self::not_found(message),
            StoreError::Validation(message) => Self::validation(message),
            StoreError::UnknownOperation(name) => Self::unknown_operation(name),
            StoreError::Other(source) => Self::internal(source.to_string()),
        }
    }
}
