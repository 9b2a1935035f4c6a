//! Domain error → HTTP problem mapping.
//!
//! Internal detail never reaches the wire: storage and capability
//! failures surface as a generic 500 after being logged.

use axum::Json;
use axum::response::{IntoResponse, Response};
use http::StatusCode;
use identity_sdk::IdentityError;
use serde::Serialize;

use crate::domain::error::DomainError;

/// Problem-style error body.
#[derive(Debug, Serialize)]
pub struct Problem {
    #[serde(skip)]
    pub status: StatusCode,
    pub title: String,
    pub detail: String,
}

impl Problem {
    pub fn new(status: StatusCode, title: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            status,
            title: title.into(),
            detail: detail.into(),
        }
    }
}

impl IntoResponse for Problem {
    fn into_response(self) -> Response {
        let status = self.status;
        (status, Json(self)).into_response()
    }
}

pub fn identity_error_to_problem(e: &IdentityError) -> Problem {
    match e {
        IdentityError::NotFound { .. } => {
            Problem::new(StatusCode::NOT_FOUND, "Not Found", e.to_string())
        }
        IdentityError::InvalidInput { .. } => {
            Problem::new(StatusCode::BAD_REQUEST, "Invalid Input", e.to_string())
        }
        IdentityError::Conflict { .. } => {
            Problem::new(StatusCode::CONFLICT, "Conflict", e.to_string())
        }
        IdentityError::SchemaNotFound { .. } => Problem::new(
            StatusCode::BAD_REQUEST,
            "Unknown User Type",
            e.to_string(),
        ),
        IdentityError::SchemaValidationFailed { .. } => Problem::new(
            StatusCode::BAD_REQUEST,
            "Schema Validation Failed",
            e.to_string(),
        ),
        IdentityError::Unauthorized => Problem::new(
            StatusCode::FORBIDDEN,
            "Access Denied",
            "You do not have permission to perform this action",
        ),
        IdentityError::LimitExceeded => Problem::new(
            StatusCode::BAD_REQUEST,
            "Too Many Results",
            "The result set is too large, narrow your filter",
        ),
        IdentityError::AuthenticationFailed => Problem::new(
            StatusCode::UNAUTHORIZED,
            "Authentication Failed",
            "Authentication failed",
        ),
        IdentityError::Internal => Problem::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal Error",
            "An internal error occurred",
        ),
    }
}

/// Implement `From<DomainError>` so `?` works in handlers.
impl From<DomainError> for Problem {
    fn from(e: DomainError) -> Self {
        if matches!(e, DomainError::Storage { .. } | DomainError::Internal) {
            tracing::error!(error = %e, "Internal error occurred");
        }
        identity_error_to_problem(&IdentityError::from(e))
    }
}
