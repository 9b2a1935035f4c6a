//! Public error types for the identity module.
//!
//! These errors are safe to expose to other modules and API consumers.
//! Infrastructure detail never crosses this boundary: storage, hashing and
//! capability failures all collapse into [`IdentityError::Internal`].

use thiserror::Error;

/// Errors returned by the identity services.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    /// Resource with the specified ID was not found.
    #[error("Resource not found: {id}")]
    NotFound { id: String },

    /// Malformed request data (bad identifiers, invalid credential shapes,
    /// negative limits, malformed organization units).
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// A conflicting resource already exists (duplicate id, attribute
    /// uniqueness violation, role name taken within the organization unit).
    #[error("Conflict: {message}")]
    Conflict { message: String },

    /// The requested user type has no registered schema.
    #[error("Unknown user type: {user_type}")]
    SchemaNotFound { user_type: String },

    /// The attribute document failed schema validation.
    #[error("Schema validation failed: {message}")]
    SchemaValidationFailed { message: String },

    /// Access denied by the authorization capability.
    #[error("Access denied")]
    Unauthorized,

    /// A composite-mode read matched more results than the merge cap.
    #[error("Result set too large, narrow the filter")]
    LimitExceeded,

    /// Credential verification or identification failed. Deliberately
    /// carries no detail about which leg failed.
    #[error("Authentication failed")]
    AuthenticationFailed,

    /// An internal error occurred.
    #[error("Internal error")]
    Internal,
}

impl IdentityError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn schema_not_found(user_type: impl Into<String>) -> Self {
        Self::SchemaNotFound {
            user_type: user_type.into(),
        }
    }

    pub fn schema_validation(message: impl Into<String>) -> Self {
        Self::SchemaValidationFailed {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn unauthorized() -> Self {
        Self::Unauthorized
    }

    #[must_use]
    pub fn internal() -> Self {
        Self::Internal
    }
}
