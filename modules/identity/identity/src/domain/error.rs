//! Domain-specific errors using thiserror.

use identity_sdk::IdentityError;
use thiserror::Error;

use crate::domain::stores::StoreError;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("User not found: {id}")]
    UserNotFound { id: String },

    #[error("Role not found: {id}")]
    RoleNotFound { id: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Invalid limit: {limit}")]
    InvalidLimit { limit: i64 },

    #[error("Invalid organization unit: '{ou_id}'")]
    InvalidOrgUnit { ou_id: String },

    #[error("Invalid credential: {message}")]
    InvalidCredential { message: String },

    #[error("Attribute '{path}' conflicts with an existing user")]
    AttributeConflict { path: String },

    #[error("Role '{name}' already exists in organization unit '{ou_id}'")]
    RoleNameExists { name: String, ou_id: String },

    #[error("Resource '{id}' already exists")]
    DuplicateResource { id: String },

    #[error("Resource '{id}' is declaratively managed and cannot be modified")]
    DeclarativeResource { id: String },

    #[error("No schema registered for user type '{user_type}'")]
    SchemaNotFound { user_type: String },

    #[error("Schema validation failed: {message}")]
    SchemaValidationFailed { message: String },

    #[error("Access denied")]
    Unauthorized,

    #[error("Result set exceeds the composite merge cap of {cap}")]
    LimitExceeded { cap: u64 },

    #[error("Authentication failed")]
    AuthenticationFailed,

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Internal error")]
    Internal,
}

impl DomainError {
    pub fn user_not_found(id: impl Into<String>) -> Self {
        Self::UserNotFound { id: id.into() }
    }

    pub fn role_not_found(id: impl Into<String>) -> Self {
        Self::RoleNotFound { id: id.into() }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn invalid_org_unit(ou_id: impl Into<String>) -> Self {
        Self::InvalidOrgUnit {
            ou_id: ou_id.into(),
        }
    }

    pub fn invalid_credential(message: impl Into<String>) -> Self {
        Self::InvalidCredential {
            message: message.into(),
        }
    }

    pub fn attribute_conflict(path: impl Into<String>) -> Self {
        Self::AttributeConflict { path: path.into() }
    }

    pub fn schema_validation(message: impl Into<String>) -> Self {
        Self::SchemaValidationFailed {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }
}

/// Map a store error in a user-resource context. `NotFound` becomes the
/// typed user-not-found error; sentinels keep their meaning; everything
/// else is a storage error the API layer will report as internal.
pub(crate) fn user_store_error(id: &str, e: StoreError) -> DomainError {
    match e {
        StoreError::NotFound => DomainError::user_not_found(id),
        other => common_store_error(other),
    }
}

/// Map a store error in a role-resource context.
pub(crate) fn role_store_error(id: &str, e: StoreError) -> DomainError {
    match e {
        StoreError::NotFound => DomainError::role_not_found(id),
        other => common_store_error(other),
    }
}

fn common_store_error(e: StoreError) -> DomainError {
    match e {
        StoreError::NotFound => DomainError::Internal,
        StoreError::Ambiguous => DomainError::storage("filter matched more than one resource"),
        StoreError::Unsupported => {
            DomainError::invalid_input("the configured store does not support this operation")
        }
        StoreError::Duplicate { id } => DomainError::DuplicateResource { id },
        StoreError::Declarative { id } => DomainError::DeclarativeResource { id },
        StoreError::LimitExceeded { cap } => DomainError::LimitExceeded { cap },
        StoreError::Storage { .. } => {
            tracing::error!(error = %e, "Store operation failed");
            DomainError::storage(e.to_string())
        }
    }
}

impl From<StoreError> for DomainError {
    fn from(e: StoreError) -> Self {
        common_store_error(e)
    }
}

/// Convert domain errors to SDK errors for public API consumption.
impl From<DomainError> for IdentityError {
    fn from(domain_error: DomainError) -> Self {
        match domain_error {
            DomainError::UserNotFound { id } | DomainError::RoleNotFound { id } => {
                IdentityError::not_found(id)
            }
            DomainError::InvalidInput { message }
            | DomainError::InvalidCredential { message } => {
                IdentityError::invalid_input(message)
            }
            DomainError::InvalidLimit { limit } => {
                IdentityError::invalid_input(format!("limit must not be negative, got {limit}"))
            }
            DomainError::InvalidOrgUnit { ou_id } => {
                IdentityError::invalid_input(format!("invalid organization unit '{ou_id}'"))
            }
            DomainError::DeclarativeResource { id } => IdentityError::invalid_input(format!(
                "resource '{id}' is declaratively managed and cannot be modified"
            )),
            DomainError::AttributeConflict { path } => IdentityError::conflict(format!(
                "attribute '{path}' conflicts with an existing user"
            )),
            DomainError::RoleNameExists { name, ou_id } => IdentityError::conflict(format!(
                "role '{name}' already exists in organization unit '{ou_id}'"
            )),
            DomainError::DuplicateResource { id } => {
                IdentityError::conflict(format!("resource '{id}' already exists"))
            }
            DomainError::SchemaNotFound { user_type } => {
                IdentityError::schema_not_found(user_type)
            }
            DomainError::SchemaValidationFailed { message } => {
                IdentityError::schema_validation(message)
            }
            DomainError::Unauthorized => IdentityError::Unauthorized,
            DomainError::LimitExceeded { .. } => IdentityError::LimitExceeded,
            DomainError::AuthenticationFailed => IdentityError::AuthenticationFailed,
            DomainError::Storage { .. } | DomainError::Internal => IdentityError::Internal,
        }
    }
}
