//! The store contract shared by the descriptor, database and composite
//! realizations.
//!
//! The store layer never synthesizes client-class errors beyond its typed
//! sentinels; everything unexpected is a `Storage` error that the service
//! layer reports as internal.

use std::collections::BTreeMap;

use async_trait::async_trait;
use identity_sdk::{Assignment, CredentialBundle, GroupSummary, Role, User};
use thiserror::Error;

/// Dotted attribute path → scalar value, equality semantics only.
///
/// A `BTreeMap` keeps placeholder ordering deterministic across dialects.
pub type AttributeFilters = BTreeMap<String, serde_json::Value>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("resource not found")]
    NotFound,

    #[error("filter matched more than one resource")]
    Ambiguous,

    #[error("store is read-only")]
    Unsupported,

    #[error("duplicate resource id '{id}'")]
    Duplicate { id: String },

    #[error("resource '{id}' is declaratively managed")]
    Declarative { id: String },

    #[error("result set exceeds the merge cap of {cap}")]
    LimitExceeded { cap: u64 },

    #[error("storage failure: {context}")]
    Storage {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl StoreError {
    pub fn storage(
        context: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Storage {
            context: context.into(),
            source: source.into(),
        }
    }

    /// True for the sentinels a caller may act on; false for failures
    /// that must propagate as-is.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

impl From<sea_orm::DbErr> for StoreError {
    fn from(e: sea_orm::DbErr) -> Self {
        Self::storage("database operation failed", e)
    }
}

/// Store surface for the user resource kind.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<User, StoreError>;

    /// Users matching `filters`, ordered by id, window `[offset, offset+limit)`.
    async fn list(
        &self,
        filters: &AttributeFilters,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<User>, StoreError>;

    async fn count(&self, filters: &AttributeFilters) -> Result<u64, StoreError>;

    async fn list_by_ou(
        &self,
        ou_ids: &[String],
        filters: &AttributeFilters,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<User>, StoreError>;

    async fn count_by_ou(
        &self,
        ou_ids: &[String],
        filters: &AttributeFilters,
    ) -> Result<u64, StoreError>;

    async fn exists(&self, id: &str) -> Result<bool, StoreError>;

    async fn create(&self, user: &User, credentials: &CredentialBundle) -> Result<(), StoreError>;

    /// Persist the user row and, when supplied, the already-merged
    /// credential bundle in the same transaction.
    async fn update(
        &self,
        user: &User,
        credentials: Option<&CredentialBundle>,
    ) -> Result<(), StoreError>;

    async fn update_credentials(
        &self,
        id: &str,
        credentials: &CredentialBundle,
    ) -> Result<(), StoreError>;

    async fn delete(&self, id: &str) -> Result<(), StoreError>;

    /// Resolve `filters` to exactly one user id. `NotFound` when nothing
    /// matches, `Ambiguous` when more than one row does.
    async fn identify(&self, filters: &AttributeFilters) -> Result<String, StoreError>;

    async fn get_with_credentials(&self, id: &str)
    -> Result<(User, CredentialBundle), StoreError>;

    /// Subset of `ids` unknown to this store.
    async fn validate_ids(&self, ids: &[String]) -> Result<Vec<String>, StoreError>;

    async fn is_declarative(&self, id: &str) -> Result<bool, StoreError>;

    async fn group_count(&self, id: &str) -> Result<u64, StoreError>;

    async fn user_groups(
        &self,
        id: &str,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<GroupSummary>, StoreError>;
}

/// Store surface for the role resource kind.
#[async_trait]
pub trait RoleStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Role, StoreError>;

    async fn list(&self, limit: u64, offset: u64) -> Result<Vec<Role>, StoreError>;

    async fn count(&self) -> Result<u64, StoreError>;

    async fn list_by_ou(
        &self,
        ou_ids: &[String],
        limit: u64,
        offset: u64,
    ) -> Result<Vec<Role>, StoreError>;

    async fn count_by_ou(&self, ou_ids: &[String]) -> Result<u64, StoreError>;

    async fn exists(&self, id: &str) -> Result<bool, StoreError>;

    async fn name_exists_in_ou(&self, name: &str, ou_id: &str) -> Result<bool, StoreError>;

    async fn create(&self, role: &Role) -> Result<(), StoreError>;

    async fn update(&self, role: &Role) -> Result<(), StoreError>;

    async fn delete(&self, id: &str) -> Result<(), StoreError>;

    async fn add_assignments(
        &self,
        id: &str,
        assignments: &[Assignment],
    ) -> Result<(), StoreError>;

    async fn remove_assignments(
        &self,
        id: &str,
        assignments: &[Assignment],
    ) -> Result<(), StoreError>;

    async fn is_declarative(&self, id: &str) -> Result<bool, StoreError>;
}
