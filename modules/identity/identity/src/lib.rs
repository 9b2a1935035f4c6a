//! Identity Module
//!
//! Users and roles as first-class resources on top of a tri-modal store:
//! immutable resources loaded from on-disk descriptors, mutable resources
//! persisted in the database, and a composite front that merges both.
//!
//! ## Architecture
//!
//! The module follows strict layering:
//!
//! ### Contract Layer (`identity-sdk`)
//! - Model types: `User`, `Role`, `CredentialBundle`, `Page`
//! - Error type: `IdentityError`
//!
//! ### API Layer (`api`)
//! - `routes.rs` / `handlers.rs` - thin axum call-sites on the services
//! - `dto.rs` - request/response shapes
//! - `error.rs` - `IdentityError` → HTTP problem mapping
//!
//! ### Domain Layer (`domain`)
//! - `stores.rs` - the store contract shared by all three realizations
//! - `service/` - user and role business operations, authorization
//!   gating, credential handling
//! - `ports.rs` - capabilities injected from outside (authorizer,
//!   organization-unit directory, schema registry, credential hasher)
//! - Rule: MUST NOT import `api::*` (one-way dependency only)
//!
//! ### Infrastructure Layer (`infra`)
//! - `storage/` - SeaORM entities, repositories, migrations (the mutable
//!   store)
//! - `declarative/` - descriptor store, loader and exporter (the
//!   immutable store)
//! - `composite.rs` - the merged front over both stores
//! - default port implementations (`authz`, `directory`, `schema`,
//!   `hasher`)

// === PUBLIC API (from SDK) ===
pub use identity_sdk::{
    Assignment, AssigneeType, CredentialBundle, CredentialRecord, GroupSummary, IdentityError,
    NewRole, NewUser, Page, PageLink, PermissionGrant, Role, RoleUpdate, StorageType, User,
    UserUpdate,
};

pub mod api;
pub mod config;
pub mod domain;
pub mod infra;

#[cfg(test)]
mod test_support;
