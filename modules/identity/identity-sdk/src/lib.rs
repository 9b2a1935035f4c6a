//! Identity Module SDK
//!
//! Public contract for the identity module: resource models (users, roles,
//! credentials), the paginated list envelope, and the error type exposed to
//! other modules and API consumers.
//!
//! This crate carries no server code. The identity module itself re-exports
//! everything here; other modules should depend on this crate only.

mod errors;
mod models;
mod page;

pub use errors::IdentityError;
pub use models::{
    Assignment, AssigneeType, CredentialBundle, CredentialRecord, GroupSummary, NewRole, NewUser,
    PermissionGrant, Role, RoleUpdate, StorageType, User, UserUpdate,
};
pub use page::{Page, PageLink};
