//! Domain services for the identity resource kinds.
//!
//! Services receive their store through the store contract, so the same
//! code runs against the database store, the descriptor store or the
//! composite front depending on the configured mode. Handlers call
//! service methods with business parameters only.

use std::sync::Arc;

use crate::domain::ports::{Authorizer, CredentialHasher, OrgUnitDirectory, SchemaRegistry};
use crate::domain::stores::{RoleStore, UserStore};

mod roles;
mod users;

pub use roles::RolesService;
pub use users::UsersService;

/// Resource kind names as seen by the authorization capability.
pub(crate) mod resources {
    pub const USER: &str = "user";
    pub const ROLE: &str = "role";
}

pub(crate) mod actions {
    pub const GET: &str = "get";
    pub const LIST: &str = "list";
    pub const CREATE: &str = "create";
    pub const UPDATE: &str = "update";
    pub const DELETE: &str = "delete";
}

/// Configuration for the domain services
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub default_page_size: u64,
    /// Fixed page size used when the exporter walks the list view.
    pub export_page_size: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            default_page_size: 30,
            export_page_size: 100,
        }
    }
}

/// DI container aggregating the domain services.
pub struct AppServices {
    pub users: Arc<UsersService>,
    pub roles: Arc<RolesService>,
}

impl AppServices {
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        user_store: Arc<dyn UserStore>,
        role_store: Arc<dyn RoleStore>,
        authorizer: Arc<dyn Authorizer>,
        org_units: Arc<dyn OrgUnitDirectory>,
        schemas: Arc<dyn SchemaRegistry>,
        hasher: Arc<dyn CredentialHasher>,
        config: ServiceConfig,
    ) -> Self {
        let users = Arc::new(UsersService::new(
            Arc::clone(&user_store),
            Arc::clone(&authorizer),
            Arc::clone(&org_units),
            schemas,
            hasher,
            config.clone(),
        ));
        let roles = Arc::new(RolesService::new(
            role_store,
            user_store,
            authorizer,
            org_units,
            config,
        ));
        Self { users, roles }
    }
}

#[cfg(test)]
mod tests_roles;
#[cfg(test)]
mod tests_users;
