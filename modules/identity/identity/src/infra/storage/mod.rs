//! Database persistence for the mutable store.
//!
//! All `SeaORM` specifics stay in this module: entities under `entity/`,
//! the attribute-filter SQL compiler, the schema migration and the two
//! store realizations.

pub mod attr_filter;
pub mod entity;
pub mod migrations;
pub mod roles_sea_repo;
pub mod users_sea_repo;

pub use roles_sea_repo::DbRoleStore;
pub use users_sea_repo::DbUserStore;
