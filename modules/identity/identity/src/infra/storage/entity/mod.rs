//! `SeaORM` entity definitions for the mutable store.

pub mod group_membership;
pub mod role;
pub mod role_assignment;
pub mod role_permission;
pub mod user;
pub mod user_indexed_attribute;
