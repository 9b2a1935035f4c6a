//! Domain layer - business logic and rules.
//!
//! - `stores` - the contract shared by the descriptor, database and
//!   composite store realizations
//! - `service` - user and role operations (authorization gating,
//!   validation, credential handling, pagination)
//! - `ports` - capabilities injected from outside the module
//! - `credentials` / `attributes` - credential normalization and
//!   attribute-document matching shared across layers
//!
//! The domain layer may import `identity_sdk` and `infra` (data access);
//! it must not import `api` (one-way dependency).

pub mod attributes;
pub mod credentials;
pub mod error;
pub mod ports;
pub mod service;
pub mod stores;
