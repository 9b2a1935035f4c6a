//! Capabilities injected into the services from outside the module.
//!
//! Each port is a narrow async trait so the concrete engine stays
//! replaceable and trivially mockable in tests. Default implementations
//! live under `infra`.

use std::sync::Arc;

use async_trait::async_trait;
use identity_sdk::CredentialRecord;
use thiserror::Error;

/// Per-request caller identity threaded from the API entry point.
#[derive(Debug, Clone, Default)]
pub struct SecurityContext {
    subject_id: Option<String>,
}

impl SecurityContext {
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn for_subject(subject_id: impl Into<String>) -> Self {
        Self {
            subject_id: Some(subject_id.into()),
        }
    }

    #[must_use]
    pub fn subject_id(&self) -> Option<&str> {
        self.subject_id.as_deref()
    }
}

/// Infrastructure failure inside a capability. The services report these
/// as internal errors.
#[derive(Error, Debug)]
#[error("capability failure: {message}")]
pub struct PortError {
    pub message: String,
}

impl PortError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<anyhow::Error> for PortError {
    fn from(e: anyhow::Error) -> Self {
        Self {
            message: e.to_string(),
        }
    }
}

/// Outcome of an authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

/// The resource an action targets, as seen by the policy engine.
#[derive(Debug, Clone)]
pub struct ResourceRef<'a> {
    /// Resource kind (`user`, `role`).
    pub kind: &'a str,
    /// Organization unit owning the resource.
    pub ou_id: &'a str,
    /// Concrete resource id, absent for collection-level actions.
    pub id: Option<&'a str>,
}

/// Organization units the caller may see for a listing operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListScope {
    /// No scoping; use the unscoped store methods.
    All,
    /// Restrict to these organization units.
    Within(Vec<String>),
    /// Nothing visible; short-circuit without touching the store.
    Denied,
}

#[async_trait]
pub trait Authorizer: Send + Sync {
    /// Decide whether `action` on `resource` is allowed for the caller.
    async fn check(
        &self,
        ctx: &SecurityContext,
        action: &str,
        resource: &ResourceRef<'_>,
    ) -> Result<Decision, PortError>;

    /// Organization units the caller may read when listing `kind`.
    async fn allowed_org_units(
        &self,
        ctx: &SecurityContext,
        action: &str,
        kind: &str,
    ) -> Result<ListScope, PortError>;
}

#[async_trait]
pub trait OrgUnitDirectory: Send + Sync {
    async fn exists(&self, ou_id: &str) -> Result<bool, PortError>;

    /// True when `child` is `parent` itself or lies below it in the
    /// organization-unit hierarchy.
    async fn is_self_or_descendant(&self, child: &str, parent: &str) -> Result<bool, PortError>;
}

/// A schema violation message safe to return to clients.
#[derive(Debug, Clone)]
pub struct SchemaViolation {
    pub message: String,
}

/// A resolved user schema.
pub trait UserSchema: Send + Sync {
    fn type_name(&self) -> &str;

    /// Organization unit this user type is bound to.
    fn bound_ou(&self) -> &str;

    /// Attribute paths that must be unique across users of any type.
    fn unique_attributes(&self) -> &[String];

    /// Attribute keys holding credential material.
    fn credential_attributes(&self) -> &[String];

    /// Validate the attribute document against the declared schema.
    fn validate(&self, attributes: &serde_json::Value) -> Result<(), SchemaViolation>;
}

#[async_trait]
pub trait SchemaRegistry: Send + Sync {
    /// Resolve a user type name; `None` when no schema is registered.
    async fn resolve(&self, type_name: &str)
    -> Result<Option<Arc<dyn UserSchema>>, PortError>;
}

#[derive(Error, Debug)]
#[error("credential hashing failed: {message}")]
pub struct HashError {
    pub message: String,
}

impl HashError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The password-hashing capability. Algorithm details stay behind this
/// trait; the domain only sees the record shape.
pub trait CredentialHasher: Send + Sync {
    /// Hash a plaintext secret into a fresh salted record.
    fn hash(&self, plain: &str) -> Result<CredentialRecord, HashError>;

    /// Verify a plaintext secret against a stored record.
    fn verify(&self, plain: &str, record: &CredentialRecord) -> Result<bool, HashError>;
}
