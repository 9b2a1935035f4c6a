//! Config-driven authorization capability.
//!
//! A deliberately small policy engine in the spirit of a static plugin:
//! either everything is allowed (single-node installs), or access is
//! restricted to a fixed set of organization units. Real deployments
//! inject their own [`Authorizer`] implementation.

use async_trait::async_trait;

use crate::config::AuthorizationConfig;
use crate::domain::ports::{Authorizer, Decision, ListScope, PortError, ResourceRef, SecurityContext};

pub struct StaticAuthorizer {
    allow_all: bool,
    allowed_org_units: Vec<String>,
}

impl StaticAuthorizer {
    #[must_use]
    pub fn from_config(config: &AuthorizationConfig) -> Self {
        Self {
            allow_all: config.allow_all,
            allowed_org_units: config.allowed_org_units.clone(),
        }
    }

    #[must_use]
    pub fn allow_all() -> Self {
        Self {
            allow_all: true,
            allowed_org_units: Vec::new(),
        }
    }
}

#[async_trait]
impl Authorizer for StaticAuthorizer {
    async fn check(
        &self,
        _ctx: &SecurityContext,
        _action: &str,
        resource: &ResourceRef<'_>,
    ) -> Result<Decision, PortError> {
        if self.allow_all || self.allowed_org_units.iter().any(|ou| ou == resource.ou_id) {
            Ok(Decision::Allow)
        } else {
            Ok(Decision::Deny)
        }
    }

    async fn allowed_org_units(
        &self,
        _ctx: &SecurityContext,
        _action: &str,
        _kind: &str,
    ) -> Result<ListScope, PortError> {
        if self.allow_all {
            Ok(ListScope::All)
        } else if self.allowed_org_units.is_empty() {
            Ok(ListScope::Denied)
        } else {
            Ok(ListScope::Within(self.allowed_org_units.clone()))
        }
    }
}
