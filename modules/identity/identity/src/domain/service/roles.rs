use std::collections::HashSet;
use std::sync::Arc;

use identity_sdk::{Assignment, AssigneeType, NewRole, Page, PermissionGrant, Role, RoleUpdate};
use tracing::instrument;
use uuid::Uuid;

use crate::domain::error::{DomainError, role_store_error};
use crate::domain::ports::{
    Authorizer, Decision, ListScope, OrgUnitDirectory, ResourceRef, SecurityContext,
};
use crate::domain::stores::{RoleStore, UserStore};

use super::{ServiceConfig, actions, resources};

const ROLES_PATH: &str = "/roles";

/// Roles service.
///
/// Shares the pre-fetch + action-check gating with the users service;
/// additionally validates user assignees against the user store and
/// keeps `(type, id)` assignment pairs unique.
pub struct RolesService {
    store: Arc<dyn RoleStore>,
    user_store: Arc<dyn UserStore>,
    authorizer: Arc<dyn Authorizer>,
    org_units: Arc<dyn OrgUnitDirectory>,
    config: ServiceConfig,
}

impl RolesService {
    #[must_use]
    pub fn new(
        store: Arc<dyn RoleStore>,
        user_store: Arc<dyn UserStore>,
        authorizer: Arc<dyn Authorizer>,
        org_units: Arc<dyn OrgUnitDirectory>,
        config: ServiceConfig,
    ) -> Self {
        Self {
            store,
            user_store,
            authorizer,
            org_units,
            config,
        }
    }

    async fn check_action(
        &self,
        ctx: &SecurityContext,
        action: &str,
        ou_id: &str,
        id: Option<&str>,
    ) -> Result<(), DomainError> {
        let resource = ResourceRef {
            kind: resources::ROLE,
            ou_id,
            id,
        };
        match self.authorizer.check(ctx, action, &resource).await {
            Ok(Decision::Allow) => Ok(()),
            Ok(Decision::Deny) => Err(DomainError::Unauthorized),
            Err(e) => {
                tracing::error!(error = %e, action, "Authorization capability failed");
                Err(DomainError::Internal)
            }
        }
    }

    #[instrument(skip(self, ctx), fields(role_id = %id))]
    pub async fn get_role(&self, ctx: &SecurityContext, id: &str) -> Result<Role, DomainError> {
        tracing::debug!("Getting role by id");

        let role = self
            .store
            .get(id)
            .await
            .map_err(|e| role_store_error(id, e))?;

        self.check_action(ctx, actions::GET, &role.ou_id, Some(id))
            .await?;

        Ok(role)
    }

    #[instrument(skip(self, ctx))]
    pub async fn list_roles(
        &self,
        ctx: &SecurityContext,
        limit: Option<i64>,
        offset: u64,
    ) -> Result<Page<Role>, DomainError> {
        tracing::debug!("Listing roles");

        let limit = self.effective_limit(limit)?;

        let scope = self
            .authorizer
            .allowed_org_units(ctx, actions::LIST, resources::ROLE)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Authorization capability failed");
                DomainError::Internal
            })?;

        let (total, items) = match scope {
            ListScope::All => {
                let total = self.store.count().await?;
                let items = self.store.list(limit, offset).await?;
                (total, items)
            }
            ListScope::Within(ou_ids) => {
                let total = self.store.count_by_ou(&ou_ids).await?;
                let items = self.store.list_by_ou(&ou_ids, limit, offset).await?;
                (total, items)
            }
            ListScope::Denied => return Ok(Page::empty()),
        };

        Ok(Page::new(items, total, ROLES_PATH, limit, offset))
    }

    /// Create a new role.
    #[instrument(skip(self, ctx, new_role), fields(name = %new_role.name, ou_id = %new_role.ou_id))]
    pub async fn create_role(
        &self,
        ctx: &SecurityContext,
        new_role: NewRole,
    ) -> Result<Role, DomainError> {
        tracing::info!("Creating new role");

        self.check_action(ctx, actions::CREATE, &new_role.ou_id, None)
            .await?;

        let id = new_role
            .id
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        if id.trim().is_empty() {
            return Err(DomainError::invalid_input("role id must not be empty"));
        }

        let role = Role {
            id,
            name: new_role.name,
            description: new_role.description,
            ou_id: new_role.ou_id,
            permissions: dedupe_permissions(new_role.permissions),
            assignments: dedupe_assignments(new_role.assignments),
        };

        self.validate_role(&role).await?;

        if self
            .store
            .name_exists_in_ou(&role.name, &role.ou_id)
            .await?
        {
            return Err(DomainError::RoleNameExists {
                name: role.name,
                ou_id: role.ou_id,
            });
        }

        self.validate_assignees(&role.assignments).await?;

        self.store
            .create(&role)
            .await
            .map_err(|e| role_store_error(&role.id, e))?;

        tracing::info!(role_id = %role.id, "Successfully created role");
        Ok(role)
    }

    /// Update an existing role (full replacement).
    #[instrument(skip(self, ctx, update), fields(role_id = %id))]
    pub async fn update_role(
        &self,
        ctx: &SecurityContext,
        id: &str,
        update: RoleUpdate,
    ) -> Result<Role, DomainError> {
        tracing::info!("Updating role");

        let current = self
            .store
            .get(id)
            .await
            .map_err(|e| role_store_error(id, e))?;

        self.check_action(ctx, actions::UPDATE, &current.ou_id, Some(id))
            .await?;

        if update.ou_id != current.ou_id {
            self.check_action(ctx, actions::UPDATE, &update.ou_id, Some(id))
                .await?;
        }

        let role = Role {
            id: id.to_owned(),
            name: update.name,
            description: update.description,
            ou_id: update.ou_id,
            permissions: dedupe_permissions(update.permissions),
            assignments: dedupe_assignments(update.assignments),
        };

        self.validate_role(&role).await?;

        // Renames and moves must not collide with an existing name in the
        // destination unit; an unchanged (name, ou) pair matches itself.
        if (role.name != current.name || role.ou_id != current.ou_id)
            && self
                .store
                .name_exists_in_ou(&role.name, &role.ou_id)
                .await?
        {
            return Err(DomainError::RoleNameExists {
                name: role.name,
                ou_id: role.ou_id,
            });
        }

        self.validate_assignees(&role.assignments).await?;

        self.store
            .update(&role)
            .await
            .map_err(|e| role_store_error(id, e))?;

        tracing::info!("Successfully updated role");
        Ok(role)
    }

    #[instrument(skip(self, ctx), fields(role_id = %id))]
    pub async fn delete_role(&self, ctx: &SecurityContext, id: &str) -> Result<(), DomainError> {
        tracing::info!("Deleting role");

        let current = self
            .store
            .get(id)
            .await
            .map_err(|e| role_store_error(id, e))?;

        self.check_action(ctx, actions::DELETE, &current.ou_id, Some(id))
            .await?;

        self.store
            .delete(id)
            .await
            .map_err(|e| role_store_error(id, e))?;

        tracing::info!("Successfully deleted role");
        Ok(())
    }

    #[instrument(skip(self, ctx, assignments), fields(role_id = %id))]
    pub async fn add_assignments(
        &self,
        ctx: &SecurityContext,
        id: &str,
        assignments: Vec<Assignment>,
    ) -> Result<Role, DomainError> {
        tracing::info!("Adding role assignments");

        let current = self
            .store
            .get(id)
            .await
            .map_err(|e| role_store_error(id, e))?;

        self.check_action(ctx, actions::UPDATE, &current.ou_id, Some(id))
            .await?;

        let assignments = dedupe_assignments(assignments);
        validate_assignment_shapes(&assignments)?;
        self.validate_assignees(&assignments).await?;

        self.store
            .add_assignments(id, &assignments)
            .await
            .map_err(|e| role_store_error(id, e))?;

        self.store.get(id).await.map_err(|e| role_store_error(id, e))
    }

    #[instrument(skip(self, ctx, assignments), fields(role_id = %id))]
    pub async fn remove_assignments(
        &self,
        ctx: &SecurityContext,
        id: &str,
        assignments: Vec<Assignment>,
    ) -> Result<Role, DomainError> {
        tracing::info!("Removing role assignments");

        let current = self
            .store
            .get(id)
            .await
            .map_err(|e| role_store_error(id, e))?;

        self.check_action(ctx, actions::UPDATE, &current.ou_id, Some(id))
            .await?;

        let assignments = dedupe_assignments(assignments);

        self.store
            .remove_assignments(id, &assignments)
            .await
            .map_err(|e| role_store_error(id, e))?;

        self.store.get(id).await.map_err(|e| role_store_error(id, e))
    }

    /// Whether the resource is descriptor-backed; used by the exporter.
    pub async fn is_declarative(&self, id: &str) -> Result<bool, DomainError> {
        self.store
            .is_declarative(id)
            .await
            .map_err(DomainError::from)
    }

    fn effective_limit(&self, limit: Option<i64>) -> Result<u64, DomainError> {
        match limit {
            None => Ok(self.config.default_page_size),
            Some(l) if l < 0 => Err(DomainError::InvalidLimit { limit: l }),
            #[allow(clippy::cast_sign_loss)]
            Some(l) => Ok(l as u64),
        }
    }

    async fn validate_role(&self, role: &Role) -> Result<(), DomainError> {
        if role.name.trim().is_empty() {
            return Err(DomainError::invalid_input("role name must not be empty"));
        }
        if role.ou_id.trim().is_empty() {
            return Err(DomainError::invalid_org_unit(&role.ou_id));
        }
        let known = self.org_units.exists(&role.ou_id).await.map_err(|e| {
            tracing::error!(error = %e, "Organization-unit directory failed");
            DomainError::Internal
        })?;
        if !known {
            return Err(DomainError::invalid_org_unit(&role.ou_id));
        }
        for grant in &role.permissions {
            if grant.resource_server_id.trim().is_empty() {
                return Err(DomainError::invalid_input(
                    "permission grant is missing a resource server id",
                ));
            }
        }
        validate_assignment_shapes(&role.assignments)
    }

    /// Reject assignments that point at unknown users. Group assignees
    /// are opaque to this module and pass through.
    async fn validate_assignees(&self, assignments: &[Assignment]) -> Result<(), DomainError> {
        let user_ids: Vec<String> = assignments
            .iter()
            .filter(|a| a.assignee_type == AssigneeType::User)
            .map(|a| a.id.clone())
            .collect();
        if user_ids.is_empty() {
            return Ok(());
        }
        let unknown = self.user_store.validate_ids(&user_ids).await?;
        if unknown.is_empty() {
            Ok(())
        } else {
            Err(DomainError::invalid_input(format!(
                "unknown assignee users: {}",
                unknown.join(", ")
            )))
        }
    }
}

fn validate_assignment_shapes(assignments: &[Assignment]) -> Result<(), DomainError> {
    for assignment in assignments {
        if assignment.id.trim().is_empty() {
            return Err(DomainError::invalid_input(
                "assignment is missing an assignee id",
            ));
        }
    }
    Ok(())
}

/// Keep the first occurrence of each `(type, id)` pair, preserving order.
fn dedupe_assignments(assignments: Vec<Assignment>) -> Vec<Assignment> {
    let mut seen = HashSet::new();
    assignments
        .into_iter()
        .filter(|a| seen.insert((a.assignee_type, a.id.clone())))
        .collect()
}

/// Deduplicate permission strings inside each grant, preserving order.
fn dedupe_permissions(grants: Vec<PermissionGrant>) -> Vec<PermissionGrant> {
    grants
        .into_iter()
        .map(|mut grant| {
            let mut seen = HashSet::new();
            grant.permissions.retain(|p| seen.insert(p.clone()));
            grant
        })
        .collect()
}
