#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Shared fixtures for the service and store tests: an in-memory mutable
//! store pair, a deterministic hasher and a set of authorizer mocks.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use identity_sdk::{
    Assignment, CredentialBundle, CredentialRecord, GroupSummary, Role, StorageType, User,
};
use parking_lot::RwLock;
use serde_json::json;

use crate::config::{OrgUnitEntry, SchemaEntry};
use crate::domain::attributes::matches_filters;
use crate::domain::ports::{
    Authorizer, CredentialHasher, Decision, HashError, ListScope, PortError, ResourceRef,
    SecurityContext,
};
use crate::domain::service::{AppServices, ServiceConfig};
use crate::domain::stores::{AttributeFilters, RoleStore, StoreError, UserStore};
use crate::infra::directory::ConfigOrgUnitDirectory;
use crate::infra::schema::StaticSchemaRegistry;

// ============================================================================
// Hasher
// ============================================================================

/// Deterministic stand-in for the PBKDF2 capability.
pub struct PlainHasher;

impl CredentialHasher for PlainHasher {
    fn hash(&self, plain: &str) -> Result<CredentialRecord, HashError> {
        Ok(CredentialRecord {
            storage_type: StorageType::Hash,
            algorithm: Some("TEST".to_owned()),
            iterations: Some(1),
            key_length: Some(32),
            salt: Some("test-salt".to_owned()),
            value: format!("hashed:{plain}"),
        })
    }

    fn verify(&self, plain: &str, record: &CredentialRecord) -> Result<bool, HashError> {
        Ok(record.value == format!("hashed:{plain}"))
    }
}

// ============================================================================
// In-memory stores
// ============================================================================

/// Mutable user store over a plain map; id-ordered like the database
/// realization.
#[derive(Default)]
pub struct InMemoryUserStore {
    users: RwLock<BTreeMap<String, (User, CredentialBundle)>>,
    groups: RwLock<BTreeMap<String, Vec<GroupSummary>>>,
}

impl InMemoryUserStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_group(&self, user_id: &str, group: GroupSummary) {
        self.groups
            .write()
            .entry(user_id.to_owned())
            .or_default()
            .push(group);
    }

    #[must_use]
    pub fn stored_bundle(&self, id: &str) -> Option<CredentialBundle> {
        self.users.read().get(id).map(|(_, bundle)| bundle.clone())
    }

    fn matching(&self, ou_ids: Option<&[String]>, filters: &AttributeFilters) -> Vec<User> {
        self.users
            .read()
            .values()
            .filter(|(user, _)| ou_ids.is_none_or(|ous| ous.contains(&user.ou_id)))
            .filter(|(user, _)| matches_filters(&user.attributes, filters))
            .map(|(user, _)| user.clone())
            .collect()
    }
}

fn window<T>(mut items: Vec<T>, limit: u64, offset: u64) -> Vec<T> {
    let offset = usize::try_from(offset).unwrap_or(usize::MAX);
    let limit = usize::try_from(limit).unwrap_or(usize::MAX);
    if offset >= items.len() {
        return Vec::new();
    }
    let mut tail = items.split_off(offset);
    tail.truncate(limit);
    tail
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn get(&self, id: &str) -> Result<User, StoreError> {
        self.users
            .read()
            .get(id)
            .map(|(user, _)| user.clone())
            .ok_or(StoreError::NotFound)
    }

    async fn list(
        &self,
        filters: &AttributeFilters,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<User>, StoreError> {
        Ok(window(self.matching(None, filters), limit, offset))
    }

    async fn count(&self, filters: &AttributeFilters) -> Result<u64, StoreError> {
        Ok(self.matching(None, filters).len() as u64)
    }

    async fn list_by_ou(
        &self,
        ou_ids: &[String],
        filters: &AttributeFilters,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<User>, StoreError> {
        Ok(window(self.matching(Some(ou_ids), filters), limit, offset))
    }

    async fn count_by_ou(
        &self,
        ou_ids: &[String],
        filters: &AttributeFilters,
    ) -> Result<u64, StoreError> {
        Ok(self.matching(Some(ou_ids), filters).len() as u64)
    }

    async fn exists(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.users.read().contains_key(id))
    }

    async fn create(&self, user: &User, credentials: &CredentialBundle) -> Result<(), StoreError> {
        let mut users = self.users.write();
        if users.contains_key(&user.id) {
            return Err(StoreError::Duplicate {
                id: user.id.clone(),
            });
        }
        users.insert(user.id.clone(), (user.clone(), credentials.clone()));
        Ok(())
    }

    async fn update(
        &self,
        user: &User,
        credentials: Option<&CredentialBundle>,
    ) -> Result<(), StoreError> {
        let mut users = self.users.write();
        let Some(slot) = users.get_mut(&user.id) else {
            return Err(StoreError::NotFound);
        };
        slot.0 = user.clone();
        if let Some(bundle) = credentials {
            slot.1 = bundle.clone();
        }
        Ok(())
    }

    async fn update_credentials(
        &self,
        id: &str,
        credentials: &CredentialBundle,
    ) -> Result<(), StoreError> {
        let mut users = self.users.write();
        let Some(slot) = users.get_mut(id) else {
            return Err(StoreError::NotFound);
        };
        slot.1 = credentials.clone();
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        if self.users.write().remove(id).is_none() {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn identify(&self, filters: &AttributeFilters) -> Result<String, StoreError> {
        let matches = self.matching(None, filters);
        match matches.len() {
            0 => Err(StoreError::NotFound),
            1 => Ok(matches[0].id.clone()),
            _ => Err(StoreError::Ambiguous),
        }
    }

    async fn get_with_credentials(
        &self,
        id: &str,
    ) -> Result<(User, CredentialBundle), StoreError> {
        self.users
            .read()
            .get(id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn validate_ids(&self, ids: &[String]) -> Result<Vec<String>, StoreError> {
        let users = self.users.read();
        Ok(ids
            .iter()
            .filter(|id| !users.contains_key(*id))
            .cloned()
            .collect())
    }

    async fn is_declarative(&self, _id: &str) -> Result<bool, StoreError> {
        Ok(false)
    }

    async fn group_count(&self, id: &str) -> Result<u64, StoreError> {
        Ok(self.groups.read().get(id).map_or(0, Vec::len) as u64)
    }

    async fn user_groups(
        &self,
        id: &str,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<GroupSummary>, StoreError> {
        let groups = self.groups.read().get(id).cloned().unwrap_or_default();
        Ok(window(groups, limit, offset))
    }
}

/// Mutable role store over a plain map.
#[derive(Default)]
pub struct InMemoryRoleStore {
    roles: RwLock<BTreeMap<String, Role>>,
}

impl InMemoryRoleStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RoleStore for InMemoryRoleStore {
    async fn get(&self, id: &str) -> Result<Role, StoreError> {
        self.roles.read().get(id).cloned().ok_or(StoreError::NotFound)
    }

    async fn list(&self, limit: u64, offset: u64) -> Result<Vec<Role>, StoreError> {
        Ok(window(
            self.roles.read().values().cloned().collect(),
            limit,
            offset,
        ))
    }

    async fn count(&self) -> Result<u64, StoreError> {
        Ok(self.roles.read().len() as u64)
    }

    async fn list_by_ou(
        &self,
        ou_ids: &[String],
        limit: u64,
        offset: u64,
    ) -> Result<Vec<Role>, StoreError> {
        let roles = self
            .roles
            .read()
            .values()
            .filter(|role| ou_ids.contains(&role.ou_id))
            .cloned()
            .collect();
        Ok(window(roles, limit, offset))
    }

    async fn count_by_ou(&self, ou_ids: &[String]) -> Result<u64, StoreError> {
        let count = self
            .roles
            .read()
            .values()
            .filter(|role| ou_ids.contains(&role.ou_id))
            .count();
        Ok(count as u64)
    }

    async fn exists(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.roles.read().contains_key(id))
    }

    async fn name_exists_in_ou(&self, name: &str, ou_id: &str) -> Result<bool, StoreError> {
        Ok(self
            .roles
            .read()
            .values()
            .any(|role| role.name == name && role.ou_id == ou_id))
    }

    async fn create(&self, role: &Role) -> Result<(), StoreError> {
        let mut roles = self.roles.write();
        if roles.contains_key(&role.id) {
            return Err(StoreError::Duplicate {
                id: role.id.clone(),
            });
        }
        roles.insert(role.id.clone(), role.clone());
        Ok(())
    }

    async fn update(&self, role: &Role) -> Result<(), StoreError> {
        let mut roles = self.roles.write();
        if !roles.contains_key(&role.id) {
            return Err(StoreError::NotFound);
        }
        roles.insert(role.id.clone(), role.clone());
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        if self.roles.write().remove(id).is_none() {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn add_assignments(
        &self,
        id: &str,
        assignments: &[Assignment],
    ) -> Result<(), StoreError> {
        let mut roles = self.roles.write();
        let Some(role) = roles.get_mut(id) else {
            return Err(StoreError::NotFound);
        };
        for assignment in assignments {
            if !role.assignments.contains(assignment) {
                role.assignments.push(assignment.clone());
            }
        }
        Ok(())
    }

    async fn remove_assignments(
        &self,
        id: &str,
        assignments: &[Assignment],
    ) -> Result<(), StoreError> {
        let mut roles = self.roles.write();
        let Some(role) = roles.get_mut(id) else {
            return Err(StoreError::NotFound);
        };
        role.assignments.retain(|a| !assignments.contains(a));
        Ok(())
    }

    async fn is_declarative(&self, _id: &str) -> Result<bool, StoreError> {
        Ok(false)
    }
}

// ============================================================================
// Authorizer mocks
// ============================================================================

/// Allows everything and counts `check` calls, so tests can assert how
/// many authorization round-trips an operation performs.
#[derive(Default)]
pub struct CountingAuthorizer {
    pub checks: AtomicUsize,
}

impl CountingAuthorizer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn check_count(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Authorizer for CountingAuthorizer {
    async fn check(
        &self,
        _ctx: &SecurityContext,
        _action: &str,
        _resource: &ResourceRef<'_>,
    ) -> Result<Decision, PortError> {
        self.checks.fetch_add(1, Ordering::SeqCst);
        Ok(Decision::Allow)
    }

    async fn allowed_org_units(
        &self,
        _ctx: &SecurityContext,
        _action: &str,
        _kind: &str,
    ) -> Result<ListScope, PortError> {
        Ok(ListScope::All)
    }
}

pub struct DenyAllAuthorizer;

#[async_trait]
impl Authorizer for DenyAllAuthorizer {
    async fn check(
        &self,
        _ctx: &SecurityContext,
        _action: &str,
        _resource: &ResourceRef<'_>,
    ) -> Result<Decision, PortError> {
        Ok(Decision::Deny)
    }

    async fn allowed_org_units(
        &self,
        _ctx: &SecurityContext,
        _action: &str,
        _kind: &str,
    ) -> Result<ListScope, PortError> {
        Ok(ListScope::Denied)
    }
}

/// Allows actions but restricts listing to a fixed scope.
pub struct ScopedAuthorizer {
    pub scope: ListScope,
}

#[async_trait]
impl Authorizer for ScopedAuthorizer {
    async fn check(
        &self,
        _ctx: &SecurityContext,
        _action: &str,
        _resource: &ResourceRef<'_>,
    ) -> Result<Decision, PortError> {
        Ok(Decision::Allow)
    }

    async fn allowed_org_units(
        &self,
        _ctx: &SecurityContext,
        _action: &str,
        _kind: &str,
    ) -> Result<ListScope, PortError> {
        Ok(self.scope.clone())
    }
}

pub struct FailingAuthorizer;

#[async_trait]
impl Authorizer for FailingAuthorizer {
    async fn check(
        &self,
        _ctx: &SecurityContext,
        _action: &str,
        _resource: &ResourceRef<'_>,
    ) -> Result<Decision, PortError> {
        Err(PortError::new("policy engine unreachable"))
    }

    async fn allowed_org_units(
        &self,
        _ctx: &SecurityContext,
        _action: &str,
        _kind: &str,
    ) -> Result<ListScope, PortError> {
        Err(PortError::new("policy engine unreachable"))
    }
}

// ============================================================================
// Wiring helpers
// ============================================================================

#[must_use]
pub fn org_units() -> Vec<OrgUnitEntry> {
    vec![
        OrgUnitEntry {
            id: "root".to_owned(),
            parent: None,
        },
        OrgUnitEntry {
            id: "engineering".to_owned(),
            parent: Some("root".to_owned()),
        },
        OrgUnitEntry {
            id: "sales".to_owned(),
            parent: Some("root".to_owned()),
        },
    ]
}

#[must_use]
pub fn employee_schema() -> SchemaEntry {
    SchemaEntry {
        name: "employee".to_owned(),
        ou_id: "root".to_owned(),
        json_schema: Some(json!({
            "type": "object",
            "required": ["username"],
            "properties": {
                "username": {"type": "string", "minLength": 1}
            }
        })),
        unique_attributes: vec!["username".to_owned()],
        credential_attributes: vec!["password".to_owned(), "pin".to_owned()],
    }
}

pub struct TestHarness {
    pub services: AppServices,
    pub user_store: Arc<InMemoryUserStore>,
    pub role_store: Arc<InMemoryRoleStore>,
}

#[must_use]
pub fn build_services(authorizer: Arc<dyn Authorizer>) -> TestHarness {
    let user_store = Arc::new(InMemoryUserStore::new());
    let role_store = Arc::new(InMemoryRoleStore::new());
    let services = build_services_with_stores(
        Arc::clone(&user_store) as Arc<dyn UserStore>,
        Arc::clone(&role_store) as Arc<dyn RoleStore>,
        authorizer,
    );
    TestHarness {
        services,
        user_store,
        role_store,
    }
}

/// Wire services around existing stores, e.g. to revisit seeded data
/// under a different authorization policy.
#[must_use]
pub fn build_services_with_stores(
    user_store: Arc<dyn UserStore>,
    role_store: Arc<dyn RoleStore>,
    authorizer: Arc<dyn Authorizer>,
) -> AppServices {
    AppServices::new(
        user_store,
        role_store,
        authorizer,
        Arc::new(ConfigOrgUnitDirectory::from_entries(&org_units())),
        Arc::new(StaticSchemaRegistry::from_entries(&[employee_schema()]).unwrap()),
        Arc::new(PlainHasher),
        ServiceConfig::default(),
    )
}

#[must_use]
pub fn ctx() -> SecurityContext {
    SecurityContext::for_subject("test-operator")
}
