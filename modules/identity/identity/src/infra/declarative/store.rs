//! In-memory keyed container for descriptor-backed resources.
//!
//! The loader holds the writer during bootstrap; after load completes no
//! writer ever runs, so request-time reads are effectively lock-free.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use identity_sdk::{Assignment, CredentialBundle, GroupSummary, Role, User};
use parking_lot::RwLock;

use crate::domain::attributes::matches_filters;
use crate::domain::stores::{AttributeFilters, RoleStore, StoreError, UserStore};

/// Insertion-ordered map of immutable entries.
pub struct DescriptorStore<T> {
    entries: RwLock<Entries<T>>,
}

struct Entries<T> {
    order: Vec<String>,
    map: HashMap<String, Arc<T>>,
}

impl<T> Default for DescriptorStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> DescriptorStore<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Entries {
                order: Vec::new(),
                map: HashMap::new(),
            }),
        }
    }

    /// Insert a loaded entry. Rejects a duplicate id with a typed error;
    /// the loader relies on this to surface descriptor conflicts.
    pub fn insert(&self, id: &str, value: T) -> Result<(), StoreError> {
        let mut entries = self.entries.write();
        if entries.map.contains_key(id) {
            return Err(StoreError::Duplicate { id: id.to_owned() });
        }
        entries.order.push(id.to_owned());
        entries.map.insert(id.to_owned(), Arc::new(value));
        Ok(())
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<T>> {
        self.entries.read().map.get(id).cloned()
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.entries.read().map.contains_key(id)
    }

    /// All entries in insertion order.
    #[must_use]
    pub fn list(&self) -> Vec<Arc<T>> {
        let entries = self.entries.read();
        entries
            .order
            .iter()
            .filter_map(|id| entries.map.get(id).cloned())
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A descriptor-backed user together with its credential bundle.
pub struct DeclarativeUser {
    pub user: User,
    pub credentials: CredentialBundle,
}

/// Read-only user store over descriptor entries. Every mutation attempt
/// fails with `Unsupported`; the loader writes through
/// [`DescriptorStore::insert`] directly.
#[derive(Default)]
pub struct DeclarativeUserStore {
    store: DescriptorStore<DeclarativeUser>,
}

impl DeclarativeUserStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, entry: DeclarativeUser) -> Result<(), StoreError> {
        let id = entry.user.id.clone();
        self.store.insert(&id, entry)
    }

    #[must_use]
    pub fn count_loaded(&self) -> usize {
        self.store.len()
    }

    fn matching(&self, filters: &AttributeFilters) -> Vec<Arc<DeclarativeUser>> {
        self.store
            .list()
            .into_iter()
            .filter(|entry| matches_filters(&entry.user.attributes, filters))
            .collect()
    }
}

fn page<T>(mut items: Vec<T>, limit: u64, offset: u64) -> Vec<T> {
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
impl UserStore for DeclarativeUserStore {
    async fn get(&self, id: &str) -> Result<User, StoreError> {
        self.store
            .get(id)
            .map(|entry| entry.user.clone())
            .ok_or(StoreError::NotFound)
    }

    async fn list(
        &self,
        filters: &AttributeFilters,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<User>, StoreError> {
        let users = self
            .matching(filters)
            .into_iter()
            .map(|entry| entry.user.clone())
            .collect();
        Ok(page(users, limit, offset))
    }

    async fn count(&self, filters: &AttributeFilters) -> Result<u64, StoreError> {
        Ok(self.matching(filters).len() as u64)
    }

    async fn list_by_ou(
        &self,
        ou_ids: &[String],
        filters: &AttributeFilters,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<User>, StoreError> {
        let users = self
            .matching(filters)
            .into_iter()
            .filter(|entry| ou_ids.contains(&entry.user.ou_id))
            .map(|entry| entry.user.clone())
            .collect();
        Ok(page(users, limit, offset))
    }

    async fn count_by_ou(
        &self,
        ou_ids: &[String],
        filters: &AttributeFilters,
    ) -> Result<u64, StoreError> {
        let count = self
            .matching(filters)
            .into_iter()
            .filter(|entry| ou_ids.contains(&entry.user.ou_id))
            .count();
        Ok(count as u64)
    }

    async fn exists(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.store.contains(id))
    }

    async fn create(&self, _user: &User, _credentials: &CredentialBundle) -> Result<(), StoreError> {
        Err(StoreError::Unsupported)
    }

    async fn update(
        &self,
        _user: &User,
        _credentials: Option<&CredentialBundle>,
    ) -> Result<(), StoreError> {
        Err(StoreError::Unsupported)
    }

    async fn update_credentials(
        &self,
        _id: &str,
        _credentials: &CredentialBundle,
    ) -> Result<(), StoreError> {
        Err(StoreError::Unsupported)
    }

    async fn delete(&self, _id: &str) -> Result<(), StoreError> {
        Err(StoreError::Unsupported)
    }

    async fn identify(&self, filters: &AttributeFilters) -> Result<String, StoreError> {
        let matches = self.matching(filters);
        match matches.len() {
            0 => Err(StoreError::NotFound),
            1 => Ok(matches[0].user.id.clone()),
            _ => Err(StoreError::Ambiguous),
        }
    }

    async fn get_with_credentials(
        &self,
        id: &str,
    ) -> Result<(User, CredentialBundle), StoreError> {
        self.store
            .get(id)
            .map(|entry| (entry.user.clone(), entry.credentials.clone()))
            .ok_or(StoreError::NotFound)
    }

    async fn validate_ids(&self, ids: &[String]) -> Result<Vec<String>, StoreError> {
        Ok(ids
            .iter()
            .filter(|id| !self.store.contains(id))
            .cloned()
            .collect())
    }

    async fn is_declarative(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.store.contains(id))
    }

    async fn group_count(&self, _id: &str) -> Result<u64, StoreError> {
        // Group memberships are mutable-only; declarative users have none.
        Ok(0)
    }

    async fn user_groups(
        &self,
        _id: &str,
        _limit: u64,
        _offset: u64,
    ) -> Result<Vec<GroupSummary>, StoreError> {
        Ok(Vec::new())
    }
}

/// Read-only role store over descriptor entries.
#[derive(Default)]
pub struct DeclarativeRoleStore {
    store: DescriptorStore<Role>,
}

impl DeclarativeRoleStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, entry: Role) -> Result<(), StoreError> {
        let id = entry.id.clone();
        self.store.insert(&id, entry)
    }

    #[must_use]
    pub fn count_loaded(&self) -> usize {
        self.store.len()
    }
}

#[async_trait]
impl RoleStore for DeclarativeRoleStore {
    async fn get(&self, id: &str) -> Result<Role, StoreError> {
        self.store
            .get(id)
            .map(|entry| (*entry).clone())
            .ok_or(StoreError::NotFound)
    }

    async fn list(&self, limit: u64, offset: u64) -> Result<Vec<Role>, StoreError> {
        let roles = self
            .store
            .list()
            .into_iter()
            .map(|entry| (*entry).clone())
            .collect();
        Ok(page(roles, limit, offset))
    }

    async fn count(&self) -> Result<u64, StoreError> {
        Ok(self.store.len() as u64)
    }

    async fn list_by_ou(
        &self,
        ou_ids: &[String],
        limit: u64,
        offset: u64,
    ) -> Result<Vec<Role>, StoreError> {
        let roles = self
            .store
            .list()
            .into_iter()
            .filter(|entry| ou_ids.contains(&entry.ou_id))
            .map(|entry| (*entry).clone())
            .collect();
        Ok(page(roles, limit, offset))
    }

    async fn count_by_ou(&self, ou_ids: &[String]) -> Result<u64, StoreError> {
        let count = self
            .store
            .list()
            .into_iter()
            .filter(|entry| ou_ids.contains(&entry.ou_id))
            .count();
        Ok(count as u64)
    }

    async fn exists(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.store.contains(id))
    }

    async fn name_exists_in_ou(&self, name: &str, ou_id: &str) -> Result<bool, StoreError> {
        Ok(self
            .store
            .list()
            .iter()
            .any(|entry| entry.name == name && entry.ou_id == ou_id))
    }

    async fn create(&self, _role: &Role) -> Result<(), StoreError> {
        Err(StoreError::Unsupported)
    }

    async fn update(&self, _role: &Role) -> Result<(), StoreError> {
        Err(StoreError::Unsupported)
    }

    async fn delete(&self, _id: &str) -> Result<(), StoreError> {
        Err(StoreError::Unsupported)
    }

    async fn add_assignments(
        &self,
        _id: &str,
        _assignments: &[Assignment],
    ) -> Result<(), StoreError> {
        Err(StoreError::Unsupported)
    }

    async fn remove_assignments(
        &self,
        _id: &str,
        _assignments: &[Assignment],
    ) -> Result<(), StoreError> {
        Err(StoreError::Unsupported)
    }

    async fn is_declarative(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.store.contains(id))
    }
}
