//! Composite front over the declarative and database stores.
//!
//! Reads consult the database first (it wins on id collisions), listing
//! merges both sides under a per-side fetch cap, and every write routes
//! to the database store; descriptor entries are immutable by
//! construction and guarded with a dedicated sentinel.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use identity_sdk::{Assignment, CredentialBundle, GroupSummary, Role, User};

use crate::domain::stores::{AttributeFilters, RoleStore, StoreError, UserStore};

/// Merge with database precedence, then order by id so pagination over
/// the merged sequence is deterministic.
fn merge_by_id<T>(db_side: Vec<T>, file_side: Vec<T>, key: impl Fn(&T) -> &str) -> Vec<T> {
    let taken: HashSet<String> = db_side.iter().map(|item| key(item).to_owned()).collect();
    let mut merged = db_side;
    merged.extend(
        file_side
            .into_iter()
            .filter(|item| !taken.contains(key(item))),
    );
    merged.sort_by(|a, b| key(a).cmp(key(b)));
    merged
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

/// The cap bounds the pre-deduplication fetch volume across both sides.
fn capped(db_len: usize, file_len: usize, cap: u64) -> Result<(), StoreError> {
    if (db_len + file_len) as u64 > cap {
        Err(StoreError::LimitExceeded { cap })
    } else {
        Ok(())
    }
}

pub struct CompositeUserStore {
    file: Arc<dyn UserStore>,
    db: Arc<dyn UserStore>,
    /// Fetch cap; bounds merge memory under adversarial filters and is
    /// enforced before deduplication.
    cap: u64,
}

impl CompositeUserStore {
    #[must_use]
    pub fn new(file: Arc<dyn UserStore>, db: Arc<dyn UserStore>, cap: u64) -> Self {
        Self { file, db, cap }
    }

    /// Fetch all matching entries from both sides, failing when the
    /// combined volume exceeds the cap, and merge with database
    /// precedence.
    async fn merged(
        &self,
        ou_ids: Option<&[String]>,
        filters: &AttributeFilters,
    ) -> Result<Vec<User>, StoreError> {
        let probe = self.cap + 1;
        let (db_side, file_side) = match ou_ids {
            Some(ou_ids) => (
                self.db.list_by_ou(ou_ids, filters, probe, 0).await?,
                self.file.list_by_ou(ou_ids, filters, probe, 0).await?,
            ),
            None => (
                self.db.list(filters, probe, 0).await?,
                self.file.list(filters, probe, 0).await?,
            ),
        };
        capped(db_side.len(), file_side.len(), self.cap)?;
        Ok(merge_by_id(db_side, file_side, |user| &user.id))
    }

    async fn guard_declarative(&self, id: &str) -> Result<(), StoreError> {
        if self.file.exists(id).await? {
            return Err(StoreError::Declarative { id: id.to_owned() });
        }
        Ok(())
    }
}

#[async_trait]
impl UserStore for CompositeUserStore {
    async fn get(&self, id: &str) -> Result<User, StoreError> {
        match self.db.get(id).await {
            Ok(user) => Ok(user),
            Err(StoreError::NotFound) => self.file.get(id).await,
            Err(e) => Err(e),
        }
    }

    async fn list(
        &self,
        filters: &AttributeFilters,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<User>, StoreError> {
        let merged = self.merged(None, filters).await?;
        Ok(window(merged, limit, offset))
    }

    async fn count(&self, filters: &AttributeFilters) -> Result<u64, StoreError> {
        // Counting shares the cap with listing so both fail symmetrically
        // instead of silently under-reporting.
        Ok(self.merged(None, filters).await?.len() as u64)
    }

    async fn list_by_ou(
        &self,
        ou_ids: &[String],
        filters: &AttributeFilters,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<User>, StoreError> {
        let merged = self.merged(Some(ou_ids), filters).await?;
        Ok(window(merged, limit, offset))
    }

    async fn count_by_ou(
        &self,
        ou_ids: &[String],
        filters: &AttributeFilters,
    ) -> Result<u64, StoreError> {
        Ok(self.merged(Some(ou_ids), filters).await?.len() as u64)
    }

    async fn exists(&self, id: &str) -> Result<bool, StoreError> {
        if self.file.exists(id).await? {
            return Ok(true);
        }
        self.db.exists(id).await
    }

    async fn create(&self, user: &User, credentials: &CredentialBundle) -> Result<(), StoreError> {
        if self.file.exists(&user.id).await? {
            return Err(StoreError::Duplicate {
                id: user.id.clone(),
            });
        }
        self.db.create(user, credentials).await
    }

    async fn update(
        &self,
        user: &User,
        credentials: Option<&CredentialBundle>,
    ) -> Result<(), StoreError> {
        self.guard_declarative(&user.id).await?;
        self.db.update(user, credentials).await
    }

    async fn update_credentials(
        &self,
        id: &str,
        credentials: &CredentialBundle,
    ) -> Result<(), StoreError> {
        self.guard_declarative(id).await?;
        self.db.update_credentials(id, credentials).await
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.guard_declarative(id).await?;
        self.db.delete(id).await
    }

    async fn identify(&self, filters: &AttributeFilters) -> Result<String, StoreError> {
        match self.db.identify(filters).await {
            Ok(id) => Ok(id),
            Err(StoreError::NotFound) => self.file.identify(filters).await,
            Err(e) => Err(e),
        }
    }

    async fn get_with_credentials(
        &self,
        id: &str,
    ) -> Result<(User, CredentialBundle), StoreError> {
        match self.db.get_with_credentials(id).await {
            Ok(found) => Ok(found),
            Err(StoreError::NotFound) => self.file.get_with_credentials(id).await,
            Err(e) => Err(e),
        }
    }

    async fn validate_ids(&self, ids: &[String]) -> Result<Vec<String>, StoreError> {
        let unknown_to_db = self.db.validate_ids(ids).await?;
        if unknown_to_db.is_empty() {
            return Ok(unknown_to_db);
        }
        self.file.validate_ids(&unknown_to_db).await
    }

    async fn is_declarative(&self, id: &str) -> Result<bool, StoreError> {
        // Presence in the descriptor store decides; the database is not
        // consulted.
        self.file.exists(id).await
    }

    async fn group_count(&self, id: &str) -> Result<u64, StoreError> {
        self.db.group_count(id).await
    }

    async fn user_groups(
        &self,
        id: &str,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<GroupSummary>, StoreError> {
        self.db.user_groups(id, limit, offset).await
    }
}

pub struct CompositeRoleStore {
    file: Arc<dyn RoleStore>,
    db: Arc<dyn RoleStore>,
    cap: u64,
}

impl CompositeRoleStore {
    #[must_use]
    pub fn new(file: Arc<dyn RoleStore>, db: Arc<dyn RoleStore>, cap: u64) -> Self {
        Self { file, db, cap }
    }

    async fn merged(&self, ou_ids: Option<&[String]>) -> Result<Vec<Role>, StoreError> {
        let probe = self.cap + 1;
        let (db_side, file_side) = match ou_ids {
            Some(ou_ids) => (
                self.db.list_by_ou(ou_ids, probe, 0).await?,
                self.file.list_by_ou(ou_ids, probe, 0).await?,
            ),
            None => (self.db.list(probe, 0).await?, self.file.list(probe, 0).await?),
        };
        capped(db_side.len(), file_side.len(), self.cap)?;
        Ok(merge_by_id(db_side, file_side, |role| &role.id))
    }

    async fn guard_declarative(&self, id: &str) -> Result<(), StoreError> {
        if self.file.exists(id).await? {
            return Err(StoreError::Declarative { id: id.to_owned() });
        }
        Ok(())
    }
}

#[async_trait]
impl RoleStore for CompositeRoleStore {
    async fn get(&self, id: &str) -> Result<Role, StoreError> {
        match self.db.get(id).await {
            Ok(role) => Ok(role),
            Err(StoreError::NotFound) => self.file.get(id).await,
            Err(e) => Err(e),
        }
    }

    async fn list(&self, limit: u64, offset: u64) -> Result<Vec<Role>, StoreError> {
        let merged = self.merged(None).await?;
        Ok(window(merged, limit, offset))
    }

    async fn count(&self) -> Result<u64, StoreError> {
        Ok(self.merged(None).await?.len() as u64)
    }

    async fn list_by_ou(
        &self,
        ou_ids: &[String],
        limit: u64,
        offset: u64,
    ) -> Result<Vec<Role>, StoreError> {
        let merged = self.merged(Some(ou_ids)).await?;
        Ok(window(merged, limit, offset))
    }

    async fn count_by_ou(&self, ou_ids: &[String]) -> Result<u64, StoreError> {
        Ok(self.merged(Some(ou_ids)).await?.len() as u64)
    }

    async fn exists(&self, id: &str) -> Result<bool, StoreError> {
        if self.file.exists(id).await? {
            return Ok(true);
        }
        self.db.exists(id).await
    }

    async fn name_exists_in_ou(&self, name: &str, ou_id: &str) -> Result<bool, StoreError> {
        if self.file.name_exists_in_ou(name, ou_id).await? {
            return Ok(true);
        }
        self.db.name_exists_in_ou(name, ou_id).await
    }

    async fn create(&self, role: &Role) -> Result<(), StoreError> {
        if self.file.exists(&role.id).await? {
            return Err(StoreError::Duplicate {
                id: role.id.clone(),
            });
        }
        self.db.create(role).await
    }

    async fn update(&self, role: &Role) -> Result<(), StoreError> {
        self.guard_declarative(&role.id).await?;
        self.db.update(role).await
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.guard_declarative(id).await?;
        self.db.delete(id).await
    }

    async fn add_assignments(
        &self,
        id: &str,
        assignments: &[Assignment],
    ) -> Result<(), StoreError> {
        self.guard_declarative(id).await?;
        self.db.add_assignments(id, assignments).await
    }

    async fn remove_assignments(
        &self,
        id: &str,
        assignments: &[Assignment],
    ) -> Result<(), StoreError> {
        self.guard_declarative(id).await?;
        self.db.remove_assignments(id, assignments).await
    }

    async fn is_declarative(&self, id: &str) -> Result<bool, StoreError> {
        self.file.exists(id).await
    }
}
