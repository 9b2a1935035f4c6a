use std::collections::BTreeMap;
use std::sync::Arc;

use identity_sdk::{
    CredentialRecord, GroupSummary, NewUser, Page, StorageType, User, UserUpdate,
};
use tracing::instrument;
use uuid::Uuid;

use crate::domain::credentials::{
    self, Cardinality, CredentialError, CredentialInput, cardinality_of,
};
use crate::domain::error::{DomainError, user_store_error};
use crate::domain::ports::{
    Authorizer, CredentialHasher, Decision, ListScope, OrgUnitDirectory, ResourceRef,
    SchemaRegistry, SecurityContext, UserSchema,
};
use crate::domain::stores::{AttributeFilters, StoreError, UserStore};

use super::{ServiceConfig, actions, resources};

const USERS_PATH: &str = "/users";

/// Users service.
///
/// Every privileged operation follows the pre-fetch + action-check
/// pattern: the existing record is loaded first so its organization unit
/// can feed the authorization check, and operations that move a user
/// between organization units are checked against the destination as
/// well.
pub struct UsersService {
    store: Arc<dyn UserStore>,
    authorizer: Arc<dyn Authorizer>,
    org_units: Arc<dyn OrgUnitDirectory>,
    schemas: Arc<dyn SchemaRegistry>,
    hasher: Arc<dyn CredentialHasher>,
    config: ServiceConfig,
}

impl UsersService {
    #[must_use]
    pub fn new(
        store: Arc<dyn UserStore>,
        authorizer: Arc<dyn Authorizer>,
        org_units: Arc<dyn OrgUnitDirectory>,
        schemas: Arc<dyn SchemaRegistry>,
        hasher: Arc<dyn CredentialHasher>,
        config: ServiceConfig,
    ) -> Self {
        Self {
            store,
            authorizer,
            org_units,
            schemas,
            hasher,
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
            kind: resources::USER,
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

    #[instrument(skip(self, ctx), fields(user_id = %id))]
    pub async fn get_user(&self, ctx: &SecurityContext, id: &str) -> Result<User, DomainError> {
        tracing::debug!("Getting user by id");

        let user = self
            .store
            .get(id)
            .await
            .map_err(|e| user_store_error(id, e))?;

        self.check_action(ctx, actions::GET, &user.ou_id, Some(id))
            .await?;

        Ok(user)
    }

    /// List users with offset pagination and attribute filters.
    #[instrument(skip(self, ctx, filters))]
    pub async fn list_users(
        &self,
        ctx: &SecurityContext,
        filters: &AttributeFilters,
        limit: Option<i64>,
        offset: u64,
    ) -> Result<Page<User>, DomainError> {
        tracing::debug!("Listing users");

        let limit = self.effective_limit(limit)?;

        let scope = self
            .authorizer
            .allowed_org_units(ctx, actions::LIST, resources::USER)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Authorization capability failed");
                DomainError::Internal
            })?;

        let (total, items) = match scope {
            ListScope::All => {
                let total = self.store.count(filters).await?;
                let items = self.store.list(filters, limit, offset).await?;
                (total, items)
            }
            ListScope::Within(ou_ids) => {
                let total = self.store.count_by_ou(&ou_ids, filters).await?;
                let items = self
                    .store
                    .list_by_ou(&ou_ids, filters, limit, offset)
                    .await?;
                (total, items)
            }
            ListScope::Denied => return Ok(Page::empty()),
        };

        tracing::debug!(total, "Listed users");
        Ok(Page::new(items, total, USERS_PATH, limit, offset))
    }

    /// Create a new user.
    #[instrument(skip(self, ctx, new_user), fields(user_type = %new_user.user_type, ou_id = %new_user.ou_id))]
    pub async fn create_user(
        &self,
        ctx: &SecurityContext,
        new_user: NewUser,
    ) -> Result<User, DomainError> {
        tracing::info!("Creating new user");

        self.check_action(ctx, actions::CREATE, &new_user.ou_id, None)
            .await?;

        let id = new_user
            .id
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        if id.trim().is_empty() {
            return Err(DomainError::invalid_input("user id must not be empty"));
        }

        let mut user = User {
            id,
            user_type: new_user.user_type,
            ou_id: new_user.ou_id,
            attributes: new_user.attributes,
        };

        let schema = self.resolve_schema(&user.user_type).await?;
        self.validate_against_schema(&user, schema.as_ref(), None)
            .await?;

        let credentials = credentials::extract_from_attributes(
            &mut user.attributes,
            schema.credential_attributes(),
            self.hasher.as_ref(),
        )
        .map_err(credential_error)?;

        self.store
            .create(&user, &credentials)
            .await
            .map_err(|e| user_store_error(&user.id, e))?;

        tracing::info!(user_id = %user.id, "Successfully created user");
        Ok(user)
    }

    /// Update an existing user. When the update carries credential
    /// attributes, the existing bundle is merged so that untouched
    /// credential types survive verbatim, and the row and bundle are
    /// persisted in one transaction.
    #[instrument(skip(self, ctx, update), fields(user_id = %id))]
    pub async fn update_user(
        &self,
        ctx: &SecurityContext,
        id: &str,
        update: UserUpdate,
    ) -> Result<User, DomainError> {
        tracing::info!("Updating user");

        let current = self
            .store
            .get(id)
            .await
            .map_err(|e| user_store_error(id, e))?;

        self.check_action(ctx, actions::UPDATE, &current.ou_id, Some(id))
            .await?;

        // A move between organization units needs a second check against
        // the destination. Empty destinations still differ from any
        // concrete unit; validation below rejects them afterwards.
        if update.ou_id != current.ou_id {
            self.check_action(ctx, actions::UPDATE, &update.ou_id, Some(id))
                .await?;
        }

        let mut user = User {
            id: id.to_owned(),
            user_type: update.user_type,
            ou_id: update.ou_id,
            attributes: update.attributes,
        };

        let schema = self.resolve_schema(&user.user_type).await?;
        self.validate_against_schema(&user, schema.as_ref(), Some(id))
            .await?;

        let extracted = credentials::extract_from_attributes(
            &mut user.attributes,
            schema.credential_attributes(),
            self.hasher.as_ref(),
        )
        .map_err(credential_error)?;

        let merged = if extracted.is_empty() {
            None
        } else {
            let (_, mut existing) = self
                .store
                .get_with_credentials(id)
                .await
                .map_err(|e| user_store_error(id, e))?;
            existing.overlay(extracted);
            Some(existing)
        };

        self.store
            .update(&user, merged.as_ref())
            .await
            .map_err(|e| user_store_error(id, e))?;

        tracing::info!("Successfully updated user");
        Ok(user)
    }

    #[instrument(skip(self, ctx), fields(user_id = %id))]
    pub async fn delete_user(&self, ctx: &SecurityContext, id: &str) -> Result<(), DomainError> {
        tracing::info!("Deleting user");

        let current = self
            .store
            .get(id)
            .await
            .map_err(|e| user_store_error(id, e))?;

        self.check_action(ctx, actions::DELETE, &current.ou_id, Some(id))
            .await?;

        self.store
            .delete(id)
            .await
            .map_err(|e| user_store_error(id, e))?;

        tracing::info!("Successfully deleted user");
        Ok(())
    }

    /// Replace the supplied credential types on a user, preserving all
    /// other types. Cardinality is enforced before any storage access.
    #[instrument(skip(self, ctx, inputs), fields(user_id = %id))]
    pub async fn update_credentials(
        &self,
        ctx: &SecurityContext,
        id: &str,
        inputs: BTreeMap<String, CredentialInput>,
    ) -> Result<(), DomainError> {
        tracing::info!("Updating user credentials");

        check_cardinality(&inputs)?;

        let current = self
            .store
            .get(id)
            .await
            .map_err(|e| user_store_error(id, e))?;

        self.check_action(ctx, actions::UPDATE, &current.ou_id, Some(id))
            .await?;

        let supplied =
            credentials::normalize_map(&inputs, self.hasher.as_ref()).map_err(credential_error)?;

        let (_, mut bundle) = self
            .store
            .get_with_credentials(id)
            .await
            .map_err(|e| user_store_error(id, e))?;
        bundle.overlay(supplied);

        self.store
            .update_credentials(id, &bundle)
            .await
            .map_err(|e| user_store_error(id, e))?;

        tracing::info!("Successfully updated credentials");
        Ok(())
    }

    /// Verify supplied plaintext credentials against the stored bundle.
    /// Failures are deliberately indistinguishable.
    #[instrument(skip(self, supplied), fields(user_id = %id))]
    pub async fn verify(
        &self,
        id: &str,
        supplied: &BTreeMap<String, String>,
    ) -> Result<(), DomainError> {
        let (_, bundle) = match self.store.get_with_credentials(id).await {
            Ok(found) => found,
            Err(StoreError::NotFound) => return Err(DomainError::AuthenticationFailed),
            Err(e) => return Err(user_store_error(id, e)),
        };

        for (credential_type, value) in supplied {
            let Some(records) = bundle.records(credential_type) else {
                return Err(DomainError::AuthenticationFailed);
            };
            if !self.any_record_matches(value, records)? {
                return Err(DomainError::AuthenticationFailed);
            }
        }
        Ok(())
    }

    /// Identify a user by attribute filters and verify their credentials.
    #[instrument(skip(self, identifiers, supplied))]
    pub async fn authenticate(
        &self,
        identifiers: &AttributeFilters,
        supplied: &BTreeMap<String, String>,
    ) -> Result<User, DomainError> {
        let id = match self.store.identify(identifiers).await {
            Ok(id) => id,
            Err(StoreError::NotFound) => {
                return Err(DomainError::user_not_found("<unidentified>"));
            }
            Err(StoreError::Ambiguous) => return Err(DomainError::AuthenticationFailed),
            Err(e) => return Err(e.into()),
        };

        self.verify(&id, supplied).await?;

        self.store
            .get(&id)
            .await
            .map_err(|e| user_store_error(&id, e))
    }

    /// Groups the user is a member of (mutable store only).
    #[instrument(skip(self, ctx), fields(user_id = %id))]
    pub async fn get_user_groups(
        &self,
        ctx: &SecurityContext,
        id: &str,
        limit: Option<i64>,
        offset: u64,
    ) -> Result<Page<GroupSummary>, DomainError> {
        let limit = self.effective_limit(limit)?;

        let user = self
            .store
            .get(id)
            .await
            .map_err(|e| user_store_error(id, e))?;

        self.check_action(ctx, actions::GET, &user.ou_id, Some(id))
            .await?;

        let total = self
            .store
            .group_count(id)
            .await
            .map_err(|e| user_store_error(id, e))?;
        let items = self
            .store
            .user_groups(id, limit, offset)
            .await
            .map_err(|e| user_store_error(id, e))?;

        let base = format!("{USERS_PATH}/{id}/groups");
        Ok(Page::new(items, total, &base, limit, offset))
    }

    /// Whether the resource is descriptor-backed; used by the exporter.
    pub async fn is_declarative(&self, id: &str) -> Result<bool, DomainError> {
        self.store
            .is_declarative(id)
            .await
            .map_err(DomainError::from)
    }

    /// Names of the credential types stored for a user; the exporter uses
    /// them to emit placeholders without touching secret material.
    pub async fn credential_types(&self, id: &str) -> Result<Vec<String>, DomainError> {
        let (_, bundle) = self
            .store
            .get_with_credentials(id)
            .await
            .map_err(|e| user_store_error(id, e))?;
        Ok(bundle.0.keys().cloned().collect())
    }

    fn effective_limit(&self, limit: Option<i64>) -> Result<u64, DomainError> {
        match limit {
            None => Ok(self.config.default_page_size),
            Some(l) if l < 0 => Err(DomainError::InvalidLimit { limit: l }),
            #[allow(clippy::cast_sign_loss)]
            Some(l) => Ok(l as u64),
        }
    }

    async fn resolve_schema(
        &self,
        user_type: &str,
    ) -> Result<Arc<dyn UserSchema>, DomainError> {
        if user_type.trim().is_empty() {
            return Err(DomainError::invalid_input("user type must not be empty"));
        }
        match self.schemas.resolve(user_type).await {
            Ok(Some(schema)) => Ok(schema),
            Ok(None) => Err(DomainError::SchemaNotFound {
                user_type: user_type.to_owned(),
            }),
            Err(e) => {
                tracing::error!(error = %e, "Schema registry failed");
                Err(DomainError::Internal)
            }
        }
    }

    /// Schema validation, attribute uniqueness and organization-unit
    /// placement, in that order.
    async fn validate_against_schema(
        &self,
        user: &User,
        schema: &dyn UserSchema,
        own_id: Option<&str>,
    ) -> Result<(), DomainError> {
        schema
            .validate(&user.attributes)
            .map_err(|v| DomainError::schema_validation(v.message))?;

        for path in schema.unique_attributes() {
            let Some(value) = crate::domain::attributes::lookup_path(&user.attributes, path)
            else {
                continue;
            };
            let mut filters = AttributeFilters::new();
            filters.insert(path.clone(), value.clone());
            match self.store.identify(&filters).await {
                Ok(existing) if Some(existing.as_str()) != own_id => {
                    return Err(DomainError::attribute_conflict(path.clone()));
                }
                Ok(_) => {}
                Err(StoreError::NotFound) => {}
                Err(StoreError::Ambiguous) => {
                    return Err(DomainError::attribute_conflict(path.clone()));
                }
                Err(e) => return Err(e.into()),
            }
        }

        self.validate_org_unit(&user.ou_id, schema.bound_ou()).await
    }

    async fn validate_org_unit(&self, ou_id: &str, bound_ou: &str) -> Result<(), DomainError> {
        if ou_id.trim().is_empty() {
            return Err(DomainError::invalid_org_unit(ou_id));
        }
        let known = self.org_units.exists(ou_id).await.map_err(|e| {
            tracing::error!(error = %e, "Organization-unit directory failed");
            DomainError::Internal
        })?;
        if !known {
            return Err(DomainError::invalid_org_unit(ou_id));
        }
        let placed = self
            .org_units
            .is_self_or_descendant(ou_id, bound_ou)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Organization-unit directory failed");
                DomainError::Internal
            })?;
        if !placed {
            return Err(DomainError::invalid_org_unit(ou_id));
        }
        Ok(())
    }

    fn any_record_matches(
        &self,
        value: &str,
        records: &[CredentialRecord],
    ) -> Result<bool, DomainError> {
        for record in records {
            let matched = match record.storage_type {
                StorageType::Hash => {
                    self.hasher.verify(value, record).map_err(|e| {
                        tracing::error!(error = %e, "Hash capability failed");
                        DomainError::Internal
                    })?
                }
                StorageType::System => record.value == value,
            };
            if matched {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Reject oversized record lists for single-cardinality types before any
/// storage access.
fn check_cardinality(inputs: &BTreeMap<String, CredentialInput>) -> Result<(), DomainError> {
    for (credential_type, input) in inputs {
        if let CredentialInput::Records(records) = input
            && cardinality_of(credential_type) == Cardinality::Single
            && records.len() > 1
        {
            return Err(DomainError::invalid_credential(format!(
                "credential type '{credential_type}' accepts at most one record, got {}",
                records.len()
            )));
        }
    }
    Ok(())
}

fn credential_error(e: CredentialError) -> DomainError {
    match e {
        CredentialError::Cardinality { .. } => DomainError::invalid_credential(e.to_string()),
        CredentialError::Hash(e) => {
            tracing::error!(error = %e, "Hash capability failed");
            DomainError::Internal
        }
    }
}
