//! ORM-based realization of the user store contract.
//!
//! Every multi-statement write runs inside a single transaction; the
//! indexed-attribute rows are resynced (delete-then-insert) on each
//! write so `identify` and filtered lists can use the index.

use async_trait::async_trait;
use identity_sdk::{CredentialBundle, GroupSummary, User};
use sea_orm::sea_query::Condition;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionError, TransactionTrait,
};

use crate::domain::attributes::{lookup_path, scalar_to_index_string};
use crate::domain::stores::{AttributeFilters, StoreError, UserStore};
use crate::infra::storage::attr_filter::FilterCompiler;
use crate::infra::storage::entity::{group_membership, user, user_indexed_attribute as uia};

#[derive(Clone)]
pub struct DbUserStore {
    db: DatabaseConnection,
    deployment_id: String,
    indexed_attributes: Vec<String>,
}

impl DbUserStore {
    #[must_use]
    pub fn new(
        db: DatabaseConnection,
        deployment_id: String,
        indexed_attributes: Vec<String>,
    ) -> Self {
        Self {
            db,
            deployment_id,
            indexed_attributes,
        }
    }

    fn deployment_cond(&self) -> Condition {
        Condition::all().add(user::Column::DeploymentId.eq(&self.deployment_id))
    }

    fn filter_cond(&self, filters: &AttributeFilters) -> Condition {
        FilterCompiler::new(
            self.db.get_database_backend(),
            &self.deployment_id,
            &self.indexed_attributes,
        )
        .condition(filters)
    }

    fn ou_cond(ou_ids: &[String]) -> Condition {
        Condition::all().add(user::Column::OuId.is_in(ou_ids.iter().map(String::as_str)))
    }

    fn indexed_rows(&self, target: &User) -> Vec<uia::ActiveModel> {
        self.indexed_attributes
            .iter()
            .filter_map(|path| {
                let value = lookup_path(&target.attributes, path)?;
                let canonical = scalar_to_index_string(value)?;
                Some(uia::ActiveModel {
                    user_id: Set(target.id.clone()),
                    attribute_name: Set(path.clone()),
                    attribute_value: Set(canonical),
                    deployment_id: Set(self.deployment_id.clone()),
                })
            })
            .collect()
    }

    async fn resync_indexed_rows(
        &self,
        txn: &DatabaseTransaction,
        target: &User,
    ) -> Result<(), StoreError> {
        uia::Entity::delete_many()
            .filter(uia::Column::UserId.eq(&target.id))
            .filter(uia::Column::DeploymentId.eq(&self.deployment_id))
            .exec(txn)
            .await?;
        let rows = self.indexed_rows(target);
        if !rows.is_empty() {
            uia::Entity::insert_many(rows).exec(txn).await?;
        }
        Ok(())
    }

    async fn fetch_row(&self, id: &str) -> Result<user::Model, StoreError> {
        user::Entity::find_by_id(id)
            .filter(self.deployment_cond())
            .one(&self.db)
            .await?
            .ok_or(StoreError::NotFound)
    }
}

fn txn_err(e: TransactionError<StoreError>) -> StoreError {
    match e {
        TransactionError::Connection(db) => db.into(),
        TransactionError::Transaction(e) => e,
    }
}

fn to_user(model: user::Model) -> User {
    User {
        id: model.id,
        user_type: model.user_type,
        ou_id: model.ou_id,
        attributes: model.attributes,
    }
}

fn parse_bundle(value: serde_json::Value) -> Result<CredentialBundle, StoreError> {
    serde_json::from_value(value)
        .map_err(|e| StoreError::storage("malformed credential bundle row", e))
}

fn bundle_to_json(bundle: &CredentialBundle) -> Result<serde_json::Value, StoreError> {
    serde_json::to_value(bundle)
        .map_err(|e| StoreError::storage("credential bundle serialization failed", e))
}

#[async_trait]
impl UserStore for DbUserStore {
    async fn get(&self, id: &str) -> Result<User, StoreError> {
        self.fetch_row(id).await.map(to_user)
    }

    async fn list(
        &self,
        filters: &AttributeFilters,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<User>, StoreError> {
        let models = user::Entity::find()
            .filter(self.deployment_cond())
            .filter(self.filter_cond(filters))
            .order_by_asc(user::Column::Id)
            .limit(limit)
            .offset(offset)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(to_user).collect())
    }

    async fn count(&self, filters: &AttributeFilters) -> Result<u64, StoreError> {
        let count = user::Entity::find()
            .filter(self.deployment_cond())
            .filter(self.filter_cond(filters))
            .count(&self.db)
            .await?;
        Ok(count)
    }

    async fn list_by_ou(
        &self,
        ou_ids: &[String],
        filters: &AttributeFilters,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<User>, StoreError> {
        let models = user::Entity::find()
            .filter(self.deployment_cond())
            .filter(Self::ou_cond(ou_ids))
            .filter(self.filter_cond(filters))
            .order_by_asc(user::Column::Id)
            .limit(limit)
            .offset(offset)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(to_user).collect())
    }

    async fn count_by_ou(
        &self,
        ou_ids: &[String],
        filters: &AttributeFilters,
    ) -> Result<u64, StoreError> {
        let count = user::Entity::find()
            .filter(self.deployment_cond())
            .filter(Self::ou_cond(ou_ids))
            .filter(self.filter_cond(filters))
            .count(&self.db)
            .await?;
        Ok(count)
    }

    async fn exists(&self, id: &str) -> Result<bool, StoreError> {
        let count = user::Entity::find_by_id(id)
            .filter(self.deployment_cond())
            .count(&self.db)
            .await?;
        Ok(count > 0)
    }

    async fn create(&self, target: &User, credentials: &CredentialBundle) -> Result<(), StoreError> {
        let store = self.clone();
        let target = target.clone();
        let credentials_json = bundle_to_json(credentials)?;
        self.db
            .transaction::<_, (), StoreError>(move |txn| {
                Box::pin(async move {
                    let taken = user::Entity::find_by_id(&target.id)
                        .filter(user::Column::DeploymentId.eq(&store.deployment_id))
                        .count(txn)
                        .await?;
                    if taken > 0 {
                        return Err(StoreError::Duplicate {
                            id: target.id.clone(),
                        });
                    }

                    let row = user::ActiveModel {
                        id: Set(target.id.clone()),
                        ou_id: Set(target.ou_id.clone()),
                        user_type: Set(target.user_type.clone()),
                        attributes: Set(target.attributes.clone()),
                        credentials: Set(credentials_json),
                        deployment_id: Set(store.deployment_id.clone()),
                    };
                    user::Entity::insert(row).exec(txn).await?;

                    let rows = store.indexed_rows(&target);
                    if !rows.is_empty() {
                        uia::Entity::insert_many(rows).exec(txn).await?;
                    }
                    Ok(())
                })
            })
            .await
            .map_err(txn_err)
    }

    async fn update(
        &self,
        target: &User,
        credentials: Option<&CredentialBundle>,
    ) -> Result<(), StoreError> {
        let store = self.clone();
        let target = target.clone();
        let credentials_json = credentials.map(bundle_to_json).transpose()?;
        self.db
            .transaction::<_, (), StoreError>(move |txn| {
                Box::pin(async move {
                    let mut row = user::ActiveModel {
                        ou_id: Set(target.ou_id.clone()),
                        user_type: Set(target.user_type.clone()),
                        attributes: Set(target.attributes.clone()),
                        ..Default::default()
                    };
                    if let Some(json) = credentials_json {
                        row.credentials = Set(json);
                    }

                    let result = user::Entity::update_many()
                        .set(row)
                        .filter(user::Column::Id.eq(&target.id))
                        .filter(user::Column::DeploymentId.eq(&store.deployment_id))
                        .exec(txn)
                        .await?;
                    if result.rows_affected == 0 {
                        return Err(StoreError::NotFound);
                    }

                    store.resync_indexed_rows(txn, &target).await
                })
            })
            .await
            .map_err(txn_err)
    }

    async fn update_credentials(
        &self,
        id: &str,
        credentials: &CredentialBundle,
    ) -> Result<(), StoreError> {
        let store = self.clone();
        let id = id.to_owned();
        let credentials_json = bundle_to_json(credentials)?;
        self.db
            .transaction::<_, (), StoreError>(move |txn| {
                Box::pin(async move {
                    let row = user::ActiveModel {
                        credentials: Set(credentials_json),
                        ..Default::default()
                    };
                    let result = user::Entity::update_many()
                        .set(row)
                        .filter(user::Column::Id.eq(&id))
                        .filter(user::Column::DeploymentId.eq(&store.deployment_id))
                        .exec(txn)
                        .await?;
                    if result.rows_affected == 0 {
                        return Err(StoreError::NotFound);
                    }
                    Ok(())
                })
            })
            .await
            .map_err(txn_err)
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let store = self.clone();
        let id = id.to_owned();
        self.db
            .transaction::<_, (), StoreError>(move |txn| {
                Box::pin(async move {
                    uia::Entity::delete_many()
                        .filter(uia::Column::UserId.eq(&id))
                        .filter(uia::Column::DeploymentId.eq(&store.deployment_id))
                        .exec(txn)
                        .await?;
                    group_membership::Entity::delete_many()
                        .filter(group_membership::Column::UserId.eq(&id))
                        .filter(group_membership::Column::DeploymentId.eq(&store.deployment_id))
                        .exec(txn)
                        .await?;
                    let result = user::Entity::delete_many()
                        .filter(user::Column::Id.eq(&id))
                        .filter(user::Column::DeploymentId.eq(&store.deployment_id))
                        .exec(txn)
                        .await?;
                    if result.rows_affected == 0 {
                        return Err(StoreError::NotFound);
                    }
                    Ok(())
                })
            })
            .await
            .map_err(txn_err)
    }

    async fn identify(&self, filters: &AttributeFilters) -> Result<String, StoreError> {
        let mut ids: Vec<String> = user::Entity::find()
            .filter(self.deployment_cond())
            .filter(self.filter_cond(filters))
            .order_by_asc(user::Column::Id)
            .limit(2)
            .all(&self.db)
            .await?
            .into_iter()
            .map(|m| m.id)
            .collect();
        match ids.len() {
            0 => Err(StoreError::NotFound),
            1 => Ok(ids.remove(0)),
            _ => Err(StoreError::Ambiguous),
        }
    }

    async fn get_with_credentials(
        &self,
        id: &str,
    ) -> Result<(User, CredentialBundle), StoreError> {
        let model = self.fetch_row(id).await?;
        let bundle = parse_bundle(model.credentials.clone())?;
        Ok((to_user(model), bundle))
    }

    async fn validate_ids(&self, ids: &[String]) -> Result<Vec<String>, StoreError> {
        let known: std::collections::HashSet<String> = user::Entity::find()
            .filter(self.deployment_cond())
            .filter(user::Column::Id.is_in(ids.iter().map(String::as_str)))
            .all(&self.db)
            .await?
            .into_iter()
            .map(|m| m.id)
            .collect();
        Ok(ids
            .iter()
            .filter(|id| !known.contains(*id))
            .cloned()
            .collect())
    }

    async fn is_declarative(&self, _id: &str) -> Result<bool, StoreError> {
        // Database entries are never declarative.
        Ok(false)
    }

    async fn group_count(&self, id: &str) -> Result<u64, StoreError> {
        let count = group_membership::Entity::find()
            .filter(group_membership::Column::UserId.eq(id))
            .filter(group_membership::Column::DeploymentId.eq(&self.deployment_id))
            .count(&self.db)
            .await?;
        Ok(count)
    }

    async fn user_groups(
        &self,
        id: &str,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<GroupSummary>, StoreError> {
        let rows = group_membership::Entity::find()
            .filter(group_membership::Column::UserId.eq(id))
            .filter(group_membership::Column::DeploymentId.eq(&self.deployment_id))
            .order_by_asc(group_membership::Column::GroupId)
            .limit(limit)
            .offset(offset)
            .all(&self.db)
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| GroupSummary {
                id: row.group_id,
                name: row.group_name,
            })
            .collect())
    }
}
