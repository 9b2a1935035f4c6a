//! ORM-based realization of the role store contract.
//!
//! Writes follow the fixed statement order: primary row, then
//! per-permission rows, then per-assignment rows, all inside one
//! transaction.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use identity_sdk::{Assignment, AssigneeType, PermissionGrant, Role};
use sea_orm::{
    ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionError, TransactionTrait,
};

use crate::domain::stores::{RoleStore, StoreError};
use crate::infra::storage::entity::{role, role_assignment, role_permission};

#[derive(Clone)]
pub struct DbRoleStore {
    db: DatabaseConnection,
}

impl DbRoleStore {
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Batch-load permissions and assignments for a page of roles and
    /// stitch them onto the primary rows.
    async fn assemble(&self, models: Vec<role::Model>) -> Result<Vec<Role>, StoreError> {
        if models.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<&str> = models.iter().map(|m| m.id.as_str()).collect();

        let permission_rows = role_permission::Entity::find()
            .filter(role_permission::Column::RoleId.is_in(ids.clone()))
            .order_by_asc(role_permission::Column::ResourceServerId)
            .order_by_asc(role_permission::Column::Permission)
            .all(&self.db)
            .await?;
        let assignment_rows = role_assignment::Entity::find()
            .filter(role_assignment::Column::RoleId.is_in(ids))
            .order_by_asc(role_assignment::Column::AssigneeType)
            .order_by_asc(role_assignment::Column::AssigneeId)
            .all(&self.db)
            .await?;

        let mut permissions: HashMap<String, Vec<PermissionGrant>> = HashMap::new();
        for row in permission_rows {
            let grants = permissions.entry(row.role_id).or_default();
            match grants
                .iter_mut()
                .find(|g| g.resource_server_id == row.resource_server_id)
            {
                Some(grant) => grant.permissions.push(row.permission),
                None => grants.push(PermissionGrant {
                    resource_server_id: row.resource_server_id,
                    permissions: vec![row.permission],
                }),
            }
        }

        let mut assignments: HashMap<String, Vec<Assignment>> = HashMap::new();
        for row in assignment_rows {
            assignments
                .entry(row.role_id.clone())
                .or_default()
                .push(parse_assignment(&row)?);
        }

        Ok(models
            .into_iter()
            .map(|m| Role {
                permissions: permissions.remove(&m.id).unwrap_or_default(),
                assignments: assignments.remove(&m.id).unwrap_or_default(),
                id: m.id,
                name: m.name,
                description: m.description,
                ou_id: m.ou_id,
            })
            .collect())
    }
}

fn parse_assignment(row: &role_assignment::Model) -> Result<Assignment, StoreError> {
    let assignee_type = match row.assignee_type.as_str() {
        "user" => AssigneeType::User,
        "group" => AssigneeType::Group,
        other => {
            return Err(StoreError::storage(
                "unexpected assignee type row",
                format!("assignee type '{other}'"),
            ));
        }
    };
    Ok(Assignment {
        id: row.assignee_id.clone(),
        assignee_type,
    })
}

fn txn_err(e: TransactionError<StoreError>) -> StoreError {
    match e {
        TransactionError::Connection(db) => db.into(),
        TransactionError::Transaction(e) => e,
    }
}

fn permission_rows(target: &Role) -> Vec<role_permission::ActiveModel> {
    target
        .permissions
        .iter()
        .flat_map(|grant| {
            grant.permissions.iter().map(|permission| {
                role_permission::ActiveModel {
                    role_id: Set(target.id.clone()),
                    resource_server_id: Set(grant.resource_server_id.clone()),
                    permission: Set(permission.clone()),
                }
            })
        })
        .collect()
}

fn assignment_rows(id: &str, assignments: &[Assignment]) -> Vec<role_assignment::ActiveModel> {
    assignments
        .iter()
        .map(|assignment| role_assignment::ActiveModel {
            role_id: Set(id.to_owned()),
            assignee_type: Set(assignment.assignee_type.as_str().to_owned()),
            assignee_id: Set(assignment.id.clone()),
        })
        .collect()
}

async fn insert_children(
    txn: &DatabaseTransaction,
    target: &Role,
) -> Result<(), StoreError> {
    let permissions = permission_rows(target);
    if !permissions.is_empty() {
        role_permission::Entity::insert_many(permissions).exec(txn).await?;
    }
    let assignments = assignment_rows(&target.id, &target.assignments);
    if !assignments.is_empty() {
        role_assignment::Entity::insert_many(assignments).exec(txn).await?;
    }
    Ok(())
}

async fn delete_children(txn: &DatabaseTransaction, id: &str) -> Result<(), StoreError> {
    role_permission::Entity::delete_many()
        .filter(role_permission::Column::RoleId.eq(id))
        .exec(txn)
        .await?;
    role_assignment::Entity::delete_many()
        .filter(role_assignment::Column::RoleId.eq(id))
        .exec(txn)
        .await?;
    Ok(())
}

#[async_trait]
impl RoleStore for DbRoleStore {
    async fn get(&self, id: &str) -> Result<Role, StoreError> {
        let model = role::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(StoreError::NotFound)?;
        let mut roles = self.assemble(vec![model]).await?;
        Ok(roles.remove(0))
    }

    async fn list(&self, limit: u64, offset: u64) -> Result<Vec<Role>, StoreError> {
        let models = role::Entity::find()
            .order_by_asc(role::Column::Id)
            .limit(limit)
            .offset(offset)
            .all(&self.db)
            .await?;
        self.assemble(models).await
    }

    async fn count(&self) -> Result<u64, StoreError> {
        Ok(role::Entity::find().count(&self.db).await?)
    }

    async fn list_by_ou(
        &self,
        ou_ids: &[String],
        limit: u64,
        offset: u64,
    ) -> Result<Vec<Role>, StoreError> {
        let models = role::Entity::find()
            .filter(role::Column::OuId.is_in(ou_ids.iter().map(String::as_str)))
            .order_by_asc(role::Column::Id)
            .limit(limit)
            .offset(offset)
            .all(&self.db)
            .await?;
        self.assemble(models).await
    }

    async fn count_by_ou(&self, ou_ids: &[String]) -> Result<u64, StoreError> {
        let count = role::Entity::find()
            .filter(role::Column::OuId.is_in(ou_ids.iter().map(String::as_str)))
            .count(&self.db)
            .await?;
        Ok(count)
    }

    async fn exists(&self, id: &str) -> Result<bool, StoreError> {
        let count = role::Entity::find_by_id(id).count(&self.db).await?;
        Ok(count > 0)
    }

    async fn name_exists_in_ou(&self, name: &str, ou_id: &str) -> Result<bool, StoreError> {
        let count = role::Entity::find()
            .filter(role::Column::Name.eq(name))
            .filter(role::Column::OuId.eq(ou_id))
            .count(&self.db)
            .await?;
        Ok(count > 0)
    }

    async fn create(&self, target: &Role) -> Result<(), StoreError> {
        let target = target.clone();
        self.db
            .transaction::<_, (), StoreError>(move |txn| {
                Box::pin(async move {
                    let taken = role::Entity::find_by_id(&target.id).count(txn).await?;
                    if taken > 0 {
                        return Err(StoreError::Duplicate {
                            id: target.id.clone(),
                        });
                    }

                    let row = role::ActiveModel {
                        id: Set(target.id.clone()),
                        ou_id: Set(target.ou_id.clone()),
                        name: Set(target.name.clone()),
                        description: Set(target.description.clone()),
                    };
                    role::Entity::insert(row).exec(txn).await?;
                    insert_children(txn, &target).await
                })
            })
            .await
            .map_err(txn_err)
    }

    async fn update(&self, target: &Role) -> Result<(), StoreError> {
        let target = target.clone();
        self.db
            .transaction::<_, (), StoreError>(move |txn| {
                Box::pin(async move {
                    let row = role::ActiveModel {
                        ou_id: Set(target.ou_id.clone()),
                        name: Set(target.name.clone()),
                        description: Set(target.description.clone()),
                        ..Default::default()
                    };
                    let result = role::Entity::update_many()
                        .set(row)
                        .filter(role::Column::Id.eq(&target.id))
                        .exec(txn)
                        .await?;
                    if result.rows_affected == 0 {
                        return Err(StoreError::NotFound);
                    }

                    delete_children(txn, &target.id).await?;
                    insert_children(txn, &target).await
                })
            })
            .await
            .map_err(txn_err)
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let id = id.to_owned();
        self.db
            .transaction::<_, (), StoreError>(move |txn| {
                Box::pin(async move {
                    delete_children(txn, &id).await?;
                    let result = role::Entity::delete_many()
                        .filter(role::Column::Id.eq(&id))
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

    async fn add_assignments(
        &self,
        id: &str,
        assignments: &[Assignment],
    ) -> Result<(), StoreError> {
        let id = id.to_owned();
        let assignments = assignments.to_vec();
        self.db
            .transaction::<_, (), StoreError>(move |txn| {
                Box::pin(async move {
                    let known = role::Entity::find_by_id(&id).count(txn).await?;
                    if known == 0 {
                        return Err(StoreError::NotFound);
                    }

                    let existing: HashSet<(String, String)> = role_assignment::Entity::find()
                        .filter(role_assignment::Column::RoleId.eq(&id))
                        .all(txn)
                        .await?
                        .into_iter()
                        .map(|row| (row.assignee_type, row.assignee_id))
                        .collect();

                    let fresh: Vec<Assignment> = assignments
                        .into_iter()
                        .filter(|a| {
                            !existing.contains(&(
                                a.assignee_type.as_str().to_owned(),
                                a.id.clone(),
                            ))
                        })
                        .collect();

                    let rows = assignment_rows(&id, &fresh);
                    if !rows.is_empty() {
                        role_assignment::Entity::insert_many(rows).exec(txn).await?;
                    }
                    Ok(())
                })
            })
            .await
            .map_err(txn_err)
    }

    async fn remove_assignments(
        &self,
        id: &str,
        assignments: &[Assignment],
    ) -> Result<(), StoreError> {
        let id = id.to_owned();
        let assignments = assignments.to_vec();
        self.db
            .transaction::<_, (), StoreError>(move |txn| {
                Box::pin(async move {
                    let known = role::Entity::find_by_id(&id).count(txn).await?;
                    if known == 0 {
                        return Err(StoreError::NotFound);
                    }

                    for assignment in &assignments {
                        role_assignment::Entity::delete_many()
                            .filter(role_assignment::Column::RoleId.eq(&id))
                            .filter(
                                role_assignment::Column::AssigneeType
                                    .eq(assignment.assignee_type.as_str()),
                            )
                            .filter(role_assignment::Column::AssigneeId.eq(&assignment.id))
                            .exec(txn)
                            .await?;
                    }
                    Ok(())
                })
            })
            .await
            .map_err(txn_err)
    }

    async fn is_declarative(&self, _id: &str) -> Result<bool, StoreError> {
        Ok(false)
    }
}
