//! Database schema for the mutable store.

use sea_orm_migration::prelude as mig;
use sea_orm_migration::prelude::{ColumnDef, Index, Table};

pub struct Migrator;

impl mig::MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn mig::MigrationTrait>> {
        vec![Box::new(CreateIdentityTables)]
    }
}

struct CreateIdentityTables;

impl mig::MigrationName for CreateIdentityTables {
    fn name(&self) -> &'static str {
        "m0001_create_identity_tables"
    }
}

fn string_col(name: &str) -> ColumnDef {
    let mut col = ColumnDef::new(mig::Alias::new(name));
    col.string().not_null();
    col
}

#[async_trait::async_trait]
impl mig::MigrationTrait for CreateIdentityTables {
    async fn up(&self, manager: &mig::SchemaManager) -> Result<(), mig::DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(mig::Alias::new("user"))
                    .if_not_exists()
                    .col(
                        ColumnDef::new(mig::Alias::new("id"))
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(&mut string_col("ou_id"))
                    .col(&mut string_col("type"))
                    .col(ColumnDef::new(mig::Alias::new("attributes")).json().not_null())
                    .col(
                        ColumnDef::new(mig::Alias::new("credentials"))
                            .json()
                            .not_null(),
                    )
                    .col(&mut string_col("deployment_id"))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(mig::Alias::new("user_indexed_attribute"))
                    .if_not_exists()
                    .col(&mut string_col("user_id"))
                    .col(&mut string_col("attribute_name"))
                    .col(&mut string_col("attribute_value"))
                    .col(&mut string_col("deployment_id"))
                    .primary_key(
                        Index::create()
                            .col(mig::Alias::new("user_id"))
                            .col(mig::Alias::new("attribute_name")),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_user_indexed_attribute_lookup")
                    .table(mig::Alias::new("user_indexed_attribute"))
                    .col(mig::Alias::new("attribute_name"))
                    .col(mig::Alias::new("attribute_value"))
                    .col(mig::Alias::new("deployment_id"))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(mig::Alias::new("group_membership"))
                    .if_not_exists()
                    .col(&mut string_col("group_id"))
                    .col(&mut string_col("user_id"))
                    .col(&mut string_col("group_name"))
                    .col(&mut string_col("deployment_id"))
                    .primary_key(
                        Index::create()
                            .col(mig::Alias::new("group_id"))
                            .col(mig::Alias::new("user_id")),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(mig::Alias::new("role"))
                    .if_not_exists()
                    .col(
                        ColumnDef::new(mig::Alias::new("id"))
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(&mut string_col("ou_id"))
                    .col(&mut string_col("name"))
                    .col(ColumnDef::new(mig::Alias::new("description")).string())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_role_ou_name")
                    .table(mig::Alias::new("role"))
                    .col(mig::Alias::new("ou_id"))
                    .col(mig::Alias::new("name"))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(mig::Alias::new("role_permission"))
                    .if_not_exists()
                    .col(&mut string_col("role_id"))
                    .col(&mut string_col("resource_server_id"))
                    .col(&mut string_col("permission"))
                    .primary_key(
                        Index::create()
                            .col(mig::Alias::new("role_id"))
                            .col(mig::Alias::new("resource_server_id"))
                            .col(mig::Alias::new("permission")),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(mig::Alias::new("role_assignment"))
                    .if_not_exists()
                    .col(&mut string_col("role_id"))
                    .col(&mut string_col("assignee_type"))
                    .col(&mut string_col("assignee_id"))
                    .primary_key(
                        Index::create()
                            .col(mig::Alias::new("role_id"))
                            .col(mig::Alias::new("assignee_type"))
                            .col(mig::Alias::new("assignee_id")),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &mig::SchemaManager) -> Result<(), mig::DbErr> {
        for table in [
            "role_assignment",
            "role_permission",
            "role",
            "group_membership",
            "user_indexed_attribute",
            "user",
        ] {
            manager
                .drop_table(Table::drop().table(mig::Alias::new(table)).to_owned())
                .await?;
        }
        Ok(())
    }
}
