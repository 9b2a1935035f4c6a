use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "user")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub ou_id: String,
    #[sea_orm(column_name = "type")]
    pub user_type: String,
    #[sea_orm(column_type = "Json")]
    pub attributes: Json,
    /// Whole credential bundle, rewritten on every credential update.
    #[sea_orm(column_type = "Json")]
    pub credentials: Json,
    pub deployment_id: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::user_indexed_attribute::Entity")]
    IndexedAttributes,
}

impl Related<super::user_indexed_attribute::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::IndexedAttributes.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
