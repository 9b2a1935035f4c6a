//! Attribute filter → SQL condition compiler.
//!
//! Indexed paths resolve through the `user_indexed_attribute` table via an
//! EXISTS probe; everything else compiles to a JSON-path predicate on the
//! attribute document. The dialect switch lives here and nowhere else, and
//! both dialects are fed from the same deterministic (sorted) key order.

use sea_orm::DatabaseBackend;
use sea_orm::sea_query::{Condition, Expr, Query, SimpleExpr};
use serde_json::Value;

use crate::domain::attributes::scalar_to_index_string;
use crate::domain::stores::AttributeFilters;
use crate::infra::storage::entity::{user, user_indexed_attribute as uia};

pub struct FilterCompiler<'a> {
    backend: DatabaseBackend,
    deployment_id: &'a str,
    indexed_attributes: &'a [String],
}

impl<'a> FilterCompiler<'a> {
    #[must_use]
    pub fn new(
        backend: DatabaseBackend,
        deployment_id: &'a str,
        indexed_attributes: &'a [String],
    ) -> Self {
        Self {
            backend,
            deployment_id,
            indexed_attributes,
        }
    }

    /// Compile the filter map into one conjunctive condition. The map is
    /// sorted by path, so placeholder ordering is stable across dialects.
    #[must_use]
    pub fn condition(&self, filters: &AttributeFilters) -> Condition {
        let mut condition = Condition::all();
        for (path, value) in filters {
            condition = condition.add(self.predicate(path, value));
        }
        condition
    }

    fn predicate(&self, path: &str, value: &Value) -> SimpleExpr {
        if self.indexed_attributes.iter().any(|p| p == path) {
            self.indexed_predicate(path, value)
        } else {
            self.json_predicate(path, value)
        }
    }

    /// EXISTS probe against the indexed-attribute rows. Values are stored
    /// in the canonical text form, so numeric widening falls out of the
    /// shared normalization.
    fn indexed_predicate(&self, path: &str, value: &Value) -> SimpleExpr {
        let canonical = scalar_to_index_string(value).unwrap_or_default();
        let probe = Query::select()
            .expr(Expr::val(1))
            .from(uia::Entity)
            .and_where(
                Expr::col((uia::Entity, uia::Column::UserId))
                    .equals((user::Entity, user::Column::Id)),
            )
            .and_where(Expr::col((uia::Entity, uia::Column::AttributeName)).eq(path))
            .and_where(Expr::col((uia::Entity, uia::Column::AttributeValue)).eq(canonical))
            .and_where(Expr::col((uia::Entity, uia::Column::DeploymentId)).eq(self.deployment_id))
            .to_owned();
        Expr::exists(probe)
    }

    fn json_predicate(&self, path: &str, value: &Value) -> SimpleExpr {
        match self.backend {
            DatabaseBackend::Postgres => postgres_json_predicate(path, value),
            _ => sqlite_json_predicate(path, value),
        }
    }
}

/// `attributes #>> '{a,b}'` with a numeric cast when the filter value is
/// numeric, so integer/float widenings compare equal.
fn postgres_json_predicate(path: &str, value: &Value) -> SimpleExpr {
    let braced = format!("{{{}}}", path.split('.').collect::<Vec<_>>().join(","));
    match value {
        Value::Number(n) => Expr::cust_with_values(
            r#"CAST("user"."attributes" #>> CAST(? AS text[]) AS numeric) = ?"#,
            [
                sea_orm::Value::from(braced),
                sea_orm::Value::from(n.as_f64().unwrap_or_default()),
            ],
        ),
        Value::Bool(b) => Expr::cust_with_values(
            r#""user"."attributes" #>> CAST(? AS text[]) = ?"#,
            [
                sea_orm::Value::from(braced),
                sea_orm::Value::from(b.to_string()),
            ],
        ),
        other => Expr::cust_with_values(
            r#""user"."attributes" #>> CAST(? AS text[]) = ?"#,
            [
                sea_orm::Value::from(braced),
                sea_orm::Value::from(scalar_text(other)),
            ],
        ),
    }
}

/// `json_extract(attributes, '$.a.b')`; JSON booleans surface as 0/1 in
/// SQLite, numbers compare through a REAL cast.
fn sqlite_json_predicate(path: &str, value: &Value) -> SimpleExpr {
    let json_path = format!("$.{path}");
    match value {
        Value::Number(n) => Expr::cust_with_values(
            r#"CAST(json_extract("user"."attributes", ?) AS REAL) = ?"#,
            [
                sea_orm::Value::from(json_path),
                sea_orm::Value::from(n.as_f64().unwrap_or_default()),
            ],
        ),
        Value::Bool(b) => Expr::cust_with_values(
            r#"json_extract("user"."attributes", ?) = ?"#,
            [
                sea_orm::Value::from(json_path),
                sea_orm::Value::from(i32::from(*b)),
            ],
        ),
        other => Expr::cust_with_values(
            r#"json_extract("user"."attributes", ?) = ?"#,
            [
                sea_orm::Value::from(json_path),
                sea_orm::Value::from(scalar_text(other)),
            ],
        ),
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
