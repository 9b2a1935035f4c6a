//! REST request/response shapes.

use std::collections::BTreeMap;

use identity_sdk::{
    Assignment, NewRole, NewUser, PermissionGrant, Role, RoleUpdate, User, UserUpdate,
};
use serde::{Deserialize, Serialize};

use crate::domain::credentials::CredentialInput;

#[derive(Debug, Serialize)]
pub struct UserDto {
    pub id: String,
    #[serde(rename = "type")]
    pub user_type: String,
    pub ou_id: String,
    pub attributes: serde_json::Value,
}

impl From<User> for UserDto {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            user_type: user.user_type,
            ou_id: user.ou_id,
            attributes: user.attributes,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateUserReq {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub user_type: String,
    pub ou_id: String,
    pub attributes: serde_json::Value,
}

impl From<CreateUserReq> for NewUser {
    fn from(req: CreateUserReq) -> Self {
        Self {
            id: req.id,
            user_type: req.user_type,
            ou_id: req.ou_id,
            attributes: req.attributes,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateUserReq {
    #[serde(rename = "type")]
    pub user_type: String,
    pub ou_id: String,
    pub attributes: serde_json::Value,
}

impl From<UpdateUserReq> for UserUpdate {
    fn from(req: UpdateUserReq) -> Self {
        Self {
            user_type: req.user_type,
            ou_id: req.ou_id,
            attributes: req.attributes,
        }
    }
}

/// `{credential type: scalar | [records]}`, same shapes the descriptor
/// loader accepts.
pub type UpdateCredentialsReq = BTreeMap<String, CredentialInput>;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthenticateReq {
    /// Attribute filters identifying exactly one user.
    pub identifiers: BTreeMap<String, serde_json::Value>,
    /// Plaintext credentials per credential type.
    pub credentials: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
pub struct RoleDto {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub ou_id: String,
    pub permissions: Vec<PermissionGrant>,
    pub assignments: Vec<Assignment>,
}

impl From<Role> for RoleDto {
    fn from(role: Role) -> Self {
        Self {
            id: role.id,
            name: role.name,
            description: role.description,
            ou_id: role.ou_id,
            permissions: role.permissions,
            assignments: role.assignments,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateRoleReq {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub ou_id: String,
    #[serde(default)]
    pub permissions: Vec<PermissionGrant>,
    #[serde(default)]
    pub assignments: Vec<Assignment>,
}

impl From<CreateRoleReq> for NewRole {
    fn from(req: CreateRoleReq) -> Self {
        Self {
            id: req.id,
            name: req.name,
            description: req.description,
            ou_id: req.ou_id,
            permissions: req.permissions,
            assignments: req.assignments,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateRoleReq {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub ou_id: String,
    #[serde(default)]
    pub permissions: Vec<PermissionGrant>,
    #[serde(default)]
    pub assignments: Vec<Assignment>,
}

impl From<UpdateRoleReq> for RoleUpdate {
    fn from(req: UpdateRoleReq) -> Self {
        Self {
            name: req.name,
            description: req.description,
            ou_id: req.ou_id,
            permissions: req.permissions,
            assignments: req.assignments,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssignmentsReq {
    pub assignments: Vec<Assignment>,
}
