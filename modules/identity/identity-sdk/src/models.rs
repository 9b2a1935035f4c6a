//! Resource models shared between the identity module and its consumers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A user resource.
///
/// The attribute document is schema-validated free-form JSON; credential
/// material never appears in it (credentials travel separately as a
/// [`CredentialBundle`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    /// Schema key resolved through the schema registry.
    #[serde(rename = "type")]
    pub user_type: String,
    /// Organization unit the user belongs to.
    pub ou_id: String,
    pub attributes: serde_json::Value,
}

/// Payload for creating a user. The id is generated when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewUser {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub user_type: String,
    pub ou_id: String,
    pub attributes: serde_json::Value,
}

/// Full-replacement update payload for a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserUpdate {
    #[serde(rename = "type")]
    pub user_type: String,
    pub ou_id: String,
    pub attributes: serde_json::Value,
}

/// A role resource: a named set of permission grants plus its assignees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub ou_id: String,
    #[serde(default)]
    pub permissions: Vec<PermissionGrant>,
    #[serde(default)]
    pub assignments: Vec<Assignment>,
}

/// Payload for creating a role. The id is generated when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRole {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub ou_id: String,
    #[serde(default)]
    pub permissions: Vec<PermissionGrant>,
    #[serde(default)]
    pub assignments: Vec<Assignment>,
}

/// Full-replacement update payload for a role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleUpdate {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub ou_id: String,
    #[serde(default)]
    pub permissions: Vec<PermissionGrant>,
    #[serde(default)]
    pub assignments: Vec<Assignment>,
}

/// Permissions granted on a single resource server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionGrant {
    pub resource_server_id: String,
    pub permissions: Vec<String>,
}

/// A role assignee. `(assignee_type, assignee_id)` pairs are unique within
/// a role.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Assignment {
    pub id: String,
    #[serde(rename = "type")]
    pub assignee_type: AssigneeType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssigneeType {
    User,
    Group,
}

impl AssigneeType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Group => "group",
        }
    }
}

/// A group a user is a member of, as returned by the membership queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSummary {
    pub id: String,
    pub name: String,
}

/// How a credential record is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    /// A salted digest produced by the hashing capability.
    Hash,
    /// An opaque system-managed token stored verbatim (e.g. passkey data).
    System,
}

/// One stored credential record.
///
/// Hash records carry the full algorithm parameters needed for later
/// verification; system records carry only the opaque value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub storage_type: StorageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iterations: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt: Option<String>,
    pub value: String,
}

impl CredentialRecord {
    /// A system-managed record holding `value` verbatim.
    pub fn system(value: impl Into<String>) -> Self {
        Self {
            storage_type: StorageType::System,
            algorithm: None,
            iterations: None,
            key_length: None,
            salt: None,
            value: value.into(),
        }
    }
}

/// Credential type name → ordered records of that type.
///
/// The map is ordered so that serialized bundles are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialBundle(pub BTreeMap<String, Vec<CredentialRecord>>);

impl CredentialBundle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn records(&self, credential_type: &str) -> Option<&[CredentialRecord]> {
        self.0.get(credential_type).map(Vec::as_slice)
    }

    pub fn set(&mut self, credential_type: impl Into<String>, records: Vec<CredentialRecord>) {
        self.0.insert(credential_type.into(), records);
    }

    /// Overlay `other` onto `self`: supplied types replace their record
    /// lists wholesale, all other types are preserved verbatim.
    pub fn overlay(&mut self, other: CredentialBundle) {
        for (credential_type, records) in other.0 {
            self.0.insert(credential_type, records);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlay_replaces_supplied_types_and_keeps_others() {
        let mut existing = CredentialBundle::new();
        existing.set("password", vec![CredentialRecord::system("old")]);
        existing.set("pin", vec![CredentialRecord::system("1234")]);

        let mut update = CredentialBundle::new();
        update.set("password", vec![CredentialRecord::system("new")]);

        existing.overlay(update);

        assert_eq!(existing.records("password").unwrap()[0].value, "new");
        assert_eq!(existing.records("pin").unwrap()[0].value, "1234");
    }

    #[test]
    fn assignee_type_round_trips_lowercase() {
        let json = serde_json::to_string(&AssigneeType::Group).unwrap();
        assert_eq!(json, "\"group\"");
        let back: AssigneeType = serde_json::from_str(&json).unwrap();
        assert_eq!(back, AssigneeType::Group);
    }

    #[test]
    fn user_serializes_type_field() {
        let user = User {
            id: "u1".to_owned(),
            user_type: "employee".to_owned(),
            ou_id: "root".to_owned(),
            attributes: serde_json::json!({"username": "jdoe"}),
        };
        let value = serde_json::to_value(&user).unwrap();
        assert_eq!(value["type"], "employee");
    }
}
