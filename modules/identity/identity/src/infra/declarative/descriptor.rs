//! Descriptor file shapes.
//!
//! One resource per file; the file extension is not semantic. Credentials
//! accept the scalar and record-list syntaxes described in
//! `domain::credentials`.

use std::collections::BTreeMap;

use identity_sdk::{Assignment, PermissionGrant};
use serde::{Deserialize, Serialize};

use crate::domain::credentials::CredentialInput;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserDescriptor {
    pub id: String,
    #[serde(rename = "type")]
    pub user_type: String,
    pub ou_id: String,
    pub attributes: serde_json::Value,
    #[serde(default)]
    pub credentials: Option<BTreeMap<String, CredentialInput>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoleDescriptor {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub ou_id: String,
    #[serde(default)]
    pub permissions: Vec<PermissionGrant>,
    #[serde(default)]
    pub assignments: Vec<Assignment>,
}

/// Export shape for users; identical to [`UserDescriptor`] except that
/// credential values are placeholder tokens.
#[derive(Debug, Serialize)]
pub struct UserExport {
    pub id: String,
    #[serde(rename = "type")]
    pub user_type: String,
    pub ou_id: String,
    pub attributes: serde_json::Value,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub credentials: BTreeMap<String, String>,
}

/// Export shape for roles; identical to [`RoleDescriptor`].
#[derive(Debug, Serialize)]
pub struct RoleExport {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub ou_id: String,
    pub permissions: Vec<PermissionGrant>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub assignments: Vec<Assignment>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_descriptor_parses_scalar_and_record_credentials() {
        let yaml = r#"
id: admin
type: employee
ou_id: root
attributes:
  username: admin
  email: admin@example.com
credentials:
  password: s3cret
  passkey:
    - storage_type: system
      value: opaque-blob
"#;
        let descriptor: UserDescriptor = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(descriptor.id, "admin");
        assert_eq!(descriptor.user_type, "employee");
        let credentials = descriptor.credentials.unwrap();
        assert!(matches!(
            credentials.get("password"),
            Some(CredentialInput::Plain(_))
        ));
        assert!(matches!(
            credentials.get("passkey"),
            Some(CredentialInput::Records(r)) if r.len() == 1
        ));
    }

    #[test]
    fn role_descriptor_parses_grants_and_assignments() {
        let yaml = r#"
id: admins
name: Administrators
ou_id: root
permissions:
  - resource_server_id: api
    permissions: [read, write]
assignments:
  - id: admin
    type: user
"#;
        let descriptor: RoleDescriptor = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(descriptor.permissions.len(), 1);
        assert_eq!(descriptor.permissions[0].permissions, vec!["read", "write"]);
        assert_eq!(descriptor.assignments.len(), 1);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let yaml = "id: r1\nname: X\nou_id: root\nbogus: true\n";
        assert!(serde_yaml::from_str::<RoleDescriptor>(yaml).is_err());
    }
}
