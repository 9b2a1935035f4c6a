//! Credential shapes, cardinality rules and normalization.
//!
//! Descriptor files and the update-credentials endpoint accept the same
//! two syntaxes per credential type: a scalar secret, or a list of
//! explicit records. Input is lifted into [`CredentialInput`] at parse
//! time and normalized into stored [`CredentialRecord`]s here, so the
//! map-of-anything shape never travels further than the boundary.

use std::collections::BTreeMap;

use identity_sdk::{CredentialBundle, CredentialRecord, StorageType};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::domain::ports::{CredentialHasher, HashError};

/// Credential types whose values are opaque system-managed tokens and
/// must never be hashed.
pub const SYSTEM_MANAGED_TYPES: &[&str] = &["passkey"];

#[must_use]
pub fn is_system_managed(credential_type: &str) -> bool {
    SYSTEM_MANAGED_TYPES.contains(&credential_type)
}

/// How many records a credential type may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// At most one record (`password`, `pin`).
    Single,
    /// Any number of records; system-managed types only.
    Multi,
}

#[must_use]
pub fn cardinality_of(credential_type: &str) -> Cardinality {
    if is_system_managed(credential_type) {
        Cardinality::Multi
    } else {
        Cardinality::Single
    }
}

/// One credential type's value as supplied by a descriptor or an update
/// request.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CredentialInput {
    /// Plaintext secret (hashed unless the type is system-managed).
    Plain(String),
    /// Explicit records, order preserved.
    Records(Vec<CredentialRecordInput>),
}

/// One record inside the list syntax. A record lacking an explicit
/// non-hash storage type is hashed.
#[derive(Debug, Clone, Deserialize)]
pub struct CredentialRecordInput {
    #[serde(default)]
    pub storage_type: Option<StorageType>,
    #[serde(default)]
    pub algorithm: Option<String>,
    #[serde(default)]
    pub iterations: Option<u32>,
    #[serde(default)]
    pub key_length: Option<u32>,
    #[serde(default)]
    pub salt: Option<String>,
    pub value: String,
}

#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("credential type '{credential_type}' accepts at most one record, got {count}")]
    Cardinality {
        credential_type: String,
        count: usize,
    },

    #[error(transparent)]
    Hash(#[from] HashError),
}

/// Normalize one credential type's input into stored records.
///
/// Cardinality is enforced before any hashing or storage work.
pub fn normalize_input(
    credential_type: &str,
    input: &CredentialInput,
    hasher: &dyn CredentialHasher,
) -> Result<Vec<CredentialRecord>, CredentialError> {
    match input {
        CredentialInput::Plain(secret) => {
            if is_system_managed(credential_type) {
                Ok(vec![CredentialRecord::system(secret.clone())])
            } else {
                Ok(vec![hasher.hash(secret)?])
            }
        }
        CredentialInput::Records(records) => {
            if cardinality_of(credential_type) == Cardinality::Single && records.len() > 1 {
                return Err(CredentialError::Cardinality {
                    credential_type: credential_type.to_owned(),
                    count: records.len(),
                });
            }
            records
                .iter()
                .map(|record| normalize_record(credential_type, record, hasher))
                .collect()
        }
    }
}

fn normalize_record(
    credential_type: &str,
    record: &CredentialRecordInput,
    hasher: &dyn CredentialHasher,
) -> Result<CredentialRecord, CredentialError> {
    if is_system_managed(credential_type) || record.storage_type == Some(StorageType::System) {
        return Ok(CredentialRecord::system(record.value.clone()));
    }
    if record.storage_type == Some(StorageType::Hash) {
        // Pre-hashed upstream; keep the supplied parameters verbatim.
        return Ok(CredentialRecord {
            storage_type: StorageType::Hash,
            algorithm: record.algorithm.clone(),
            iterations: record.iterations,
            key_length: record.key_length,
            salt: record.salt.clone(),
            value: record.value.clone(),
        });
    }
    Ok(hasher.hash(&record.value)?)
}

/// Normalize a `{type: value}` map into a bundle, preserving input order
/// per type.
pub fn normalize_map(
    inputs: &BTreeMap<String, CredentialInput>,
    hasher: &dyn CredentialHasher,
) -> Result<CredentialBundle, CredentialError> {
    let mut bundle = CredentialBundle::new();
    for (credential_type, input) in inputs {
        bundle.set(
            credential_type.clone(),
            normalize_input(credential_type, input, hasher)?,
        );
    }
    Ok(bundle)
}

/// Pull credential material out of a user attribute document.
///
/// An attribute key is credential-bearing when it matches a
/// schema-declared credential field or a known system-managed type.
/// Matching string values are removed from the document and hashed (or
/// stored verbatim for system-managed types); empty strings are removed
/// but produce no record; non-string values stay in the document
/// untouched.
pub fn extract_from_attributes(
    attributes: &mut Value,
    schema_credential_fields: &[String],
    hasher: &dyn CredentialHasher,
) -> Result<CredentialBundle, CredentialError> {
    let mut bundle = CredentialBundle::new();
    let Some(doc) = attributes.as_object_mut() else {
        return Ok(bundle);
    };

    let candidate_keys: Vec<String> = doc
        .keys()
        .filter(|key| {
            schema_credential_fields.iter().any(|f| f == *key) || is_system_managed(key)
        })
        .cloned()
        .collect();

    for key in candidate_keys {
        let Some(Value::String(secret)) = doc.get(&key) else {
            continue;
        };
        let secret = secret.clone();
        doc.remove(&key);
        if secret.is_empty() {
            continue;
        }
        let input = CredentialInput::Plain(secret);
        bundle.set(key.clone(), normalize_input(&key, &input, hasher)?);
    }
    Ok(bundle)
}
