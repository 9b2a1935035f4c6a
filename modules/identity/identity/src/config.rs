//! Configuration for the identity module.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Which store realization backs a resource kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    /// Database store only.
    Mutable,
    /// Descriptor store only; the service is effectively read-only.
    Declarative,
    /// Both stores active, reads merged, writes routed to the database.
    Composite,
}

impl StoreMode {
    /// Resolve a per-kind `store` value, falling back to the global
    /// `declarative_resources.enabled` flag when the value is missing or
    /// unrecognized. Matching ignores case and surrounding whitespace.
    #[must_use]
    pub fn resolve(raw: Option<&str>, declarative_enabled: bool) -> Self {
        let fallback = if declarative_enabled {
            Self::Declarative
        } else {
            Self::Mutable
        };
        let Some(raw) = raw else {
            return fallback;
        };
        match raw.trim().to_ascii_lowercase().as_str() {
            "mutable" => Self::Mutable,
            "declarative" => Self::Declarative,
            "composite" => Self::Composite,
            "" => fallback,
            other => {
                tracing::warn!(
                    store = other,
                    "Unrecognized store mode, falling back to the declarative_resources flag"
                );
                fallback
            }
        }
    }
}

/// Configuration for the identity module
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IdentityConfig {
    /// Scopes every identifying query so multiple logical deployments can
    /// share one physical database.
    #[serde(default = "default_deployment_id")]
    pub deployment_id: String,

    #[serde(default)]
    pub declarative_resources: DeclarativeResourcesConfig,

    #[serde(default)]
    pub users: UserKindConfig,

    #[serde(default)]
    pub roles: KindConfig,

    #[serde(default)]
    pub hashing: HashingConfig,

    /// Fetch cap for composite-mode list merging, applied to the
    /// combined pre-deduplication volume of both stores.
    #[serde(default = "default_composite_fetch_cap")]
    pub composite_fetch_cap: u64,

    #[serde(default)]
    pub authorization: AuthorizationConfig,

    /// Known organization units; `parent: None` marks a root.
    #[serde(default)]
    pub org_units: Vec<OrgUnitEntry>,

    /// Registered user schemas, keyed by type name.
    #[serde(default)]
    pub schemas: Vec<SchemaEntry>,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            deployment_id: default_deployment_id(),
            declarative_resources: DeclarativeResourcesConfig::default(),
            users: UserKindConfig::default(),
            roles: KindConfig::default(),
            hashing: HashingConfig::default(),
            composite_fetch_cap: default_composite_fetch_cap(),
            authorization: AuthorizationConfig::default(),
            org_units: Vec::new(),
            schemas: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeclarativeResourcesConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Root directory holding per-kind descriptor subdirectories
    /// (`<directory>/users`, `<directory>/roles`).
    #[serde(default = "default_descriptor_directory")]
    pub directory: PathBuf,
}

impl Default for DeclarativeResourcesConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            directory: default_descriptor_directory(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KindConfig {
    /// One of `mutable`, `declarative`, `composite`; unrecognized values
    /// fall back to `declarative_resources.enabled`.
    #[serde(default)]
    pub store: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserKindConfig {
    #[serde(default)]
    pub store: Option<String>,
    /// Attribute paths synced into the indexed-attribute table on every
    /// write so that `identify` and filtered lists hit an index.
    #[serde(default = "default_indexed_attributes")]
    pub indexed_attributes: Vec<String>,
}

impl Default for UserKindConfig {
    fn default() -> Self {
        Self {
            store: None,
            indexed_attributes: default_indexed_attributes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HashingConfig {
    #[serde(default = "default_hash_iterations")]
    pub iterations: u32,
    #[serde(default = "default_hash_key_length")]
    pub key_length: u32,
}

impl Default for HashingConfig {
    fn default() -> Self {
        Self {
            iterations: default_hash_iterations(),
            key_length: default_hash_key_length(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthorizationConfig {
    /// When true every action is allowed; single-node installs and tests.
    #[serde(default = "default_allow_all")]
    pub allow_all: bool,
    /// Organization units readable/writable when `allow_all` is false.
    #[serde(default)]
    pub allowed_org_units: Vec<String>,
}

impl Default for AuthorizationConfig {
    fn default() -> Self {
        Self {
            allow_all: default_allow_all(),
            allowed_org_units: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrgUnitEntry {
    pub id: String,
    #[serde(default)]
    pub parent: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaEntry {
    /// Type name users reference through their `type` field.
    pub name: String,
    /// Organization unit this type is bound to; users of the type must
    /// live in it or one of its descendants.
    pub ou_id: String,
    /// Optional JSON Schema applied to the attribute document.
    #[serde(default)]
    pub json_schema: Option<serde_json::Value>,
    /// Attribute paths that must be unique across users.
    #[serde(default)]
    pub unique_attributes: Vec<String>,
    /// Attribute keys that hold credential material and are extracted
    /// into the credential bundle instead of being stored as attributes.
    #[serde(default)]
    pub credential_attributes: Vec<String>,
}

fn default_deployment_id() -> String {
    "default".to_owned()
}

fn default_descriptor_directory() -> PathBuf {
    PathBuf::from("repository/resources")
}

fn default_indexed_attributes() -> Vec<String> {
    vec!["username".to_owned(), "email".to_owned()]
}

fn default_composite_fetch_cap() -> u64 {
    1000
}

fn default_hash_iterations() -> u32 {
    600_000
}

fn default_hash_key_length() -> u32 {
    32
}

fn default_allow_all() -> bool {
    true
}
