//! Descriptor directory loader.
//!
//! Walks a per-kind directory, parses each regular file as one resource,
//! validates it, hashes embedded secrets and inserts into the descriptor
//! store. The load is all-or-nothing: any failure aborts startup, and a
//! database probe error in composite mode is fatal rather than ignored.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use identity_sdk::{CredentialBundle, Role, User};
use thiserror::Error;
use walkdir::WalkDir;

use crate::domain::credentials::{self, CredentialError};
use crate::domain::ports::CredentialHasher;
use crate::domain::stores::{RoleStore, StoreError, UserStore};
use crate::infra::declarative::descriptor::{RoleDescriptor, UserDescriptor};
use crate::infra::declarative::store::{
    DeclarativeRoleStore, DeclarativeUser, DeclarativeUserStore,
};

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("failed to read descriptor directory '{path}'")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("failed to read descriptor file '{path}'")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse descriptor file '{path}'")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid descriptor '{path}': {message}")]
    Validation { path: PathBuf, message: String },

    #[error("invalid credentials in descriptor '{path}'")]
    Credential {
        path: PathBuf,
        #[source]
        source: CredentialError,
    },

    #[error("duplicate descriptor id '{id}'")]
    Duplicate { id: String },

    #[error("descriptor id '{id}' already exists in the database store")]
    CrossStoreClash { id: String },

    #[error("database probe failed during descriptor load")]
    Probe(#[source] StoreError),
}

fn descriptor_files(directory: &Path) -> Result<Vec<PathBuf>, LoaderError> {
    if !directory.exists() {
        tracing::debug!(directory = %directory.display(), "Descriptor directory absent, nothing to load");
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(directory).sort_by_file_name() {
        let entry = entry.map_err(|source| LoaderError::Walk {
            path: directory.to_path_buf(),
            source,
        })?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn read_descriptor<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, LoaderError> {
    let text = std::fs::read_to_string(path).map_err(|source| LoaderError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_str(&text).map_err(|source| LoaderError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Loads user descriptors into the declarative user store.
pub struct UserResourceLoader {
    directory: PathBuf,
    store: Arc<DeclarativeUserStore>,
    /// Present in composite mode; a descriptor clashing with a database
    /// entry is a fatal cross-store conflict.
    db_probe: Option<Arc<dyn UserStore>>,
    hasher: Arc<dyn CredentialHasher>,
}

impl UserResourceLoader {
    #[must_use]
    pub fn new(
        directory: PathBuf,
        store: Arc<DeclarativeUserStore>,
        db_probe: Option<Arc<dyn UserStore>>,
        hasher: Arc<dyn CredentialHasher>,
    ) -> Self {
        Self {
            directory,
            store,
            db_probe,
            hasher,
        }
    }

    /// Load every descriptor file; returns the number of loaded users.
    pub async fn load(&self) -> Result<usize, LoaderError> {
        let files = descriptor_files(&self.directory)?;
        for path in &files {
            self.load_file(path).await?;
        }
        let loaded = self.store.count_loaded();
        tracing::info!(loaded, directory = %self.directory.display(), "Loaded user descriptors");
        Ok(loaded)
    }

    async fn load_file(&self, path: &Path) -> Result<(), LoaderError> {
        let descriptor: UserDescriptor = read_descriptor(path)?;
        validate_user(path, &descriptor)?;

        let credentials = match &descriptor.credentials {
            Some(inputs) => credentials::normalize_map(inputs, self.hasher.as_ref()).map_err(
                |source| LoaderError::Credential {
                    path: path.to_path_buf(),
                    source,
                },
            )?,
            None => CredentialBundle::new(),
        };

        if let Some(probe) = &self.db_probe {
            if probe.exists(&descriptor.id).await.map_err(LoaderError::Probe)? {
                return Err(LoaderError::CrossStoreClash { id: descriptor.id });
            }
        }

        let entry = DeclarativeUser {
            user: User {
                id: descriptor.id,
                user_type: descriptor.user_type,
                ou_id: descriptor.ou_id,
                attributes: descriptor.attributes,
            },
            credentials,
        };
        self.store.insert(entry).map_err(|e| match e {
            StoreError::Duplicate { id } => LoaderError::Duplicate { id },
            other => LoaderError::Probe(other),
        })
    }
}

/// Loads role descriptors into the declarative role store.
pub struct RoleResourceLoader {
    directory: PathBuf,
    store: Arc<DeclarativeRoleStore>,
    db_probe: Option<Arc<dyn RoleStore>>,
}

impl RoleResourceLoader {
    #[must_use]
    pub fn new(
        directory: PathBuf,
        store: Arc<DeclarativeRoleStore>,
        db_probe: Option<Arc<dyn RoleStore>>,
    ) -> Self {
        Self {
            directory,
            store,
            db_probe,
        }
    }

    /// Load every descriptor file; returns the number of loaded roles.
    pub async fn load(&self) -> Result<usize, LoaderError> {
        let files = descriptor_files(&self.directory)?;
        for path in &files {
            self.load_file(path).await?;
        }
        let loaded = self.store.count_loaded();
        tracing::info!(loaded, directory = %self.directory.display(), "Loaded role descriptors");
        Ok(loaded)
    }

    async fn load_file(&self, path: &Path) -> Result<(), LoaderError> {
        let descriptor: RoleDescriptor = read_descriptor(path)?;
        validate_role(path, &descriptor)?;

        if let Some(probe) = &self.db_probe {
            if probe.exists(&descriptor.id).await.map_err(LoaderError::Probe)? {
                return Err(LoaderError::CrossStoreClash { id: descriptor.id });
            }
        }

        let role = Role {
            id: descriptor.id,
            name: descriptor.name,
            description: descriptor.description,
            ou_id: descriptor.ou_id,
            permissions: descriptor.permissions,
            assignments: descriptor.assignments,
        };
        self.store.insert(role).map_err(|e| match e {
            StoreError::Duplicate { id } => LoaderError::Duplicate { id },
            other => LoaderError::Probe(other),
        })
    }
}

fn validate_user(path: &Path, descriptor: &UserDescriptor) -> Result<(), LoaderError> {
    let fail = |message: &str| LoaderError::Validation {
        path: path.to_path_buf(),
        message: message.to_owned(),
    };
    if descriptor.id.trim().is_empty() {
        return Err(fail("user id must not be empty"));
    }
    if descriptor.user_type.trim().is_empty() {
        return Err(fail("user type must not be empty"));
    }
    if descriptor.ou_id.trim().is_empty() {
        return Err(fail("user ou_id must not be empty"));
    }
    let has_username = descriptor
        .attributes
        .get("username")
        .and_then(serde_json::Value::as_str)
        .is_some_and(|u| !u.is_empty());
    if !has_username {
        return Err(fail("user must carry a username attribute"));
    }
    Ok(())
}

fn validate_role(path: &Path, descriptor: &RoleDescriptor) -> Result<(), LoaderError> {
    let fail = |message: String| LoaderError::Validation {
        path: path.to_path_buf(),
        message,
    };
    if descriptor.id.trim().is_empty() {
        return Err(fail("role id must not be empty".to_owned()));
    }
    if descriptor.name.trim().is_empty() {
        return Err(fail("role name must not be empty".to_owned()));
    }
    if descriptor.ou_id.trim().is_empty() {
        return Err(fail("role ou_id must not be empty".to_owned()));
    }
    for grant in &descriptor.permissions {
        if grant.resource_server_id.trim().is_empty() {
            return Err(fail(
                "permission grant is missing a resource server id".to_owned(),
            ));
        }
    }
    for assignment in &descriptor.assignments {
        if assignment.id.trim().is_empty() {
            return Err(fail("assignment is missing an assignee id".to_owned()));
        }
    }
    Ok(())
}
