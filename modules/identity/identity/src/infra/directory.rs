//! Organization-unit directory backed by the configured unit tree.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::config::OrgUnitEntry;
use crate::domain::ports::{OrgUnitDirectory, PortError};

pub struct ConfigOrgUnitDirectory {
    /// Unit id → parent id; roots map to `None`.
    parents: HashMap<String, Option<String>>,
}

impl ConfigOrgUnitDirectory {
    #[must_use]
    pub fn from_entries(entries: &[OrgUnitEntry]) -> Self {
        let parents = entries
            .iter()
            .map(|entry| (entry.id.clone(), entry.parent.clone()))
            .collect();
        Self { parents }
    }
}

#[async_trait]
impl OrgUnitDirectory for ConfigOrgUnitDirectory {
    async fn exists(&self, ou_id: &str) -> Result<bool, PortError> {
        Ok(self.parents.contains_key(ou_id))
    }

    async fn is_self_or_descendant(&self, child: &str, parent: &str) -> Result<bool, PortError> {
        let mut current = Some(child.to_owned());
        // Bounded by the unit count; a malformed cycle terminates too.
        for _ in 0..=self.parents.len() {
            match current {
                Some(id) if id == parent => return Ok(true),
                Some(id) => current = self.parents.get(&id).cloned().flatten(),
                None => return Ok(false),
            }
        }
        Ok(false)
    }
}
