//! Schema registry backed by the configured user schemas.
//!
//! Attribute documents are validated with compiled JSON Schema
//! validators; the rest of the schema surface (bound unit, unique and
//! credential attributes) comes straight from configuration.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::SchemaEntry;
use crate::domain::ports::{PortError, SchemaRegistry, SchemaViolation, UserSchema};

struct CompiledSchema {
    type_name: String,
    bound_ou: String,
    unique_attributes: Vec<String>,
    credential_attributes: Vec<String>,
    validator: Option<jsonschema::Validator>,
}

impl UserSchema for CompiledSchema {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn bound_ou(&self) -> &str {
        &self.bound_ou
    }

    fn unique_attributes(&self) -> &[String] {
        &self.unique_attributes
    }

    fn credential_attributes(&self) -> &[String] {
        &self.credential_attributes
    }

    fn validate(&self, attributes: &serde_json::Value) -> Result<(), SchemaViolation> {
        let Some(validator) = &self.validator else {
            return Ok(());
        };
        match validator.iter_errors(attributes).next() {
            None => Ok(()),
            Some(error) => Err(SchemaViolation {
                message: format!("{} at {}", error, error.instance_path()),
            }),
        }
    }
}

pub struct StaticSchemaRegistry {
    schemas: HashMap<String, Arc<dyn UserSchema>>,
}

impl StaticSchemaRegistry {
    /// Compile the configured schemas. A malformed JSON Schema is a
    /// configuration error and aborts startup.
    pub fn from_entries(entries: &[SchemaEntry]) -> Result<Self, anyhow::Error> {
        let mut schemas: HashMap<String, Arc<dyn UserSchema>> = HashMap::new();
        for entry in entries {
            let validator = entry
                .json_schema
                .as_ref()
                .map(jsonschema::validator_for)
                .transpose()
                .map_err(|e| {
                    anyhow::anyhow!("invalid JSON Schema for user type '{}': {e}", entry.name)
                })?;
            let compiled = CompiledSchema {
                type_name: entry.name.clone(),
                bound_ou: entry.ou_id.clone(),
                unique_attributes: entry.unique_attributes.clone(),
                credential_attributes: entry.credential_attributes.clone(),
                validator,
            };
            schemas.insert(entry.name.clone(), Arc::new(compiled));
        }
        Ok(Self { schemas })
    }
}

#[async_trait]
impl SchemaRegistry for StaticSchemaRegistry {
    async fn resolve(
        &self,
        type_name: &str,
    ) -> Result<Option<Arc<dyn UserSchema>>, PortError> {
        Ok(self.schemas.get(type_name).cloned())
    }
}
