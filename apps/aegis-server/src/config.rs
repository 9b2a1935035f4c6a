//! Server configuration: defaults, YAML file, environment overrides.

use std::path::Path;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use identity::config::IdentityConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// `SeaORM` connection URL; SQLite and Postgres are supported.
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// `tracing-subscriber` env-filter directive.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

fn default_bind_addr() -> String {
    "127.0.0.1:8090".to_owned()
}

fn default_database_url() -> String {
    "sqlite://aegis.db?mode=rwc".to_owned()
}

fn default_log_filter() -> String {
    "info".to_owned()
}

/// Defaults, overlaid with the YAML file (when present), overlaid with
/// `AEGIS_`-prefixed environment variables.
pub fn load(path: &Path) -> Result<AppConfig, figment::Error> {
    Figment::from(Serialized::defaults(AppConfig::default()))
        .merge(Yaml::file(path))
        .merge(Env::prefixed("AEGIS_").split("__"))
        .extract()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_a_file() {
        let config = load(Path::new("does-not-exist.yaml")).unwrap();
        assert_eq!(config.server.bind_addr, "127.0.0.1:8090");
        assert!(!config.identity.declarative_resources.enabled);
    }
}
