//! Wiring: database, descriptor load, store-mode selection, services,
//! HTTP server.
//!
//! The descriptor stores are constructed and fully loaded before the
//! composite store is handed to the services, so request workers always
//! observe a populated descriptor map.

use std::sync::Arc;

use anyhow::Context;
use identity::config::{IdentityConfig, StoreMode};
use identity::domain::ports::{Authorizer, CredentialHasher, OrgUnitDirectory, SchemaRegistry};
use identity::domain::service::{AppServices, ServiceConfig};
use identity::domain::stores::{RoleStore, UserStore};
use identity::infra::authz::StaticAuthorizer;
use identity::infra::composite::{CompositeRoleStore, CompositeUserStore};
use identity::infra::declarative::{
    DeclarativeRoleStore, DeclarativeUserStore, RoleResourceLoader, UserResourceLoader,
};
use identity::infra::directory::ConfigOrgUnitDirectory;
use identity::infra::hasher::Pbkdf2Hasher;
use identity::infra::schema::StaticSchemaRegistry;
use identity::infra::storage::migrations::Migrator;
use identity::infra::storage::{DbRoleStore, DbUserStore};
use sea_orm::{Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;

pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    let db = Database::connect(&config.database.url)
        .await
        .with_context(|| format!("failed to connect to '{}'", config.database.url))?;
    Migrator::up(&db, None)
        .await
        .context("failed to run database migrations")?;

    let services = build_services(&config.identity, &db).await?;
    let router = identity::api::rest::router(
        Arc::new(services),
        ServiceConfig::default().export_page_size,
    )
    .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("failed to bind '{}'", config.server.bind_addr))?;
    tracing::info!(addr = %config.server.bind_addr, "Aegis identity server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server terminated abnormally")
}

async fn build_services(
    config: &IdentityConfig,
    db: &DatabaseConnection,
) -> anyhow::Result<AppServices> {
    let hasher: Arc<dyn CredentialHasher> = Arc::new(Pbkdf2Hasher::from_config(&config.hashing));
    let authorizer: Arc<dyn Authorizer> =
        Arc::new(StaticAuthorizer::from_config(&config.authorization));
    let org_units: Arc<dyn OrgUnitDirectory> =
        Arc::new(ConfigOrgUnitDirectory::from_entries(&config.org_units));
    let schemas: Arc<dyn SchemaRegistry> = Arc::new(
        StaticSchemaRegistry::from_entries(&config.schemas)
            .context("failed to compile user schemas")?,
    );

    let db_users = Arc::new(DbUserStore::new(
        db.clone(),
        config.deployment_id.clone(),
        config.users.indexed_attributes.clone(),
    ));
    let db_roles = Arc::new(DbRoleStore::new(db.clone()));

    let declarative_enabled = config.declarative_resources.enabled;
    let users_mode = StoreMode::resolve(config.users.store.as_deref(), declarative_enabled);
    let roles_mode = StoreMode::resolve(config.roles.store.as_deref(), declarative_enabled);
    tracing::info!(?users_mode, ?roles_mode, "Resolved resource store modes");

    let user_store: Arc<dyn UserStore> = match users_mode {
        StoreMode::Mutable => db_users.clone(),
        StoreMode::Declarative | StoreMode::Composite => {
            let declarative = Arc::new(DeclarativeUserStore::new());
            let probe: Option<Arc<dyn UserStore>> = match users_mode {
                StoreMode::Composite => Some(db_users.clone()),
                _ => None,
            };
            UserResourceLoader::new(
                config.declarative_resources.directory.join("users"),
                Arc::clone(&declarative),
                probe,
                Arc::clone(&hasher),
            )
            .load()
            .await
            .context("user descriptor load failed")?;

            if users_mode == StoreMode::Composite {
                Arc::new(CompositeUserStore::new(
                    declarative,
                    db_users.clone(),
                    config.composite_fetch_cap,
                ))
            } else {
                declarative
            }
        }
    };

    let role_store: Arc<dyn RoleStore> = match roles_mode {
        StoreMode::Mutable => db_roles.clone(),
        StoreMode::Declarative | StoreMode::Composite => {
            let declarative = Arc::new(DeclarativeRoleStore::new());
            let probe: Option<Arc<dyn RoleStore>> = match roles_mode {
                StoreMode::Composite => Some(db_roles.clone()),
                _ => None,
            };
            RoleResourceLoader::new(
                config.declarative_resources.directory.join("roles"),
                Arc::clone(&declarative),
                probe,
            )
            .load()
            .await
            .context("role descriptor load failed")?;

            if roles_mode == StoreMode::Composite {
                Arc::new(CompositeRoleStore::new(
                    declarative,
                    db_roles.clone(),
                    config.composite_fetch_cap,
                ))
            } else {
                declarative
            }
        }
    };

    Ok(AppServices::new(
        user_store,
        role_store,
        authorizer,
        org_units,
        schemas,
        hasher,
        ServiceConfig::default(),
    ))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install shutdown handler");
    }
    tracing::info!("Shutdown signal received");
}
