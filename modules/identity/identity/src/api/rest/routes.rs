//! Route table and request-context middleware.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::{Extension, Router, middleware};

use crate::api::rest::handlers;
use crate::domain::ports::SecurityContext;
use crate::domain::service::AppServices;
use crate::infra::declarative::{RoleExporter, UserExporter};

/// Derive the per-request [`SecurityContext`] from the `x-subject-id`
/// header. Authentication itself is out of scope here; the gateway in
/// front of the service owns it.
async fn security_context(
    mut request: axum::extract::Request,
    next: middleware::Next,
) -> axum::response::Response {
    let ctx = request
        .headers()
        .get("x-subject-id")
        .and_then(|value| value.to_str().ok())
        .map_or_else(SecurityContext::anonymous, SecurityContext::for_subject);
    request.extensions_mut().insert(ctx);
    next.run(request).await
}

#[must_use]
pub fn router(services: Arc<AppServices>, export_page_size: u64) -> Router {
    let user_exporter = Arc::new(UserExporter::new(
        Arc::clone(&services.users),
        export_page_size,
    ));
    let role_exporter = Arc::new(RoleExporter::new(
        Arc::clone(&services.roles),
        export_page_size,
    ));

    Router::new()
        .route(
            "/users",
            get(handlers::list_users).post(handlers::create_user),
        )
        .route("/users/authenticate", post(handlers::authenticate))
        .route(
            "/users/{id}",
            get(handlers::get_user)
                .put(handlers::update_user)
                .delete(handlers::delete_user),
        )
        .route("/users/{id}/groups", get(handlers::get_user_groups))
        .route(
            "/users/{id}/update-credentials",
            post(handlers::update_credentials),
        )
        .route(
            "/roles",
            get(handlers::list_roles).post(handlers::create_role),
        )
        .route(
            "/roles/{id}",
            get(handlers::get_role)
                .put(handlers::update_role)
                .delete(handlers::delete_role),
        )
        .route(
            "/roles/{id}/assignments/add",
            post(handlers::add_role_assignments),
        )
        .route(
            "/roles/{id}/assignments/remove",
            post(handlers::remove_role_assignments),
        )
        .route("/export/users", get(handlers::export_users))
        .route("/export/roles", get(handlers::export_roles))
        .layer(middleware::from_fn(security_context))
        .layer(Extension(services))
        .layer(Extension(user_exporter))
        .layer(Extension(role_exporter))
}
