//! Request handlers. Handlers stay on HTTP concerns only: extract,
//! delegate to the service with business parameters, map the result.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Query};
use axum::response::IntoResponse;
use axum::{Extension, Json};
use http::StatusCode;
use identity_sdk::Page;
use serde_json::Value;

use crate::api::rest::dto::{
    AssignmentsReq, AuthenticateReq, CreateRoleReq, CreateUserReq, RoleDto, UpdateCredentialsReq,
    UpdateRoleReq, UpdateUserReq, UserDto,
};
use crate::api::rest::error::Problem;
use crate::domain::ports::SecurityContext;
use crate::domain::service::AppServices;
use crate::domain::stores::AttributeFilters;
use crate::infra::declarative::{RoleExporter, UserExporter};

type ApiResult<T> = Result<T, Problem>;

/// Split the raw query pairs into pagination parameters and attribute
/// filters. Every non-reserved key is an equality filter.
fn split_query(params: HashMap<String, String>) -> Result<(Option<i64>, u64, AttributeFilters), Problem> {
    let mut limit = None;
    let mut offset = 0;
    let mut filters = AttributeFilters::new();
    for (key, value) in params {
        match key.as_str() {
            "limit" => {
                limit = Some(value.parse::<i64>().map_err(|_| {
                    Problem::new(
                        StatusCode::BAD_REQUEST,
                        "Invalid Input",
                        format!("limit '{value}' is not an integer"),
                    )
                })?);
            }
            "offset" => {
                offset = value.parse::<u64>().map_err(|_| {
                    Problem::new(
                        StatusCode::BAD_REQUEST,
                        "Invalid Input",
                        format!("offset '{value}' is not a non-negative integer"),
                    )
                })?;
            }
            _ => {
                filters.insert(key, Value::String(value));
            }
        }
    }
    Ok((limit, offset, filters))
}

fn map_page<T, D: From<T>>(page: Page<T>) -> Page<D> {
    Page {
        total: page.total,
        items: page.items.into_iter().map(D::from).collect(),
        links: page.links,
    }
}

// ==================== User Handlers ====================

#[tracing::instrument(skip(svc, ctx, params))]
pub(crate) async fn list_users(
    Extension(ctx): Extension<SecurityContext>,
    Extension(svc): Extension<Arc<AppServices>>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<Page<UserDto>>> {
    let (limit, offset, filters) = split_query(params)?;
    let page = svc.users.list_users(&ctx, &filters, limit, offset).await?;
    Ok(Json(map_page(page)))
}

#[tracing::instrument(skip(svc, ctx), fields(user_id = %id))]
pub(crate) async fn get_user(
    Extension(ctx): Extension<SecurityContext>,
    Extension(svc): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> ApiResult<Json<UserDto>> {
    let user = svc.users.get_user(&ctx, &id).await?;
    Ok(Json(user.into()))
}

#[tracing::instrument(skip(svc, ctx, req_body))]
pub(crate) async fn create_user(
    Extension(ctx): Extension<SecurityContext>,
    Extension(svc): Extension<Arc<AppServices>>,
    Json(req_body): Json<CreateUserReq>,
) -> ApiResult<impl IntoResponse> {
    let user = svc.users.create_user(&ctx, req_body.into()).await?;
    Ok((StatusCode::CREATED, Json(UserDto::from(user))))
}

#[tracing::instrument(skip(svc, ctx, req_body), fields(user_id = %id))]
pub(crate) async fn update_user(
    Extension(ctx): Extension<SecurityContext>,
    Extension(svc): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(req_body): Json<UpdateUserReq>,
) -> ApiResult<Json<UserDto>> {
    let user = svc.users.update_user(&ctx, &id, req_body.into()).await?;
    Ok(Json(user.into()))
}

#[tracing::instrument(skip(svc, ctx), fields(user_id = %id))]
pub(crate) async fn delete_user(
    Extension(ctx): Extension<SecurityContext>,
    Extension(svc): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    svc.users.delete_user(&ctx, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[tracing::instrument(skip(svc, ctx, req_body), fields(user_id = %id))]
pub(crate) async fn update_credentials(
    Extension(ctx): Extension<SecurityContext>,
    Extension(svc): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(req_body): Json<UpdateCredentialsReq>,
) -> ApiResult<StatusCode> {
    svc.users.update_credentials(&ctx, &id, req_body).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[tracing::instrument(skip(svc, ctx, params), fields(user_id = %id))]
pub(crate) async fn get_user_groups(
    Extension(ctx): Extension<SecurityContext>,
    Extension(svc): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<Page<identity_sdk::GroupSummary>>> {
    let (limit, offset, _) = split_query(params)?;
    let page = svc.users.get_user_groups(&ctx, &id, limit, offset).await?;
    Ok(Json(page))
}

#[tracing::instrument(skip(svc, req_body))]
pub(crate) async fn authenticate(
    Extension(svc): Extension<Arc<AppServices>>,
    Json(req_body): Json<AuthenticateReq>,
) -> ApiResult<Json<UserDto>> {
    let identifiers: AttributeFilters = req_body.identifiers.into_iter().collect();
    let user = svc
        .users
        .authenticate(&identifiers, &req_body.credentials)
        .await?;
    Ok(Json(user.into()))
}

// ==================== Role Handlers ====================

#[tracing::instrument(skip(svc, ctx, params))]
pub(crate) async fn list_roles(
    Extension(ctx): Extension<SecurityContext>,
    Extension(svc): Extension<Arc<AppServices>>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<Page<RoleDto>>> {
    let (limit, offset, _) = split_query(params)?;
    let page = svc.roles.list_roles(&ctx, limit, offset).await?;
    Ok(Json(map_page(page)))
}

#[tracing::instrument(skip(svc, ctx), fields(role_id = %id))]
pub(crate) async fn get_role(
    Extension(ctx): Extension<SecurityContext>,
    Extension(svc): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> ApiResult<Json<RoleDto>> {
    let role = svc.roles.get_role(&ctx, &id).await?;
    Ok(Json(role.into()))
}

#[tracing::instrument(skip(svc, ctx, req_body))]
pub(crate) async fn create_role(
    Extension(ctx): Extension<SecurityContext>,
    Extension(svc): Extension<Arc<AppServices>>,
    Json(req_body): Json<CreateRoleReq>,
) -> ApiResult<impl IntoResponse> {
    let role = svc.roles.create_role(&ctx, req_body.into()).await?;
    Ok((StatusCode::CREATED, Json(RoleDto::from(role))))
}

#[tracing::instrument(skip(svc, ctx, req_body), fields(role_id = %id))]
pub(crate) async fn update_role(
    Extension(ctx): Extension<SecurityContext>,
    Extension(svc): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(req_body): Json<UpdateRoleReq>,
) -> ApiResult<Json<RoleDto>> {
    let role = svc.roles.update_role(&ctx, &id, req_body.into()).await?;
    Ok(Json(role.into()))
}

#[tracing::instrument(skip(svc, ctx), fields(role_id = %id))]
pub(crate) async fn delete_role(
    Extension(ctx): Extension<SecurityContext>,
    Extension(svc): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    svc.roles.delete_role(&ctx, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[tracing::instrument(skip(svc, ctx, req_body), fields(role_id = %id))]
pub(crate) async fn add_role_assignments(
    Extension(ctx): Extension<SecurityContext>,
    Extension(svc): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(req_body): Json<AssignmentsReq>,
) -> ApiResult<Json<RoleDto>> {
    let role = svc
        .roles
        .add_assignments(&ctx, &id, req_body.assignments)
        .await?;
    Ok(Json(role.into()))
}

#[tracing::instrument(skip(svc, ctx, req_body), fields(role_id = %id))]
pub(crate) async fn remove_role_assignments(
    Extension(ctx): Extension<SecurityContext>,
    Extension(svc): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(req_body): Json<AssignmentsReq>,
) -> ApiResult<Json<RoleDto>> {
    let role = svc
        .roles
        .remove_assignments(&ctx, &id, req_body.assignments)
        .await?;
    Ok(Json(role.into()))
}

// ==================== Export Handlers ====================

#[tracing::instrument(skip(exporter, ctx))]
pub(crate) async fn export_users(
    Extension(ctx): Extension<SecurityContext>,
    Extension(exporter): Extension<Arc<UserExporter>>,
) -> ApiResult<Json<Vec<serde_json::Value>>> {
    let ids = exporter.enumerate(&ctx).await?;
    let mut documents = Vec::with_capacity(ids.len());
    for id in &ids {
        let (export, _) = exporter.export(&ctx, id).await?;
        documents.push(serde_json::to_value(export).map_err(|e| {
            tracing::error!(error = %e, "Export serialization failed");
            Problem::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal Error",
                "An internal error occurred",
            )
        })?);
    }
    Ok(Json(documents))
}

#[tracing::instrument(skip(exporter, ctx))]
pub(crate) async fn export_roles(
    Extension(ctx): Extension<SecurityContext>,
    Extension(exporter): Extension<Arc<RoleExporter>>,
) -> ApiResult<Json<Vec<serde_json::Value>>> {
    let ids = exporter.enumerate(&ctx).await?;
    let mut documents = Vec::with_capacity(ids.len());
    for id in &ids {
        let (export, _) = exporter.export(&ctx, id).await?;
        documents.push(serde_json::to_value(export).map_err(|e| {
            tracing::error!(error = %e, "Export serialization failed");
            Problem::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal Error",
                "An internal error occurred",
            )
        })?);
    }
    Ok(Json(documents))
}
