//! Admin HTTP handlers.
//!
//! This module implements the admin endpoints. All of them require an API
//! key with `is_admin = true`:
//! - POST /api/v1/admin/users - Create user
//! - PATCH /api/v1/admin/users/{email} - Update user
//! - POST /api/v1/admin/applications - Register application
//! - POST /api/v1/admin/permissions/grant - Grant access
//! - POST /api/v1/admin/permissions/revoke - Revoke access
//! - POST /api/v1/admin/api-keys - Mint API key
//! - GET /api/v1/admin/users - List users with active grant counts
//! - GET /api/v1/admin/applications - List applications with user counts
//! - GET /api/v1/admin/logs/access - Query the access log
//! - GET /api/v1/admin/logs/audit - Query the audit log
//!
//! User updates, grants and revokes drop the affected cached verdicts.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Serialize;

use crate::{
    error::AppError,
    middleware::auth::AuthContext,
    models::{
        access_log::{AccessLogEntry, AccessLogQuery, AuditLogEntry, AuditLogQuery},
        api_key::{CreateApiKeyRequest, CreatedApiKeyResponse},
        application::{
            Application, ApplicationSummary, CreateApplicationRequest, ListApplicationsQuery,
        },
        page::LogPage,
        permission::{GrantPermissionRequest, Permission, RevokePermissionRequest},
        user::{CreateUserRequest, ListUsersQuery, UpdateUserRequest, User, UserSummary},
    },
    state::AppState,
};

#[derive(Debug, Serialize)]
pub struct RevokePermissionResponse {
    pub user_email: String,
    pub app_name: String,
    pub revoked: u64,
}

/// Create a user.
///
/// # Response
///
/// - **Success (201 Created)**: The created user
/// - **Error (409)**: Email already registered
pub async fn create_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let user = state
        .admin
        .create_user(&auth.admin_context(), request)
        .await?;

    Ok((StatusCode::CREATED, Json(user)))
}

/// Update a user's name, flags or notes. Absent fields are left unchanged.
pub async fn update_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(email): Path<String>,
    Json(changes): Json<UpdateUserRequest>,
) -> Result<Json<User>, AppError> {
    let user = state
        .admin
        .update_user(&auth.admin_context(), &email, changes)
        .await?;

    Ok(Json(user))
}

pub async fn create_application(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateApplicationRequest>,
) -> Result<(StatusCode, Json<Application>), AppError> {
    let application = state
        .admin
        .create_application(&auth.admin_context(), request)
        .await?;

    Ok((StatusCode::CREATED, Json(application)))
}

/// Grant a user access to an application, or refresh an existing grant.
pub async fn grant_permission(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<GrantPermissionRequest>,
) -> Result<Json<Permission>, AppError> {
    let permission = state
        .admin
        .grant_permission(&auth.admin_context(), request)
        .await?;

    Ok(Json(permission))
}

/// Revoke a grant.
///
/// # Endpoint
///
/// `POST /api/v1/admin/permissions/revoke?user_email=alice@co.com&app_name=billing`
pub async fn revoke_permission(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(request): Query<RevokePermissionRequest>,
) -> Result<Json<RevokePermissionResponse>, AppError> {
    let user_email = request.user_email.clone();
    let app_name = request.app_name.clone();

    let revoked = state
        .admin
        .revoke_permission(&auth.admin_context(), request)
        .await?;

    Ok(Json(RevokePermissionResponse {
        user_email,
        app_name,
        revoked,
    }))
}

/// Mint an API key.
///
/// # Response
///
/// - **Success (201 Created)**: Includes the raw `api_key`, shown only once
pub async fn create_api_key(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateApiKeyRequest>,
) -> Result<(StatusCode, Json<CreatedApiKeyResponse>), AppError> {
    let created = state
        .admin
        .create_api_key(&auth.admin_context(), request)
        .await?;

    Ok((StatusCode::CREATED, Json(created)))
}

/// List users.
///
/// # Endpoint
///
/// `GET /api/v1/admin/users?is_active=true&is_admin=false&skip=0&limit=100`
pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<Vec<UserSummary>>, AppError> {
    Ok(Json(state.admin.list_users(query).await?))
}

pub async fn list_applications(
    State(state): State<AppState>,
    Query(query): Query<ListApplicationsQuery>,
) -> Result<Json<Vec<ApplicationSummary>>, AppError> {
    Ok(Json(state.admin.list_applications(query).await?))
}

/// Query the access log.
///
/// # Endpoint
///
/// `GET /api/v1/admin/logs/access?email=&app_name=&access_granted=&start_time=&end_time=&skip=&limit=`
///
/// # Response
///
/// - **Success (200 OK)**: `{ "total": n, "logs": [...] }`, newest first.
///   `total` counts every matching row, not just this page.
pub async fn access_logs(
    State(state): State<AppState>,
    Query(query): Query<AccessLogQuery>,
) -> Result<Json<LogPage<AccessLogEntry>>, AppError> {
    Ok(Json(state.admin.access_logs(query).await?))
}

/// Query the audit log. Same paging as the access log.
pub async fn audit_logs(
    State(state): State<AppState>,
    Query(query): Query<AuditLogQuery>,
) -> Result<Json<LogPage<AuditLogEntry>>, AppError> {
    Ok(Json(state.admin.audit_logs(query).await?))
}
