//! HTTP request handlers (route handlers).
//!
//! Each handler is an async function that:
//! 1. Receives HTTP request data (JSON body, URL params, etc.)
//! 2. Delegates to a service
//! 3. Returns HTTP response (JSON, status code)

use axum::{
    Router,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, patch, post},
};

use crate::{
    middleware::{auth, rate_limit},
    state::AppState,
};

/// Admin endpoints for users, applications, grants and API keys
pub mod admin;
/// Authorization check and user listing endpoints
pub mod authorization;
/// Decision cache management endpoint
pub mod cache;
/// Health check endpoint
pub mod health;

/// Build the full API router.
///
/// `/api/v1/health` is public. Everything else requires an API key, and the
/// `/api/v1/admin` routes require an admin key. The per-IP rate limit, when
/// configured, covers every route and runs before authentication.
pub fn router(state: AppState) -> Router {
    let admin_routes = Router::new()
        .route(
            "/api/v1/admin/users",
            post(admin::create_user).get(admin::list_users),
        )
        .route("/api/v1/admin/users/{email}", patch(admin::update_user))
        .route(
            "/api/v1/admin/applications",
            post(admin::create_application).get(admin::list_applications),
        )
        .route(
            "/api/v1/admin/permissions/grant",
            post(admin::grant_permission),
        )
        .route(
            "/api/v1/admin/permissions/revoke",
            post(admin::revoke_permission),
        )
        .route("/api/v1/admin/api-keys", post(admin::create_api_key))
        .route("/api/v1/admin/logs/access", get(admin::access_logs))
        .route("/api/v1/admin/logs/audit", get(admin::audit_logs))
        .route_layer(from_fn(auth::require_admin));

    let authenticated_routes = Router::new()
        .route(
            "/api/v1/auth/check",
            post(authorization::check_authorization),
        )
        .route(
            "/api/v1/users/{email}/applications",
            get(authorization::list_user_applications),
        )
        .route("/api/v1/cache/clear", post(cache::clear_cache))
        .merge(admin_routes)
        // Runs before require_admin, which reads the context it inserts
        .route_layer(from_fn_with_state(state.clone(), auth::auth_middleware));

    Router::new()
        .route("/api/v1/health", get(health::health_check))
        .merge(authenticated_routes)
        .layer(from_fn_with_state(
            state.clone(),
            rate_limit::rate_limit_middleware,
        ))
        .with_state(state)
}
