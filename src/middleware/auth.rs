//! API key authentication middleware.
//!
//! This middleware intercepts every protected request to:
//! 1. Extract the API key from the configured header
//! 2. Verify it (hash lookup, expiry, IP allow-list)
//! 3. Inject authentication context into the request
//! 4. Reject unauthenticated requests with HTTP 401
//!
//! Admin routes additionally run [`require_admin`].

use std::net::SocketAddr;

use axum::{
    Extension,
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};

use crate::{error::AppError, services::admin::AdminContext, state::AppState};

/// Key name recorded for requests served while API-key auth is disabled.
pub const AUTH_DISABLED_KEY_NAME: &str = "auth-disabled";

/// Authentication context attached to authenticated requests.
///
/// This struct is inserted into the request's extension map and can be
/// extracted by route handlers to know who made the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    /// Display name of the API key that authenticated the request
    pub key_name: String,

    /// Whether the key may call admin routes
    pub is_admin: bool,

    /// Peer address of the caller, if the server recorded one
    pub ip_address: Option<String>,
}

impl AuthContext {
    /// Admin identity recorded in the audit log.
    pub fn admin_context(&self) -> AdminContext {
        AdminContext {
            actor: format!("api-key:{}", self.key_name),
            ip_address: self.ip_address.clone(),
        }
    }
}

/// Peer IP of the connection, as recorded by `into_make_service_with_connect_info`.
fn client_ip(request: &Request) -> Option<String> {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_canonical().to_string())
}

/// API key authentication middleware function.
///
/// # Flow
///
/// 1. Read the API key header (`X-API-Key` unless configured otherwise)
/// 2. Verify the key against the store for the caller's IP
/// 3. If valid: inject `AuthContext` into request, call next handler
/// 4. If missing: 401 `api_key_required`; if rejected: 401 `invalid_api_key`
///
/// With API-key auth disabled the request passes with an admin context.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let ip_address = client_ip(&request);

    if !state.auth.enabled {
        request.extensions_mut().insert(AuthContext {
            key_name: AUTH_DISABLED_KEY_NAME.to_string(),
            is_admin: true,
            ip_address,
        });
        return Ok(next.run(request).await);
    }

    let raw_key = request
        .headers()
        .get(&state.auth.header)
        .and_then(|h| h.to_str().ok())
        .filter(|key| !key.is_empty())
        .map(str::to_owned)
        .ok_or(AppError::ApiKeyRequired)?;

    let record = state
        .verifier
        .authenticate(&raw_key, ip_address.as_deref())
        .await?
        .ok_or(AppError::InvalidApiKey)?;

    request.extensions_mut().insert(AuthContext {
        key_name: record.name,
        is_admin: record.is_admin,
        ip_address,
    });

    Ok(next.run(request).await)
}

/// Rejects non-admin keys with HTTP 403. Must run after [`auth_middleware`].
pub async fn require_admin(
    Extension(auth): Extension<AuthContext>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if !auth.is_admin {
        tracing::warn!(key_name = %auth.key_name, "Non-admin API key used on admin route");
        return Err(AppError::Forbidden);
    }

    Ok(next.run(request).await)
}
