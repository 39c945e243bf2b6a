//! Per-IP rate limiting for every route.

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};

use crate::{error::AppError, state::AppState};

/// Reject requests beyond the configured per-minute budget with HTTP 429.
///
/// Requests without a recorded peer address are not counted.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_canonical());

    match (&state.rate_limiter, peer) {
        (Some(limiter), Some(ip)) if !limiter.check(ip) => {
            tracing::warn!(ip_address = %ip, path = %request.uri().path(), "Rate limit exceeded");
            Err(AppError::RateLimited)
        }
        _ => Ok(next.run(request).await),
    }
}
