//! Health check endpoint for service monitoring.

use axum::{Json, extract::State};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::state::AppState;

/// Health check response.
///
/// Returns service status, database connectivity and whether the decision
/// cache is on.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `healthy`, or `degraded` when the database is unreachable
    pub status: &'static str,

    /// `healthy` or `unhealthy`
    pub database: &'static str,

    pub cache_enabled: bool,

    /// Current server timestamp
    pub timestamp: DateTime<Utc>,
}

/// Health check handler.
///
/// # Checks
///
/// - Database connectivity (executes simple query)
///
/// # Response (200 OK)
///
/// ```json
/// {
///   "status": "healthy",
///   "database": "healthy",
///   "cache_enabled": true,
///   "timestamp": "2025-12-21T19:00:00Z"
/// }
/// ```
///
/// A failed database ping still answers 200, with `status: "degraded"` and
/// `database: "unhealthy"`.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let (status, database) = match state.store.ping().await {
        Ok(()) => ("healthy", "healthy"),
        Err(err) => {
            tracing::error!(error = %err, "Database health check failed");
            ("degraded", "unhealthy")
        }
    };

    Json(HealthResponse {
        status,
        database,
        cache_enabled: state.engine.caching_enabled(),
        timestamp: Utc::now(),
    })
}
