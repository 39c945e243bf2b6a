//! Error types and HTTP error response handling.
//!
//! This module defines all application errors and how they are converted
//! into HTTP responses with appropriate status codes and JSON bodies.
//!
//! Authorization denials are NOT errors. They travel as an ordinary
//! [`AuthorizationDecision`](crate::services::authorization::AuthorizationDecision)
//! and are rendered as `200 OK`. An `AppError` always means the request could
//! not be answered.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Application-wide error type.
///
/// # Error Categories
///
/// - **Database Errors**: The permission store could not be read or written
/// - **Authentication Errors**: Missing, invalid or under-privileged API keys
/// - **Resource Errors**: Admin targets that do not exist or already exist
/// - **Validation Errors**: Invalid request data
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Database operation failed (e.g., connection error, query error).
    ///
    /// Never converted into a denial: a failed check is distinct from a
    /// negative one.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// No API key header on a protected route.
    ///
    /// Returns HTTP 401 Unauthorized.
    #[error("API key required")]
    ApiKeyRequired,

    /// API key is unknown, inactive, expired or used from a disallowed IP.
    ///
    /// Returns HTTP 401 Unauthorized.
    #[error("Invalid API key")]
    InvalidApiKey,

    /// API key is valid but lacks admin privileges.
    ///
    /// Returns HTTP 403 Forbidden.
    #[error("Admin API key required")]
    Forbidden,

    /// Admin target (user, application) does not exist.
    ///
    /// Returns HTTP 404 Not Found.
    #[error("{0}")]
    NotFound(String),

    /// Admin create call for a name that is already taken.
    ///
    /// Returns HTTP 409 Conflict.
    #[error("{0}")]
    Conflict(String),

    /// Request body or parameters are invalid.
    ///
    /// Returns HTTP 400 Bad Request.
    #[error("Invalid request")]
    InvalidRequest(String),

    /// The caller's IP used up its request window.
    ///
    /// Returns HTTP 429 Too Many Requests.
    #[error("Rate limit exceeded")]
    RateLimited,
}

/// Convert AppError into an HTTP response.
///
/// # Response Format
///
/// All errors return JSON in this format:
/// ```json
/// {
///   "error": {
///     "code": "error_type",
///     "message": "Human-readable error message"
///   }
/// }
/// ```
///
/// # Status Code Mapping
///
/// - `ApiKeyRequired`, `InvalidApiKey` → 401 Unauthorized
/// - `Forbidden` → 403 Forbidden
/// - `NotFound` → 404 Not Found
/// - `Conflict` → 409 Conflict
/// - `InvalidRequest` → 400 Bad Request
/// - `RateLimited` → 429 Too Many Requests
/// - `Database` → 500 Internal Server Error (hides details from client)
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::ApiKeyRequired => (
                StatusCode::UNAUTHORIZED,
                "api_key_required",
                self.to_string(),
            ),
            AppError::InvalidApiKey => (
                StatusCode::UNAUTHORIZED,
                "invalid_api_key",
                self.to_string(),
            ),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "forbidden", self.to_string()),
            AppError::NotFound(ref msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            AppError::Conflict(ref msg) => (StatusCode::CONFLICT, "conflict", msg.clone()),
            AppError::InvalidRequest(ref msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", msg.clone())
            }
            AppError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limited",
                self.to_string(),
            ),
            AppError::Database(ref err) => {
                tracing::error!(error = %err, "Database error while handling request");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
