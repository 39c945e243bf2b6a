//! HTTP middleware components.
//!
//! Middleware are functions that run before route handlers.
//! They can:
//! - Authenticate requests
//! - Reject under-privileged callers
//! - Short-circuit requests (reject unauthorized or over-limit)

/// API key authentication middleware
pub mod auth;
/// Per-IP rate limiting
pub mod rate_limit;
