//! Business logic services.
//!
//! Services contain the decision core separated from HTTP handlers. They
//! reach the database only through the store traits.

/// Admin mutations and their audit trail
pub mod admin;
/// API key hashing and verification
pub mod api_key;
/// Authorization decision engine
pub mod authorization;
/// TTL decision cache
pub mod cache;
/// CIDR allow-list matching
pub mod ip_allowlist;
/// Per-client request limiting
pub mod rate_limit;
