//! Data models representing database entities.
//!
//! This module contains all data structures that map to database tables,
//! plus the request/response bodies of the admin API.

/// Access and audit log records
pub mod access_log;
/// API key authentication model
pub mod api_key;
/// Protected application model
pub mod application;
/// Pagination for admin listings
pub mod page;
/// User-to-application grant model
pub mod permission;
/// Authorized user model
pub mod user;
