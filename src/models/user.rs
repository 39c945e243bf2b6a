//! User data models and admin request types.
//!
//! Users are identified by their lower-cased email address. They are never
//! deleted; revoking a user sets `is_active = false`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::page::Page;

/// Represents a user record from the database.
///
/// # Database Table
///
/// Maps to the `auth_users` table. The `email` column is unique and stored
/// lower-cased, so lookups must normalize with [`normalize_email`] first.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct User {
    /// Unique identifier for this user
    pub id: Uuid,

    /// Lower-cased email address (natural key)
    pub email: String,

    /// Optional display name
    pub full_name: Option<String>,

    /// Password credential, managed by the login flow
    ///
    /// Never serialized into API responses.
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,

    /// Inactive users are denied every authorization check
    pub is_active: bool,

    /// Whether this user may manage other users
    pub is_admin: bool,

    /// Identity of the admin (or bootstrap process) that created the user
    pub created_by: String,

    /// Free-form admin notes
    pub notes: Option<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Normalize an email address for storage, lookup and cache keys.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Request body for creating a user.
///
/// # JSON Example
///
/// ```json
/// {
///   "email": "alice@co.com",
///   "full_name": "Alice",
///   "is_admin": false
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,

    #[serde(default)]
    pub full_name: Option<String>,

    #[serde(default)]
    pub is_admin: bool,

    #[serde(default)]
    pub notes: Option<String>,
}

/// Request body for updating a user. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub full_name: Option<String>,

    #[serde(default)]
    pub is_active: Option<bool>,

    #[serde(default)]
    pub is_admin: Option<bool>,

    #[serde(default)]
    pub notes: Option<String>,
}

/// Row of the admin user listing.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub is_active: bool,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub created_by: String,

    /// Active grants held by this user, expired ones included
    pub permissions_count: i64,
}

/// Query string of `GET /api/v1/admin/users`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ListUsersQuery {
    pub is_active: Option<bool>,
    pub is_admin: Option<bool>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

impl ListUsersQuery {
    pub fn page(&self) -> Page {
        Page::new(self.skip, self.limit)
    }
}
