//! Application data models.
//!
//! An application is a protected resource that users are granted access to.
//! Only active applications are eligible for authorization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;

use crate::models::page::Page;

/// Represents an application record from the database.
///
/// # Database Table
///
/// Maps to the `auth_applications` table. `app_name` is unique and is the
/// name callers pass to the authorization check.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Application {
    pub id: Uuid,

    /// Unique machine name used in authorization checks
    pub app_name: String,

    /// Human-readable name
    pub display_name: String,

    pub description: Option<String>,

    /// Allowed SSO callback URLs (JSONB array)
    pub callback_urls: Json<Vec<String>>,

    /// Deactivated applications deny every user
    pub is_active: bool,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Request body for registering an application.
///
/// # JSON Example
///
/// ```json
/// {
///   "app_name": "billing",
///   "display_name": "Billing Portal",
///   "callback_urls": ["https://billing.co.com/callback"]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CreateApplicationRequest {
    pub app_name: String,

    pub display_name: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub callback_urls: Vec<String>,
}

/// One entry of a user's application listing.
///
/// Only grants that are currently usable are ever turned into this type.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize)]
pub struct UserApplication {
    pub app_name: String,

    pub display_name: String,

    pub description: Option<String>,

    pub granted_at: DateTime<Utc>,

    /// `None` for grants that never expire
    pub expires_at: Option<DateTime<Utc>>,
}

/// Row of the admin application listing.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct ApplicationSummary {
    pub id: Uuid,
    pub app_name: String,
    pub display_name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,

    /// Users holding an active grant for this application
    pub users_count: i64,
}

/// Query string of `GET /api/v1/admin/applications`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ListApplicationsQuery {
    pub is_active: Option<bool>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

impl ListApplicationsQuery {
    pub fn page(&self) -> Page {
        Page::new(self.skip, self.limit)
    }
}
