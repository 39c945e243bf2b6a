//! Permission store seam.
//!
//! The decision engine and the API key verifier only ever talk to the
//! database through [`PermissionStore`]; admin mutations go through
//! [`AdminStore`]. [`postgres::PgStore`] implements both.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
#[cfg(test)]
use mockall::automock;
use uuid::Uuid;

use crate::models::{
    access_log::{AccessLogEntry, AccessLogQuery, AuditLogEntry, AuditLogQuery, NewAccessLog, NewAuditLog},
    api_key::{ApiKey, NewApiKey},
    application::{
        Application, ApplicationSummary, CreateApplicationRequest, ListApplicationsQuery,
        UserApplication,
    },
    page::LogPage,
    permission::Permission,
    user::{CreateUserRequest, ListUsersQuery, UpdateUserRequest, User, UserSummary},
};

pub mod postgres;

#[cfg(test)]
pub mod memory;

/// Read access to users, applications and grants, plus the two write paths
/// the decision core owns (log inserts and API key `last_used_at`).
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PermissionStore: Send + Sync {
    /// Active application with this exact name.
    async fn find_active_application(
        &self,
        app_name: &str,
    ) -> Result<Option<Application>, sqlx::Error>;

    /// Active user with this (already normalized) email.
    async fn find_active_user(&self, email: &str) -> Result<Option<User>, sqlx::Error>;

    /// Active permission row linking the user to the application.
    ///
    /// Expiry is not filtered here so the engine can report it distinctly.
    async fn find_active_permission(
        &self,
        user_id: Uuid,
        app_id: Uuid,
    ) -> Result<Option<Permission>, sqlx::Error>;

    /// Currently usable grants of a user against active applications.
    async fn list_user_grants(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<UserApplication>, sqlx::Error>;

    async fn insert_access_log(&self, entry: NewAccessLog) -> Result<(), sqlx::Error>;

    async fn insert_audit_log(&self, entry: NewAuditLog) -> Result<(), sqlx::Error>;

    /// Active API key with this SHA-256 hex digest.
    async fn find_active_api_key(&self, key_hash: &str) -> Result<Option<ApiKey>, sqlx::Error>;

    async fn touch_api_key(&self, id: Uuid, used_at: DateTime<Utc>) -> Result<(), sqlx::Error>;

    /// Round-trip to the database for health reporting.
    async fn ping(&self) -> Result<(), sqlx::Error>;
}

impl std::fmt::Debug for dyn PermissionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PermissionStore")
    }
}

/// Admin mutations of users, applications, grants and API keys, plus the
/// admin listings and log queries.
///
/// Lookups here ignore the `is_active` flag; callers decide what an inactive
/// target means for their operation.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AdminStore: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error>;

    async fn find_application_by_name(
        &self,
        app_name: &str,
    ) -> Result<Option<Application>, sqlx::Error>;

    /// Insert a user. `request.email` must already be normalized.
    async fn insert_user(
        &self,
        request: CreateUserRequest,
        created_by: String,
    ) -> Result<User, sqlx::Error>;

    /// Apply the present fields of `changes`; `None` if no such user.
    async fn update_user(
        &self,
        email: &str,
        changes: UpdateUserRequest,
    ) -> Result<Option<User>, sqlx::Error>;

    async fn insert_application(
        &self,
        request: CreateApplicationRequest,
    ) -> Result<Application, sqlx::Error>;

    /// Insert the grant, or re-activate and refresh an existing one.
    async fn upsert_permission(
        &self,
        user_id: Uuid,
        app_id: Uuid,
        granted_by: Option<Uuid>,
        expires_at: Option<DateTime<Utc>>,
        notes: Option<String>,
    ) -> Result<Permission, sqlx::Error>;

    /// Soft-revoke; returns the number of rows changed.
    async fn deactivate_permission(&self, user_id: Uuid, app_id: Uuid) -> Result<u64, sqlx::Error>;

    async fn insert_api_key(&self, key: NewApiKey) -> Result<ApiKey, sqlx::Error>;

    /// Users ordered by email, each with its active grant count.
    async fn list_users(&self, query: ListUsersQuery) -> Result<Vec<UserSummary>, sqlx::Error>;

    /// Applications ordered by name, each with its active grant count.
    async fn list_applications(
        &self,
        query: ListApplicationsQuery,
    ) -> Result<Vec<ApplicationSummary>, sqlx::Error>;

    /// Matching access log rows, newest first. `email` is already normalized.
    async fn query_access_logs(
        &self,
        query: AccessLogQuery,
    ) -> Result<LogPage<AccessLogEntry>, sqlx::Error>;

    /// Matching audit log rows, newest first. `admin_email` is already normalized.
    async fn query_audit_logs(
        &self,
        query: AuditLogQuery,
    ) -> Result<LogPage<AuditLogEntry>, sqlx::Error>;
}

impl std::fmt::Debug for dyn AdminStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AdminStore")
    }
}
