//! PostgreSQL implementation of the store traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use uuid::Uuid;

use crate::{
    db::DbPool,
    models::{
        access_log::{
            AccessLogEntry, AccessLogQuery, AuditLogEntry, AuditLogQuery, NewAccessLog,
            NewAuditLog,
        },
        api_key::{ApiKey, NewApiKey},
        application::{
            Application, ApplicationSummary, CreateApplicationRequest, ListApplicationsQuery,
            UserApplication,
        },
        page::LogPage,
        permission::Permission,
        user::{CreateUserRequest, ListUsersQuery, UpdateUserRequest, User, UserSummary},
    },
    store::{AdminStore, PermissionStore},
};

const USER_COLUMNS: &str = "id, email, full_name, password_hash, is_active, is_admin, created_by, notes, created_at, updated_at";

const APPLICATION_COLUMNS: &str =
    "id, app_name, display_name, description, callback_urls, is_active, created_at, updated_at";

const PERMISSION_COLUMNS: &str =
    "id, user_id, app_id, granted_at, granted_by, expires_at, is_active, notes";

const API_KEY_COLUMNS: &str = "id, key_hash, name, description, is_active, is_admin, created_by, created_at, last_used_at, expires_at, allowed_ips";

// A NULL parameter disables its filter, so each query has one static text.
const ACCESS_LOG_FILTER: &str = "WHERE ($1::TEXT IS NULL OR email = $1)
      AND ($2::TEXT IS NULL OR app_name = $2)
      AND ($3::BOOLEAN IS NULL OR access_granted = $3)
      AND ($4::TIMESTAMPTZ IS NULL OR access_time >= $4)
      AND ($5::TIMESTAMPTZ IS NULL OR access_time <= $5)";

const AUDIT_LOG_FILTER: &str = "WHERE ($1::TEXT IS NULL OR admin_email = $1)
      AND ($2::TEXT IS NULL OR action = $2)
      AND ($3::TIMESTAMPTZ IS NULL OR action_time >= $3)
      AND ($4::TIMESTAMPTZ IS NULL OR action_time <= $4)";

/// Store backed by a shared connection pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PermissionStore for PgStore {
    async fn find_active_application(
        &self,
        app_name: &str,
    ) -> Result<Option<Application>, sqlx::Error> {
        sqlx::query_as::<_, Application>(&format!(
            "SELECT {APPLICATION_COLUMNS} FROM auth_applications WHERE app_name = $1 AND is_active = true"
        ))
        .bind(app_name)
        .fetch_optional(&self.pool)
        .await
    }

    async fn find_active_user(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM auth_users WHERE email = $1 AND is_active = true"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
    }

    async fn find_active_permission(
        &self,
        user_id: Uuid,
        app_id: Uuid,
    ) -> Result<Option<Permission>, sqlx::Error> {
        sqlx::query_as::<_, Permission>(&format!(
            "SELECT {PERMISSION_COLUMNS} FROM auth_user_app_permissions
             WHERE user_id = $1 AND app_id = $2 AND is_active = true"
        ))
        .bind(user_id)
        .bind(app_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn list_user_grants(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<UserApplication>, sqlx::Error> {
        sqlx::query_as::<_, UserApplication>(
            r#"
            SELECT a.app_name, a.display_name, a.description, p.granted_at, p.expires_at
            FROM auth_user_app_permissions p
            JOIN auth_applications a ON a.id = p.app_id
            JOIN auth_users u ON u.id = p.user_id
            WHERE p.user_id = $1
              AND p.is_active = true
              AND a.is_active = true
              AND u.is_active = true
              AND (p.expires_at IS NULL OR p.expires_at > $2)
            ORDER BY a.app_name
            "#,
        )
        .bind(user_id)
        .bind(now)
        .fetch_all(&self.pool)
        .await
    }

    async fn insert_access_log(&self, entry: NewAccessLog) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO auth_access_logs (
                email, app_id, app_name, access_granted, denial_reason, ip_address, user_agent
            )
            VALUES (
                $1,
                (SELECT id FROM auth_applications WHERE app_name = $2),
                $2, $3, $4, $5, $6
            )
            "#,
        )
        .bind(entry.email)
        .bind(entry.app_name)
        .bind(entry.access_granted)
        .bind(entry.denial_reason)
        .bind(entry.ip_address)
        .bind(entry.user_agent)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn insert_audit_log(&self, entry: NewAuditLog) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO auth_audit_logs (
                admin_email, action, target_email, target_app, details, ip_address
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(entry.admin_email)
        .bind(entry.action)
        .bind(entry.target_email)
        .bind(entry.target_app)
        .bind(entry.details.map(Json))
        .bind(entry.ip_address)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_active_api_key(&self, key_hash: &str) -> Result<Option<ApiKey>, sqlx::Error> {
        sqlx::query_as::<_, ApiKey>(&format!(
            "SELECT {API_KEY_COLUMNS} FROM auth_api_keys WHERE key_hash = $1 AND is_active = true"
        ))
        .bind(key_hash)
        .fetch_optional(&self.pool)
        .await
    }

    async fn touch_api_key(&self, id: Uuid, used_at: DateTime<Utc>) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE auth_api_keys SET last_used_at = $1 WHERE id = $2")
            .bind(used_at)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;

        Ok(())
    }
}

#[async_trait]
impl AdminStore for PgStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM auth_users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
    }

    async fn find_application_by_name(
        &self,
        app_name: &str,
    ) -> Result<Option<Application>, sqlx::Error> {
        sqlx::query_as::<_, Application>(&format!(
            "SELECT {APPLICATION_COLUMNS} FROM auth_applications WHERE app_name = $1"
        ))
        .bind(app_name)
        .fetch_optional(&self.pool)
        .await
    }

    async fn insert_user(
        &self,
        request: CreateUserRequest,
        created_by: String,
    ) -> Result<User, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO auth_users (email, full_name, is_admin, created_by, notes)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(request.email)
        .bind(request.full_name)
        .bind(request.is_admin)
        .bind(created_by)
        .bind(request.notes)
        .fetch_one(&self.pool)
        .await
    }

    async fn update_user(
        &self,
        email: &str,
        changes: UpdateUserRequest,
    ) -> Result<Option<User>, sqlx::Error> {
        // COALESCE keeps the stored value for every absent field
        sqlx::query_as::<_, User>(&format!(
            "UPDATE auth_users
             SET full_name = COALESCE($2, full_name),
                 is_active = COALESCE($3, is_active),
                 is_admin = COALESCE($4, is_admin),
                 notes = COALESCE($5, notes),
                 updated_at = NOW()
             WHERE email = $1
             RETURNING {USER_COLUMNS}"
        ))
        .bind(email)
        .bind(changes.full_name)
        .bind(changes.is_active)
        .bind(changes.is_admin)
        .bind(changes.notes)
        .fetch_optional(&self.pool)
        .await
    }

    async fn insert_application(
        &self,
        request: CreateApplicationRequest,
    ) -> Result<Application, sqlx::Error> {
        sqlx::query_as::<_, Application>(&format!(
            "INSERT INTO auth_applications (app_name, display_name, description, callback_urls)
             VALUES ($1, $2, $3, $4)
             RETURNING {APPLICATION_COLUMNS}"
        ))
        .bind(request.app_name)
        .bind(request.display_name)
        .bind(request.description)
        .bind(Json(request.callback_urls))
        .fetch_one(&self.pool)
        .await
    }

    async fn upsert_permission(
        &self,
        user_id: Uuid,
        app_id: Uuid,
        granted_by: Option<Uuid>,
        expires_at: Option<DateTime<Utc>>,
        notes: Option<String>,
    ) -> Result<Permission, sqlx::Error> {
        sqlx::query_as::<_, Permission>(&format!(
            "INSERT INTO auth_user_app_permissions (user_id, app_id, granted_by, expires_at, notes)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (user_id, app_id) DO UPDATE
             SET is_active = true,
                 granted_at = NOW(),
                 granted_by = EXCLUDED.granted_by,
                 expires_at = EXCLUDED.expires_at,
                 notes = EXCLUDED.notes
             RETURNING {PERMISSION_COLUMNS}"
        ))
        .bind(user_id)
        .bind(app_id)
        .bind(granted_by)
        .bind(expires_at)
        .bind(notes)
        .fetch_one(&self.pool)
        .await
    }

    async fn deactivate_permission(&self, user_id: Uuid, app_id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE auth_user_app_permissions SET is_active = false
             WHERE user_id = $1 AND app_id = $2 AND is_active = true",
        )
        .bind(user_id)
        .bind(app_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn insert_api_key(&self, key: NewApiKey) -> Result<ApiKey, sqlx::Error> {
        sqlx::query_as::<_, ApiKey>(&format!(
            "INSERT INTO auth_api_keys (key_hash, name, description, is_admin, created_by, expires_at, allowed_ips)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {API_KEY_COLUMNS}"
        ))
        .bind(key.key_hash)
        .bind(key.name)
        .bind(key.description)
        .bind(key.is_admin)
        .bind(key.created_by)
        .bind(key.expires_at)
        .bind(Json(key.allowed_ips))
        .fetch_one(&self.pool)
        .await
    }

    async fn list_users(&self, query: ListUsersQuery) -> Result<Vec<UserSummary>, sqlx::Error> {
        let page = query.page();

        sqlx::query_as::<_, UserSummary>(
            r#"
            SELECT u.id, u.email, u.full_name, u.is_active, u.is_admin, u.created_at, u.created_by,
                   (SELECT COUNT(*) FROM auth_user_app_permissions p
                    WHERE p.user_id = u.id AND p.is_active = true) AS permissions_count
            FROM auth_users u
            WHERE ($1::BOOLEAN IS NULL OR u.is_active = $1)
              AND ($2::BOOLEAN IS NULL OR u.is_admin = $2)
            ORDER BY u.email
            OFFSET $3 LIMIT $4
            "#,
        )
        .bind(query.is_active)
        .bind(query.is_admin)
        .bind(page.offset)
        .bind(page.limit)
        .fetch_all(&self.pool)
        .await
    }

    async fn list_applications(
        &self,
        query: ListApplicationsQuery,
    ) -> Result<Vec<ApplicationSummary>, sqlx::Error> {
        let page = query.page();

        sqlx::query_as::<_, ApplicationSummary>(
            r#"
            SELECT a.id, a.app_name, a.display_name, a.description, a.is_active, a.created_at,
                   (SELECT COUNT(*) FROM auth_user_app_permissions p
                    WHERE p.app_id = a.id AND p.is_active = true) AS users_count
            FROM auth_applications a
            WHERE ($1::BOOLEAN IS NULL OR a.is_active = $1)
            ORDER BY a.app_name
            OFFSET $2 LIMIT $3
            "#,
        )
        .bind(query.is_active)
        .bind(page.offset)
        .bind(page.limit)
        .fetch_all(&self.pool)
        .await
    }

    async fn query_access_logs(
        &self,
        query: AccessLogQuery,
    ) -> Result<LogPage<AccessLogEntry>, sqlx::Error> {
        let page = query.page();

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM auth_access_logs {ACCESS_LOG_FILTER}"
        ))
        .bind(query.email.as_deref())
        .bind(query.app_name.as_deref())
        .bind(query.access_granted)
        .bind(query.start_time)
        .bind(query.end_time)
        .fetch_one(&self.pool)
        .await?;

        let logs = sqlx::query_as::<_, AccessLogEntry>(&format!(
            "SELECT email, app_name, access_time, access_granted, denial_reason, ip_address
             FROM auth_access_logs {ACCESS_LOG_FILTER}
             ORDER BY access_time DESC
             OFFSET $6 LIMIT $7"
        ))
        .bind(query.email.as_deref())
        .bind(query.app_name.as_deref())
        .bind(query.access_granted)
        .bind(query.start_time)
        .bind(query.end_time)
        .bind(page.offset)
        .bind(page.limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(LogPage { total, logs })
    }

    async fn query_audit_logs(
        &self,
        query: AuditLogQuery,
    ) -> Result<LogPage<AuditLogEntry>, sqlx::Error> {
        let page = query.page();

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM auth_audit_logs {AUDIT_LOG_FILTER}"
        ))
        .bind(query.admin_email.as_deref())
        .bind(query.action.as_deref())
        .bind(query.start_time)
        .bind(query.end_time)
        .fetch_one(&self.pool)
        .await?;

        let logs = sqlx::query_as::<_, AuditLogEntry>(&format!(
            "SELECT admin_email, action, target_email, target_app, action_time, details, ip_address
             FROM auth_audit_logs {AUDIT_LOG_FILTER}
             ORDER BY action_time DESC
             OFFSET $5 LIMIT $6"
        ))
        .bind(query.admin_email.as_deref())
        .bind(query.action.as_deref())
        .bind(query.start_time)
        .bind(query.end_time)
        .bind(page.offset)
        .bind(page.limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(LogPage { total, logs })
    }
}
