//! Admin operations on users, applications, grants and API keys.
//!
//! Every successful mutation writes an audit entry through the decision
//! engine. User updates, grants and revokes also drop the affected cached
//! verdicts so the next check reads the store.
//!
//! Listings and log queries are read-only and are not audited.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;

use crate::{
    error::AppError,
    models::{
        access_log::{AccessLogEntry, AccessLogQuery, AuditLogEntry, AuditLogQuery},
        api_key::{CreateApiKeyRequest, CreatedApiKeyResponse, NewApiKey},
        application::{
            Application, ApplicationSummary, CreateApplicationRequest, ListApplicationsQuery,
        },
        page::LogPage,
        permission::{GrantPermissionRequest, Permission, RevokePermissionRequest},
        user::{
            CreateUserRequest, ListUsersQuery, UpdateUserRequest, User, UserSummary,
            normalize_email,
        },
    },
    services::{api_key::hash_api_key, authorization::AuthorizationEngine, ip_allowlist::AllowEntry},
    store::AdminStore,
};

/// Identity of the caller performing an admin action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminContext {
    /// Recorded as `admin_email` in the audit log
    pub actor: String,

    pub ip_address: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AdminService {
    store: Arc<dyn AdminStore>,
    engine: Arc<AuthorizationEngine>,
}

impl AdminService {
    pub fn new(store: Arc<dyn AdminStore>, engine: Arc<AuthorizationEngine>) -> Self {
        Self { store, engine }
    }

    /// Register a new user.
    ///
    /// # Errors
    ///
    /// - `InvalidRequest`: email is empty or has no `@`
    /// - `Conflict`: a user with this email already exists
    pub async fn create_user(
        &self,
        admin: &AdminContext,
        mut request: CreateUserRequest,
    ) -> Result<User, AppError> {
        request.email = normalize_email(&request.email);
        validate_email(&request.email)?;

        if self.store.find_user_by_email(&request.email).await?.is_some() {
            return Err(AppError::Conflict("User already exists".to_string()));
        }

        let is_admin = request.is_admin;
        let user = self.store.insert_user(request, admin.actor.clone()).await?;

        self.audit(admin, "create_user", Some(&user.email), None, json!({ "is_admin": is_admin }))
            .await;

        Ok(user)
    }

    /// Update a user's profile or flags.
    ///
    /// # Errors
    ///
    /// - `NotFound`: no user with this email
    pub async fn update_user(
        &self,
        admin: &AdminContext,
        email: &str,
        changes: UpdateUserRequest,
    ) -> Result<User, AppError> {
        let email = normalize_email(email);
        let details = serde_json::to_value(&changes).unwrap_or_default();

        let user = self
            .store
            .update_user(&email, changes)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        self.engine.clear_cache(Some(&email), None);
        self.audit(admin, "update_user", Some(&email), None, details).await;

        Ok(user)
    }

    /// Register a new application.
    ///
    /// # Errors
    ///
    /// - `InvalidRequest`: empty name or an invalid callback URL
    /// - `Conflict`: an application with this name already exists
    pub async fn create_application(
        &self,
        admin: &AdminContext,
        request: CreateApplicationRequest,
    ) -> Result<Application, AppError> {
        if request.app_name.trim().is_empty() {
            return Err(AppError::InvalidRequest(
                "app_name must not be empty".to_string(),
            ));
        }
        for callback_url in &request.callback_urls {
            validate_callback_url(callback_url)?;
        }

        if self
            .store
            .find_application_by_name(&request.app_name)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict("Application already exists".to_string()));
        }

        let application = self.store.insert_application(request).await?;

        self.audit(
            admin,
            "create_application",
            None,
            Some(&application.app_name),
            json!({ "display_name": application.display_name }),
        )
        .await;

        Ok(application)
    }

    /// Grant (or re-grant) a user access to an application.
    ///
    /// # Errors
    ///
    /// - `NotFound`: user or application missing or inactive
    pub async fn grant_permission(
        &self,
        admin: &AdminContext,
        request: GrantPermissionRequest,
    ) -> Result<Permission, AppError> {
        let email = normalize_email(&request.user_email);

        let user = self
            .store
            .find_user_by_email(&email)
            .await?
            .filter(|user| user.is_active)
            .ok_or_else(|| AppError::NotFound("User not found or inactive".to_string()))?;

        let application = self
            .store
            .find_application_by_name(&request.app_name)
            .await?
            .filter(|app| app.is_active)
            .ok_or_else(|| AppError::NotFound("Application not found or inactive".to_string()))?;

        let granted_by = self
            .store
            .find_user_by_email(&normalize_email(&admin.actor))
            .await?
            .map(|admin_user| admin_user.id);

        let permission = self
            .store
            .upsert_permission(
                user.id,
                application.id,
                granted_by,
                request.expires_at,
                request.notes,
            )
            .await?;

        self.engine
            .clear_cache(Some(&email), Some(&application.app_name));
        self.audit(
            admin,
            "grant_permission",
            Some(&email),
            Some(&application.app_name),
            json!({ "expires_at": request.expires_at }),
        )
        .await;

        Ok(permission)
    }

    /// Soft-revoke a user's grant for an application.
    ///
    /// Revoking a grant that does not exist (or is already inactive) succeeds.
    ///
    /// # Errors
    ///
    /// - `NotFound`: user or application missing
    pub async fn revoke_permission(
        &self,
        admin: &AdminContext,
        request: RevokePermissionRequest,
    ) -> Result<u64, AppError> {
        let email = normalize_email(&request.user_email);

        let user = self.store.find_user_by_email(&email).await?;
        let application = self
            .store
            .find_application_by_name(&request.app_name)
            .await?;
        let (Some(user), Some(application)) = (user, application) else {
            return Err(AppError::NotFound(
                "User or application not found".to_string(),
            ));
        };

        let revoked = self
            .store
            .deactivate_permission(user.id, application.id)
            .await?;
        self.engine.clear_cache(Some(&email), Some(&request.app_name));

        self.audit(
            admin,
            "revoke_permission",
            Some(&email),
            Some(&request.app_name),
            json!({ "revoked": revoked }),
        )
        .await;

        Ok(revoked)
    }

    /// Mint a new API key. The raw key is only ever returned here.
    ///
    /// # Errors
    ///
    /// - `InvalidRequest`: empty name or a malformed allow-list entry
    pub async fn create_api_key(
        &self,
        admin: &AdminContext,
        request: CreateApiKeyRequest,
    ) -> Result<CreatedApiKeyResponse, AppError> {
        if request.name.trim().is_empty() {
            return Err(AppError::InvalidRequest("name must not be empty".to_string()));
        }
        for entry in &request.allowed_ips {
            AllowEntry::parse(entry).map_err(AppError::InvalidRequest)?;
        }

        let raw_key = generate_api_key();
        let record = self
            .store
            .insert_api_key(NewApiKey {
                key_hash: hash_api_key(&raw_key),
                name: request.name,
                description: request.description,
                is_admin: request.is_admin,
                created_by: admin.actor.clone(),
                expires_at: request.expires_at,
                allowed_ips: request.allowed_ips,
            })
            .await?;

        self.audit(
            admin,
            "create_api_key",
            None,
            None,
            json!({ "name": record.name, "is_admin": record.is_admin }),
        )
        .await;

        Ok(CreatedApiKeyResponse {
            id: record.id,
            name: record.name,
            api_key: raw_key,
            is_admin: record.is_admin,
            expires_at: record.expires_at,
            allowed_ips: record.allowed_ips.0,
        })
    }

    pub async fn list_users(&self, query: ListUsersQuery) -> Result<Vec<UserSummary>, AppError> {
        Ok(self.store.list_users(query).await?)
    }

    pub async fn list_applications(
        &self,
        query: ListApplicationsQuery,
    ) -> Result<Vec<ApplicationSummary>, AppError> {
        Ok(self.store.list_applications(query).await?)
    }

    /// One page of the access log, newest first.
    ///
    /// # Errors
    ///
    /// - `InvalidRequest`: `start_time` is after `end_time`
    pub async fn access_logs(
        &self,
        mut query: AccessLogQuery,
    ) -> Result<LogPage<AccessLogEntry>, AppError> {
        validate_time_range(query.start_time, query.end_time)?;
        query.email = query.email.as_deref().map(normalize_email);

        Ok(self.store.query_access_logs(query).await?)
    }

    /// One page of the audit log, newest first.
    ///
    /// # Errors
    ///
    /// - `InvalidRequest`: `start_time` is after `end_time`
    pub async fn audit_logs(
        &self,
        mut query: AuditLogQuery,
    ) -> Result<LogPage<AuditLogEntry>, AppError> {
        validate_time_range(query.start_time, query.end_time)?;
        query.admin_email = query.admin_email.as_deref().map(normalize_email);

        Ok(self.store.query_audit_logs(query).await?)
    }

    async fn audit(
        &self,
        admin: &AdminContext,
        action: &str,
        target_email: Option<&str>,
        target_app: Option<&str>,
        details: serde_json::Value,
    ) {
        self.engine
            .log_admin_action(
                &admin.actor,
                action,
                target_email,
                target_app,
                Some(details),
                admin.ip_address.as_deref(),
            )
            .await;
    }
}

/// 32 random bytes, hex-encoded.
fn generate_api_key() -> String {
    let bytes: [u8; 32] = rand::random();
    hex::encode(bytes)
}

fn validate_email(email: &str) -> Result<(), AppError> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(AppError::InvalidRequest("Invalid email address".to_string())),
    }
}

fn validate_time_range(
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> Result<(), AppError> {
    match (start, end) {
        (Some(start), Some(end)) if start > end => Err(AppError::InvalidRequest(
            "start_time must not be after end_time".to_string(),
        )),
        _ => Ok(()),
    }
}

/// Callback URLs must parse, use HTTP or HTTPS, and fit in 2048 characters.
fn validate_callback_url(callback_url: &str) -> Result<(), AppError> {
    if callback_url.len() > 2048 {
        return Err(AppError::InvalidRequest(
            "Callback URL exceeds 2048 characters".to_string(),
        ));
    }

    let parsed = url::Url::parse(callback_url).map_err(|_| {
        AppError::InvalidRequest(format!("Invalid callback URL: {callback_url}"))
    })?;

    match parsed.scheme() {
        "https" | "http" => Ok(()),
        _ => Err(AppError::InvalidRequest(
            "Callback URL must use HTTP or HTTPS".to_string(),
        )),
    }
}
