//! Authorization decision engine.
//!
//! Decides whether a user may access an application:
//!
//! 1. Normalize the email and build the cache key `"<email>:<app_name>"`
//! 2. Positive cache hit → authorized
//! 3. Negative cache hit → denied with the cached reason
//! 4. Otherwise run the authoritative check against the permission store
//! 5. Cache the verdict
//! 6. Write an access log entry (also on cache hits)
//!
//! Access and audit log writes are best-effort: a failed write is logged and
//! never changes the verdict. Store read failures are NOT denials; they are
//! returned as [`AppError::Database`] and never cached.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;

use crate::{
    error::AppError,
    models::{
        access_log::{NewAccessLog, NewAuditLog},
        application::UserApplication,
        user::normalize_email,
    },
    services::cache::{CachedDecision, Clock, DecisionCache, SystemClock, cache_key},
    store::PermissionStore,
};

/// Denial reason for a user that is missing or inactive.
pub const USER_NOT_AUTHORIZED: &str = "User not authorized";

/// Denial reason for a grant whose expiration has passed.
pub const AUTHORIZATION_EXPIRED: &str = "Authorization expired";

/// Tunables of the decision engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    pub caching_enabled: bool,

    /// Lifetime of cached grants
    pub positive_ttl: Duration,

    /// Lifetime of cached denials
    pub negative_ttl: Duration,

    /// Maximum entries per cache
    pub cache_capacity: usize,

    pub audit_enabled: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            caching_enabled: true,
            positive_ttl: Duration::from_secs(300),
            negative_ttl: Duration::from_secs(60),
            cache_capacity: 1000,
            audit_enabled: true,
        }
    }
}

/// Outcome of an authorization check.
///
/// A denial is a normal outcome and is rendered as `200 OK` by the HTTP layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorizationDecision {
    pub authorized: bool,

    pub denial_reason: Option<String>,
}

impl AuthorizationDecision {
    pub fn granted() -> Self {
        Self {
            authorized: true,
            denial_reason: None,
        }
    }

    pub fn denied(reason: impl Into<String>) -> Self {
        Self {
            authorized: false,
            denial_reason: Some(reason.into()),
        }
    }
}

/// Decides access for (user, application) pairs.
///
/// Each engine owns its own decision cache; engines never share cache state.
#[derive(Debug)]
pub struct AuthorizationEngine {
    store: Arc<dyn PermissionStore>,
    cache: Option<DecisionCache>,
    audit_enabled: bool,
}

impl AuthorizationEngine {
    pub fn new(store: Arc<dyn PermissionStore>, settings: EngineSettings) -> Self {
        Self::with_clock(store, settings, Arc::new(SystemClock))
    }

    /// Build an engine whose cache TTLs are measured with `clock`.
    pub fn with_clock(
        store: Arc<dyn PermissionStore>,
        settings: EngineSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let cache = settings.caching_enabled.then(|| {
            DecisionCache::new(
                settings.cache_capacity,
                settings.positive_ttl,
                settings.negative_ttl,
                clock,
            )
        });

        Self {
            store,
            cache,
            audit_enabled: settings.audit_enabled,
        }
    }

    pub fn caching_enabled(&self) -> bool {
        self.cache.is_some()
    }

    /// Check whether `email` may access `app_name`.
    ///
    /// `ip_address` and `user_agent` are only recorded in the access log.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Database`] if the authoritative check cannot read
    /// the permission store. Log write failures are not errors.
    pub async fn check_authorization(
        &self,
        email: &str,
        app_name: &str,
        ip_address: Option<&str>,
        user_agent: Option<&str>,
    ) -> Result<AuthorizationDecision, AppError> {
        let email = normalize_email(email);
        let key = cache_key(&email, app_name);

        if let Some(cache) = &self.cache {
            match cache.lookup(&key) {
                Some(CachedDecision::Granted) => {
                    tracing::debug!(cache_key = %key, "Cache hit");
                    let decision = AuthorizationDecision::granted();
                    self.log_access(&email, app_name, &decision, ip_address, user_agent)
                        .await;
                    return Ok(decision);
                }
                Some(CachedDecision::Denied(reason)) => {
                    tracing::debug!(cache_key = %key, "Negative cache hit");
                    let decision = AuthorizationDecision::denied(reason);
                    self.log_access(&email, app_name, &decision, ip_address, user_agent)
                        .await;
                    return Ok(decision);
                }
                None => {}
            }
        }

        let decision = self.perform_authorization_check(&email, app_name).await?;

        if let Some(cache) = &self.cache {
            match &decision.denial_reason {
                None => cache.store_granted(key),
                Some(reason) => cache.store_denied(key, reason.clone()),
            }
        }

        self.log_access(&email, app_name, &decision, ip_address, user_agent)
            .await;

        Ok(decision)
    }

    /// Authoritative check against the permission store.
    ///
    /// The check order fixes which reason is reported when several
    /// conditions fail at once: application, then user, then permission,
    /// then expiry.
    async fn perform_authorization_check(
        &self,
        email: &str,
        app_name: &str,
    ) -> Result<AuthorizationDecision, AppError> {
        let Some(application) = self.store.find_active_application(app_name).await? else {
            return Ok(AuthorizationDecision::denied(format!(
                "Application '{app_name}' not found or inactive"
            )));
        };

        let Some(user) = self.store.find_active_user(email).await? else {
            return Ok(AuthorizationDecision::denied(USER_NOT_AUTHORIZED));
        };

        let Some(permission) = self
            .store
            .find_active_permission(user.id, application.id)
            .await?
        else {
            return Ok(AuthorizationDecision::denied(format!(
                "User not authorized for application '{app_name}'"
            )));
        };

        if permission.is_expired_at(Utc::now()) {
            return Ok(AuthorizationDecision::denied(AUTHORIZATION_EXPIRED));
        }

        Ok(AuthorizationDecision::granted())
    }

    async fn log_access(
        &self,
        email: &str,
        app_name: &str,
        decision: &AuthorizationDecision,
        ip_address: Option<&str>,
        user_agent: Option<&str>,
    ) {
        let entry = NewAccessLog::new(
            email,
            app_name,
            decision.authorized,
            decision.denial_reason.as_deref(),
            ip_address,
            user_agent,
        );

        if let Err(err) = self.store.insert_access_log(entry).await {
            tracing::error!(error = %err, app_name = %app_name, "Failed to log access attempt");
        }
    }

    /// Applications `email` currently holds a usable grant for.
    ///
    /// Unknown or inactive users get an empty list.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Database`] if the store cannot be read.
    pub async fn get_user_applications(
        &self,
        email: &str,
    ) -> Result<Vec<UserApplication>, AppError> {
        let email = normalize_email(email);

        let Some(user) = self.store.find_active_user(&email).await? else {
            return Ok(Vec::new());
        };

        Ok(self.store.list_user_grants(user.id, Utc::now()).await?)
    }

    /// Drop cached verdicts.
    ///
    /// - email and app: that one pair
    /// - email only: every pair of that user
    /// - otherwise: everything
    pub fn clear_cache(&self, email: Option<&str>, app_name: Option<&str>) {
        let Some(cache) = &self.cache else {
            return;
        };

        match (email.map(normalize_email), app_name) {
            (Some(email), Some(app_name)) => {
                cache.remove(&cache_key(&email, app_name));
                tracing::info!(email = %email, app_name = %app_name, "Cleared cached decision");
            }
            (Some(email), None) => {
                let removed = cache.remove_prefix(&format!("{email}:"));
                tracing::info!(email = %email, removed, "Cleared cached decisions for user");
            }
            (None, _) => {
                cache.clear();
                tracing::info!("Cleared decision cache");
            }
        }
    }

    /// Record an administrative action in the audit log.
    ///
    /// No-op when audit logging is disabled. Write failures are logged and
    /// swallowed.
    pub async fn log_admin_action(
        &self,
        admin_email: &str,
        action: &str,
        target_email: Option<&str>,
        target_app: Option<&str>,
        details: Option<Value>,
        ip_address: Option<&str>,
    ) {
        if !self.audit_enabled {
            return;
        }

        let entry = NewAuditLog {
            admin_email: normalize_email(admin_email),
            action: action.to_string(),
            target_email: target_email.map(normalize_email),
            target_app: target_app.map(str::to_string),
            details,
            ip_address: ip_address.map(str::to_string),
        };

        if let Err(err) = self.store.insert_audit_log(entry).await {
            tracing::error!(error = %err, action = %action, "Failed to log admin action");
        }
    }

    #[cfg(test)]
    pub(crate) fn cache(&self) -> Option<&DecisionCache> {
        self.cache.as_ref()
    }
}
