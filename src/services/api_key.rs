//! API key verification for service-to-service calls.
//!
//! # Flow
//!
//! 1. Hash the presented key with SHA-256
//! 2. Look up an active key record by hash
//! 3. Reject expired keys
//! 4. Reject callers outside the key's IP allow-list, if it has one
//! 5. Record `last_used_at` and accept
//!
//! Every rejection is a plain `false`. The raw key never reaches a log line;
//! only the caller IP and the key's display name do.

use std::sync::Arc;

use chrono::Utc;
use sha2::{Digest, Sha256};

use crate::{
    error::AppError, models::api_key::ApiKey, services::ip_allowlist::ip_allowed,
    store::PermissionStore,
};

/// SHA-256 hex digest of a raw API key, as stored in `auth_api_keys.key_hash`.
pub fn hash_api_key(raw_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw_key.as_bytes());

    hex::encode(hasher.finalize())
}

/// Verifies presented API keys against the permission store.
#[derive(Debug, Clone)]
pub struct ApiKeyVerifier {
    store: Arc<dyn PermissionStore>,
}

impl ApiKeyVerifier {
    pub fn new(store: Arc<dyn PermissionStore>) -> Self {
        Self { store }
    }

    /// Return the key record if `raw_key` is valid for a call from `ip_address`.
    ///
    /// # Errors
    ///
    /// Fails only if the key lookup itself fails. A store outage is reported
    /// as an error rather than as an invalid key.
    pub async fn authenticate(
        &self,
        raw_key: &str,
        ip_address: Option<&str>,
    ) -> Result<Option<ApiKey>, AppError> {
        let key_hash = hash_api_key(raw_key);

        let Some(record) = self.store.find_active_api_key(&key_hash).await? else {
            tracing::warn!(ip_address = ?ip_address, "Invalid API key attempt");
            return Ok(None);
        };

        let now = Utc::now();
        if record.expires_at.is_some_and(|expires_at| expires_at < now) {
            tracing::warn!(key_name = %record.name, "Expired API key used");
            return Ok(None);
        }

        if let Some(ip) = ip_address {
            if !record.allowed_ips.is_empty() && !ip_allowed(ip, &record.allowed_ips) {
                tracing::warn!(
                    key_name = %record.name,
                    ip_address = %ip,
                    "API key used from unauthorized IP"
                );
                return Ok(None);
            }
        }

        // Best-effort: a failed timestamp write does not reject a valid key
        if let Err(err) = self.store.touch_api_key(record.id, now).await {
            tracing::warn!(key_name = %record.name, error = %err, "Failed to update API key last_used_at");
        }

        Ok(Some(record))
    }

    /// Whether `raw_key` is valid for a call from `ip_address`.
    ///
    /// # Errors
    ///
    /// See [`ApiKeyVerifier::authenticate`].
    pub async fn verify_api_key(
        &self,
        raw_key: &str,
        ip_address: Option<&str>,
    ) -> Result<bool, AppError> {
        Ok(self.authenticate(raw_key, ip_address).await?.is_some())
    }
}
