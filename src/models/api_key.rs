//! API Key model for service-to-service authentication.
//!
//! API keys are stored in the database as SHA-256 hashes. The raw key is shown
//! once at creation time and never persisted or logged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;

/// Represents an API key record from the database.
///
/// # Database Table
///
/// Maps to the `auth_api_keys` table with columns:
/// - `key_hash`: SHA-256 hex digest of the actual API key
/// - `name`: Display name, safe to log
/// - `is_active` / `expires_at`: Revocation and natural expiry
/// - `allowed_ips`: JSONB array of addresses or CIDR networks
/// - `last_used_at`: Refreshed on every successful verification
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ApiKey {
    /// Unique identifier for this API key
    pub id: Uuid,

    /// SHA-256 hash of the actual API key (64 hex characters)
    ///
    /// When a request comes in with `X-API-Key: abc123`, we:
    /// 1. Hash "abc123" with SHA-256
    /// 2. Look up this hash in the database
    /// 3. If found and active, continue with expiry and IP checks
    pub key_hash: String,

    /// Human-readable name of the service using this API key
    pub name: String,

    pub description: Option<String>,

    /// Whether this API key is currently active
    ///
    /// Inactive keys are rejected during authentication. This provides a way to revoke access without deleting the record.
    pub is_active: bool,

    /// Admin keys may call the `/admin` routes
    pub is_admin: bool,

    pub created_by: String,

    /// Timestamp when this API key was created
    pub created_at: DateTime<Utc>,

    pub last_used_at: Option<DateTime<Utc>>,

    pub expires_at: Option<DateTime<Utc>>,

    /// Allowed caller addresses; empty means unrestricted
    pub allowed_ips: Json<Vec<String>>,
}

/// Request body for creating an API key.
///
/// # JSON Example
///
/// ```json
/// {
///   "name": "billing-backend",
///   "allowed_ips": ["10.0.0.0/8", "192.168.1.5"]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CreateApiKeyRequest {
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub allowed_ips: Vec<String>,

    #[serde(default)]
    pub is_admin: bool,
}

/// Insert payload for a new API key. Carries the hash only.
#[derive(Debug, Clone, PartialEq)]
pub struct NewApiKey {
    pub key_hash: String,

    pub name: String,

    pub description: Option<String>,

    pub is_admin: bool,

    pub created_by: String,

    pub expires_at: Option<DateTime<Utc>>,

    pub allowed_ips: Vec<String>,
}

/// Response body for a freshly created API key.
///
/// `api_key` is the raw secret. It is only returned here.
#[derive(Debug, Serialize)]
pub struct CreatedApiKeyResponse {
    pub id: Uuid,

    pub name: String,

    pub api_key: String,

    pub is_admin: bool,

    pub expires_at: Option<DateTime<Utc>>,

    pub allowed_ips: Vec<String>,
}
