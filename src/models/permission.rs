//! Permission (grant) models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A directed grant from a user to an application.
///
/// # Usability
///
/// A permission only authorizes access if it is active, has not expired, and
/// both the user and the application are themselves active. Expiry is
/// evaluated at read time; there is no background sweep.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Permission {
    pub id: Uuid,

    pub user_id: Uuid,

    pub app_id: Uuid,

    pub granted_at: DateTime<Utc>,

    /// User that granted the permission, if it was an interactive admin
    pub granted_by: Option<Uuid>,

    /// Optional expiration timestamp
    pub expires_at: Option<DateTime<Utc>>,

    /// Revoking a permission sets this to false
    pub is_active: bool,

    /// Why access was granted
    pub notes: Option<String>,
}

impl Permission {
    /// Whether the expiration timestamp, if any, lies before `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at < now)
    }
}

/// Request body for granting a permission.
///
/// # JSON Example
///
/// ```json
/// {
///   "user_email": "alice@co.com",
///   "app_name": "billing",
///   "expires_at": "2026-01-01T00:00:00Z",
///   "notes": "Quarter close"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GrantPermissionRequest {
    pub user_email: String,

    pub app_name: String,

    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub notes: Option<String>,
}

/// Query parameters for revoking a permission.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RevokePermissionRequest {
    pub user_email: String,

    pub app_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn permission(expires_at: Option<DateTime<Utc>>) -> Permission {
        Permission {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            app_id: Uuid::new_v4(),
            granted_at: Utc::now(),
            granted_by: None,
            expires_at,
            is_active: true,
            notes: None,
        }
    }

    #[test]
    fn permission_without_expiry_never_expires() {
        assert!(!permission(None).is_expired_at(Utc::now()));
    }

    #[test]
    fn permission_expired_only_after_timestamp() {
        let now = Utc::now();
        assert!(permission(Some(now - Duration::days(1))).is_expired_at(now));
        assert!(!permission(Some(now + Duration::days(1))).is_expired_at(now));
    }
}
