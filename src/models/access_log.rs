//! Access and audit log records.
//!
//! Both logs are append-only. This service inserts rows and never updates or
//! deletes them. Admins read them back through the filtered, paginated
//! queries defined here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::types::Json;

use crate::models::{page::Page, user::normalize_email};

/// Maximum stored length of a user agent, in characters.
pub const MAX_USER_AGENT_CHARS: usize = 500;

/// One authorization decision, written on every check including cache hits.
///
/// The `app_id` column is resolved from `app_name` by the store at insert
/// time, so a log entry can be written even for unknown applications.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAccessLog {
    /// Lower-cased requester email
    pub email: String,

    pub app_name: String,

    pub access_granted: bool,

    pub denial_reason: Option<String>,

    pub ip_address: Option<String>,

    /// Truncated to [`MAX_USER_AGENT_CHARS`]
    pub user_agent: Option<String>,
}

impl NewAccessLog {
    pub fn new(
        email: &str,
        app_name: &str,
        access_granted: bool,
        denial_reason: Option<&str>,
        ip_address: Option<&str>,
        user_agent: Option<&str>,
    ) -> Self {
        Self {
            email: normalize_email(email),
            app_name: app_name.to_string(),
            access_granted,
            denial_reason: denial_reason.map(str::to_string),
            ip_address: ip_address.map(str::to_string),
            user_agent: user_agent.map(truncate_user_agent),
        }
    }
}

fn truncate_user_agent(user_agent: &str) -> String {
    user_agent.chars().take(MAX_USER_AGENT_CHARS).collect()
}

/// One administrative action, written when audit logging is enabled.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditLog {
    /// Lower-cased identity of the acting admin
    pub admin_email: String,

    /// Action name, e.g. `grant_permission`
    pub action: String,

    pub target_email: Option<String>,

    pub target_app: Option<String>,

    /// Action-specific detail object, stored as JSONB
    pub details: Option<Value>,

    pub ip_address: Option<String>,
}

/// Access log row as returned to admins.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize)]
pub struct AccessLogEntry {
    pub email: String,
    pub app_name: String,
    pub access_time: DateTime<Utc>,
    pub access_granted: bool,
    pub denial_reason: Option<String>,
    pub ip_address: Option<String>,
}

/// Audit log row as returned to admins.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize)]
pub struct AuditLogEntry {
    pub admin_email: String,
    pub action: String,
    pub target_email: Option<String>,
    pub target_app: Option<String>,
    pub action_time: DateTime<Utc>,
    pub details: Option<Json<Value>>,
    pub ip_address: Option<String>,
}

/// Filters of `GET /api/v1/admin/logs/access`. Time bounds are inclusive.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AccessLogQuery {
    pub email: Option<String>,
    pub app_name: Option<String>,
    pub access_granted: Option<bool>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

impl AccessLogQuery {
    pub fn page(&self) -> Page {
        Page::new(self.skip, self.limit)
    }

    pub fn matches(&self, entry: &AccessLogEntry) -> bool {
        self.email.as_ref().is_none_or(|email| *email == entry.email)
            && self.app_name.as_ref().is_none_or(|app| *app == entry.app_name)
            && self
                .access_granted
                .is_none_or(|granted| granted == entry.access_granted)
            && within(entry.access_time, self.start_time, self.end_time)
    }
}

/// Filters of `GET /api/v1/admin/logs/audit`. Time bounds are inclusive.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AuditLogQuery {
    pub admin_email: Option<String>,
    pub action: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

impl AuditLogQuery {
    pub fn page(&self) -> Page {
        Page::new(self.skip, self.limit)
    }

    pub fn matches(&self, entry: &AuditLogEntry) -> bool {
        self.admin_email
            .as_ref()
            .is_none_or(|email| *email == entry.admin_email)
            && self.action.as_ref().is_none_or(|action| *action == entry.action)
            && within(entry.action_time, self.start_time, self.end_time)
    }
}

fn within(at: DateTime<Utc>, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> bool {
    start.is_none_or(|start| at >= start) && end.is_none_or(|end| at <= end)
}
