//! In-memory store used by scenario tests.
//!
//! Mirrors the filtering rules of the PostgreSQL queries and counts every
//! authoritative read so tests can assert on cache behaviour.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use sqlx::types::Json;
use uuid::Uuid;

use crate::{
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
        page::{LogPage, Page},
        permission::Permission,
        user::{CreateUserRequest, ListUsersQuery, UpdateUserRequest, User, UserSummary},
    },
    services::api_key::hash_api_key,
    store::{AdminStore, PermissionStore},
};

#[derive(Debug, Default)]
struct State {
    users: Vec<User>,
    applications: Vec<Application>,
    permissions: Vec<Permission>,
    api_keys: Vec<ApiKey>,
    /// Insertion order; the timestamp stands in for the `DEFAULT NOW()` columns
    access_logs: Vec<(DateTime<Utc>, NewAccessLog)>,
    audit_logs: Vec<(DateTime<Utc>, NewAuditLog)>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    reads: AtomicUsize,
    fail_reads: AtomicBool,
    fail_log_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, email: &str, is_active: bool) -> User {
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            full_name: None,
            password_hash: None,
            is_active,
            is_admin: false,
            created_by: "bootstrap".to_string(),
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.state.lock().users.push(user.clone());
        user
    }

    pub fn add_application(&self, app_name: &str, is_active: bool) -> Application {
        let application = Application {
            id: Uuid::new_v4(),
            app_name: app_name.to_string(),
            display_name: format!("{app_name} display"),
            description: None,
            callback_urls: Json(Vec::new()),
            is_active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.state.lock().applications.push(application.clone());
        application
    }

    pub fn add_permission(
        &self,
        user: &User,
        application: &Application,
        expires_at: Option<DateTime<Utc>>,
        is_active: bool,
    ) -> Permission {
        let permission = Permission {
            id: Uuid::new_v4(),
            user_id: user.id,
            app_id: application.id,
            granted_at: Utc::now(),
            granted_by: None,
            expires_at,
            is_active,
            notes: None,
        };
        self.state.lock().permissions.push(permission.clone());
        permission
    }

    pub fn set_permission_active(&self, permission_id: Uuid, is_active: bool) {
        let mut state = self.state.lock();
        if let Some(permission) = state.permissions.iter_mut().find(|p| p.id == permission_id) {
            permission.is_active = is_active;
        }
    }

    pub fn add_api_key(
        &self,
        raw_key: &str,
        name: &str,
        expires_at: Option<DateTime<Utc>>,
        allowed_ips: &[&str],
        is_admin: bool,
    ) -> ApiKey {
        let key = ApiKey {
            id: Uuid::new_v4(),
            key_hash: hash_api_key(raw_key),
            name: name.to_string(),
            description: None,
            is_active: true,
            is_admin,
            created_by: "bootstrap".to_string(),
            created_at: Utc::now(),
            last_used_at: None,
            expires_at,
            allowed_ips: Json(allowed_ips.iter().map(|ip| ip.to_string()).collect()),
        };
        self.state.lock().api_keys.push(key.clone());
        key
    }

    pub fn api_key(&self, id: Uuid) -> Option<ApiKey> {
        self.state.lock().api_keys.iter().find(|k| k.id == id).cloned()
    }

    pub fn access_logs(&self) -> Vec<NewAccessLog> {
        self.state
            .lock()
            .access_logs
            .iter()
            .map(|(_, entry)| entry.clone())
            .collect()
    }

    pub fn audit_logs(&self) -> Vec<NewAuditLog> {
        self.state
            .lock()
            .audit_logs
            .iter()
            .map(|(_, entry)| entry.clone())
            .collect()
    }

    pub fn add_access_log_at(&self, at: DateTime<Utc>, entry: NewAccessLog) {
        self.state.lock().access_logs.push((at, entry));
    }

    pub fn add_audit_log_at(&self, at: DateTime<Utc>, entry: NewAuditLog) {
        self.state.lock().audit_logs.push((at, entry));
    }

    /// Number of authoritative reads (application, user, permission, grants, API key).
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_log_writes(&self, fail: bool) {
        self.fail_log_writes.store(fail, Ordering::SeqCst);
    }

    fn read(&self) -> Result<(), sqlx::Error> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(sqlx::Error::PoolTimedOut);
        }
        Ok(())
    }

    fn write_log(&self) -> Result<(), sqlx::Error> {
        if self.fail_log_writes.load(Ordering::SeqCst) {
            return Err(sqlx::Error::PoolClosed);
        }
        Ok(())
    }
}

fn active_grants(state: &State, matches: impl Fn(&Permission) -> bool) -> i64 {
    let count = state
        .permissions
        .iter()
        .filter(|p| p.is_active && matches(p))
        .count();
    i64::try_from(count).unwrap_or(i64::MAX)
}

/// Newest first; later inserts win ties, as they would on the same `NOW()`.
fn newest_first<T>(rows: impl Iterator<Item = T>, at: impl Fn(&T) -> DateTime<Utc>) -> Vec<T> {
    let mut rows: Vec<(usize, T)> = rows.enumerate().collect();
    rows.sort_by(|(ia, a), (ib, b)| at(b).cmp(&at(a)).then(ib.cmp(ia)));
    rows.into_iter().map(|(_, row)| row).collect()
}

fn page_of<T>(matching: Vec<T>, page: Page) -> LogPage<T> {
    LogPage {
        total: i64::try_from(matching.len()).unwrap_or(i64::MAX),
        logs: page.slice(matching),
    }
}

#[async_trait]
impl PermissionStore for MemoryStore {
    async fn find_active_application(
        &self,
        app_name: &str,
    ) -> Result<Option<Application>, sqlx::Error> {
        self.read()?;
        Ok(self
            .state
            .lock()
            .applications
            .iter()
            .find(|a| a.app_name == app_name && a.is_active)
            .cloned())
    }

    async fn find_active_user(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        self.read()?;
        Ok(self
            .state
            .lock()
            .users
            .iter()
            .find(|u| u.email == email && u.is_active)
            .cloned())
    }

    async fn find_active_permission(
        &self,
        user_id: Uuid,
        app_id: Uuid,
    ) -> Result<Option<Permission>, sqlx::Error> {
        self.read()?;
        Ok(self
            .state
            .lock()
            .permissions
            .iter()
            .find(|p| p.user_id == user_id && p.app_id == app_id && p.is_active)
            .cloned())
    }

    async fn list_user_grants(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<UserApplication>, sqlx::Error> {
        self.read()?;
        let state = self.state.lock();
        let user_active = state.users.iter().any(|u| u.id == user_id && u.is_active);
        if !user_active {
            return Ok(Vec::new());
        }

        let mut grants: Vec<UserApplication> = state
            .permissions
            .iter()
            .filter(|p| p.user_id == user_id && p.is_active)
            .filter(|p| p.expires_at.is_none_or(|expires_at| expires_at > now))
            .filter_map(|p| {
                state
                    .applications
                    .iter()
                    .find(|a| a.id == p.app_id && a.is_active)
                    .map(|a| UserApplication {
                        app_name: a.app_name.clone(),
                        display_name: a.display_name.clone(),
                        description: a.description.clone(),
                        granted_at: p.granted_at,
                        expires_at: p.expires_at,
                    })
            })
            .collect();
        grants.sort_by(|a, b| a.app_name.cmp(&b.app_name));

        Ok(grants)
    }

    async fn insert_access_log(&self, entry: NewAccessLog) -> Result<(), sqlx::Error> {
        self.write_log()?;
        self.state.lock().access_logs.push((Utc::now(), entry));
        Ok(())
    }

    async fn insert_audit_log(&self, entry: NewAuditLog) -> Result<(), sqlx::Error> {
        self.write_log()?;
        self.state.lock().audit_logs.push((Utc::now(), entry));
        Ok(())
    }

    async fn find_active_api_key(&self, key_hash: &str) -> Result<Option<ApiKey>, sqlx::Error> {
        self.read()?;
        Ok(self
            .state
            .lock()
            .api_keys
            .iter()
            .find(|k| k.key_hash == key_hash && k.is_active)
            .cloned())
    }

    async fn touch_api_key(&self, id: Uuid, used_at: DateTime<Utc>) -> Result<(), sqlx::Error> {
        if let Some(key) = self.state.lock().api_keys.iter_mut().find(|k| k.id == id) {
            key.last_used_at = Some(used_at);
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), sqlx::Error> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(sqlx::Error::PoolTimedOut);
        }
        Ok(())
    }
}

#[async_trait]
impl AdminStore for MemoryStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        Ok(self
            .state
            .lock()
            .users
            .iter()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn find_application_by_name(
        &self,
        app_name: &str,
    ) -> Result<Option<Application>, sqlx::Error> {
        Ok(self
            .state
            .lock()
            .applications
            .iter()
            .find(|a| a.app_name == app_name)
            .cloned())
    }

    async fn insert_user(
        &self,
        request: CreateUserRequest,
        created_by: String,
    ) -> Result<User, sqlx::Error> {
        let mut user = self.add_user(&request.email, true);
        user.full_name = request.full_name;
        user.is_admin = request.is_admin;
        user.created_by = created_by;
        user.notes = request.notes;

        let mut state = self.state.lock();
        if let Some(stored) = state.users.iter_mut().find(|u| u.id == user.id) {
            *stored = user.clone();
        }
        Ok(user)
    }

    async fn update_user(
        &self,
        email: &str,
        changes: UpdateUserRequest,
    ) -> Result<Option<User>, sqlx::Error> {
        let mut state = self.state.lock();
        let Some(user) = state.users.iter_mut().find(|u| u.email == email) else {
            return Ok(None);
        };

        if let Some(full_name) = changes.full_name {
            user.full_name = Some(full_name);
        }
        if let Some(is_active) = changes.is_active {
            user.is_active = is_active;
        }
        if let Some(is_admin) = changes.is_admin {
            user.is_admin = is_admin;
        }
        if let Some(notes) = changes.notes {
            user.notes = Some(notes);
        }
        user.updated_at = Utc::now();

        Ok(Some(user.clone()))
    }

    async fn insert_application(
        &self,
        request: CreateApplicationRequest,
    ) -> Result<Application, sqlx::Error> {
        let mut application = self.add_application(&request.app_name, true);
        application.display_name = request.display_name;
        application.description = request.description;
        application.callback_urls = Json(request.callback_urls);

        let mut state = self.state.lock();
        if let Some(stored) = state.applications.iter_mut().find(|a| a.id == application.id) {
            *stored = application.clone();
        }
        Ok(application)
    }

    async fn upsert_permission(
        &self,
        user_id: Uuid,
        app_id: Uuid,
        granted_by: Option<Uuid>,
        expires_at: Option<DateTime<Utc>>,
        notes: Option<String>,
    ) -> Result<Permission, sqlx::Error> {
        let mut state = self.state.lock();
        if let Some(existing) = state
            .permissions
            .iter_mut()
            .find(|p| p.user_id == user_id && p.app_id == app_id)
        {
            existing.is_active = true;
            existing.granted_at = Utc::now();
            existing.granted_by = granted_by;
            existing.expires_at = expires_at;
            existing.notes = notes;
            return Ok(existing.clone());
        }

        let permission = Permission {
            id: Uuid::new_v4(),
            user_id,
            app_id,
            granted_at: Utc::now(),
            granted_by,
            expires_at,
            is_active: true,
            notes,
        };
        state.permissions.push(permission.clone());
        Ok(permission)
    }

    async fn deactivate_permission(&self, user_id: Uuid, app_id: Uuid) -> Result<u64, sqlx::Error> {
        let mut changed = 0;
        for permission in self
            .state
            .lock()
            .permissions
            .iter_mut()
            .filter(|p| p.user_id == user_id && p.app_id == app_id && p.is_active)
        {
            permission.is_active = false;
            changed += 1;
        }
        Ok(changed)
    }

    async fn insert_api_key(&self, key: NewApiKey) -> Result<ApiKey, sqlx::Error> {
        let record = ApiKey {
            id: Uuid::new_v4(),
            key_hash: key.key_hash,
            name: key.name,
            description: key.description,
            is_active: true,
            is_admin: key.is_admin,
            created_by: key.created_by,
            created_at: Utc::now(),
            last_used_at: None,
            expires_at: key.expires_at,
            allowed_ips: Json(key.allowed_ips),
        };
        self.state.lock().api_keys.push(record.clone());
        Ok(record)
    }

    async fn list_users(&self, query: ListUsersQuery) -> Result<Vec<UserSummary>, sqlx::Error> {
        let state = self.state.lock();
        let mut users: Vec<&User> = state
            .users
            .iter()
            .filter(|u| query.is_active.is_none_or(|active| u.is_active == active))
            .filter(|u| query.is_admin.is_none_or(|admin| u.is_admin == admin))
            .collect();
        users.sort_by(|a, b| a.email.cmp(&b.email));

        Ok(query
            .page()
            .slice(users)
            .into_iter()
            .map(|u| UserSummary {
                id: u.id,
                email: u.email.clone(),
                full_name: u.full_name.clone(),
                is_active: u.is_active,
                is_admin: u.is_admin,
                created_at: u.created_at,
                created_by: u.created_by.clone(),
                permissions_count: active_grants(&state, |p| p.user_id == u.id),
            })
            .collect())
    }

    async fn list_applications(
        &self,
        query: ListApplicationsQuery,
    ) -> Result<Vec<ApplicationSummary>, sqlx::Error> {
        let state = self.state.lock();
        let mut applications: Vec<&Application> = state
            .applications
            .iter()
            .filter(|a| query.is_active.is_none_or(|active| a.is_active == active))
            .collect();
        applications.sort_by(|a, b| a.app_name.cmp(&b.app_name));

        Ok(query
            .page()
            .slice(applications)
            .into_iter()
            .map(|a| ApplicationSummary {
                id: a.id,
                app_name: a.app_name.clone(),
                display_name: a.display_name.clone(),
                description: a.description.clone(),
                is_active: a.is_active,
                created_at: a.created_at,
                users_count: active_grants(&state, |p| p.app_id == a.id),
            })
            .collect())
    }

    async fn query_access_logs(
        &self,
        query: AccessLogQuery,
    ) -> Result<LogPage<AccessLogEntry>, sqlx::Error> {
        let rows: Vec<AccessLogEntry> = self
            .state
            .lock()
            .access_logs
            .iter()
            .map(|(at, log)| AccessLogEntry {
                email: log.email.clone(),
                app_name: log.app_name.clone(),
                access_time: *at,
                access_granted: log.access_granted,
                denial_reason: log.denial_reason.clone(),
                ip_address: log.ip_address.clone(),
            })
            .filter(|entry| query.matches(entry))
            .collect();

        let matching = newest_first(rows.into_iter(), |entry| entry.access_time);
        Ok(page_of(matching, query.page()))
    }

    async fn query_audit_logs(
        &self,
        query: AuditLogQuery,
    ) -> Result<LogPage<AuditLogEntry>, sqlx::Error> {
        let rows: Vec<AuditLogEntry> = self
            .state
            .lock()
            .audit_logs
            .iter()
            .map(|(at, log)| AuditLogEntry {
                admin_email: log.admin_email.clone(),
                action: log.action.clone(),
                target_email: log.target_email.clone(),
                target_app: log.target_app.clone(),
                action_time: *at,
                details: log.details.clone().map(Json),
                ip_address: log.ip_address.clone(),
            })
            .filter(|entry| query.matches(entry))
            .collect();

        let matching = newest_first(rows.into_iter(), |entry| entry.action_time);
        Ok(page_of(matching, query.page()))
    }
}
