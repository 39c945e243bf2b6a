//! Shared application state handed to every handler and middleware.

use std::sync::Arc;

use axum::http::HeaderName;

use crate::{
    services::{
        admin::AdminService,
        api_key::ApiKeyVerifier,
        authorization::{AuthorizationEngine, EngineSettings},
        rate_limit::RateLimiter,
    },
    store::{AdminStore, PermissionStore},
};

/// How protected routes authenticate their callers.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    /// When false every request runs with a synthetic admin context
    pub enabled: bool,

    /// Header carrying the raw API key
    pub header: HeaderName,
}

/// Process-wide state. Built once at startup and cloned per request.
#[derive(Debug, Clone)]
pub struct AppState {
    pub store: Arc<dyn PermissionStore>,
    pub engine: Arc<AuthorizationEngine>,
    pub verifier: ApiKeyVerifier,
    pub admin: AdminService,
    pub auth: AuthSettings,

    /// `None` when rate limiting is disabled
    pub rate_limiter: Option<Arc<RateLimiter>>,
}

impl AppState {
    /// Wire every service onto one store.
    pub fn new<S>(store: Arc<S>, settings: EngineSettings, auth: AuthSettings) -> Self
    where
        S: PermissionStore + AdminStore + 'static,
    {
        let engine = Arc::new(AuthorizationEngine::new(store.clone(), settings));

        Self {
            store: store.clone(),
            verifier: ApiKeyVerifier::new(store.clone()),
            admin: AdminService::new(store, engine.clone()),
            engine,
            auth,
            rate_limiter: None,
        }
    }

    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.rate_limiter = Some(Arc::new(limiter));
        self
    }
}
