//! Auth Service - Main Application Entry Point
//!
//! Central authorization service for internal applications. Callers ask
//! whether a user may access an application; the answer comes from a
//! PostgreSQL permission store fronted by an in-process TTL cache.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Database**: PostgreSQL with sqlx (async queries)
//! - **Authentication**: API key with SHA-256 hashing and IP allow-lists
//! - **Format**: JSON requests/responses
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables
//! 2. Create database connection pool
//! 3. Run database migrations
//! 4. Build HTTP router with routes and middleware
//! 5. Start server on configured port

mod config;
mod db;
mod error;
mod handlers;
mod middleware;
mod models;
mod services;
mod state;
mod store;

use std::{net::SocketAddr, sync::Arc};

use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::EnvFilter;

use crate::{
    config::LogFormat, services::rate_limit::RateLimiter, state::AppState,
    store::postgres::PgStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration before logging so LOG_FORMAT can pick the output format
    let config = config::Config::from_env()?;

    // Reads RUST_LOG environment variable (defaults to "info" level)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
    tracing::info!("Configuration loaded");

    let pool = db::create_pool(&config.database_url, config.database_max_connections).await?;
    tracing::info!("Database pool created");

    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations complete");

    let settings = config.engine_settings();
    tracing::info!(
        caching = settings.caching_enabled,
        positive_ttl_secs = settings.positive_ttl.as_secs(),
        negative_ttl_secs = settings.negative_ttl.as_secs(),
        capacity = settings.cache_capacity,
        api_key_auth = config.enable_api_key_auth,
        "Authorization engine configured"
    );
    if !config.enable_api_key_auth {
        tracing::warn!("API key authentication is disabled; every caller is treated as admin");
    }

    let mut state = AppState::new(
        Arc::new(PgStore::new(pool)),
        settings,
        config.auth_settings()?,
    );
    if let Some(per_minute) = config.rate_limit()? {
        tracing::info!(per_minute, "Per-IP rate limiting enabled");
        state = state.with_rate_limiter(RateLimiter::per_minute(per_minute));
    }

    let mut app = handlers::router(state);

    let cors_origins = config.cors_origins()?;
    if !cors_origins.is_empty() {
        tracing::info!(origins = cors_origins.len(), "CORS enabled");
        app = app.layer(
            CorsLayer::new()
                .allow_origin(cors_origins)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    // Add distributed tracing middleware for observability
    let app = app.layer(TraceLayer::new_for_http());

    // Bind to network address and start server
    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // Peer addresses feed the API key IP allow-lists
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
