//! Application configuration management.
//!
//! This module handles loading configuration from environment variables.
//! It uses the `envy` crate to automatically deserialize environment variables into a type-safe struct.

use std::time::Duration;

use serde::Deserialize;

use axum::http::{
    HeaderName, HeaderValue,
    header::{InvalidHeaderName, InvalidHeaderValue},
};

use crate::{services::authorization::EngineSettings, state::AuthSettings};

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `DATABASE_URL` (required): PostgreSQL connection string
/// - `SERVER_PORT` (optional): HTTP server port, defaults to 8000
/// - `DATABASE_MAX_CONNECTIONS` (optional): pool size, defaults to 10
/// - `ENABLE_CACHING` (optional): decision cache on/off, defaults to true
/// - `CACHE_TTL_SECONDS` (optional): positive cache TTL, defaults to 300
/// - `NEGATIVE_CACHE_TTL_SECONDS` (optional): negative cache TTL, defaults to 60
/// - `CACHE_MAX_ENTRIES` (optional): capacity of each cache, defaults to 1000
/// - `ENABLE_AUDIT_LOG` (optional): admin audit trail on/off, defaults to true
/// - `ENABLE_API_KEY_AUTH` (optional): require API keys, defaults to true
/// - `API_KEY_HEADER` (optional): header carrying the key, defaults to `X-API-Key`
/// - `LOG_FORMAT` (optional): `text` or `json`, defaults to `text`
/// - `CORS_ORIGINS` (optional): comma-separated browser origins; CORS is off when unset
/// - `ENABLE_RATE_LIMITING` (optional): per-IP request limit on/off, defaults to true
/// - `RATE_LIMIT_PER_MINUTE` (optional): requests per client IP per minute, defaults to 100
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,

    #[serde(default = "default_port")]
    pub server_port: u16,

    #[serde(default = "default_max_connections")]
    pub database_max_connections: u32,

    #[serde(default = "default_true")]
    pub enable_caching: bool,

    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_seconds: u64,

    #[serde(default = "default_negative_cache_ttl")]
    pub negative_cache_ttl_seconds: u64,

    #[serde(default = "default_cache_max_entries")]
    pub cache_max_entries: usize,

    #[serde(default = "default_true")]
    pub enable_audit_log: bool,

    #[serde(default = "default_true")]
    pub enable_api_key_auth: bool,

    #[serde(default = "default_api_key_header")]
    pub api_key_header: String,

    #[serde(default)]
    pub log_format: LogFormat,

    #[serde(default)]
    pub cors_origins: Option<String>,

    #[serde(default = "default_true")]
    pub enable_rate_limiting: bool,

    #[serde(default = "default_rate_limit_per_minute")]
    pub rate_limit_per_minute: u32,
}

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

fn default_port() -> u16 {
    8000
}

fn default_max_connections() -> u32 {
    10
}

fn default_true() -> bool {
    true
}

fn default_cache_ttl() -> u64 {
    300
}

// Must stay below the positive TTL.
fn default_negative_cache_ttl() -> u64 {
    60
}

fn default_cache_max_entries() -> usize {
    1000
}

fn default_rate_limit_per_minute() -> u32 {
    100
}

fn default_api_key_header() -> String {
    "X-API-Key".to_string()
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// This method first attempts to load a `.env` file (which is optional),
    /// then reads environment variables and deserializes them into a Config struct.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing (e.g., DATABASE_URL)
    /// - Environment variable values cannot be parsed into expected types
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();

        envy::from_env::<Config>()
    }

    /// Decision engine settings derived from this configuration.
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            caching_enabled: self.enable_caching,
            positive_ttl: Duration::from_secs(self.cache_ttl_seconds),
            negative_ttl: Duration::from_secs(self.negative_cache_ttl_seconds),
            cache_capacity: self.cache_max_entries,
            audit_enabled: self.enable_audit_log,
        }
    }

    /// API key settings for the protected routes.
    ///
    /// # Errors
    ///
    /// Returns an error if `API_KEY_HEADER` is not a valid header name.
    pub fn auth_settings(&self) -> Result<AuthSettings, InvalidHeaderName> {
        Ok(AuthSettings {
            enabled: self.enable_api_key_auth,
            header: HeaderName::try_from(self.api_key_header.as_str())?,
        })
    }

    /// Per-minute request budget per client IP, or `None` when disabled.
    ///
    /// # Errors
    ///
    /// Returns an error if rate limiting is on with a budget of zero.
    pub fn rate_limit(&self) -> anyhow::Result<Option<u32>> {
        if !self.enable_rate_limiting {
            return Ok(None);
        }
        anyhow::ensure!(
            self.rate_limit_per_minute > 0,
            "RATE_LIMIT_PER_MINUTE must be greater than zero"
        );
        Ok(Some(self.rate_limit_per_minute))
    }

    /// Origins allowed by the CORS layer. Empty means no CORS layer.
    ///
    /// # Errors
    ///
    /// Returns an error if an origin is not a valid header value.
    pub fn cors_origins(&self) -> Result<Vec<HeaderValue>, InvalidHeaderValue> {
        self.cors_origins
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(HeaderValue::from_str)
            .collect()
    }
}
