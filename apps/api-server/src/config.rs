//! Centralized configuration for api-server.
//!
//! All environment variables are loaded and validated at startup to fail fast
//! on misconfiguration rather than at request time.

use axum::http::HeaderValue;
use std::env;
use std::fmt;
use std::path::PathBuf;

/// Storage backend provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageProvider {
    /// In-memory storage (data lost on restart)
    Memory,
    /// SQLite file-based storage
    Sqlite,
}

impl StorageProvider {
    fn from_str(s: &str) -> Self {
        if s.eq_ignore_ascii_case("sqlite") {
            Self::Sqlite
        } else {
            Self::Memory
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    fn from_str(s: &str) -> Self {
        if s.eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Pretty
        }
    }
}

/// Configuration error.
#[derive(Debug)]
pub struct ConfigError {
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Configuration error for {}: {}", self.field, self.message)
    }
}

impl std::error::Error for ConfigError {}

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port (default: 3001)
    pub port: u16,
    /// CORS allow origin
    pub cors_allow_origin: HeaderValue,
    /// Storage provider
    pub storage_provider: StorageProvider,
    /// SQLite database path; the adapter default applies when unset
    pub db_path: Option<PathBuf>,
    /// Log format
    pub log_format: LogFormat,
}

impl Config {
    /// Load and validate configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F: Fn(&str) -> Option<String>>(var: F) -> Result<Self, ConfigError> {
        let port = match var("PORT") {
            Some(s) => s.parse().map_err(|_| ConfigError {
                field: "PORT",
                message: format!("'{}' is not a valid port", s),
            })?,
            None => 3001,
        };

        let cors_origin_str = var("CORS_ALLOW_ORIGIN").unwrap_or_else(|| "*".into());
        let cors_allow_origin = if cors_origin_str == "*" {
            HeaderValue::from_static("*")
        } else {
            HeaderValue::from_str(&cors_origin_str).map_err(|e| ConfigError {
                field: "CORS_ALLOW_ORIGIN",
                message: format!("Invalid header value '{}': {}", cors_origin_str, e),
            })?
        };

        let storage_provider =
            StorageProvider::from_str(&var("STORAGE_PROVIDER").unwrap_or_else(|| "sqlite".into()));

        let db_path = var("DB_PATH").filter(|s| !s.is_empty()).map(PathBuf::from);

        let log_format = LogFormat::from_str(&var("LOG_FORMAT").unwrap_or_else(|| "pretty".into()));

        Ok(Self {
            port,
            cors_allow_origin,
            storage_provider,
            db_path,
            log_format,
        })
    }

    /// Log warnings about configuration that is unsuitable outside local dev.
    pub fn warn_if_ephemeral(&self) {
        if self.storage_provider == StorageProvider::Memory {
            tracing::warn!(
                "STORAGE_PROVIDER=memory: submitted events are kept in memory and lost on restart."
            );
        }
        if self.cors_allow_origin == HeaderValue::from_static("*") {
            tracing::warn!(
                "CORS_ALLOW_ORIGIN is '*': any origin may submit events. \
                 Set CORS_ALLOW_ORIGIN to the frontend origin in production."
            );
        }
    }
}
