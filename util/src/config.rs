//! Configuration for the similarity-check service.
//!
//! Two layers live here:
//!
//! - [`AppConfig`]: process-level settings (logging, database, listener, scheduler
//!   intervals). It is a lazily initialized, globally accessible singleton loaded
//!   from the environment, with per-field setters for tests.
//! - [`PluginConfig`]: engine settings (service credentials, retry policy, batch
//!   limits). It is never global; callers build one and hand it to the service
//!   constructors that need it.

use std::env;
use std::str::FromStr;
use std::sync::{OnceLock, RwLock, RwLockReadGuard};
use std::time::Duration;

use thiserror::Error;

/// Maximum content size accepted for external processing (100 MiB).
pub const MAX_FILE_SIZE: u64 = 104_857_600;

/// Number of consecutive transient failures tolerated before a submission is
/// moved to `ERROR`.
pub const MAX_SEND_ATTEMPTS: i32 = 12;

/// Fixed retry window applied after a transient failure.
pub const RETRY_BACKOFF_SECONDS: i64 = 3600;

/// Maximum number of submissions a single dispatch run selects.
pub const DISPATCH_BATCH_SIZE: u64 = 50;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}

/// Process-level configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: String,
    pub project_name: String,
    pub log_level: String,
    pub log_file: String,
    pub log_to_stdout: bool,
    pub database_path: String,
    pub storage_root: String,
    pub host: String,
    pub port: u16,
    pub dispatch_interval_seconds: u64,
    pub settings_refresh_interval_seconds: u64,
}

/// Lazily-initialized, thread-safe singleton instance of `AppConfig`.
static CONFIG_INSTANCE: OnceLock<RwLock<AppConfig>> = OnceLock::new();

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            env: "development".into(),
            project_name: "similarity-check".into(),
            log_level: "api=info,services=info".into(),
            log_file: "api.log".into(),
            log_to_stdout: false,
            database_path: "data/similarity.db".into(),
            storage_root: "data/submissions".into(),
            host: "127.0.0.1".into(),
            port: 3000,
            dispatch_interval_seconds: 60,
            settings_refresh_interval_seconds: 3600,
        }
    }
}

impl AppConfig {
    /// Loads the configuration from `.env` and environment variables.
    ///
    /// Unset variables fall back to [`AppConfig::default`]; values that are set
    /// but unparsable fall back too, with a warning.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        Self {
            env: env::var("APP_ENV").unwrap_or(defaults.env),
            project_name: env::var("PROJECT_NAME").unwrap_or(defaults.project_name),
            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            log_file: env::var("LOG_FILE").unwrap_or(defaults.log_file),
            log_to_stdout: env::var("LOG_TO_STDOUT").map(|v| v == "true").unwrap_or(false),
            database_path: env::var("DATABASE_PATH").unwrap_or(defaults.database_path),
            storage_root: env::var("SUBMISSION_STORAGE_ROOT").unwrap_or(defaults.storage_root),
            host: env::var("HOST").unwrap_or(defaults.host),
            port: parsed_or("PORT", defaults.port),
            dispatch_interval_seconds: parsed_or(
                "DISPATCH_INTERVAL_SECONDS",
                defaults.dispatch_interval_seconds,
            ),
            settings_refresh_interval_seconds: parsed_or(
                "SETTINGS_REFRESH_INTERVAL_SECONDS",
                defaults.settings_refresh_interval_seconds,
            ),
        }
    }

    /// Returns a shared reference to the global configuration.
    pub fn global() -> RwLockReadGuard<'static, AppConfig> {
        let lock = CONFIG_INSTANCE.get_or_init(|| RwLock::new(AppConfig::from_env()));
        // A poisoned lock still holds a fully written config.
        lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Resets the configuration by reloading from environment variables.
    ///
    /// Useful in tests to clear overrides.
    pub fn reset() {
        if let Some(lock) = CONFIG_INSTANCE.get() {
            let mut guard = lock.write().unwrap_or_else(|poisoned| poisoned.into_inner());
            *guard = AppConfig::from_env();
        }
    }

    fn set_field<F>(setter: F)
    where
        F: FnOnce(&mut AppConfig),
    {
        let lock = CONFIG_INSTANCE.get_or_init(|| RwLock::new(AppConfig::from_env()));
        let mut guard = lock.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        setter(&mut guard);
    }

    pub fn set_database_path(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.database_path = value.into());
    }

    pub fn set_storage_root(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.storage_root = value.into());
    }
}

/// Settings for the submission lifecycle engine.
///
/// Passed explicitly into the dispatch loop, the consent gate, the webhook
/// reconciler and the service client. Nothing in the engine reads the
/// environment directly.
#[derive(Debug, Clone, PartialEq)]
pub struct PluginConfig {
    /// Base URL of the similarity service API, without a trailing slash.
    pub api_url: String,
    pub api_key: String,
    /// Shared secret used to sign inbound webhooks.
    pub webhook_secret: String,
    /// Public URL of our webhook endpoint; registration is skipped when unset.
    pub webhook_url: Option<String>,
    pub integration_name: String,
    pub integration_version: String,
    pub request_timeout_seconds: u64,
    pub batch_size: u64,
    pub dispatch_workers: usize,
    pub batch_budget_seconds: u64,
    pub lease_seconds: i64,
    pub max_send_attempts: i32,
    pub retry_backoff_seconds: i64,
    pub max_file_size: u64,
    pub send_receipts: bool,
    pub admin_email: Option<String>,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            api_url: String::new(),
            api_key: String::new(),
            webhook_secret: String::new(),
            webhook_url: None,
            integration_name: "similarity-check".into(),
            integration_version: env!("CARGO_PKG_VERSION").into(),
            request_timeout_seconds: 5,
            batch_size: DISPATCH_BATCH_SIZE,
            dispatch_workers: 4,
            batch_budget_seconds: 120,
            lease_seconds: 300,
            max_send_attempts: MAX_SEND_ATTEMPTS,
            retry_backoff_seconds: RETRY_BACKOFF_SECONDS,
            max_file_size: MAX_FILE_SIZE,
            send_receipts: true,
            admin_email: None,
        }
    }
}

impl PluginConfig {
    /// Builds the engine configuration from `.env` and the environment.
    ///
    /// `SIMILARITY_API_URL`, `SIMILARITY_API_KEY` and `SIMILARITY_WEBHOOK_SECRET`
    /// are required; everything else has a default.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let config = Self {
            api_url: required("SIMILARITY_API_URL")?.trim_end_matches('/').to_string(),
            api_key: required("SIMILARITY_API_KEY")?,
            webhook_secret: required("SIMILARITY_WEBHOOK_SECRET")?,
            webhook_url: env::var("SIMILARITY_WEBHOOK_URL").ok().filter(|v| !v.is_empty()),
            integration_name: env::var("SIMILARITY_INTEGRATION_NAME")
                .unwrap_or(defaults.integration_name),
            integration_version: env::var("SIMILARITY_INTEGRATION_VERSION")
                .unwrap_or(defaults.integration_version),
            request_timeout_seconds: optional(
                "REQUEST_TIMEOUT_SECONDS",
                defaults.request_timeout_seconds,
            )?,
            batch_size: optional("DISPATCH_BATCH_SIZE", defaults.batch_size)?,
            dispatch_workers: optional("DISPATCH_WORKERS", defaults.dispatch_workers)?,
            batch_budget_seconds: optional(
                "DISPATCH_BATCH_BUDGET_SECONDS",
                defaults.batch_budget_seconds,
            )?,
            lease_seconds: optional("LEASE_SECONDS", defaults.lease_seconds)?,
            max_send_attempts: optional("MAX_SEND_ATTEMPTS", defaults.max_send_attempts)?,
            retry_backoff_seconds: optional(
                "RETRY_BACKOFF_SECONDS",
                defaults.retry_backoff_seconds,
            )?,
            max_file_size: optional("MAX_FILE_SIZE", defaults.max_file_size)?,
            send_receipts: optional("SEND_RECEIPTS", defaults.send_receipts)?,
            admin_email: env::var("ADMIN_EMAIL").ok().filter(|v| !v.is_empty()),
        };
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_send_attempts < 1 {
            return Err(ConfigError::Invalid {
                name: "MAX_SEND_ATTEMPTS",
                value: self.max_send_attempts.to_string(),
            });
        }
        if self.dispatch_workers == 0 {
            return Err(ConfigError::Invalid {
                name: "DISPATCH_WORKERS",
                value: "0".into(),
            });
        }
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid {
                name: "DISPATCH_BATCH_SIZE",
                value: "0".into(),
            });
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn batch_budget(&self) -> Duration {
        Duration::from_secs(self.batch_budget_seconds)
    }

    pub fn retry_backoff(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.retry_backoff_seconds)
    }

    pub fn lease(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.lease_seconds)
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::Missing(name)),
    }
}

fn optional<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => {
            let parsed = value.trim().parse::<T>();
            parsed.map_err(|_| ConfigError::Invalid { name, value })
        }
        Err(_) => Ok(default),
    }
}

fn parsed_or<T: FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(value) => value.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(variable = name, value = %value, "ignoring unparsable setting");
            default
        }),
        Err(_) => default,
    }
}
