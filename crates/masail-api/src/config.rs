//! Server configuration read from the environment.

use std::str::FromStr;
use std::time::Duration;

use masail_documents::application::command_handlers::RetryPolicy;

use crate::error::AppError;

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// Human-readable multi-line output.
    Pretty,
}

impl FromStr for LogFormat {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            other => Err(AppError::Config(format!(
                "LOG_FORMAT must be json or pretty, got {other}"
            ))),
        }
    }
}

/// Settings for the API server, read once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// `PostgreSQL` connection string. `None` selects the in-memory stores.
    pub database_url: Option<String>,
    /// Interface to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
    /// Upper bound on pooled database connections.
    pub database_max_connections: u32,
    /// Attempts per command before a version conflict is surfaced.
    pub command_max_attempts: u32,
    /// Base delay between conflict retries.
    pub command_retry_backoff: Duration,
    /// Aggregates kept in the snapshot cache. `0` disables it.
    pub snapshot_cache_capacity: usize,
    /// Seconds between background reconciliation passes. `0` disables them.
    pub reconcile_interval_secs: u64,
    /// Events read per reconciliation batch.
    pub reconcile_batch_size: usize,
    /// Log output format.
    pub log_format: LogFormat,
    /// OTLP gRPC collector endpoint. `None` disables trace export.
    pub otlp_endpoint: Option<String>,
    /// Allowed CORS origins. `None` allows any origin.
    pub cors_allowed_origins: Option<Vec<String>>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            host: "0.0.0.0".to_owned(),
            port: 3000,
            database_max_connections: 10,
            command_max_attempts: 3,
            command_retry_backoff: Duration::from_millis(10),
            snapshot_cache_capacity: 1024,
            reconcile_interval_secs: 60,
            reconcile_batch_size: 500,
            log_format: LogFormat::Json,
            otlp_endpoint: None,
            cors_allowed_origins: None,
        }
    }
}

impl AppConfig {
    /// Reads the configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a variable is present but malformed.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`, which returns the value of
    /// a variable or `None` when it is unset.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a variable is present but malformed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let config = Self {
            database_url: get("DATABASE_URL"),
            host: get("HOST").unwrap_or(defaults.host),
            port: parse_or(get("PORT"), "PORT", defaults.port)?,
            database_max_connections: parse_or(
                get("DATABASE_MAX_CONNECTIONS"),
                "DATABASE_MAX_CONNECTIONS",
                defaults.database_max_connections,
            )?,
            command_max_attempts: parse_or(
                get("COMMAND_MAX_ATTEMPTS"),
                "COMMAND_MAX_ATTEMPTS",
                defaults.command_max_attempts,
            )?,
            command_retry_backoff: get("COMMAND_RETRY_BACKOFF_MS")
                .map(|value| parse("COMMAND_RETRY_BACKOFF_MS", &value).map(Duration::from_millis))
                .transpose()?
                .unwrap_or(defaults.command_retry_backoff),
            snapshot_cache_capacity: parse_or(
                get("SNAPSHOT_CACHE_CAPACITY"),
                "SNAPSHOT_CACHE_CAPACITY",
                defaults.snapshot_cache_capacity,
            )?,
            reconcile_interval_secs: parse_or(
                get("RECONCILE_INTERVAL_SECS"),
                "RECONCILE_INTERVAL_SECS",
                defaults.reconcile_interval_secs,
            )?,
            reconcile_batch_size: parse_or(
                get("RECONCILE_BATCH_SIZE"),
                "RECONCILE_BATCH_SIZE",
                defaults.reconcile_batch_size,
            )?,
            log_format: get("LOG_FORMAT")
                .map(|value| value.parse::<LogFormat>())
                .transpose()?
                .unwrap_or(defaults.log_format),
            otlp_endpoint: get("OTEL_EXPORTER_OTLP_ENDPOINT"),
            cors_allowed_origins: get("CORS_ALLOWED_ORIGINS").map(|value| {
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|origin| !origin.is_empty())
                    .map(str::to_owned)
                    .collect()
            }),
        };

        if config.command_max_attempts == 0 {
            return Err(AppError::Config(
                "COMMAND_MAX_ATTEMPTS must be at least 1".to_owned(),
            ));
        }
        if config.reconcile_batch_size == 0 {
            return Err(AppError::Config(
                "RECONCILE_BATCH_SIZE must be at least 1".to_owned(),
            ));
        }
        Ok(config)
    }

    /// Retry policy for the document command service.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.command_max_attempts,
            backoff: self.command_retry_backoff,
        }
    }

    /// `HOST:PORT` string to bind.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse<T>(key: &str, value: &str) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| AppError::Config(format!("{key} is invalid: {e}")))
}

fn parse_or<T>(value: Option<String>, key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.map_or(Ok(default), |value| parse(key, &value))
}
