//! Server configuration: optional YAML file, then environment overrides.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use stockkeeper_core::config::{ConcurrencyConfig, StrategyKind};

use crate::error::AppError;

/// Environment variable naming the optional YAML configuration file.
pub const CONFIG_FILE_VAR: &str = "STOCKKEEPER_CONFIG";

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;

/// Fully resolved server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Interface to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
    /// PostgreSQL connection string. `None` runs on the in-memory store.
    pub database_url: Option<String>,
    /// OTLP collector endpoint. `None` disables trace export.
    pub otlp_endpoint: Option<String>,
    /// Decrement-path concurrency settings.
    pub concurrency: ConcurrencyConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_owned(),
            port: DEFAULT_PORT,
            database_url: None,
            otlp_endpoint: None,
            concurrency: ConcurrencyConfig::default(),
        }
    }
}

/// Shape of the YAML configuration file. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    host: Option<String>,
    port: Option<u16>,
    database_url: Option<String>,
    otlp_endpoint: Option<String>,
    concurrency: FileConcurrency,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConcurrency {
    strategy: Option<StrategyKind>,
    lock_timeout_ms: Option<u64>,
    max_retries: Option<u32>,
    retry_backoff_ms: Option<u64>,
    lease_ttl_ms: Option<u64>,
}

impl AppConfig {
    /// Reads configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the config file cannot be read or
    /// parsed, or a variable holds an invalid value.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolves configuration through `lookup`, which maps a variable name
    /// to its value.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the config file cannot be read or
    /// parsed, or a variable holds an invalid value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup(CONFIG_FILE_VAR) {
            Some(path) => Self::from_yaml_file(Path::new(&path))?,
            None => Self::default(),
        };
        config.apply_env(&lookup)?;
        config
            .concurrency
            .validate()
            .map_err(|e| AppError::Config(e.to_string()))?;
        Ok(config)
    }

    /// Reads a YAML configuration file on top of the defaults.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or parsed.
    pub fn from_yaml_file(path: &Path) -> Result<Self, AppError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_yaml_str(&text)
    }

    /// Parses YAML configuration text on top of the defaults.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the text is not valid configuration.
    pub fn from_yaml_str(text: &str) -> Result<Self, AppError> {
        let file: FileConfig = serde_yaml::from_str(text)
            .map_err(|e| AppError::Config(format!("invalid configuration file: {e}")))?;

        let mut config = Self::default();
        if let Some(host) = file.host {
            config.host = host;
        }
        if let Some(port) = file.port {
            config.port = port;
        }
        config.database_url = file.database_url;
        config.otlp_endpoint = file.otlp_endpoint;

        let c = &mut config.concurrency;
        if let Some(strategy) = file.concurrency.strategy {
            c.strategy = strategy;
        }
        if let Some(ms) = file.concurrency.lock_timeout_ms {
            c.lock_timeout = Some(Duration::from_millis(ms));
        }
        if let Some(retries) = file.concurrency.max_retries {
            c.max_retries = retries;
        }
        if let Some(ms) = file.concurrency.retry_backoff_ms {
            c.retry_backoff = Duration::from_millis(ms);
        }
        if let Some(ms) = file.concurrency.lease_ttl_ms {
            c.lease_ttl = Duration::from_millis(ms);
        }
        Ok(config)
    }

    fn apply_env<F>(&mut self, lookup: &F) -> Result<(), AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("DATABASE_URL") {
            self.database_url = Some(url);
        }
        if let Some(endpoint) = lookup("OTEL_EXPORTER_OTLP_ENDPOINT") {
            self.otlp_endpoint = Some(endpoint);
        }
        if let Some(host) = lookup("HOST") {
            self.host = host;
        }
        if let Some(port) = parsed::<u16>(lookup, "PORT")? {
            self.port = port;
        }

        let c = &mut self.concurrency;
        if let Some(raw) = lookup("STOCK_STRATEGY") {
            c.strategy = StrategyKind::from_str(&raw)
                .map_err(|e| AppError::Config(format!("STOCK_STRATEGY: {e}")))?;
        }
        if let Some(ms) = parsed::<u64>(lookup, "STOCK_LOCK_TIMEOUT_MS")? {
            c.lock_timeout = Some(Duration::from_millis(ms));
        }
        if let Some(retries) = parsed::<u32>(lookup, "STOCK_MAX_RETRIES")? {
            c.max_retries = retries;
        }
        if let Some(ms) = parsed::<u64>(lookup, "STOCK_RETRY_BACKOFF_MS")? {
            c.retry_backoff = Duration::from_millis(ms);
        }
        if let Some(ms) = parsed::<u64>(lookup, "STOCK_LEASE_TTL_MS")? {
            c.lease_ttl = Duration::from_millis(ms);
        }
        Ok(())
    }

    /// The `HOST:PORT` pair to bind.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parsed<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| AppError::Config(format!("{key} must be a valid number: {e}")))
        })
        .transpose()
}
