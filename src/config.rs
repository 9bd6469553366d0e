use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};
use validator::Validate;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_SCOPE_CACHE_TTL_SECS: u64 = 30;
const DEFAULT_SCHEMA_CHECK_INTERVAL_SECS: u64 = 300;
const DEFAULT_SCHEMA_CHECK_TIMEOUT_SECS: u64 = 5;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_DB_MIN_CONNECTIONS: u32 = 1;
const DEFAULT_DB_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Server host address for the diagnostics endpoints
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    #[serde(default = "default_env")]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// TTL for cached scope resolutions. Bounds how long an
    /// administrator's isolation change can go unobserved when tooling
    /// fails to bump the branch's config version.
    #[validate(range(min = 1, max = 3600))]
    #[serde(default = "default_scope_cache_ttl_secs")]
    pub scope_cache_ttl_secs: u64,

    /// Interval between background schema audits
    #[validate(range(min = 10, max = 86400))]
    #[serde(default = "default_schema_check_interval_secs")]
    pub schema_check_interval_secs: u64,

    /// Upper bound on each catalog/projection query during an audit
    #[validate(range(min = 1, max = 60))]
    #[serde(default = "default_schema_check_timeout_secs")]
    pub schema_check_timeout_secs: u64,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// DB pool: min connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// DB connect timeout (seconds)
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_env() -> String {
    DEFAULT_ENV.to_string()
}
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}
fn default_scope_cache_ttl_secs() -> u64 {
    DEFAULT_SCOPE_CACHE_TTL_SECS
}
fn default_schema_check_interval_secs() -> u64 {
    DEFAULT_SCHEMA_CHECK_INTERVAL_SECS
}
fn default_schema_check_timeout_secs() -> u64 {
    DEFAULT_SCHEMA_CHECK_TIMEOUT_SECS
}
fn default_db_max_connections() -> u32 {
    DEFAULT_DB_MAX_CONNECTIONS
}
fn default_db_min_connections() -> u32 {
    DEFAULT_DB_MIN_CONNECTIONS
}
fn default_db_connect_timeout_secs() -> u64 {
    DEFAULT_DB_CONNECT_TIMEOUT_SECS
}

impl AppConfig {
    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn scope_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.scope_cache_ttl_secs)
    }

    pub fn schema_check_interval(&self) -> Duration {
        Duration::from_secs(self.schema_check_interval_secs)
    }

    pub fn schema_check_timeout(&self) -> Duration {
        Duration::from_secs(self.schema_check_timeout_secs)
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Loads configuration from `config/{default,<env>}` files and
/// `APP__`-prefixed environment variables, then validates it.
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    // Support both RUN_ENV and APP_ENV for selecting the config profile
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    let config = Config::builder()
        .set_default("database_url", "sqlite://meridian.db?mode=rwc")?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}

/// Initializes the global tracing subscriber. `RUST_LOG` overrides the
/// configured level when set.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::fmt;

    let default_directive = format!("meridian_isolation={level}");
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt()
            .with_env_filter(filter_directive)
            .json()
            .try_init();
    } else {
        let _ = fmt().with_env_filter(filter_directive).try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> AppConfig {
        AppConfig {
            database_url: "sqlite://meridian.db?mode=memory".into(),
            host: default_host(),
            port: DEFAULT_PORT,
            environment: DEFAULT_ENV.into(),
            log_level: DEFAULT_LOG_LEVEL.into(),
            log_json: false,
            scope_cache_ttl_secs: DEFAULT_SCOPE_CACHE_TTL_SECS,
            schema_check_interval_secs: DEFAULT_SCHEMA_CHECK_INTERVAL_SECS,
            schema_check_timeout_secs: DEFAULT_SCHEMA_CHECK_TIMEOUT_SECS,
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            db_min_connections: DEFAULT_DB_MIN_CONNECTIONS,
            db_connect_timeout_secs: DEFAULT_DB_CONNECT_TIMEOUT_SECS,
        }
    }

    #[test]
    fn defaults_are_valid() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn zero_cache_ttl_is_rejected() {
        let mut cfg = base_config();
        cfg.scope_cache_ttl_secs = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn oversized_check_timeout_is_rejected() {
        let mut cfg = base_config();
        cfg.schema_check_timeout_secs = 600;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn durations_convert() {
        let cfg = base_config();
        assert_eq!(cfg.scope_cache_ttl(), Duration::from_secs(30));
        assert_eq!(cfg.schema_check_interval(), Duration::from_secs(300));
        assert_eq!(cfg.schema_check_timeout(), Duration::from_secs(5));
    }
}
