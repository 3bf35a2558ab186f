use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

use crate::ml::forecasting::{DEFAULT_DEGREE, DEFAULT_MAX_SPAN_DAYS};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 30;
const DEFAULT_SOURCE_TIMEOUT_SECS: u64 = 10;

/// Highest polynomial degree accepted from configuration or requests.
pub const MAX_DEGREE: usize = 6;

/// Forecasting configuration
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ForecastConfig {
    /// Degree of the fitted polynomial (1 = linear trend)
    #[serde(default = "default_degree")]
    #[validate(custom = "validate_degree")]
    pub degree: usize,

    /// Seconds between periodic refreshes
    #[serde(default = "default_refresh_interval_secs")]
    #[validate(range(min = 1))]
    pub refresh_interval_secs: u64,

    /// URL of the ticket listing; unset means an in-memory source fed via the API
    #[serde(default)]
    #[validate(custom = "validate_source_url")]
    pub source_url: Option<String>,

    /// Request timeout for the ticket listing, in seconds
    #[serde(default = "default_source_timeout_secs")]
    #[validate(range(min = 1))]
    pub source_timeout_secs: u64,

    /// Records older than this many days before today are ignored
    #[serde(default = "default_max_span_days")]
    #[validate(range(min = 1))]
    pub max_span_days: u64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            degree: default_degree(),
            refresh_interval_secs: default_refresh_interval_secs(),
            source_url: None,
            source_timeout_secs: default_source_timeout_secs(),
            max_span_days: default_max_span_days(),
        }
    }
}

impl ForecastConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn source_timeout(&self) -> Duration {
        Duration::from_secs(self.source_timeout_secs)
    }
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Forecasting configuration
    #[serde(default)]
    #[validate]
    pub forecast: ForecastConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            environment: default_environment(),
            log_level: default_log_level(),
            log_json: false,
            forecast: ForecastConfig::default(),
        }
    }
}

impl AppConfig {
    /// Checks if running in production environment
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// Checks if running in development environment
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    /// Gets log level reference
    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.is_production() && self.forecast.source_url.is_none() {
            let mut err = ValidationError::new("source_url_required");
            err.message = Some(
                "Set APP__FORECAST__SOURCE_URL in production; the in-memory ticket source is for development only".into(),
            );
            errors.add("forecast", err);
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Default value functions
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_degree() -> usize {
    DEFAULT_DEGREE
}

fn default_refresh_interval_secs() -> u64 {
    DEFAULT_REFRESH_INTERVAL_SECS
}

fn default_source_timeout_secs() -> u64 {
    DEFAULT_SOURCE_TIMEOUT_SECS
}

fn default_max_span_days() -> u64 {
    DEFAULT_MAX_SPAN_DAYS
}

/// Validates log level values
fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if valid_levels.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("log_level");
        err.message = Some("Must be one of: trace, debug, info, warn, error".into());
        Err(err)
    }
}

pub fn validate_degree(degree: usize) -> Result<(), ValidationError> {
    if degree > MAX_DEGREE {
        let mut err = ValidationError::new("degree");
        err.message = Some(format!("degree must be between 0 and {}", MAX_DEGREE).into());
        return Err(err);
    }
    Ok(())
}

fn validate_source_url(url: &str) -> Result<(), ValidationError> {
    let lower = url.trim().to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        Ok(())
    } else {
        let mut err = ValidationError::new("source_url");
        err.message = Some("source_url must be an http(s) URL".into());
        Err(err)
    }
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("ticket_forecast={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .json()
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .try_init();
    }
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. Default config (config/default.toml)
/// 3. Environment-specific config (config/{env}.toml)
/// 4. Environment variables (APP__*, nested with `__`, e.g. APP__FORECAST__DEGREE)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    load_config_from(CONFIG_DIR)
}

/// Same as [`load_config`] with an explicit config directory.
pub fn load_config_from(config_dir: impl AsRef<Path>) -> Result<AppConfig, AppConfigError> {
    let config_dir = config_dir.as_ref();
    // Support both RUN_ENV and APP_ENV for selecting config profile
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !config_dir.exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            config_dir.display()
        );
    }

    let config = Config::builder()
        .set_default("host", DEFAULT_HOST)?
        .set_default("port", DEFAULT_PORT as i64)?
        .set_default("environment", run_env.as_str())?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{}/default", config_dir.display())).required(false))
        .add_source(
            File::with_name(&format!("{}/{}", config_dir.display(), run_env)).required(false),
        )
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    app_config.validate_additional_constraints().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}
