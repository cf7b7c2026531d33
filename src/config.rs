use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

use crate::auth::TokenConfig;
use crate::db::DbConfig;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const CONFIG_DIR: &str = "config";
const DEFAULT_BUCKET: &str = "order-attachments";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const MIN_JWT_SECRET_LEN: usize = 32;
const TOKEN_ISSUER: &str = "studio-storefront";

/// Where authentication, order tables and attachments live.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum BackendMode {
    /// In-process fake, seeded with demo data.
    #[default]
    Mock,
    /// Supabase-compatible backend-as-a-service.
    Hosted,
    /// Self-hosted relational database via sea-orm.
    Database,
}

/// Application configuration
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct AppConfig {
    /// Application environment
    #[validate(length(min = 1))]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    #[serde(default)]
    pub backend: BackendMode,

    /// Base URL of the hosted backend, e.g. `https://xyz.supabase.co`
    #[serde(default)]
    #[validate(url)]
    pub hosted_url: Option<String>,

    /// Public (anon) API key of the hosted backend
    #[serde(default)]
    pub hosted_anon_key: Option<String>,

    /// Per-request timeout for the hosted backend (1s - 5min)
    #[serde(default = "default_request_timeout_secs")]
    #[validate(range(min = 1, max = 300))]
    pub request_timeout_secs: u64,

    /// Database connection URL (self-hosted backend)
    #[serde(default)]
    pub database_url: String,

    #[serde(default = "default_db_max_connections")]
    #[validate(range(min = 1, max = 100))]
    pub db_max_connections: u32,

    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// JWT secret key for the self-hosted backend
    #[serde(default)]
    pub jwt_secret: String,

    /// JWT expiration time in seconds (5min - 30d)
    #[serde(default = "default_jwt_expiration")]
    #[validate(range(min = 300, max = 2592000))]
    pub jwt_expiration: u64,

    /// Directory holding the local storage documents (cart, session, ...)
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,

    #[serde(default = "default_bucket")]
    #[validate(length(min = 1, max = 63))]
    pub attachments_bucket: String,

    /// Where the self-hosted backend writes uploaded attachments
    #[serde(default = "default_attachments_dir")]
    pub attachments_dir: PathBuf,

    /// Public URL prefix under which `attachments_dir` is served
    #[serde(default = "default_public_base_url")]
    #[validate(url)]
    pub public_base_url: String,

    /// Amount charged up front for a custom service request
    #[serde(default = "default_deposit_amount")]
    #[validate(custom = "validate_deposit_amount")]
    pub deposit_amount: Decimal,

    /// Administrator account created by the mock backend and `seed-data`
    #[serde(default)]
    #[validate(email)]
    pub admin_email: Option<String>,

    #[serde(default)]
    pub admin_password: Option<String>,
}

impl AppConfig {
    /// Built-in defaults: mock backend, development environment.
    pub fn new() -> Self {
        Self {
            environment: DEFAULT_ENV.to_string(),
            log_level: default_log_level(),
            log_json: false,
            backend: BackendMode::Mock,
            hosted_url: None,
            hosted_anon_key: None,
            request_timeout_secs: default_request_timeout_secs(),
            database_url: String::new(),
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            jwt_secret: String::new(),
            jwt_expiration: default_jwt_expiration(),
            storage_dir: default_storage_dir(),
            attachments_bucket: default_bucket(),
            attachments_dir: default_attachments_dir(),
            public_base_url: default_public_base_url(),
            deposit_amount: default_deposit_amount(),
            admin_email: None,
            admin_password: None,
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn token_config(&self) -> TokenConfig {
        TokenConfig {
            secret: self.jwt_secret.clone(),
            issuer: TOKEN_ISSUER.to_string(),
            expiration: Duration::from_secs(self.jwt_expiration),
        }
    }

    pub fn db_config(&self) -> DbConfig {
        DbConfig {
            url: self.database_url.clone(),
            max_connections: self.db_max_connections,
            min_connections: self.db_min_connections,
            ..Default::default()
        }
    }

    /// Checks that depend on the selected backend mode.
    pub fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        match self.backend {
            BackendMode::Mock => {}
            BackendMode::Hosted => {
                if self.hosted_url.as_deref().map_or(true, str::is_empty) {
                    let mut err = ValidationError::new("hosted_url_required");
                    err.message = Some("Set APP__HOSTED_URL when backend = \"hosted\"".into());
                    errors.add("hosted_url", err);
                }
                if self.hosted_anon_key.as_deref().map_or(true, str::is_empty) {
                    let mut err = ValidationError::new("hosted_anon_key_required");
                    err.message =
                        Some("Set APP__HOSTED_ANON_KEY when backend = \"hosted\"".into());
                    errors.add("hosted_anon_key", err);
                }
            }
            BackendMode::Database => {
                if self.database_url.trim().is_empty() {
                    let mut err = ValidationError::new("database_url_required");
                    err.message =
                        Some("Set APP__DATABASE_URL when backend = \"database\"".into());
                    errors.add("database_url", err);
                }
                if self.jwt_secret.trim().len() < MIN_JWT_SECRET_LEN {
                    let mut err = ValidationError::new("jwt_secret");
                    err.message = Some(
                        format!(
                            "JWT secret must be at least {MIN_JWT_SECRET_LEN} characters when backend = \"database\""
                        )
                        .into(),
                    );
                    errors.add("jwt_secret", err);
                }
            }
        }

        if self.db_min_connections > self.db_max_connections {
            let mut err = ValidationError::new("db_min_connections");
            err.message = Some("db_min_connections must not exceed db_max_connections".into());
            errors.add("db_min_connections", err);
        }

        if self.admin_email.is_some() != self.admin_password.is_some() {
            let mut err = ValidationError::new("admin_credentials");
            err.message = Some("admin_email and admin_password must be set together".into());
            errors.add("admin_password", err);
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_db_max_connections() -> u32 {
    10
}

fn default_db_min_connections() -> u32 {
    1
}

fn default_jwt_expiration() -> u64 {
    3600
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from(".storefront")
}

fn default_bucket() -> String {
    DEFAULT_BUCKET.to_string()
}

fn default_attachments_dir() -> PathBuf {
    PathBuf::from("attachments")
}

fn default_public_base_url() -> String {
    "http://localhost:8080/attachments".to_string()
}

fn default_deposit_amount() -> Decimal {
    Decimal::from(100)
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

fn validate_deposit_amount(amount: &Decimal) -> Result<(), ValidationError> {
    if amount.is_sign_negative() || amount.is_zero() {
        let mut err = ValidationError::new("deposit_amount");
        err.message = Some("deposit_amount must be greater than 0".into());
        return Err(err);
    }
    Ok(())
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("studio_storefront={}", level);
    let filter = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map(EnvFilter::new)
        .unwrap_or_else(|| EnvFilter::new(default_directive));

    // try_init: a subscriber may already be installed (tests, embedding apps)
    if json {
        let _ = fmt().with_env_filter(filter).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter).try_init();
    }
}

/// Loads application configuration from `./config`.
///
/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. Default config (config/default.toml)
/// 3. Environment-specific config (config/{RUN_ENV}.toml)
/// 4. Environment variables (APP__*)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    load_config_from(Path::new(CONFIG_DIR), &run_env)
}

/// Same as [`load_config`] with an explicit config directory and profile.
pub fn load_config_from(config_dir: &Path, run_env: &str) -> Result<AppConfig, AppConfigError> {
    info!("Loading configuration for environment: {}", run_env);

    if !config_dir.exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            config_dir.display()
        );
    }

    let config = Config::builder()
        .set_default("environment", run_env)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .set_default("backend", "mock")?
        .add_source(File::with_name(&config_dir.join("default").to_string_lossy()).required(false))
        .add_source(File::with_name(&config_dir.join(run_env).to_string_lossy()).required(false))
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

    info!(backend = %app_config.backend, "Configuration loaded successfully");
    Ok(app_config)
}
