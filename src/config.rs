use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::info;
use validator::{Validate, ValidationError, ValidationErrors};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_BC_TIMEOUT_SECS: u64 = 30;
const DEFAULT_BC_MAX_RETRIES: u32 = 3;
const DEFAULT_BC_RETRY_BASE_DELAY_MS: u64 = 500;
const DEFAULT_BC_PAGE_SIZE: u32 = 100;
const DEFAULT_BC_SYNC_BATCH_SIZE: usize = 50;
const DEFAULT_BC_PRICE_FETCH_CONCURRENCY: usize = 10;
const DEFAULT_BC_PRICE_FETCH_PAUSE_MS: u64 = 250;
const DEFAULT_BC_TOKEN_EXPIRY_MARGIN_SECS: i64 = 60;

/// Business Central integration configuration
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct BcConfig {
    /// Azure AD tenant id used for the client-credentials grant
    #[serde(default)]
    pub tenant_id: String,

    /// OAuth2 client id
    #[serde(default)]
    pub client_id: String,

    /// OAuth2 client secret
    #[serde(default)]
    pub client_secret: String,

    /// OAuth2 scope requested with the token
    #[serde(default = "default_bc_scope")]
    pub scope: String,

    /// Token endpoint URL; `{tenant_id}` is substituted
    #[serde(default = "default_bc_token_url")]
    pub token_url: String,

    /// Base URL of the Business Central API; `{tenant_id}` is substituted
    #[serde(default = "default_bc_base_url")]
    pub base_url: String,

    /// Preferred BC environment name, probed before the fallback list
    #[serde(default = "default_bc_environment")]
    pub environment: String,

    /// Company display name to select from the companies listing (first company if unset)
    #[serde(default)]
    pub company_name: Option<String>,

    /// Hard per-call HTTP timeout (seconds)
    #[serde(default = "default_bc_timeout_secs")]
    pub timeout_secs: u64,

    /// Retry ceiling for 429/5xx responses on GET calls
    #[serde(default = "default_bc_max_retries")]
    pub max_retries: u32,

    /// Base delay for exponential backoff (milliseconds)
    #[serde(default = "default_bc_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// Page size requested from paginated BC resources
    #[serde(default = "default_bc_page_size")]
    pub page_size: u32,

    /// Number of mirror rows upserted per local batch
    #[serde(default = "default_bc_sync_batch_size")]
    #[validate(range(min = 1))]
    pub sync_batch_size: usize,

    /// Concurrent per-item price fetches within one batch
    #[serde(default = "default_bc_price_fetch_concurrency")]
    #[validate(range(min = 1, max = 32))]
    pub price_fetch_concurrency: usize,

    /// Pause between price-fetch batches (milliseconds)
    #[serde(default = "default_bc_price_fetch_pause_ms")]
    pub price_fetch_pause_ms: u64,

    /// Seconds before expiry at which a cached token is considered stale
    #[serde(default = "default_bc_token_expiry_margin_secs")]
    pub token_expiry_margin_secs: i64,

    /// Interval between background catalog sync runs (seconds, 0 = disabled)
    #[serde(default)]
    pub sync_interval_secs: u64,
}

impl Default for BcConfig {
    fn default() -> Self {
        Self {
            tenant_id: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            scope: default_bc_scope(),
            token_url: default_bc_token_url(),
            base_url: default_bc_base_url(),
            environment: default_bc_environment(),
            company_name: None,
            timeout_secs: default_bc_timeout_secs(),
            max_retries: default_bc_max_retries(),
            retry_base_delay_ms: default_bc_retry_base_delay_ms(),
            page_size: default_bc_page_size(),
            sync_batch_size: default_bc_sync_batch_size(),
            price_fetch_concurrency: default_bc_price_fetch_concurrency(),
            price_fetch_pause_ms: default_bc_price_fetch_pause_ms(),
            token_expiry_margin_secs: default_bc_token_expiry_margin_secs(),
            sync_interval_secs: 0,
        }
    }
}

fn default_bc_scope() -> String {
    "https://api.businesscentral.dynamics.com/.default".to_string()
}

fn default_bc_token_url() -> String {
    "https://login.microsoftonline.com/{tenant_id}/oauth2/v2.0/token".to_string()
}

fn default_bc_base_url() -> String {
    "https://api.businesscentral.dynamics.com/v2.0/{tenant_id}".to_string()
}

fn default_bc_environment() -> String {
    "Production".to_string()
}

fn default_bc_timeout_secs() -> u64 {
    DEFAULT_BC_TIMEOUT_SECS
}

fn default_bc_max_retries() -> u32 {
    DEFAULT_BC_MAX_RETRIES
}

fn default_bc_retry_base_delay_ms() -> u64 {
    DEFAULT_BC_RETRY_BASE_DELAY_MS
}

fn default_bc_page_size() -> u32 {
    DEFAULT_BC_PAGE_SIZE
}

fn default_bc_sync_batch_size() -> usize {
    DEFAULT_BC_SYNC_BATCH_SIZE
}

fn default_bc_price_fetch_concurrency() -> usize {
    DEFAULT_BC_PRICE_FETCH_CONCURRENCY
}

fn default_bc_price_fetch_pause_ms() -> u64 {
    DEFAULT_BC_PRICE_FETCH_PAUSE_MS
}

fn default_bc_token_expiry_margin_secs() -> i64 {
    DEFAULT_BC_TOKEN_EXPIRY_MARGIN_SECS
}

impl BcConfig {
    /// Fully resolved token endpoint
    pub fn resolved_token_url(&self) -> String {
        self.token_url.replace("{tenant_id}", &self.tenant_id)
    }

    /// Fully resolved API base URL
    pub fn resolved_base_url(&self) -> String {
        self.base_url.replace("{tenant_id}", &self.tenant_id)
    }
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// CORS: comma-separated list of allowed origins (production)
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// Allow permissive CORS fallback
    #[serde(default)]
    pub cors_allow_any_origin: bool,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// DB pool: min connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// DB timeouts (seconds)
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// Policy applied when a sortie would drive a salesperson's stock negative:
    /// "reject" refuses the movement, "allow" records it with a warning
    #[serde(default = "default_negative_stock_policy")]
    #[validate(custom = "validate_negative_stock_policy")]
    pub negative_stock_policy: String,

    /// Capacity of the domain event channel
    #[serde(default = "default_event_channel_capacity")]
    #[validate(custom = "validate_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// Business Central integration settings
    #[serde(default)]
    #[validate]
    pub bc: BcConfig,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_db_max_connections() -> u32 {
    10
}

fn default_db_min_connections() -> u32 {
    1
}

fn default_db_connect_timeout_secs() -> u64 {
    30
}

fn default_db_idle_timeout_secs() -> u64 {
    600
}

fn default_db_acquire_timeout_secs() -> u64 {
    8
}

fn default_negative_stock_policy() -> String {
    "reject".to_string()
}

fn default_event_channel_capacity() -> usize {
    1024
}

fn validate_negative_stock_policy(policy: &str) -> Result<(), ValidationError> {
    match policy {
        "reject" | "allow" => Ok(()),
        _ => {
            let mut err = ValidationError::new("negative_stock_policy");
            err.message = Some("negative_stock_policy must be \"reject\" or \"allow\"".into());
            Err(err)
        }
    }
}

fn validate_event_channel_capacity(capacity: usize) -> Result<(), ValidationError> {
    if capacity == 0 {
        let mut err = ValidationError::new("event_channel_capacity");
        err.message = Some("event_channel_capacity must be greater than 0".into());
        return Err(err);
    }
    Ok(())
}

impl AppConfig {
    /// Construct a minimal configuration, used by tests and tooling.
    pub fn new(
        database_url: String,
        host: String,
        port: u16,
        environment: String,
    ) -> Self {
        Self {
            database_url,
            host,
            port,
            environment,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            cors_allowed_origins: None,
            cors_allow_any_origin: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            negative_stock_policy: default_negative_stock_policy(),
            event_channel_capacity: default_event_channel_capacity(),
            bc: BcConfig::default(),
        }
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn is_development(&self) -> bool {
        matches!(self.environment.as_str(), "development" | "dev" | "test")
    }

    pub fn should_allow_permissive_cors(&self) -> bool {
        self.cors_allow_any_origin || self.is_development()
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] ValidationErrors),
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::fmt;

    let default_directive = format!("vansale_api={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt().with_env_filter(filter_directive).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter_directive).try_init();
    }
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Default config (config/default.toml)
/// 2. Environment-specific config (config/{env}.toml)
/// 3. Environment variables (APP_*)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    // Support both RUN_ENV and APP_ENV for selecting config profile
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

    let builder = Config::builder()
        .set_default("database_url", "sqlite://vansale.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", DEFAULT_PORT as i64)?
        .set_default("environment", run_env.clone())?
        .add_source(File::with_name(&format!("{CONFIG_DIR}/default")).required(false))
        .add_source(File::with_name(&format!("{CONFIG_DIR}/{run_env}")).required(false))
        .add_source(
            Environment::with_prefix("APP")
                .separator("__")
                .try_parsing(true),
        );

    let cfg: AppConfig = builder.build()?.try_deserialize()?;
    cfg.validate()?;

    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> AppConfig {
        AppConfig::new(
            "sqlite::memory:".to_string(),
            "127.0.0.1".to_string(),
            8080,
            "test".to_string(),
        )
    }

    #[test]
    fn default_config_validates() {
        base_config().validate().expect("defaults should validate");
    }

    #[test]
    fn invalid_negative_stock_policy_is_rejected() {
        let mut cfg = base_config();
        cfg.negative_stock_policy = "panic".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_event_channel_capacity_is_rejected() {
        let mut cfg = base_config();
        cfg.event_channel_capacity = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn bc_urls_substitute_tenant() {
        let mut bc = BcConfig::default();
        bc.tenant_id = "my-tenant".to_string();
        assert_eq!(
            bc.resolved_token_url(),
            "https://login.microsoftonline.com/my-tenant/oauth2/v2.0/token"
        );
        assert_eq!(
            bc.resolved_base_url(),
            "https://api.businesscentral.dynamics.com/v2.0/my-tenant"
        );
    }

    #[test]
    fn permissive_cors_allowed_in_development_only() {
        let mut cfg = base_config();
        cfg.environment = "development".to_string();
        assert!(cfg.should_allow_permissive_cors());

        cfg.environment = "production".to_string();
        assert!(!cfg.should_allow_permissive_cors());

        cfg.cors_allow_any_origin = true;
        assert!(cfg.should_allow_permissive_cors());
    }
}
