use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_RATE_LIMIT_REQUESTS: u32 = 100;
const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 60;
const DEFAULT_RATE_LIMIT_NAMESPACE: &str = "shopfront:rl";
const DEFAULT_RAZORPAY_API_BASE: &str = "https://api.razorpay.com/v1";
const DEV_DEFAULT_JWT_SECRET: &str =
    "this_is_a_development_secret_key_that_is_long_enough_for_local_testing_only";

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Redis connection URL, used by the shared rate limiter store
    pub redis_url: String,

    /// JWT signing secret
    #[validate(length(min = 32), custom = "validate_jwt_secret")]
    pub jwt_secret: String,

    /// Access token lifetime in seconds
    #[validate(range(min = 300, max = 2_592_000))]
    pub jwt_expiration: usize,

    /// Refresh token lifetime in seconds
    #[validate(range(min = 3600, max = 7_776_000))]
    pub refresh_token_expiration: usize,

    /// Lifetime of the `token` session cookie in days
    #[serde(default = "default_cookie_expire_days")]
    #[validate(range(min = 1, max = 365))]
    pub cookie_expire_days: i64,

    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
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

    /// CORS: allow credentials (required for the session cookie)
    #[serde(default = "default_true_bool")]
    pub cors_allow_credentials: bool,

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

    /// Rate limiting: requests per window
    #[serde(default = "default_rate_limit_requests")]
    pub rate_limit_requests_per_window: u32,
    /// Rate limiting: window size (seconds)
    #[serde(default = "default_rate_limit_window_secs")]
    pub rate_limit_window_seconds: u64,
    /// Rate limiting: include headers
    #[serde(default = "default_true_bool")]
    pub rate_limit_enable_headers: bool,

    /// Rate limit path policies: comma-separated list of `prefix:limit:window_secs`
    /// Example: "/api/v1/search:30:60,/api/v1/products:120:60"
    #[serde(default)]
    pub rate_limit_path_policies: Option<String>,

    /// Enable Redis-backed rate limiter
    #[serde(default)]
    pub rate_limit_use_redis: bool,

    /// Namespace for rate limiter keys when Redis is enabled
    #[serde(default = "default_rate_limit_namespace")]
    pub rate_limit_namespace: String,

    /// Storefront base URL used in verification and reset links
    #[serde(default = "default_client_url")]
    #[validate(url)]
    pub client_url: String,

    /// Currency code for payment orders
    #[serde(default = "default_currency")]
    #[validate(length(equal = 3))]
    pub default_currency: String,

    /// Tax rate applied to cart subtotals (0.10 = 10%)
    #[serde(default = "default_tax_rate")]
    #[validate(custom = "validate_tax_rate")]
    pub tax_rate: Decimal,

    /// Subtotal above which standard shipping is free
    #[serde(default = "default_free_shipping_threshold")]
    pub free_shipping_threshold: Decimal,

    /// Flat shipping fee below the free-shipping threshold
    #[serde(default = "default_standard_shipping_fee")]
    pub standard_shipping_fee: Decimal,

    /// Variants at or below this stock count are reported as low stock
    #[serde(default = "default_low_stock_threshold")]
    pub low_stock_threshold: i32,

    /// Phone OTP lifetime in seconds
    #[serde(default = "default_otp_ttl_secs")]
    #[validate(range(min = 60, max = 3600))]
    pub otp_ttl_secs: i64,

    /// Email verification link lifetime in seconds
    #[serde(default = "default_verification_token_ttl_secs")]
    pub verification_token_ttl_secs: i64,

    /// Password reset link lifetime in seconds
    #[serde(default = "default_reset_token_ttl_secs")]
    pub reset_token_ttl_secs: i64,

    /// Days after delivery during which a return can be requested
    #[serde(default = "default_return_window_days")]
    pub return_window_days: i64,

    /// Per-request timeout in seconds; slower requests answer 408
    #[serde(default = "default_request_timeout_secs")]
    #[validate(range(min = 1))]
    pub request_timeout_secs: u64,

    /// Event channel capacity for async event processing
    #[serde(default = "default_event_channel_capacity")]
    #[validate(range(min = 1))]
    pub event_channel_capacity: usize,

    /// Payment gateway key id (`rzp_test_...` / `rzp_live_...`)
    #[serde(default)]
    #[validate(custom = "validate_razorpay_key_id")]
    pub razorpay_key_id: Option<String>,

    /// Payment gateway key secret; also signs checkout callbacks
    #[serde(default)]
    pub razorpay_key_secret: Option<String>,

    /// Payment gateway REST base URL
    #[serde(default = "default_razorpay_api_base")]
    #[validate(url)]
    pub razorpay_api_base: String,

    /// Transactional email provider endpoint; logs messages when unset
    #[serde(default)]
    pub email_api_url: Option<String>,
    #[serde(default)]
    pub email_api_key: Option<String>,
    #[serde(default = "default_email_from")]
    pub email_from: String,

    /// SMS provider endpoint; logs messages when unset
    #[serde(default)]
    pub sms_api_url: Option<String>,
    #[serde(default)]
    pub sms_api_key: Option<String>,

    /// JWT issuer name
    #[serde(default = "default_auth_issuer")]
    pub auth_issuer: String,

    /// JWT audience
    #[serde(default = "default_auth_audience")]
    pub auth_audience: String,
}

impl AppConfig {
    /// Creates a new configuration
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        database_url: String,
        redis_url: String,
        jwt_secret: String,
        jwt_expiration: usize,
        refresh_token_expiration: usize,
        host: String,
        port: u16,
        environment: String,
    ) -> Self {
        Self {
            database_url,
            redis_url,
            jwt_secret,
            jwt_expiration,
            refresh_token_expiration,
            cookie_expire_days: default_cookie_expire_days(),
            host,
            port,
            environment,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            cors_allowed_origins: None,
            cors_allow_any_origin: false,
            cors_allow_credentials: true,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            rate_limit_requests_per_window: default_rate_limit_requests(),
            rate_limit_window_seconds: default_rate_limit_window_secs(),
            rate_limit_enable_headers: true,
            rate_limit_path_policies: None,
            rate_limit_use_redis: false,
            rate_limit_namespace: default_rate_limit_namespace(),
            client_url: default_client_url(),
            default_currency: default_currency(),
            tax_rate: default_tax_rate(),
            free_shipping_threshold: default_free_shipping_threshold(),
            standard_shipping_fee: default_standard_shipping_fee(),
            low_stock_threshold: default_low_stock_threshold(),
            otp_ttl_secs: default_otp_ttl_secs(),
            verification_token_ttl_secs: default_verification_token_ttl_secs(),
            reset_token_ttl_secs: default_reset_token_ttl_secs(),
            return_window_days: default_return_window_days(),
            request_timeout_secs: default_request_timeout_secs(),
            event_channel_capacity: default_event_channel_capacity(),
            razorpay_key_id: None,
            razorpay_key_secret: None,
            razorpay_api_base: default_razorpay_api_base(),
            email_api_url: None,
            email_api_key: None,
            email_from: default_email_from(),
            sms_api_url: None,
            sms_api_key: None,
            auth_issuer: default_auth_issuer(),
            auth_audience: default_auth_audience(),
        }
    }

    /// Checks if running in production environment
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// Checks if running in development environment
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    /// Returns true if explicit CORS origins are configured
    pub fn has_cors_allowed_origins(&self) -> bool {
        self.cors_allowed_origins
            .as_ref()
            .map(|raw| raw.split(',').any(|origin| !origin.trim().is_empty()))
            .unwrap_or(false)
    }

    /// Whether we should fall back to permissive CORS
    pub fn should_allow_permissive_cors(&self) -> bool {
        self.is_development() || self.cors_allow_any_origin
    }

    /// Session cookie lifetime
    pub fn cookie_max_age(&self) -> Duration {
        Duration::from_secs((self.cookie_expire_days.max(0) as u64) * 24 * 60 * 60)
    }

    /// Gateway credentials when both halves are configured
    pub fn razorpay_credentials(&self) -> Option<(&str, &str)> {
        match (&self.razorpay_key_id, &self.razorpay_key_secret) {
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => {
                Some((id.as_str(), secret.as_str()))
            }
            _ => None,
        }
    }

    /// Gets log level reference
    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if !self.should_allow_permissive_cors() && !self.has_cors_allowed_origins() {
            let mut err = ValidationError::new("cors_allowed_origins_required");
            err.message = Some(
                "Set APP__CORS_ALLOWED_ORIGINS for non-development environments or explicitly opt-in via APP__CORS_ALLOW_ANY_ORIGIN=true".into(),
            );
            errors.add("cors_allowed_origins", err);
        }

        if !self.is_development() && self.jwt_secret.trim() == DEV_DEFAULT_JWT_SECRET {
            let mut err = ValidationError::new("jwt_secret_default_dev");
            err.message = Some(
                "The bundled development JWT secret must not be used outside development. Set APP__JWT_SECRET to a unique, secure value."
                    .into(),
            );
            errors.add("jwt_secret", err);
        }

        if self.razorpay_key_id.is_some() != self.razorpay_key_secret.is_some() {
            let mut err = ValidationError::new("razorpay_credentials_incomplete");
            err.message =
                Some("APP__RAZORPAY_KEY_ID and APP__RAZORPAY_KEY_SECRET must be set together".into());
            errors.add("razorpay_key_secret", err);
        }

        if self.free_shipping_threshold < Decimal::ZERO || self.standard_shipping_fee < Decimal::ZERO
        {
            let mut err = ValidationError::new("shipping_amounts_negative");
            err.message = Some("Shipping threshold and fee must not be negative".into());
            errors.add("standard_shipping_fee", err);
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

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_cookie_expire_days() -> i64 {
    7
}

fn default_db_max_connections() -> u32 {
    16
}

fn default_db_min_connections() -> u32 {
    2
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

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_rate_limit_requests() -> u32 {
    DEFAULT_RATE_LIMIT_REQUESTS
}

fn default_rate_limit_window_secs() -> u64 {
    DEFAULT_RATE_LIMIT_WINDOW_SECS
}

fn default_rate_limit_namespace() -> String {
    DEFAULT_RATE_LIMIT_NAMESPACE.to_string()
}

fn default_true_bool() -> bool {
    true
}

fn default_client_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_currency() -> String {
    "INR".to_string()
}

fn default_tax_rate() -> Decimal {
    dec!(0.10)
}

fn default_free_shipping_threshold() -> Decimal {
    dec!(50)
}

fn default_standard_shipping_fee() -> Decimal {
    dec!(5)
}

fn default_low_stock_threshold() -> i32 {
    10
}

fn default_otp_ttl_secs() -> i64 {
    5 * 60
}

fn default_verification_token_ttl_secs() -> i64 {
    10 * 60
}

fn default_reset_token_ttl_secs() -> i64 {
    15 * 60
}

fn default_return_window_days() -> i64 {
    7
}

fn default_event_channel_capacity() -> usize {
    1024
}

fn default_razorpay_api_base() -> String {
    DEFAULT_RAZORPAY_API_BASE.to_string()
}

fn default_email_from() -> String {
    "no-reply@shopfront.local".to_string()
}

fn default_auth_issuer() -> String {
    "shopfront-api".to_string()
}

fn default_auth_audience() -> String {
    "shopfront-clients".to_string()
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

fn validate_jwt_secret(secret: &str) -> Result<(), ValidationError> {
    let trimmed = secret.trim();

    // Reject known insecure defaults and obvious placeholders
    const DISALLOWED: [&str; 4] = [
        "CHANGE_THIS_SECRET_IN_PRODUCTION",
        "your-secret-key",
        "your_jwt_secret",
        "default-secret-key",
    ];
    if DISALLOWED
        .iter()
        .any(|&bad| trimmed.eq_ignore_ascii_case(bad))
    {
        let mut err = ValidationError::new("jwt_secret");
        err.message = Some("JWT secret must be overridden with a secure random value".into());
        return Err(err);
    }

    if let Some(first) = trimmed.chars().next() {
        if trimmed.chars().all(|c| c == first) {
            let mut err = ValidationError::new("jwt_secret");
            err.message = Some("JWT secret cannot be a repeated character sequence".into());
            return Err(err);
        }
    }

    let unique_chars: std::collections::HashSet<char> = trimmed.chars().collect();
    if unique_chars.len() < 10 {
        let mut err = ValidationError::new("jwt_secret");
        err.message =
            Some("JWT secret must have at least 10 unique characters for adequate entropy".into());
        return Err(err);
    }

    Ok(())
}

fn validate_tax_rate(rate: &Decimal) -> Result<(), ValidationError> {
    if *rate < Decimal::ZERO || *rate > Decimal::ONE {
        let mut err = ValidationError::new("tax_rate");
        err.message = Some("tax_rate must be between 0.0 and 1.0".into());
        return Err(err);
    }
    Ok(())
}

fn validate_razorpay_key_id(key_id: &str) -> Result<(), ValidationError> {
    if key_id.starts_with("rzp_") {
        Ok(())
    } else {
        let mut err = ValidationError::new("razorpay_key_id");
        err.message = Some("razorpay_key_id must start with rzp_".into());
        Err(err)
    }
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::fmt;

    let default_directive = format!("shopfront_api={},tower_http=debug", level);
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
/// 1. Built-in defaults
/// 2. Default config (config/default.toml)
/// 3. Environment-specific config (config/{env}.toml)
/// 4. Environment variables (APP__*)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
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

    // jwt_secret has no default and must come from a file or APP__JWT_SECRET.
    let config = Config::builder()
        .set_default("database_url", "sqlite://shopfront.db?mode=rwc")?
        .set_default("redis_url", "redis://localhost:6379")?
        .set_default("jwt_expiration", 604800)?
        .set_default("refresh_token_expiration", 2592000)?
        .set_default("host", "0.0.0.0")?
        .set_default("port", 8080)?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    if config.get_string("jwt_secret").is_err() {
        error!("JWT secret is not configured. Set APP__JWT_SECRET to a secure random string.");
        return Err(AppConfigError::Load(ConfigError::NotFound(
            "jwt_secret is required but not configured. Set APP__JWT_SECRET environment variable."
                .into(),
        )));
    }

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    app_config.validate_additional_constraints().map_err(|e| {
        error!("Configuration security validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}

#[cfg(test)]
mod cors_validation_tests {
    use super::*;

    fn base_config() -> AppConfig {
        AppConfig::new(
            "sqlite://shopfront.db?mode=memory".into(),
            "redis://127.0.0.1:6379".into(),
            "super_secure_jwt_secret_that_is_long_enough_123".into(),
            3600,
            86_400,
            "127.0.0.1".into(),
            8080,
            "production".into(),
        )
    }

    #[test]
    fn non_dev_requires_cors_origins() {
        let cfg = base_config();
        assert!(cfg.validate_additional_constraints().is_err());
    }

    #[test]
    fn non_dev_allows_override_flag() {
        let mut cfg = base_config();
        cfg.cors_allow_any_origin = true;
        assert!(cfg.validate_additional_constraints().is_ok());
    }

    #[test]
    fn non_dev_with_origins_passes() {
        let mut cfg = base_config();
        cfg.cors_allowed_origins = Some("https://example.com".into());
        assert!(cfg.validate_additional_constraints().is_ok());
    }

    #[test]
    fn development_allows_permissive_by_default() {
        let mut cfg = base_config();
        cfg.environment = "development".into();
        assert!(cfg.validate_additional_constraints().is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dev_config() -> AppConfig {
        AppConfig::new(
            "sqlite::memory:".into(),
            "redis://127.0.0.1:6379".into(),
            "k3y-for-tests-0123456789-abcdefghijklmnopqrstuvwxyz".into(),
            3600,
            86_400,
            "127.0.0.1".into(),
            8080,
            "development".into(),
        )
    }

    #[test]
    fn defaults_pass_validation() {
        let cfg = dev_config();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.tax_rate, dec!(0.10));
        assert_eq!(cfg.cookie_max_age(), Duration::from_secs(7 * 86_400));
    }

    #[test]
    fn razorpay_key_id_needs_prefix() {
        let mut cfg = dev_config();
        cfg.razorpay_key_id = Some("key_123".into());
        cfg.razorpay_key_secret = Some("secret".into());
        let errors = cfg.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("razorpay_key_id"));

        cfg.razorpay_key_id = Some("rzp_test_123".into());
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.razorpay_credentials(), Some(("rzp_test_123", "secret")));
    }

    #[test]
    fn razorpay_credentials_must_be_paired() {
        let mut cfg = dev_config();
        cfg.razorpay_key_id = Some("rzp_test_123".into());
        assert!(cfg.validate_additional_constraints().is_err());
        assert!(cfg.razorpay_credentials().is_none());
    }

    #[test]
    fn weak_jwt_secrets_are_rejected() {
        assert!(validate_jwt_secret(&"a".repeat(40)).is_err());
        assert!(validate_jwt_secret("your-secret-key").is_err());
        assert!(validate_jwt_secret("abababababababababababababababab").is_err());
        assert!(validate_jwt_secret("k3y-for-tests-0123456789-abcdefghijklmnop").is_ok());
    }

    #[test]
    fn tax_rate_must_be_a_fraction() {
        assert!(validate_tax_rate(&dec!(1.5)).is_err());
        assert!(validate_tax_rate(&dec!(-0.1)).is_err());
        assert!(validate_tax_rate(&dec!(0.18)).is_ok());
    }
}
