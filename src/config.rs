use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Flat environment variables honoured on top of the `RETENTION__*` scheme.
const FLAT_ENV_OVERRIDES: &[(&str, &str)] = &[
    ("SECRET_KEY", "auth.secret_key"),
    ("DATABASE_URL", "storage.path"),
    ("MODEL_PATH", "model.path"),
    ("MARKETING_WEBHOOK_URL", "marketing.webhook_url"),
    ("MARKETING_WEBHOOK_TIMEOUT", "marketing.webhook_timeout_secs"),
    ("MARKETING_WEBHOOK_RETRIES", "marketing.webhook_retries"),
    ("RISK_THRESHOLD_HIGH", "risk.high_threshold"),
    ("RISK_THRESHOLD_MEDIUM", "risk.medium_threshold"),
    ("HIGH_RISK_CAMPAIGN_ID", "marketing.campaigns.high"),
    ("MEDIUM_RISK_CAMPAIGN_ID", "marketing.campaigns.medium"),
    ("LOW_RISK_CAMPAIGN_ID", "marketing.campaigns.low"),
];

/// Flat boolean switches; only `true`, `1` and `t` turn them on.
const FLAT_BOOL_OVERRIDES: &[(&str, &str)] =
    &[("MARKETING_WEBHOOK_ENABLED", "marketing.webhook_enabled")];

fn legacy_bool(raw: &str) -> bool {
    matches!(raw.trim().to_lowercase().as_str(), "true" | "1" | "t")
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Token signing and password hashing
    #[serde(default)]
    pub auth: AuthConfig,

    /// Persistent store configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Churn model artifact
    #[serde(default)]
    pub model: ModelConfig,

    /// Risk tier thresholds
    #[serde(default)]
    pub risk: RiskConfig,

    /// Marketing webhook configuration
    #[serde(default)]
    pub marketing: MarketingConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self> {
        let config_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config/default.toml".to_string());
        Self::load_from(&config_path)
    }

    /// Load configuration, layering `config_path` over the embedded defaults
    pub fn load_from(config_path: &str) -> Result<Self> {
        let mut builder = config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            // Override with config file if it exists
            .add_source(config::File::with_name(config_path).required(false))
            // Override with environment variables (prefix: RETENTION__)
            .add_source(
                config::Environment::with_prefix("RETENTION")
                    .separator("__")
                    .try_parsing(true),
            );

        for (var, key) in FLAT_ENV_OVERRIDES {
            builder = builder.set_override_option(*key, std::env::var(var).ok())?;
        }
        for (var, key) in FLAT_BOOL_OVERRIDES {
            let value = std::env::var(var).ok().map(|raw| legacy_bool(&raw));
            builder = builder.set_override_option(*key, value)?;
        }

        let config: Config = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the service cannot run with
    pub fn validate(&self) -> Result<()> {
        self.risk.validate()?;

        if self.auth.secret_key.trim().is_empty() {
            return Err(AppError::Configuration(
                "auth.secret_key must not be empty".to_string(),
            ));
        }

        if self.auth.token_ttl_hours <= 0 {
            return Err(AppError::Configuration(
                "auth.token_ttl_hours must be positive".to_string(),
            ));
        }

        if !(4..=31).contains(&self.auth.bcrypt_cost) {
            return Err(AppError::Configuration(
                "auth.bcrypt_cost must be between 4 and 31".to_string(),
            ));
        }

        if self.marketing.webhook_retries == 0 {
            return Err(AppError::Configuration(
                "marketing.webhook_retries must be at least 1".to_string(),
            ));
        }

        if self.server.request_timeout_secs == 0 {
            return Err(AppError::Configuration(
                "server.request_timeout_secs must be positive".to_string(),
            ));
        }

        // Predict waits for the notifier, so its retries must finish inside the request deadline
        let request_timeout = Duration::from_secs(self.server.request_timeout_secs);
        let dispatch = self.marketing.worst_case_dispatch();
        if self.marketing.webhook_enabled && dispatch >= request_timeout {
            return Err(AppError::Configuration(format!(
                "marketing webhook worst case ({} ms) must stay below server.request_timeout_secs ({} s)",
                dispatch.as_millis(),
                self.server.request_timeout_secs
            )));
        }

        if self.storage.backend == StorageBackend::Sled && self.storage.path.is_none() {
            return Err(AppError::Configuration(
                "Sled backend requires 'storage.path' configuration".to_string(),
            ));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Request timeout (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HS256 signing key for bearer tokens
    #[serde(default = "default_secret_key")]
    pub secret_key: String,

    /// Token lifetime, fixed at issuance
    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: i64,

    /// bcrypt work factor
    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,

    /// Require a bearer token on /api/predict and /api/segments
    #[serde(default)]
    pub protect_api: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret_key: default_secret_key(),
            token_ttl_hours: default_token_ttl_hours(),
            bcrypt_cost: default_bcrypt_cost(),
            protect_api: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Store backend type
    #[serde(default)]
    pub backend: StorageBackend,

    /// Path for the embedded database
    pub path: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            path: Some(PathBuf::from("./instance/retention.db")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    Sled,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// JSON model artifact produced by the training pipeline
    #[serde(default = "default_model_path")]
    pub path: PathBuf,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: default_model_path(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RiskConfig {
    /// Probabilities at or above this are high risk
    #[serde(default = "default_high_threshold")]
    pub high_threshold: f64,

    /// Probabilities at or above this (and below high) are medium risk
    #[serde(default = "default_medium_threshold")]
    pub medium_threshold: f64,
}

impl RiskConfig {
    pub fn validate(&self) -> Result<()> {
        let in_range = |v: f64| (0.0..=1.0).contains(&v);
        if !in_range(self.high_threshold) || !in_range(self.medium_threshold) {
            return Err(AppError::Configuration(
                "risk thresholds must lie within [0, 1]".to_string(),
            ));
        }
        if self.medium_threshold > self.high_threshold {
            return Err(AppError::Configuration(format!(
                "risk.medium_threshold ({}) must not exceed risk.high_threshold ({})",
                self.medium_threshold, self.high_threshold
            )));
        }
        Ok(())
    }
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            high_threshold: default_high_threshold(),
            medium_threshold: default_medium_threshold(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketingConfig {
    /// Enable webhook notifications
    #[serde(default)]
    pub webhook_enabled: bool,

    /// Marketing system endpoint
    pub webhook_url: Option<String>,

    /// Per-attempt timeout (seconds)
    #[serde(default = "default_webhook_timeout")]
    pub webhook_timeout_secs: u64,

    /// Total delivery attempts
    #[serde(default = "default_webhook_retries")]
    pub webhook_retries: u32,

    /// Backoff unit; the delay after attempt n is n units
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Also dispatch campaigns for low-risk customers
    #[serde(default)]
    pub notify_low_risk: bool,

    /// Campaign identifiers per tier
    #[serde(default)]
    pub campaigns: CampaignConfig,

    /// Extra headers sent with every webhook request
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl MarketingConfig {
    /// Longest a dispatch can take: every attempt times out and each
    /// attempt but the last is followed by its backoff delay
    pub fn worst_case_dispatch(&self) -> Duration {
        let retries = u64::from(self.webhook_retries);
        let attempts = Duration::from_secs(self.webhook_timeout_secs.saturating_mul(retries));
        let backoff_units = retries * retries.saturating_sub(1) / 2;
        let backoff = Duration::from_millis(self.retry_backoff_ms.saturating_mul(backoff_units));
        attempts.saturating_add(backoff)
    }
}

impl Default for MarketingConfig {
    fn default() -> Self {
        Self {
            webhook_enabled: false,
            webhook_url: None,
            webhook_timeout_secs: default_webhook_timeout(),
            webhook_retries: default_webhook_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            notify_low_risk: false,
            campaigns: CampaignConfig::default(),
            headers: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignConfig {
    pub high: Option<String>,
    pub medium: Option<String>,
    pub low: Option<String>,
}

impl Default for CampaignConfig {
    fn default() -> Self {
        Self {
            high: Some("high_retention_campaign".to_string()),
            medium: Some("medium_retention_campaign".to_string()),
            low: Some("low_retention_campaign".to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logs: bool,

    /// Enable Prometheus metrics
    #[serde(default = "default_true")]
    pub prometheus_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
            prometheus_enabled: true,
        }
    }
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    30
}

fn default_secret_key() -> String {
    "you-will-never-guess".to_string()
}

fn default_token_ttl_hours() -> i64 {
    24
}

fn default_bcrypt_cost() -> u32 {
    bcrypt::DEFAULT_COST
}

fn default_model_path() -> PathBuf {
    PathBuf::from("./data/churn_model.json")
}

fn default_high_threshold() -> f64 {
    0.7
}

fn default_medium_threshold() -> f64 {
    0.4
}

fn default_webhook_timeout() -> u64 {
    5
}

fn default_webhook_retries() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    1000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}
