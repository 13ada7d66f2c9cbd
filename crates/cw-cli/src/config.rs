//! Configuration loading for the Crosswatch CLI.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Address the API server binds to.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Optional routing policy file. The builtin policy applies when
    /// absent.
    #[serde(default)]
    pub policy_file: Option<String>,

    /// Registered tenants and their ingestion tokens.
    #[serde(default, rename = "tenant")]
    pub tenants: Vec<TenantConfig>,

    /// Correlator tuning.
    #[serde(default)]
    pub correlator: CorrelatorConfig,

    /// Dispatch retry tuning.
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Ingestion rate limiting.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Outbound webhook endpoints per action kind.
    #[serde(default)]
    pub sinks: SinkConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            policy_file: None,
            tenants: Vec::new(),
            correlator: CorrelatorConfig::default(),
            dispatch: DispatchConfig::default(),
            rate_limit: RateLimitConfig::default(),
            sinks: SinkConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Creates a copy with secrets redacted, safe to print.
    pub fn redact_secrets(&self) -> Self {
        let mut config = self.clone();
        for tenant in &mut config.tenants {
            if !tenant.token.is_empty() {
                tenant.token = "***REDACTED***".to_string();
            }
        }
        config
    }
}

/// One registered tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantConfig {
    /// Tenant id, matched against envelope payloads.
    pub id: String,
    /// Bearer token the tenant authenticates with.
    pub token: String,
}

/// Correlator tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelatorConfig {
    /// Sliding window width in minutes.
    #[serde(default = "default_window_minutes")]
    pub window_minutes: i64,
    /// Distinct tenants required to open a group.
    #[serde(default = "default_min_tenants")]
    pub min_tenants: usize,
    /// Seconds between sweep passes.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

fn default_window_minutes() -> i64 {
    60
}

fn default_min_tenants() -> usize {
    3
}

fn default_sweep_interval() -> u64 {
    60
}

impl Default for CorrelatorConfig {
    fn default() -> Self {
        Self {
            window_minutes: default_window_minutes(),
            min_tenants: default_min_tenants(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

/// Dispatch retry tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    #[serde(default = "default_attempt_timeout_secs")]
    pub attempt_timeout_secs: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_backoff_ms() -> u64 {
    200
}

fn default_max_backoff_ms() -> u64 {
    5000
}

fn default_attempt_timeout_secs() -> u64 {
    10
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_backoff_ms: default_base_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            attempt_timeout_secs: default_attempt_timeout_secs(),
        }
    }
}

/// Ingestion rate limiting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Events per tenant per minute.
    #[serde(default = "default_events_per_minute")]
    pub events_per_minute: u32,
}

fn default_events_per_minute() -> u32 {
    120
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            events_per_minute: default_events_per_minute(),
        }
    }
}

/// Outbound webhook endpoints. Actions without an endpoint fall back to
/// the log sink.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SinkConfig {
    #[serde(default)]
    pub page_webhook: Option<String>,
    #[serde(default)]
    pub ticket_webhook: Option<String>,
    #[serde(default)]
    pub alert_webhook: Option<String>,
    #[serde(default)]
    pub escalate_webhook: Option<String>,
    /// Request timeout for webhook deliveries.
    #[serde(default = "default_webhook_timeout_secs")]
    pub webhook_timeout_secs: u64,
}

fn default_webhook_timeout_secs() -> u64 {
    10
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Output mode: "development", "production", or "default".
    #[serde(default = "default_log_mode")]
    pub mode: String,
}

fn default_log_mode() -> String {
    "default".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            mode: default_log_mode(),
        }
    }
}
