//! Service configuration.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

use crate::errors::{Result, ValidationError};
use crate::observability::LogFormat;

/// Prefix of the environment variables read by [`CertflowConfig::from_env`].
pub const ENV_PREFIX: &str = "CERTFLOW_";

/// Configuration for a certflow service instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertflowConfig {
    /// Name reported in health reports and logs.
    #[serde(default = "default_service_name")]
    pub service_name: String,
    /// Page size used when a query does not specify a limit.
    #[serde(default = "default_page_limit")]
    pub default_page_limit: usize,
    /// Largest accepted page size.
    #[serde(default = "default_max_page_limit")]
    pub max_page_limit: usize,
    /// Upper bound on a single durable write, in milliseconds.
    #[serde(default = "default_persistence_timeout_ms")]
    pub persistence_timeout_ms: u64,
    /// Upper bound on a call to the execution delegate or notification
    /// hook, in milliseconds.
    #[serde(default = "default_hook_timeout_ms")]
    pub hook_timeout_ms: u64,
    /// Window used for the recent failure rate, in seconds.
    #[serde(default = "default_health_window_seconds")]
    pub health_window_seconds: u64,
    /// Failure rate above which the service reports itself degraded.
    #[serde(default = "default_degraded_failure_rate")]
    pub degraded_failure_rate: f64,
    /// How long external event ids are remembered, in seconds.
    #[serde(default = "default_dedup_ttl_seconds")]
    pub dedup_ttl_seconds: u64,
    /// Log output format.
    #[serde(default)]
    pub log_format: LogFormat,
}

fn default_service_name() -> String {
    "certification-service".to_string()
}

fn default_page_limit() -> usize {
    50
}

fn default_max_page_limit() -> usize {
    500
}

fn default_persistence_timeout_ms() -> u64 {
    5000
}

fn default_hook_timeout_ms() -> u64 {
    5000
}

fn default_health_window_seconds() -> u64 {
    3600
}

fn default_degraded_failure_rate() -> f64 {
    0.5
}

fn default_dedup_ttl_seconds() -> u64 {
    3600
}

impl Default for CertflowConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            default_page_limit: default_page_limit(),
            max_page_limit: default_max_page_limit(),
            persistence_timeout_ms: default_persistence_timeout_ms(),
            hook_timeout_ms: default_hook_timeout_ms(),
            health_window_seconds: default_health_window_seconds(),
            degraded_failure_rate: default_degraded_failure_rate(),
            dedup_ttl_seconds: default_dedup_ttl_seconds(),
            log_format: LogFormat::default(),
        }
    }
}

impl CertflowConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a JSON document; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Builds a configuration from defaults overridden by `CERTFLOW_*`
    /// environment variables.
    pub fn from_env() -> Result<Self> {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from a variable lookup such as the process
    /// environment.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

        if let Some(value) = var("SERVICE_NAME") {
            self.service_name = value;
        }
        if let Some(value) = var("DEFAULT_PAGE_LIMIT") {
            self.default_page_limit = parse_var("DEFAULT_PAGE_LIMIT", &value)?;
        }
        if let Some(value) = var("MAX_PAGE_LIMIT") {
            self.max_page_limit = parse_var("MAX_PAGE_LIMIT", &value)?;
        }
        if let Some(value) = var("PERSISTENCE_TIMEOUT_MS") {
            self.persistence_timeout_ms = parse_var("PERSISTENCE_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = var("HOOK_TIMEOUT_MS") {
            self.hook_timeout_ms = parse_var("HOOK_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = var("HEALTH_WINDOW_SECONDS") {
            self.health_window_seconds = parse_var("HEALTH_WINDOW_SECONDS", &value)?;
        }
        if let Some(value) = var("DEGRADED_FAILURE_RATE") {
            self.degraded_failure_rate = parse_var("DEGRADED_FAILURE_RATE", &value)?;
        }
        if let Some(value) = var("DEDUP_TTL_SECONDS") {
            self.dedup_ttl_seconds = parse_var("DEDUP_TTL_SECONDS", &value)?;
        }
        if let Some(value) = var("LOG_FORMAT") {
            self.log_format = value.parse()?;
        }

        self.validate()?;
        Ok(self)
    }

    /// Sets the service name.
    #[must_use]
    pub fn with_service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = name.into();
        self
    }

    /// Sets the default and maximum page sizes.
    #[must_use]
    pub fn with_page_limits(mut self, default_limit: usize, max_limit: usize) -> Self {
        self.default_page_limit = default_limit;
        self.max_page_limit = max_limit;
        self
    }

    /// Sets the persistence timeout.
    #[must_use]
    pub fn with_persistence_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.persistence_timeout_ms = timeout_ms;
        self
    }

    /// Sets the collaborator call timeout.
    #[must_use]
    pub fn with_hook_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.hook_timeout_ms = timeout_ms;
        self
    }

    /// Sets the health window.
    #[must_use]
    pub fn with_health_window_seconds(mut self, seconds: u64) -> Self {
        self.health_window_seconds = seconds;
        self
    }

    /// Sets the degraded threshold.
    #[must_use]
    pub fn with_degraded_failure_rate(mut self, rate: f64) -> Self {
        self.degraded_failure_rate = rate;
        self
    }

    /// Sets the dedup retention.
    #[must_use]
    pub fn with_dedup_ttl_seconds(mut self, seconds: u64) -> Self {
        self.dedup_ttl_seconds = seconds;
        self
    }

    /// Persistence timeout as a `Duration`.
    #[must_use]
    pub fn persistence_timeout(&self) -> Duration {
        Duration::from_millis(self.persistence_timeout_ms)
    }

    /// Collaborator call timeout as a `Duration`.
    #[must_use]
    pub fn hook_timeout(&self) -> Duration {
        Duration::from_millis(self.hook_timeout_ms)
    }

    /// Health window as a `Duration`.
    #[must_use]
    pub fn health_window(&self) -> Duration {
        Duration::from_secs(self.health_window_seconds)
    }

    /// Dedup retention as a `Duration`.
    #[must_use]
    pub fn dedup_ttl(&self) -> Duration {
        Duration::from_secs(self.dedup_ttl_seconds)
    }

    /// Checks the configuration for inconsistent values.
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        if self.service_name.trim().is_empty() {
            return Err(
                ValidationError::new("service_name must not be blank").with_field("service_name")
            );
        }
        if self.default_page_limit == 0 || self.max_page_limit == 0 {
            return Err(ValidationError::new("page limits must be positive")
                .with_field("default_page_limit"));
        }
        if self.default_page_limit > self.max_page_limit {
            return Err(ValidationError::new(format!(
                "default_page_limit {} exceeds max_page_limit {}",
                self.default_page_limit, self.max_page_limit
            ))
            .with_field("default_page_limit"));
        }
        if self.persistence_timeout_ms == 0 {
            return Err(ValidationError::new("persistence_timeout_ms must be positive")
                .with_field("persistence_timeout_ms"));
        }
        if self.hook_timeout_ms == 0 {
            return Err(ValidationError::new("hook_timeout_ms must be positive")
                .with_field("hook_timeout_ms"));
        }
        if !(0.0..=1.0).contains(&self.degraded_failure_rate) {
            return Err(ValidationError::new(format!(
                "degraded_failure_rate {} is outside [0, 1]",
                self.degraded_failure_rate
            ))
            .with_field("degraded_failure_rate"));
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(name: &str, value: &str) -> std::result::Result<T, ValidationError> {
    value.trim().parse().map_err(|_| {
        ValidationError::new(format!("{ENV_PREFIX}{name} has invalid value '{value}'"))
            .with_field(name.to_ascii_lowercase())
    })
}
