//! Core data models for the recommendation engine

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Bytes per megabyte used for all MB conversions.
pub const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

pub const DEFAULT_LIMIT_MULTIPLIER: f64 = 1.5;
pub const DEFAULT_COUNT_DAYS: u32 = 7;
pub const DEFAULT_WORKER_COUNT: usize = 20;
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(60);

/// Settings for one recommendation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationConfig {
    pub namespace: String,
    pub prometheus_url: String,
    pub memory_limit_multiplier: f64,
    /// Lookback window in days
    pub count_days: u32,
    pub worker_count: usize,
    #[serde(with = "duration_secs")]
    pub http_timeout: Duration,
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            namespace: "default".to_string(),
            prometheus_url: "https://prometheus.example.com".to_string(),
            memory_limit_multiplier: DEFAULT_LIMIT_MULTIPLIER,
            count_days: DEFAULT_COUNT_DAYS,
            worker_count: DEFAULT_WORKER_COUNT,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }
}

impl RecommendationConfig {
    /// Check the settings, reporting the first problem found.
    ///
    /// The Prometheus URL is checked before the namespace.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.prometheus_url.is_empty() {
            return Err(ConfigError::MissingPrometheusUrl);
        }
        if self.namespace.is_empty() {
            return Err(ConfigError::MissingNamespace);
        }

        let url = url::Url::parse(&self.prometheus_url).map_err(|e| {
            ConfigError::InvalidPrometheusUrl {
                url: self.prometheus_url.clone(),
                reason: e.to_string(),
            }
        })?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::InvalidPrometheusUrl {
                url: self.prometheus_url.clone(),
                reason: "scheme must be http or https".to_string(),
            });
        }

        if self.count_days == 0 {
            return Err(ConfigError::InvalidCountDays);
        }
        if self.worker_count == 0 {
            return Err(ConfigError::InvalidWorkerCount);
        }
        if !self.memory_limit_multiplier.is_finite() || self.memory_limit_multiplier <= 0.0 {
            return Err(ConfigError::InvalidLimitMultiplier(
                self.memory_limit_multiplier,
            ));
        }

        Ok(())
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

/// Currently configured memory request and limit of a container.
///
/// All fields are zero when the configuration could not be resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CurrentConfig {
    pub request_bytes: f64,
    pub limit_bytes: f64,
    pub request_mb: i64,
    pub limit_mb: i64,
}

impl CurrentConfig {
    pub fn from_bytes(request_bytes: f64, limit_bytes: f64) -> Self {
        Self {
            request_bytes,
            limit_bytes,
            request_mb: bytes_to_mb(request_bytes),
            limit_mb: bytes_to_mb(limit_bytes),
        }
    }

    /// True when neither request nor limit was found
    pub fn is_unresolved(&self) -> bool {
        self.request_bytes == 0.0 && self.limit_bytes == 0.0
    }
}

/// Weighted usage estimate for one container, with its current configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContainerEstimate {
    pub memory_bytes: f64,
    pub current: CurrentConfig,
}

/// Final output row for one (deployment, container) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationResult {
    pub namespace: String,
    pub deployment: String,
    pub container: String,

    pub current_request_mb: i64,
    pub current_limit_mb: i64,
    pub current_request_bytes: f64,
    pub current_limit_bytes: f64,

    pub recommended_request_mb: i64,
    pub recommended_limit_mb: i64,
    pub recommended_request_bytes: f64,
    pub recommended_limit_bytes: f64,

    pub request_optimization_mb: i64,
    pub limit_optimization_mb: i64,
    #[serde(rename = "request_optimization_percent")]
    pub request_optimization_pct: f64,
    #[serde(rename = "limit_optimization_percent")]
    pub limit_optimization_pct: f64,

    pub memory_limit_multiplier: f64,
}

/// Whole megabytes in a byte count, rounded down.
pub fn bytes_to_mb(bytes: f64) -> i64 {
    (bytes / BYTES_PER_MB).floor() as i64
}
