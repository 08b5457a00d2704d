//! Error types for the recommendation engine

use thiserror::Error;

/// Failures talking to the metrics backend.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("metrics backend returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("query failed: {0}")]
    QueryFailed(String),

    #[error("invalid metrics backend URL: {0}")]
    InvalidUrl(String),
}

/// Configuration validation failures.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("prometheus URL must be provided")]
    MissingPrometheusUrl,

    #[error("namespace must be provided")]
    MissingNamespace,

    #[error("invalid prometheus URL {url}: {reason}")]
    InvalidPrometheusUrl { url: String, reason: String },

    #[error("lookback window must cover at least one day")]
    InvalidCountDays,

    #[error("worker count must be at least one")]
    InvalidWorkerCount,

    #[error("memory limit multiplier must be a positive number, got {0}")]
    InvalidLimitMultiplier(f64),
}

/// Errors that abort a recommendation run.
#[derive(Debug, Error)]
pub enum RecommendError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to discover deployments: {0}")]
    Discovery(#[source] MetricsError),

    #[error("worker task failed: {0}")]
    Worker(String),

    #[error("failed to export report to {path}: {reason}")]
    Export { path: String, reason: String },
}

pub type Result<T, E = RecommendError> = std::result::Result<T, E>;
