//! Metrics backend access
//!
//! The recommendation engine only sees the [`MetricsSource`] trait. The
//! HTTP implementation talks to the Prometheus query API; tests plug in
//! in-memory fixtures.

mod checker;
mod client;

#[cfg(test)]
mod tests;

pub use checker::{MetricCheck, MetricStatus, MetricsChecker, PreflightReport};
pub use client::{PrometheusClient, QUERY_API, QUERY_RANGE_API};

use crate::error::MetricsError;
use serde::Deserialize;
use std::collections::HashMap;

pub use async_trait::async_trait;

/// One `[timestamp, "value"]` pair as returned by the query API
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Sample(pub f64, pub String);

impl Sample {
    pub fn new(timestamp: f64, value: impl Into<String>) -> Self {
        Self(timestamp, value.into())
    }

    pub fn timestamp(&self) -> f64 {
        self.0
    }

    /// Numeric value, or `None` for malformed and non-finite samples
    pub fn as_f64(&self) -> Option<f64> {
        parse_sample_value(&self.1)
    }
}

/// A labelled series from an instant (`value`) or range (`values`) query
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Series {
    #[serde(default)]
    pub metric: HashMap<String, String>,
    #[serde(default)]
    pub value: Option<Sample>,
    #[serde(default)]
    pub values: Vec<Sample>,
}

impl Series {
    pub fn label(&self, key: &str) -> Option<&str> {
        self.metric.get(key).map(String::as_str)
    }

    /// Value of an instant-query series
    pub fn instant_value(&self) -> Option<f64> {
        self.value.as_ref().and_then(Sample::as_f64)
    }
}

/// Ordered result of a query
pub type ResultSet = Vec<Series>;

/// Query capability the engine consumes
#[async_trait]
pub trait MetricsSource: Send + Sync {
    /// Evaluate `query` at `time` (Unix seconds), or at the backend's now
    async fn instant(&self, query: &str, time: Option<i64>) -> Result<ResultSet, MetricsError>;

    /// Evaluate `query` over `[start, end]` with the given resolution
    async fn range(
        &self,
        query: &str,
        start: i64,
        end: i64,
        step_secs: u32,
    ) -> Result<ResultSet, MetricsError>;
}

/// Parse a sample value, rejecting anything that is not a finite number.
pub fn parse_sample_value(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Join identifiers into a `=~` alternation pattern (`a|b|c`).
pub fn alternation<I, S>(names: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names
        .into_iter()
        .map(|n| n.as_ref().to_string())
        .collect::<Vec<_>>()
        .join("|")
}
