//! Pre-flight check that the metrics the engine relies on exist

use super::MetricsSource;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Outcome of checking one metric
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum MetricStatus {
    /// The metric returned this many series
    Available(usize),
    Empty,
    Failed(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricCheck {
    pub query: String,
    pub status: MetricStatus,
}

/// Per-metric results of a pre-flight run
#[derive(Debug, Clone, Serialize)]
pub struct PreflightReport {
    pub namespace: String,
    pub checks: Vec<MetricCheck>,
}

impl PreflightReport {
    /// True when every required metric returned data
    pub fn is_ready(&self) -> bool {
        self.checks
            .iter()
            .all(|c| matches!(c.status, MetricStatus::Available(_)))
    }

    pub fn missing(&self) -> impl Iterator<Item = &MetricCheck> {
        self.checks
            .iter()
            .filter(|c| !matches!(c.status, MetricStatus::Available(_)))
    }
}

/// Validates that required metrics are present for a namespace
pub struct MetricsChecker {
    source: Arc<dyn MetricsSource>,
    namespace: String,
}

impl MetricsChecker {
    pub fn new(source: Arc<dyn MetricsSource>, namespace: impl Into<String>) -> Self {
        Self {
            source,
            namespace: namespace.into(),
        }
    }

    /// Selectors for every metric the engine queries
    pub fn required_metrics(&self) -> Vec<String> {
        let ns = &self.namespace;
        vec![
            format!(r#"container_memory_rss{{namespace="{ns}"}}"#),
            format!(r#"kube_pod_owner{{namespace="{ns}"}}"#),
            format!(r#"kube_replicaset_owner{{namespace="{ns}"}}"#),
            format!(r#"kube_deployment_created{{namespace="{ns}"}}"#),
            format!(r#"kube_deployment_spec_replicas{{namespace="{ns}"}}"#),
            format!(
                r#"kube_pod_container_resource_requests{{namespace="{ns}", resource="memory"}}"#
            ),
            format!(
                r#"kube_pod_container_resource_limits{{namespace="{ns}", resource="memory"}}"#
            ),
        ]
    }

    /// Query every required metric once and report what came back
    pub async fn check_required_metrics(&self) -> PreflightReport {
        let mut checks = Vec::new();

        for query in self.required_metrics() {
            let status = match self.source.instant(&query, None).await {
                Ok(result) if result.is_empty() => {
                    warn!(metric = %query, "No data found for metric");
                    MetricStatus::Empty
                }
                Ok(result) => MetricStatus::Available(result.len()),
                Err(e) => {
                    warn!(metric = %query, error = %e, "Error querying metric");
                    MetricStatus::Failed(e.to_string())
                }
            };
            checks.push(MetricCheck { query, status });
        }

        let report = PreflightReport {
            namespace: self.namespace.clone(),
            checks,
        };
        if report.is_ready() {
            info!(namespace = %self.namespace, "All required metrics are available");
        }
        report
    }
}
