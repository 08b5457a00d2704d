//! Observability for recommendation runs
//!
//! Provides:
//! - Prometheus metrics (queries issued, skipped hours, deployment latency)
//! - Structured logging of run events with tracing

use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Encoder, Histogram,
    IntCounter, IntCounterVec, TextEncoder,
};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

/// Histogram buckets for per-deployment processing time (in seconds)
const DEPLOYMENT_BUCKETS: &[f64] = &[
    0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1200.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<RecommenderMetricsInner> = OnceLock::new();

struct RecommenderMetricsInner {
    queries_total: IntCounterVec,
    query_errors_total: IntCounterVec,
    hours_skipped_total: IntCounterVec,
    deployments_processed: IntCounter,
    deployments_discarded: IntCounter,
    recommendations_generated: IntCounter,
    current_config_missing: IntCounter,
    deployment_duration_seconds: Histogram,
}

impl RecommenderMetricsInner {
    fn new() -> Self {
        Self {
            queries_total: register_int_counter_vec!(
                "kube_recommend_queries_total",
                "Queries issued to the metrics backend",
                &["kind"]
            )
            .expect("Failed to register queries_total"),

            query_errors_total: register_int_counter_vec!(
                "kube_recommend_query_errors_total",
                "Queries to the metrics backend that failed",
                &["kind"]
            )
            .expect("Failed to register query_errors_total"),

            hours_skipped_total: register_int_counter_vec!(
                "kube_recommend_hours_skipped_total",
                "Hours skipped while aggregating usage",
                &["reason"]
            )
            .expect("Failed to register hours_skipped_total"),

            deployments_processed: register_int_counter!(
                "kube_recommend_deployments_processed_total",
                "Deployments aggregated over the full lookback window"
            )
            .expect("Failed to register deployments_processed"),

            deployments_discarded: register_int_counter!(
                "kube_recommend_deployments_discarded_total",
                "Deployments dropped because the run was cancelled mid-aggregation"
            )
            .expect("Failed to register deployments_discarded"),

            recommendations_generated: register_int_counter!(
                "kube_recommend_recommendations_generated_total",
                "Recommendation records produced"
            )
            .expect("Failed to register recommendations_generated"),

            current_config_missing: register_int_counter!(
                "kube_recommend_current_config_missing_total",
                "Containers whose current request or limit could not be resolved"
            )
            .expect("Failed to register current_config_missing"),

            deployment_duration_seconds: register_histogram!(
                "kube_recommend_deployment_duration_seconds",
                "Time spent aggregating one deployment",
                DEPLOYMENT_BUCKETS.to_vec()
            )
            .expect("Failed to register deployment_duration_seconds"),
        }
    }
}

/// Handle to the process-wide recommender metrics
///
/// Clones share the same underlying metrics.
#[derive(Clone)]
pub struct RecommenderMetrics {
    _private: (),
}

impl Default for RecommenderMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl RecommenderMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(RecommenderMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &RecommenderMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    pub fn inc_queries(&self, kind: &str) {
        self.inner().queries_total.with_label_values(&[kind]).inc();
    }

    pub fn inc_query_errors(&self, kind: &str) {
        self.inner().query_errors_total.with_label_values(&[kind]).inc();
    }

    pub fn inc_hours_skipped(&self, reason: &str) {
        self.inner()
            .hours_skipped_total
            .with_label_values(&[reason])
            .inc();
    }

    pub fn inc_deployments_processed(&self) {
        self.inner().deployments_processed.inc();
    }

    pub fn inc_deployments_discarded(&self) {
        self.inner().deployments_discarded.inc();
    }

    pub fn add_recommendations(&self, count: usize) {
        self.inner().recommendations_generated.inc_by(count as u64);
    }

    pub fn inc_current_config_missing(&self) {
        self.inner().current_config_missing.inc();
    }

    pub fn observe_deployment_duration(&self, duration_secs: f64) {
        self.inner()
            .deployment_duration_seconds
            .observe(duration_secs);
    }

    /// Render the default registry in the Prometheus text format
    pub fn render_text(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&prometheus::gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Structured logger for run events
#[derive(Clone)]
pub struct StructuredLogger {
    namespace: String,
}

impl StructuredLogger {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    pub fn log_run_started(&self, count_days: u32, worker_count: usize, multiplier: f64) {
        info!(
            event = "run_started",
            namespace = %self.namespace,
            count_days = count_days,
            worker_count = worker_count,
            memory_limit_multiplier = multiplier,
            "Starting memory recommendation run"
        );
    }

    pub fn log_deployments_discovered(&self, count: usize) {
        info!(
            event = "deployments_discovered",
            namespace = %self.namespace,
            deployments = count,
            "Discovered eligible deployments"
        );
    }

    pub fn log_hour_skipped(&self, deployment: &str, end: i64, reason: &str) {
        debug!(
            event = "hour_skipped",
            namespace = %self.namespace,
            deployment = %deployment,
            hour_end = end,
            reason = %reason,
            "Skipping hour"
        );
    }

    pub fn log_deployment_processed(
        &self,
        deployment: &str,
        containers: &[&str],
        hours_sampled: usize,
        hours_skipped: usize,
        elapsed_ms: u128,
    ) {
        info!(
            event = "deployment_processed",
            namespace = %self.namespace,
            deployment = %deployment,
            containers = containers.len(),
            hours_sampled = hours_sampled,
            hours_skipped = hours_skipped,
            elapsed_ms = elapsed_ms,
            "Processed deployment"
        );
        for container in containers {
            debug!(
                namespace = %self.namespace,
                deployment = %deployment,
                container = %container,
                "Processed container"
            );
        }
    }

    pub fn log_deployment_discarded(&self, deployment: &str) {
        warn!(
            event = "deployment_discarded",
            namespace = %self.namespace,
            deployment = %deployment,
            "Run cancelled, discarding partial aggregate"
        );
    }

    pub fn log_current_config_missing(&self, deployment: &str, container: &str, detail: &str) {
        warn!(
            event = "current_config_missing",
            namespace = %self.namespace,
            deployment = %deployment,
            container = %container,
            detail = %detail,
            "Current memory configuration unresolved, using zero"
        );
    }

    pub fn log_run_finished(
        &self,
        recommendations: usize,
        deployments_completed: usize,
        cancelled: bool,
        elapsed_ms: u128,
    ) {
        if cancelled {
            warn!(
                event = "run_finished",
                namespace = %self.namespace,
                recommendations = recommendations,
                deployments_completed = deployments_completed,
                cancelled = true,
                elapsed_ms = elapsed_ms,
                "Recommendation run cancelled"
            );
        } else {
            info!(
                event = "run_finished",
                namespace = %self.namespace,
                recommendations = recommendations,
                deployments_completed = deployments_completed,
                cancelled = false,
                elapsed_ms = elapsed_ms,
                "Recommendation run finished"
            );
        }
    }
}
