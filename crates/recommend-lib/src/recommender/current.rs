//! Resolution of a container's currently configured memory request and limit

use crate::error::MetricsError;
use crate::models::CurrentConfig;
use crate::observability::{RecommenderMetrics, StructuredLogger};
use crate::prometheus::{MetricsSource, Series};
use std::sync::Arc;

const REQUESTS_METRIC: &str = "kube_pod_container_resource_requests";
const LIMITS_METRIC: &str = "kube_pod_container_resource_limits";

pub struct CurrentConfigResolver {
    source: Arc<dyn MetricsSource>,
    namespace: String,
    logger: StructuredLogger,
    metrics: RecommenderMetrics,
}

impl CurrentConfigResolver {
    pub fn new(
        source: Arc<dyn MetricsSource>,
        namespace: impl Into<String>,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            source,
            namespace: namespace.into(),
            logger,
            metrics: RecommenderMetrics::new(),
        }
    }

    /// Pods are matched on the `<deployment>-<replicaset hash>-<pod hash>` shape
    /// so a sibling deployment sharing the prefix (`web` vs `web-api`) is excluded.
    pub fn query(&self, metric: &str, deployment: &str, container: &str) -> String {
        format!(
            r#"{}{{namespace="{}",container="{}",pod=~"{}-[a-z0-9]+-[a-z0-9]+",resource="memory"}}"#,
            metric, self.namespace, container, deployment
        )
    }

    /// Current request and limit; zero-valued when unresolved, never an error.
    pub async fn resolve(&self, deployment: &str, container: &str) -> CurrentConfig {
        let request = self.fetch(REQUESTS_METRIC, deployment, container).await;
        let limit = self.fetch(LIMITS_METRIC, deployment, container).await;

        let mut missing = Vec::new();
        let request_bytes = self.unwrap_or_zero(request, "request", &mut missing);
        let limit_bytes = self.unwrap_or_zero(limit, "limit", &mut missing);

        if !missing.is_empty() {
            self.metrics.inc_current_config_missing();
            self.logger
                .log_current_config_missing(deployment, container, &missing.join("; "));
        }

        CurrentConfig::from_bytes(request_bytes, limit_bytes)
    }

    fn unwrap_or_zero(
        &self,
        value: Result<Option<f64>, MetricsError>,
        what: &str,
        missing: &mut Vec<String>,
    ) -> f64 {
        match value {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                missing.push(format!("no {what} series"));
                0.0
            }
            Err(e) => {
                missing.push(format!("{what} query failed: {e}"));
                0.0
            }
        }
    }

    async fn fetch(
        &self,
        metric: &str,
        deployment: &str,
        container: &str,
    ) -> Result<Option<f64>, MetricsError> {
        let result = self
            .source
            .instant(&self.query(metric, deployment, container), None)
            .await?;
        Ok(first_by_pod(&result))
    }
}

/// First numeric value among `series`, visiting them by ascending `pod` label
/// so the outcome does not depend on backend ordering.
pub fn first_by_pod(series: &[Series]) -> Option<f64> {
    let mut ordered: Vec<&Series> = series.iter().collect();
    ordered.sort_by(|a, b| a.label("pod").cmp(&b.label("pod")));
    ordered.into_iter().find_map(Series::instant_value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prometheus::{async_trait, ResultSet, Sample};
    use std::collections::HashMap;

    struct NoSeries;

    #[async_trait]
    impl MetricsSource for NoSeries {
        async fn instant(&self, _q: &str, _t: Option<i64>) -> Result<ResultSet, MetricsError> {
            Ok(Vec::new())
        }

        async fn range(&self, _q: &str, _s: i64, _e: i64, _st: u32) -> Result<ResultSet, MetricsError> {
            Ok(Vec::new())
        }
    }

    fn series(pod: &str, value: &str) -> Series {
        Series {
            metric: HashMap::from([("pod".to_string(), pod.to_string())]),
            value: Some(Sample::new(0.0, value)),
            ..Default::default()
        }
    }

    #[test]
    fn test_smallest_pod_wins() {
        let result = vec![series("web-b", "200"), series("web-a", "100")];
        assert_eq!(first_by_pod(&result), Some(100.0));
    }

    #[test]
    fn test_non_numeric_is_skipped() {
        let result = vec![series("web-b", "200"), series("web-a", "n/a")];
        assert_eq!(first_by_pod(&result), Some(200.0));
    }

    #[test]
    fn test_query_anchors_pod_shape() {
        let resolver = CurrentConfigResolver::new(
            Arc::new(NoSeries),
            "shop",
            StructuredLogger::new("shop"),
        );
        assert_eq!(
            resolver.query(REQUESTS_METRIC, "web", "app"),
            r#"kube_pod_container_resource_requests{namespace="shop",container="app",pod=~"web-[a-z0-9]+-[a-z0-9]+",resource="memory"}"#
        );
    }

    #[test]
    fn test_no_series() {
        assert_eq!(first_by_pod(&[]), None);
    }
}
