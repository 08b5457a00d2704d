//! Discovery of deployments eligible for analysis

use crate::error::MetricsError;
use crate::prometheus::MetricsSource;
use std::collections::HashSet;
use std::sync::Arc;

pub const SECONDS_PER_DAY: i64 = 86_400;

/// Finds deployments old enough to cover the lookback window and scaled above zero
pub struct DeploymentDiscoverer {
    source: Arc<dyn MetricsSource>,
    namespace: String,
}

impl DeploymentDiscoverer {
    pub fn new(source: Arc<dyn MetricsSource>, namespace: impl Into<String>) -> Self {
        Self {
            source,
            namespace: namespace.into(),
        }
    }

    pub fn query(&self, count_days: u32, now: i64) -> String {
        let cutoff = now - i64::from(count_days) * SECONDS_PER_DAY;
        format!(
            r#"kube_deployment_created{{namespace="{}"}} <= {} and kube_deployment_spec_replicas > 0"#,
            self.namespace, cutoff
        )
    }

    /// Eligible deployment names in backend order, without duplicates
    pub async fn discover(&self, count_days: u32, now: i64) -> Result<Vec<String>, MetricsError> {
        let result = self
            .source
            .instant(&self.query(count_days, now), None)
            .await?;

        let mut seen = HashSet::new();
        Ok(result
            .iter()
            .filter_map(|series| series.label("deployment"))
            .filter(|name| seen.insert(name.to_string()))
            .map(str::to_string)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prometheus::{async_trait, ResultSet, Series};
    use std::collections::HashMap;

    struct Deployments(Vec<&'static str>);

    #[async_trait]
    impl MetricsSource for Deployments {
        async fn instant(&self, _q: &str, _t: Option<i64>) -> Result<ResultSet, MetricsError> {
            Ok(self
                .0
                .iter()
                .map(|d| Series {
                    metric: HashMap::from([("deployment".to_string(), d.to_string())]),
                    ..Default::default()
                })
                .collect())
        }

        async fn range(&self, _q: &str, _s: i64, _e: i64, _st: u32) -> Result<ResultSet, MetricsError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_query_cutoff() {
        let discoverer = DeploymentDiscoverer::new(Arc::new(Deployments(vec![])), "prod");
        assert_eq!(
            discoverer.query(7, 1_700_000_000),
            r#"kube_deployment_created{namespace="prod"} <= 1699395200 and kube_deployment_spec_replicas > 0"#
        );
    }

    #[tokio::test]
    async fn test_discover_dedupes_in_order() {
        let source = Arc::new(Deployments(vec!["web", "api", "web", "worker"]));
        let discoverer = DeploymentDiscoverer::new(source, "prod");
        let names = discoverer.discover(7, 1_700_000_000).await.unwrap();
        assert_eq!(names, vec!["web", "api", "worker"]);
    }
}
