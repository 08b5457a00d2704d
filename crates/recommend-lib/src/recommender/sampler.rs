//! Per-container memory usage sampling

use crate::error::MetricsError;
use crate::prometheus::MetricsSource;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

pub struct UsageSampler {
    source: Arc<dyn MetricsSource>,
    namespace: String,
}

impl UsageSampler {
    pub fn new(source: Arc<dyn MetricsSource>, namespace: impl Into<String>) -> Self {
        Self {
            source,
            namespace: namespace.into(),
        }
    }

    /// Average RSS over the hour before `at`, per container, for pods in `pod_filter`.
    ///
    /// The pause container and unlabelled series are excluded by the query;
    /// non-numeric values are dropped one by one.
    pub async fn sample_memory(
        &self,
        pod_filter: &str,
        at: i64,
    ) -> Result<HashMap<String, f64>, MetricsError> {
        let query = format!(
            r#"avg(avg_over_time(container_memory_rss{{namespace="{}",container!="",container!="POD",pod=~"{}"}}[1h])) by (container)"#,
            self.namespace, pod_filter
        );
        let result = self.source.instant(&query, Some(at)).await?;

        let mut samples = HashMap::new();
        for series in &result {
            let Some(container) = series.label("container").filter(|c| !c.is_empty()) else {
                continue;
            };
            match series.instant_value() {
                Some(bytes) => {
                    samples.insert(container.to_string(), bytes);
                }
                None => {
                    debug!(container = %container, at, "Dropping malformed memory sample");
                }
            }
        }

        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prometheus::{async_trait, ResultSet, Sample, Series};
    use std::sync::Mutex;

    /// Records every instant query and answers with a fixed result
    struct Recording {
        result: ResultSet,
        queries: Mutex<Vec<(String, Option<i64>)>>,
    }

    #[async_trait]
    impl MetricsSource for Recording {
        async fn instant(&self, query: &str, time: Option<i64>) -> Result<ResultSet, MetricsError> {
            self.queries.lock().unwrap().push((query.to_string(), time));
            Ok(self.result.clone())
        }

        async fn range(&self, _q: &str, _s: i64, _e: i64, _st: u32) -> Result<ResultSet, MetricsError> {
            Ok(Vec::new())
        }
    }

    fn sample(container: Option<&str>, value: &str) -> Series {
        Series {
            metric: container
                .map(|c| HashMap::from([("container".to_string(), c.to_string())]))
                .unwrap_or_default(),
            value: Some(Sample::new(0.0, value)),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_sample_memory_filters_series() {
        let source = Arc::new(Recording {
            result: vec![
                sample(Some("app"), "1048576"),
                sample(Some("sidecar"), "2048"),
                sample(Some(""), "4096"),
                sample(None, "8192"),
                sample(Some("broken"), "NaN"),
                sample(Some("garbage"), "not-a-number"),
            ],
            queries: Mutex::new(Vec::new()),
        });
        let sampler = UsageSampler::new(source.clone(), "shop");

        let samples = sampler
            .sample_memory("web-rs-pod|web-rs-pod2", 1_700_000_000)
            .await
            .unwrap();

        assert_eq!(
            samples,
            HashMap::from([("app".to_string(), 1048576.0), ("sidecar".to_string(), 2048.0)])
        );

        let queries = source.queries.lock().unwrap();
        assert_eq!(queries.len(), 1);
        let (query, at) = &queries[0];
        assert_eq!(*at, Some(1_700_000_000));
        assert!(query.contains(r#"namespace="shop""#));
        assert!(query.contains(r#"container!="""#));
        assert!(query.contains(r#"container!="POD""#));
        assert!(query.contains(r#"pod=~"web-rs-pod|web-rs-pod2""#));
        assert!(query.contains("[1h]"));
        assert!(query.ends_with("by (container)"));
    }
}
