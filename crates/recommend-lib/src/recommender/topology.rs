//! Deployment → replica-set → pod resolution for one hour window
//!
//! Usage metrics are labelled by pod, so every hour needs a two-hop lookup.
//! An empty set is a valid answer (scale-to-zero, rollout gaps); callers
//! skip the hour instead of failing.

use crate::error::MetricsError;
use crate::prometheus::MetricsSource;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Resolution of ownership range queries
pub const OWNER_STEP_SECS: u32 = 60;

pub struct TopologyResolver {
    source: Arc<dyn MetricsSource>,
    namespace: String,
}

impl TopologyResolver {
    pub fn new(source: Arc<dyn MetricsSource>, namespace: impl Into<String>) -> Self {
        Self {
            source,
            namespace: namespace.into(),
        }
    }

    /// Replica-sets owned by `deployment` during `[start, end)`
    pub async fn resolve_replica_sets(
        &self,
        deployment: &str,
        start: i64,
        end: i64,
    ) -> Result<BTreeSet<String>, MetricsError> {
        let query = format!(
            r#"kube_replicaset_owner{{namespace="{}", owner_name="{}"}}"#,
            self.namespace, deployment
        );
        self.collect_label(&query, "replicaset", start, end).await
    }

    /// Pods owned by any replica-set in the `a|b|c` filter during `[start, end)`
    pub async fn resolve_pods(
        &self,
        replica_set_filter: &str,
        start: i64,
        end: i64,
    ) -> Result<BTreeSet<String>, MetricsError> {
        let query = format!(
            r#"kube_pod_owner{{namespace="{}", owner_name=~"{}"}}"#,
            self.namespace, replica_set_filter
        );
        self.collect_label(&query, "pod", start, end).await
    }

    async fn collect_label(
        &self,
        query: &str,
        label: &str,
        start: i64,
        end: i64,
    ) -> Result<BTreeSet<String>, MetricsError> {
        let result = self
            .source
            .range(query, start, end, OWNER_STEP_SECS)
            .await?;

        Ok(result
            .iter()
            .filter_map(|series| series.label(label))
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .collect())
    }
}
