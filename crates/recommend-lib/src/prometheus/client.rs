//! HTTP client for the Prometheus query API

use super::{async_trait, MetricsSource, ResultSet, Series};
use crate::error::MetricsError;
use crate::observability::RecommenderMetrics;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const QUERY_API: &str = "api/v1/query";
pub const QUERY_RANGE_API: &str = "api/v1/query_range";

/// Connection pool size per host, matching the worker pool default
const MAX_IDLE_PER_HOST: usize = 100;

#[derive(Debug, Deserialize)]
struct ApiResponse {
    status: String,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    data: Option<ApiData>,
}

#[derive(Debug, Deserialize)]
struct ApiData {
    #[serde(default)]
    result: Vec<Series>,
}

/// Prometheus client with a global request timeout
pub struct PrometheusClient {
    client: Client,
    base_url: Url,
    metrics: RecommenderMetrics,
}

impl PrometheusClient {
    /// Create a new client for `base_url`
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, MetricsError> {
        let mut base_url =
            Url::parse(base_url).map_err(|e| MetricsError::InvalidUrl(e.to_string()))?;
        if base_url.scheme() != "http" && base_url.scheme() != "https" {
            return Err(MetricsError::InvalidUrl(format!(
                "unsupported scheme {}",
                base_url.scheme()
            )));
        }
        // Keep any path prefix (e.g. /prometheus) when joining API paths
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(MAX_IDLE_PER_HOST)
            .pool_idle_timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url,
            metrics: RecommenderMetrics::new(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, api: &str) -> Result<Url, MetricsError> {
        self.base_url
            .join(api)
            .map_err(|e| MetricsError::InvalidUrl(e.to_string()))
    }

    async fn execute(&self, url: Url, kind: &str) -> Result<ResultSet, MetricsError> {
        self.metrics.inc_queries(kind);
        let result = self.fetch(url).await;
        if result.is_err() {
            self.metrics.inc_query_errors(kind);
        }
        result
    }

    async fn fetch(&self, url: Url) -> Result<ResultSet, MetricsError> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MetricsError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        let parsed: ApiResponse =
            serde_json::from_str(&body).map_err(|e| MetricsError::Decode(e.to_string()))?;

        if parsed.status != "success" {
            return Err(MetricsError::QueryFailed(
                parsed
                    .error
                    .unwrap_or_else(|| format!("status {}", parsed.status)),
            ));
        }

        Ok(parsed.data.map(|d| d.result).unwrap_or_default())
    }
}

#[async_trait]
impl MetricsSource for PrometheusClient {
    async fn instant(&self, query: &str, time: Option<i64>) -> Result<ResultSet, MetricsError> {
        let mut url = self.endpoint(QUERY_API)?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("query", query);
            if let Some(t) = time {
                pairs.append_pair("time", &t.to_string());
            }
        }
        debug!(query = %query, time = ?time, "Prometheus instant query");
        self.execute(url, "instant").await
    }

    async fn range(
        &self,
        query: &str,
        start: i64,
        end: i64,
        step_secs: u32,
    ) -> Result<ResultSet, MetricsError> {
        let mut url = self.endpoint(QUERY_RANGE_API)?;
        url.query_pairs_mut()
            .append_pair("query", query)
            .append_pair("start", &start.to_string())
            .append_pair("end", &end.to_string())
            .append_pair("step", &step_secs.to_string());
        debug!(query = %query, start, end, step_secs, "Prometheus range query");
        self.execute(url, "range").await
    }
}
