//! CLI subcommands

pub mod check;
pub mod recommend;

use anyhow::{Context, Result};
use recommend_lib::prometheus::PrometheusClient;
use recommend_lib::RecommendationConfig;
use std::sync::Arc;

/// Validate `config` and connect to its Prometheus endpoint
fn connect(config: &RecommendationConfig) -> Result<Arc<PrometheusClient>> {
    config.validate().context("Invalid configuration")?;
    let client = PrometheusClient::new(&config.prometheus_url, config.http_timeout)
        .context("Failed to create Prometheus client")?;
    Ok(Arc::new(client))
}
