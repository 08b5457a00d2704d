//! Pre-flight metrics check

use anyhow::{bail, Result};
use recommend_lib::prometheus::{MetricsChecker, PreflightReport};
use recommend_lib::RecommendationConfig;
use std::sync::Arc;

use crate::output::{print_error, print_preflight, print_success, OutputFormat};

/// Run the pre-flight checks without printing anything
pub async fn preflight(
    source: Arc<dyn recommend_lib::prometheus::MetricsSource>,
    namespace: &str,
) -> PreflightReport {
    MetricsChecker::new(source, namespace)
        .check_required_metrics()
        .await
}

/// `kube-recommend check`
pub async fn run(config: RecommendationConfig, format: OutputFormat) -> Result<()> {
    let client = super::connect(&config)?;
    let report = preflight(client, &config.namespace).await;
    print_preflight(&report, format)?;

    if !report.is_ready() {
        let missing = report.missing().count();
        print_error(&format!(
            "{missing} of {} required metrics are unavailable in namespace {}",
            report.checks.len(),
            config.namespace
        ));
        bail!("Pre-flight check failed");
    }

    print_success(&format!(
        "All required metrics are available in namespace {}",
        config.namespace
    ));
    Ok(())
}
