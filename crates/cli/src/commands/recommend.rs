//! Recommendation run and report export

use anyhow::{bail, Context, Result};
use recommend_lib::{
    JsonReportSink, RecommendationConfig, RecommendationReport, Recommender, RecommenderMetrics,
    ReportSink, ShutdownSignal,
};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::output::{print_error, print_info, print_report, print_success, print_warning, OutputFormat};

pub struct RecommendOptions {
    pub output_dir: PathBuf,
    pub metrics_file: Option<PathBuf>,
    pub skip_preflight: bool,
    pub format: OutputFormat,
}

/// `kube-recommend recommend`
pub async fn run(config: RecommendationConfig, options: RecommendOptions) -> Result<()> {
    let client = super::connect(&config)?;

    if !options.skip_preflight {
        let preflight = super::check::preflight(client.clone(), &config.namespace).await;
        if !preflight.is_ready() {
            for check in preflight.missing() {
                print_error(&format!("Metric unavailable: {}", check.query));
            }
            bail!("Required metrics are missing; run `kube-recommend check` for details");
        }
    }

    let shutdown = ShutdownSignal::new();
    let ctrl_c = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, cancelling run");
                shutdown.trigger();
            }
        })
    };

    print_info(&format!(
        "Analyzing namespace {} over the last {} days with {} workers",
        config.namespace, config.count_days, config.worker_count
    ));
    let outcome = Recommender::new(client, config.clone())
        .generate_recommendations(shutdown)
        .await;
    ctrl_c.abort();
    let run = outcome.context("Recommendation run failed")?;

    if let Some(path) = &options.metrics_file {
        write_metrics(path)?;
    }

    if run.cancelled {
        print_warning(&format!(
            "Run cancelled: {} of {} deployments completed",
            run.deployments_completed, run.deployments_discovered
        ));
    }
    if run.is_empty() {
        if run.deployments_discovered == 0 {
            print_warning(&format!(
                "No deployments in namespace {} are old enough to cover {} days",
                config.namespace, config.count_days
            ));
        } else {
            print_warning("No recommendations: no container reported memory usage");
        }
        return Ok(());
    }

    let path = JsonReportSink::new(&options.output_dir)
        .export(&config.namespace, &run.recommendations)?;
    let report = RecommendationReport::new(&config.namespace, run.recommendations);
    print_report(&report, options.format)?;
    print_success(&format!(
        "{} recommendations written to {}",
        report.recommendations.len(),
        path.display()
    ));

    Ok(())
}

/// Dump run metrics in the Prometheus text format
fn write_metrics(path: &Path) -> Result<()> {
    let text = RecommenderMetrics::new().render_text()?;
    std::fs::write(path, text)
        .with_context(|| format!("Failed to write metrics to {}", path.display()))
}
