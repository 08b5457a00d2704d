//! Report sinks for finished recommendation runs

use crate::error::{RecommendError, Result};
use crate::models::RecommendationResult;
use crate::recommender::optimization_percent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Totals over every row of a report
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub containers: usize,
    pub total_current_request_mb: i64,
    pub total_current_limit_mb: i64,
    pub total_recommended_request_mb: i64,
    pub total_recommended_limit_mb: i64,
    pub total_request_optimization_mb: i64,
    pub total_limit_optimization_mb: i64,
    pub total_request_optimization_percent: f64,
    pub total_limit_optimization_percent: f64,
}

impl ReportSummary {
    pub fn from_results(results: &[RecommendationResult]) -> Self {
        let mut summary = Self {
            containers: results.len(),
            ..Default::default()
        };
        for rec in results {
            summary.total_current_request_mb += rec.current_request_mb;
            summary.total_current_limit_mb += rec.current_limit_mb;
            summary.total_recommended_request_mb += rec.recommended_request_mb;
            summary.total_recommended_limit_mb += rec.recommended_limit_mb;
            summary.total_request_optimization_mb += rec.request_optimization_mb;
            summary.total_limit_optimization_mb += rec.limit_optimization_mb;
        }
        summary.total_request_optimization_percent = optimization_percent(
            summary.total_request_optimization_mb,
            summary.total_current_request_mb,
        );
        summary.total_limit_optimization_percent = optimization_percent(
            summary.total_limit_optimization_mb,
            summary.total_current_limit_mb,
        );
        summary
    }
}

/// Serialized form of a report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationReport {
    pub namespace: String,
    pub generated_at: DateTime<Utc>,
    pub recommendations: Vec<RecommendationResult>,
    pub summary: ReportSummary,
}

impl RecommendationReport {
    pub fn new(namespace: impl Into<String>, recommendations: Vec<RecommendationResult>) -> Self {
        let summary = ReportSummary::from_results(&recommendations);
        Self {
            namespace: namespace.into(),
            generated_at: Utc::now(),
            recommendations,
            summary,
        }
    }
}

/// Destination for the ordered records of a finished run
pub trait ReportSink {
    /// Export `records` for `namespace`, returning where they were written
    fn export(&self, namespace: &str, records: &[RecommendationResult]) -> Result<PathBuf>;
}

/// Writes `<namespace>-resource-recommend.json` into a directory
pub struct JsonReportSink {
    dir: PathBuf,
}

impl JsonReportSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn file_name(namespace: &str) -> String {
        format!("{namespace}-resource-recommend.json")
    }

    pub fn path_for(&self, namespace: &str) -> PathBuf {
        self.dir.join(Self::file_name(namespace))
    }
}

impl ReportSink for JsonReportSink {
    fn export(&self, namespace: &str, records: &[RecommendationResult]) -> Result<PathBuf> {
        let report = RecommendationReport::new(namespace, records.to_vec());
        let path = self.path_for(namespace);
        let export_error = |reason: String| RecommendError::Export {
            path: path.display().to_string(),
            reason,
        };

        let body = serde_json::to_string_pretty(&report).map_err(|e| export_error(e.to_string()))?;
        write_file(&path, body.as_bytes()).map_err(|e| export_error(e.to_string()))?;

        info!(
            namespace = %report.namespace,
            path = %path.display(),
            recommendations = report.recommendations.len(),
            "Exported recommendation report"
        );
        Ok(path)
    }
}

fn write_file(path: &Path, body: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CurrentConfig;
    use crate::recommender::calculate;
    use tempfile::TempDir;

    const MB: f64 = 1024.0 * 1024.0;

    fn row(
        deployment: &str,
        recommended_mb: f64,
        request_mb: f64,
        limit_mb: f64,
    ) -> RecommendationResult {
        calculate(
            "shop",
            deployment,
            "app",
            recommended_mb * MB,
            1.5,
            &CurrentConfig::from_bytes(request_mb * MB, limit_mb * MB),
        )
    }

    #[test]
    fn test_summary_totals() {
        let results = vec![row("web", 400.0, 800.0, 1600.0), row("api", 100.0, 200.0, 400.0)];
        let summary = ReportSummary::from_results(&results);

        assert_eq!(summary.containers, 2);
        assert_eq!(summary.total_current_request_mb, 1000);
        assert_eq!(summary.total_current_limit_mb, 2000);
        assert_eq!(summary.total_recommended_request_mb, 500);
        assert_eq!(summary.total_recommended_limit_mb, 750);
        assert_eq!(summary.total_request_optimization_mb, 500);
        assert_eq!(summary.total_limit_optimization_mb, 1250);
        assert_eq!(summary.total_request_optimization_percent, 50.0);
        assert_eq!(summary.total_limit_optimization_percent, 62.5);
    }

    #[test]
    fn test_summary_without_current_config() {
        let summary = ReportSummary::from_results(&[row("web", 100.0, 0.0, 0.0)]);
        assert_eq!(summary.total_request_optimization_mb, -100);
        assert_eq!(summary.total_request_optimization_percent, 0.0);
        assert_eq!(summary.total_limit_optimization_percent, 0.0);
    }

    #[test]
    fn test_empty_summary() {
        assert_eq!(ReportSummary::from_results(&[]), ReportSummary::default());
    }

    #[test]
    fn test_json_export() {
        let dir = TempDir::new().unwrap();
        let sink = JsonReportSink::new(dir.path());
        let path = sink
            .export("shop", &[row("web", 400.0, 800.0, 1600.0)])
            .unwrap();
        assert_eq!(path, dir.path().join("shop-resource-recommend.json"));

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["namespace"], "shop");
        assert_eq!(written["recommendations"][0]["deployment"], "web");
        assert_eq!(written["recommendations"][0]["request_optimization_percent"], 50.0);
        assert_eq!(written["summary"]["containers"], 1);
    }

    #[test]
    fn test_export_creates_missing_directory() {
        let dir = TempDir::new().unwrap();
        let sink = JsonReportSink::new(dir.path().join("reports").join("daily"));
        let path = sink.export("shop", &[]).unwrap();
        assert!(path.exists());
    }
}
