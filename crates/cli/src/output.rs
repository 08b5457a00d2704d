//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use recommend_lib::prometheus::{MetricStatus, PreflightReport};
use recommend_lib::{RecommendationReport, RecommendationResult, ReportSummary};
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Row for the recommendations table
#[derive(Tabled)]
struct RecommendationRow {
    #[tabled(rename = "Deployment")]
    deployment: String,
    #[tabled(rename = "Container")]
    container: String,
    #[tabled(rename = "Req (cur)")]
    current_request: String,
    #[tabled(rename = "Lim (cur)")]
    current_limit: String,
    #[tabled(rename = "Req (rec)")]
    recommended_request: String,
    #[tabled(rename = "Lim (rec)")]
    recommended_limit: String,
    #[tabled(rename = "Req Δ")]
    request_delta: String,
    #[tabled(rename = "Lim Δ")]
    limit_delta: String,
    #[tabled(rename = "Req %")]
    request_pct: String,
    #[tabled(rename = "Lim %")]
    limit_pct: String,
}

impl From<&RecommendationResult> for RecommendationRow {
    fn from(r: &RecommendationResult) -> Self {
        Self {
            deployment: r.deployment.clone(),
            container: r.container.clone(),
            current_request: format_mb(r.current_request_mb),
            current_limit: format_mb(r.current_limit_mb),
            recommended_request: format_mb(r.recommended_request_mb),
            recommended_limit: format_mb(r.recommended_limit_mb),
            request_delta: color_delta(r.request_optimization_mb, format_mb(r.request_optimization_mb)),
            limit_delta: color_delta(r.limit_optimization_mb, format_mb(r.limit_optimization_mb)),
            request_pct: color_delta(
                r.request_optimization_mb,
                format_percent(r.request_optimization_pct),
            ),
            limit_pct: color_delta(
                r.limit_optimization_mb,
                format_percent(r.limit_optimization_pct),
            ),
        }
    }
}

/// Row for the summary table
#[derive(Tabled)]
struct SummaryRow {
    #[tabled(rename = "Resource")]
    resource: &'static str,
    #[tabled(rename = "Current")]
    current: String,
    #[tabled(rename = "Recommended")]
    recommended: String,
    #[tabled(rename = "Optimization")]
    optimization: String,
    #[tabled(rename = "%")]
    percent: String,
}

/// Row for the pre-flight table
#[derive(Tabled)]
struct CheckRow {
    #[tabled(rename = "Query")]
    query: String,
    #[tabled(rename = "Status")]
    status: String,
}

/// Print a full recommendation report
pub fn print_report(report: &RecommendationReport, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report)?);
        }
        OutputFormat::Table => {
            let rows: Vec<RecommendationRow> =
                report.recommendations.iter().map(RecommendationRow::from).collect();
            println!("{}", Table::new(rows).with(Style::rounded()));
            println!();
            print_summary(&report.summary);
        }
    }
    Ok(())
}

fn print_summary(summary: &ReportSummary) {
    println!(
        "{} ({} containers)",
        "Optimization summary".bold(),
        summary.containers
    );
    let rows = [
        SummaryRow {
            resource: "Memory request",
            current: format_mb(summary.total_current_request_mb),
            recommended: format_mb(summary.total_recommended_request_mb),
            optimization: color_delta(
                summary.total_request_optimization_mb,
                format_mb(summary.total_request_optimization_mb),
            ),
            percent: format_percent(summary.total_request_optimization_percent),
        },
        SummaryRow {
            resource: "Memory limit",
            current: format_mb(summary.total_current_limit_mb),
            recommended: format_mb(summary.total_recommended_limit_mb),
            optimization: color_delta(
                summary.total_limit_optimization_mb,
                format_mb(summary.total_limit_optimization_mb),
            ),
            percent: format_percent(summary.total_limit_optimization_percent),
        },
    ];
    println!("{}", Table::new(rows).with(Style::rounded()));
}

/// Print a pre-flight report
pub fn print_preflight(report: &PreflightReport, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report)?);
        }
        OutputFormat::Table => {
            let rows: Vec<CheckRow> = report
                .checks
                .iter()
                .map(|c| CheckRow {
                    query: c.query.clone(),
                    status: color_metric_status(&c.status),
                })
                .collect();
            println!("{}", Table::new(rows).with(Style::rounded()));
        }
    }
    Ok(())
}

/// Print a success message
pub fn print_success(message: &str) {
    eprintln!("{} {}", "✓".green().bold(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    eprintln!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    eprintln!("{} {}", "ℹ".blue().bold(), message);
}

/// Format whole megabytes the way Kubernetes quantities read
pub fn format_mb(mb: i64) -> String {
    if mb.abs() >= 1024 {
        format!("{:.2}Gi", mb as f64 / 1024.0)
    } else {
        format!("{}Mi", mb)
    }
}

pub fn format_percent(pct: f64) -> String {
    format!("{:.1}%", pct)
}

/// Green when memory can be released, red when the container needs more
pub fn color_delta(delta_mb: i64, formatted: String) -> String {
    match delta_mb.signum() {
        1 => formatted.green().to_string(),
        -1 => formatted.red().to_string(),
        _ => formatted,
    }
}

fn color_metric_status(status: &MetricStatus) -> String {
    match status {
        MetricStatus::Available(series) => format!("available ({series} series)").green().to_string(),
        MetricStatus::Empty => "empty".yellow().to_string(),
        MetricStatus::Failed(e) => format!("failed: {e}").red().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_mb() {
        assert_eq!(format_mb(0), "0Mi");
        assert_eq!(format_mb(512), "512Mi");
        assert_eq!(format_mb(1536), "1.50Gi");
        assert_eq!(format_mb(-300), "-300Mi");
        assert_eq!(format_mb(-2048), "-2.00Gi");
    }

    #[test]
    fn test_format_percent() {
        assert_eq!(format_percent(50.0), "50.0%");
        assert_eq!(format_percent(-87.5), "-87.5%");
        assert_eq!(format_percent(0.0), "0.0%");
    }

    #[test]
    fn test_color_delta_keeps_text() {
        colored::control::set_override(false);
        assert_eq!(color_delta(10, "10Mi".to_string()), "10Mi");
        assert_eq!(color_delta(-10, "-10Mi".to_string()), "-10Mi");
        assert_eq!(color_delta(0, "0Mi".to_string()), "0Mi");
    }
}
