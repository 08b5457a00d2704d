//! Kubernetes memory recommendation CLI
//!
//! Mines a namespace's memory usage history from Prometheus and reports
//! recommended requests and limits next to the current configuration.

mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use commands::recommend::RecommendOptions;
use crate::config::Settings;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Kubernetes memory recommendation CLI
#[derive(Parser)]
#[command(name = "kube-recommend")]
#[command(author, version, about = "Memory request and limit recommendations for Kubernetes deployments", long_about = None)]
pub struct Cli {
    /// Configuration file (default: ~/.config/kube-recommend/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, short, default_value = "table", global = true)]
    pub format: output::OutputFormat,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Where to find the metrics
#[derive(Args)]
pub struct TargetArgs {
    /// Prometheus base URL
    #[arg(long)]
    pub prometheus_url: Option<String>,

    /// Namespace to analyze
    #[arg(long, short)]
    pub namespace: Option<String>,

    /// Timeout for each Prometheus request, in seconds
    #[arg(long)]
    pub http_timeout_secs: Option<u64>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate memory recommendations and export a JSON report
    Recommend {
        #[command(flatten)]
        target: TargetArgs,

        /// Limit multiplier applied to the recommended request
        #[arg(long = "limits")]
        memory_limit_multiplier: Option<f64>,

        /// Lookback window in days
        #[arg(long)]
        count_days: Option<u32>,

        /// Number of parallel workers
        #[arg(long)]
        workers: Option<usize>,

        /// Directory the report is written to
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Write run metrics in the Prometheus text format to this file
        #[arg(long)]
        metrics_file: Option<PathBuf>,

        /// Skip the metrics availability check
        #[arg(long)]
        skip_preflight: bool,
    },

    /// Check that every metric the recommender needs is available
    Check {
        #[command(flatten)]
        target: TargetArgs,
    },
}

impl TargetArgs {
    fn settings(self) -> Settings {
        Settings {
            prometheus_url: self.prometheus_url,
            namespace: self.namespace,
            http_timeout_secs: self.http_timeout_secs,
            ..Default::default()
        }
    }
}

fn init_tracing(verbose: bool, json: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let registry = tracing_subscriber::registry().with(filter);

    // Logs go to stderr so table and JSON output stay clean on stdout
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.json_logs);

    let layered = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Recommend {
            target,
            memory_limit_multiplier,
            count_days,
            workers,
            output,
            metrics_file,
            skip_preflight,
        } => {
            let flags = Settings {
                memory_limit_multiplier,
                count_days,
                worker_count: workers,
                output_dir: output,
                ..target.settings()
            };
            let settings = layered.merge(flags);
            let options = RecommendOptions {
                output_dir: settings.output_dir(),
                metrics_file,
                skip_preflight,
                format: cli.format,
            };
            commands::recommend::run(settings.recommendation_config(), options).await?;
        }
        Commands::Check { target } => {
            let settings = layered.merge(target.settings());
            commands::check::run(settings.recommendation_config(), cli.format).await?;
        }
    }

    Ok(())
}
