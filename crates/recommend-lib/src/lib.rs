//! Memory recommendation library for Kubernetes deployments
//!
//! This crate provides the core functionality for:
//! - Querying usage history from a Prometheus-compatible backend
//! - Weighted percentile estimation of per-container memory needs
//! - Comparison against the currently configured requests and limits
//! - Report export and run observability

pub mod error;
pub mod models;
pub mod observability;
pub mod prometheus;
pub mod recommender;
pub mod report;
pub mod shutdown;

pub use error::{ConfigError, MetricsError, RecommendError, Result};
pub use models::*;
pub use observability::{RecommenderMetrics, StructuredLogger};
pub use recommender::{Recommender, RunReport};
pub use report::{JsonReportSink, RecommendationReport, ReportSink, ReportSummary};
pub use shutdown::ShutdownSignal;
