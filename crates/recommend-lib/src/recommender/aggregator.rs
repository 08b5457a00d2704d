//! Windowed usage aggregation for a single deployment
//!
//! Walks the lookback window one day and one hour at a time, newest first.
//! Each day's hourly samples collapse into an order-statistic P90 per
//! container, and days are combined with a recency weight of `0.5^(day+1)`.
//! Weights are not renormalized, so the estimate is a decayed sum.

use super::sampler::UsageSampler;
use super::topology::TopologyResolver;
use crate::error::MetricsError;
use crate::observability::{RecommenderMetrics, StructuredLogger};
use crate::prometheus::alternation;
use crate::shutdown::ShutdownSignal;
use std::collections::HashMap;
use tracing::debug;

pub const HOURS_PER_DAY: i64 = 24;
pub const SECONDS_PER_HOUR: i64 = 3_600;
/// P90 rank numerator over 100, kept integral so `floor(n * 0.9)` is exact
pub const P90_PERCENT: usize = 90;

/// Per-day scratch buffer: container → hourly samples
pub type DaySamples = HashMap<String, Vec<f64>>;

/// Order-statistic P90: sorts `samples` and takes rank `floor(n * 0.9)`
/// clamped to the last index. `None` when there are no samples.
pub fn day_statistic(samples: &mut [f64]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    samples.sort_by(f64::total_cmp);
    let rank = samples.len() * P90_PERCENT / 100;
    Some(samples[rank.min(samples.len() - 1)])
}

/// Weight of the day `day` days back; day 0 is the most recent.
pub fn recency_weight(day: u32) -> f64 {
    0.5_f64.powi(day as i32 + 1)
}

/// `[start, end)` of the given hour of the given day, counted back from `now`
pub fn hour_window(now: i64, day: u32, hour: u32) -> (i64, i64) {
    let end = now - (i64::from(day) * HOURS_PER_DAY + i64::from(hour)) * SECONDS_PER_HOUR;
    (end - SECONDS_PER_HOUR, end)
}

/// Weighted estimates for one deployment
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeploymentUsage {
    /// container → recency-weighted sum of daily P90 values (bytes)
    pub containers: HashMap<String, f64>,
    pub hours_sampled: usize,
    pub hours_skipped: usize,
}

enum HourOutcome {
    Sampled(HashMap<String, f64>),
    NoReplicaSets,
    NoPods,
}

pub struct WindowedAggregator {
    topology: TopologyResolver,
    sampler: UsageSampler,
    count_days: u32,
    now: i64,
    logger: StructuredLogger,
    metrics: RecommenderMetrics,
}

impl WindowedAggregator {
    pub fn new(
        topology: TopologyResolver,
        sampler: UsageSampler,
        count_days: u32,
        now: i64,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            topology,
            sampler,
            count_days,
            now,
            logger,
            metrics: RecommenderMetrics::new(),
        }
    }

    /// Aggregate `deployment` over the whole lookback window.
    ///
    /// `scratch` is the caller's reusable day buffer; it is cleared before
    /// every day. Returns `None` when `shutdown` fires before the window is
    /// complete, in which case nothing partial is returned.
    pub async fn aggregate(
        &self,
        deployment: &str,
        scratch: &mut DaySamples,
        shutdown: &ShutdownSignal,
    ) -> Option<DeploymentUsage> {
        let mut usage = DeploymentUsage::default();

        for day in 0..self.count_days {
            scratch.clear();

            for hour in 0..HOURS_PER_DAY as u32 {
                if shutdown.is_triggered() {
                    return None;
                }
                let (start, end) = hour_window(self.now, day, hour);

                let outcome = tokio::select! {
                    biased;
                    _ = shutdown.triggered() => return None,
                    outcome = self.analyze_hour(deployment, start, end) => outcome,
                };

                match outcome {
                    Ok(HourOutcome::Sampled(samples)) => {
                        usage.hours_sampled += 1;
                        for (container, bytes) in samples {
                            scratch.entry(container).or_default().push(bytes);
                        }
                    }
                    Ok(HourOutcome::NoReplicaSets) => {
                        self.skip_hour(&mut usage, deployment, end, "no_replicasets")
                    }
                    Ok(HourOutcome::NoPods) => self.skip_hour(&mut usage, deployment, end, "no_pods"),
                    Err(e) => {
                        self.skip_hour(&mut usage, deployment, end, "query_error");
                        debug!(deployment = %deployment, error = %e, "Hour query failed");
                    }
                }
            }

            let weight = recency_weight(day);
            for (container, samples) in scratch.iter_mut() {
                let Some(p90) = day_statistic(samples) else {
                    continue;
                };
                let contribution = p90 * weight;
                if contribution > 0.0 {
                    *usage.containers.entry(container.clone()).or_insert(0.0) += contribution;
                }
            }
        }

        Some(usage)
    }

    fn skip_hour(&self, usage: &mut DeploymentUsage, deployment: &str, end: i64, reason: &str) {
        usage.hours_skipped += 1;
        self.metrics.inc_hours_skipped(reason);
        self.logger.log_hour_skipped(deployment, end, reason);
    }

    async fn analyze_hour(
        &self,
        deployment: &str,
        start: i64,
        end: i64,
    ) -> Result<HourOutcome, MetricsError> {
        let replica_sets = self
            .topology
            .resolve_replica_sets(deployment, start, end)
            .await?;
        if replica_sets.is_empty() {
            return Ok(HourOutcome::NoReplicaSets);
        }

        let pods = self
            .topology
            .resolve_pods(&alternation(&replica_sets), start, end)
            .await?;
        if pods.is_empty() {
            return Ok(HourOutcome::NoPods);
        }

        let samples = self.sampler.sample_memory(&alternation(&pods), end).await?;
        Ok(HourOutcome::Sampled(samples))
    }
}
