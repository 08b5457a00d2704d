//! Memory recommendation engine
//!
//! Discovers eligible deployments, fans them out to a fixed pool of
//! workers, and turns each worker's weighted usage estimates into
//! recommendation records once every worker has finished.

mod aggregator;
mod calculator;
mod current;
mod discovery;
mod sampler;
mod topology;


pub use aggregator::{
    day_statistic, hour_window, recency_weight, DaySamples, DeploymentUsage, WindowedAggregator,
    HOURS_PER_DAY, P90_PERCENT, SECONDS_PER_HOUR,
};
pub use calculator::{calculate, optimization_percent};
pub use current::{first_by_pod, CurrentConfigResolver};
pub use discovery::{DeploymentDiscoverer, SECONDS_PER_DAY};
pub use sampler::UsageSampler;
pub use topology::{TopologyResolver, OWNER_STEP_SECS};

use crate::error::{RecommendError, Result};
use crate::models::{ContainerEstimate, RecommendationConfig, RecommendationResult};
use crate::observability::{RecommenderMetrics, StructuredLogger};
use crate::prometheus::MetricsSource;
use crate::shutdown::ShutdownSignal;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinSet;
use tracing::debug;

/// Capacity of the deployment queue feeding the workers
pub const QUEUE_CAPACITY: usize = 100;

/// deployment → container → estimate
type EstimateMap = HashMap<String, HashMap<String, ContainerEstimate>>;

/// Outcome of a recommendation run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    /// Sorted by deployment, then container
    pub recommendations: Vec<RecommendationResult>,
    pub deployments_discovered: usize,
    pub deployments_completed: usize,
    /// The shutdown signal fired; interrupted deployments were discarded
    pub cancelled: bool,
}

impl RunReport {
    pub fn is_empty(&self) -> bool {
        self.recommendations.is_empty()
    }
}

/// One deployment's finished estimates
struct ProcessedDeployment {
    estimates: HashMap<String, ContainerEstimate>,
    hours_sampled: usize,
    hours_skipped: usize,
}

/// Per-deployment pipeline shared by every worker
struct Pipeline {
    aggregator: WindowedAggregator,
    current: CurrentConfigResolver,
    logger: StructuredLogger,
    metrics: RecommenderMetrics,
}

impl Pipeline {
    /// Consume deployments until the queue is drained or shutdown fires
    async fn run_worker(
        self: Arc<Self>,
        worker_id: usize,
        queue: Arc<Mutex<mpsc::Receiver<String>>>,
        results: Arc<RwLock<EstimateMap>>,
        shutdown: ShutdownSignal,
    ) {
        // Reused across deployments; the aggregator clears it before every day
        let mut scratch = DaySamples::new();

        loop {
            let next = {
                let mut queue = queue.lock().await;
                tokio::select! {
                    biased;
                    _ = shutdown.triggered() => None,
                    deployment = queue.recv() => deployment,
                }
            };
            let Some(deployment) = next else {
                break;
            };

            let started = Instant::now();
            let Some(processed) = self.process(&deployment, &mut scratch, &shutdown).await else {
                self.metrics.inc_deployments_discarded();
                self.logger.log_deployment_discarded(&deployment);
                break;
            };
            let elapsed = started.elapsed();

            let mut containers: Vec<&str> =
                processed.estimates.keys().map(String::as_str).collect();
            containers.sort_unstable();
            self.logger.log_deployment_processed(
                &deployment,
                &containers,
                processed.hours_sampled,
                processed.hours_skipped,
                elapsed.as_millis(),
            );
            self.metrics.inc_deployments_processed();
            self.metrics
                .observe_deployment_duration(elapsed.as_secs_f64());

            results
                .write()
                .await
                .insert(deployment, processed.estimates);
        }

        debug!(worker_id, "Worker finished");
    }

    /// Aggregate one deployment and attach current configuration.
    ///
    /// `None` if shutdown interrupted it.
    async fn process(
        &self,
        deployment: &str,
        scratch: &mut DaySamples,
        shutdown: &ShutdownSignal,
    ) -> Option<ProcessedDeployment> {
        let usage = self.aggregator.aggregate(deployment, scratch, shutdown).await?;

        let mut estimates = HashMap::with_capacity(usage.containers.len());
        for (container, memory_bytes) in usage.containers {
            let current = tokio::select! {
                biased;
                _ = shutdown.triggered() => return None,
                current = self.current.resolve(deployment, &container) => current,
            };
            estimates.insert(
                container,
                ContainerEstimate {
                    memory_bytes,
                    current,
                },
            );
        }

        Some(ProcessedDeployment {
            estimates,
            hours_sampled: usage.hours_sampled,
            hours_skipped: usage.hours_skipped,
        })
    }
}

/// Memory recommender for one namespace
pub struct Recommender {
    source: Arc<dyn MetricsSource>,
    config: RecommendationConfig,
    now: i64,
    logger: StructuredLogger,
    metrics: RecommenderMetrics,
}

impl Recommender {
    pub fn new(source: Arc<dyn MetricsSource>, config: RecommendationConfig) -> Self {
        let logger = StructuredLogger::new(&config.namespace);
        Self {
            source,
            config,
            now: chrono::Utc::now().timestamp(),
            logger,
            metrics: RecommenderMetrics::new(),
        }
    }

    /// Pin the end of the lookback window (Unix seconds)
    pub fn with_now(mut self, now: i64) -> Self {
        self.now = now;
        self
    }

    /// Run the full pipeline.
    ///
    /// Only invalid configuration, a failed discovery query, or a crashed
    /// worker abort the run. Everything else degrades to fewer samples.
    pub async fn generate_recommendations(&self, shutdown: ShutdownSignal) -> Result<RunReport> {
        self.config.validate()?;
        let started = Instant::now();
        self.logger.log_run_started(
            self.config.count_days,
            self.config.worker_count,
            self.config.memory_limit_multiplier,
        );

        let discoverer = DeploymentDiscoverer::new(self.source.clone(), &self.config.namespace);
        let deployments = discoverer
            .discover(self.config.count_days, self.now)
            .await
            .map_err(RecommendError::Discovery)?;
        self.logger.log_deployments_discovered(deployments.len());

        let discovered = deployments.len();
        let estimates = self.run_workers(deployments, &shutdown).await?;

        let report = RunReport {
            recommendations: self.build_recommendations(&estimates),
            deployments_discovered: discovered,
            deployments_completed: estimates.len(),
            cancelled: shutdown.is_triggered(),
        };

        self.metrics.add_recommendations(report.recommendations.len());
        self.logger.log_run_finished(
            report.recommendations.len(),
            report.deployments_completed,
            report.cancelled,
            started.elapsed().as_millis(),
        );
        Ok(report)
    }

    fn pipeline(&self) -> Pipeline {
        let ns = &self.config.namespace;
        Pipeline {
            aggregator: WindowedAggregator::new(
                TopologyResolver::new(self.source.clone(), ns),
                UsageSampler::new(self.source.clone(), ns),
                self.config.count_days,
                self.now,
                self.logger.clone(),
            ),
            current: CurrentConfigResolver::new(self.source.clone(), ns, self.logger.clone()),
            logger: self.logger.clone(),
            metrics: self.metrics.clone(),
        }
    }

    /// Feed `deployments` to the worker pool and wait for every worker
    async fn run_workers(
        &self,
        deployments: Vec<String>,
        shutdown: &ShutdownSignal,
    ) -> Result<EstimateMap> {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        let queue = Arc::new(Mutex::new(rx));
        let results = Arc::new(RwLock::new(EstimateMap::new()));
        let pipeline = Arc::new(self.pipeline());

        let mut workers = JoinSet::new();
        for worker_id in 0..self.config.worker_count {
            workers.spawn(pipeline.clone().run_worker(
                worker_id,
                queue.clone(),
                results.clone(),
                shutdown.clone(),
            ));
        }
        // The receiver now dies with the last worker, failing `send` if the pool is gone
        drop(queue);

        for deployment in deployments {
            let sent = tokio::select! {
                biased;
                _ = shutdown.triggered() => false,
                sent = tx.send(deployment) => sent.is_ok(),
            };
            if !sent {
                break;
            }
        }
        drop(tx);

        let mut failure = None;
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                failure.get_or_insert_with(|| e.to_string());
            }
        }
        if let Some(e) = failure {
            return Err(RecommendError::Worker(e));
        }

        // Every writer has joined; take the map out under the read lock
        let estimates = results.read().await.clone();
        Ok(estimates)
    }

    fn build_recommendations(&self, estimates: &EstimateMap) -> Vec<RecommendationResult> {
        let mut recommendations: Vec<RecommendationResult> = estimates
            .iter()
            .flat_map(|(deployment, containers)| {
                containers.iter().map(move |(container, estimate)| {
                    calculate(
                        &self.config.namespace,
                        deployment,
                        container,
                        estimate.memory_bytes,
                        self.config.memory_limit_multiplier,
                        &estimate.current,
                    )
                })
            })
            .collect();

        recommendations.sort_by(|a, b| {
            (a.deployment.as_str(), a.container.as_str())
                .cmp(&(b.deployment.as_str(), b.container.as_str()))
        });
        recommendations
    }
}
