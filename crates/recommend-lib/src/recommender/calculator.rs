//! Recommendation math against the current configuration

use crate::models::{bytes_to_mb, CurrentConfig, RecommendationResult};

/// Delta as a percentage of the current value; 0 when nothing is configured.
pub fn optimization_percent(delta_mb: i64, current_mb: i64) -> f64 {
    if current_mb == 0 {
        return 0.0;
    }
    delta_mb as f64 / current_mb as f64 * 100.0
}

/// Build the recommendation for one container.
///
/// Request and limit deltas are each measured against their own current
/// value, so the two percentages are independent.
pub fn calculate(
    namespace: &str,
    deployment: &str,
    container: &str,
    estimate_bytes: f64,
    limit_multiplier: f64,
    current: &CurrentConfig,
) -> RecommendationResult {
    let recommended_request_bytes = estimate_bytes;
    let recommended_limit_bytes = estimate_bytes * limit_multiplier;
    let recommended_request_mb = bytes_to_mb(recommended_request_bytes);
    let recommended_limit_mb = bytes_to_mb(recommended_limit_bytes);

    let request_optimization_mb = current.request_mb - recommended_request_mb;
    let limit_optimization_mb = current.limit_mb - recommended_limit_mb;

    RecommendationResult {
        namespace: namespace.to_string(),
        deployment: deployment.to_string(),
        container: container.to_string(),
        current_request_mb: current.request_mb,
        current_limit_mb: current.limit_mb,
        current_request_bytes: current.request_bytes,
        current_limit_bytes: current.limit_bytes,
        recommended_request_mb,
        recommended_limit_mb,
        recommended_request_bytes,
        recommended_limit_bytes,
        request_optimization_mb,
        limit_optimization_mb,
        request_optimization_pct: optimization_percent(request_optimization_mb, current.request_mb),
        limit_optimization_pct: optimization_percent(limit_optimization_mb, current.limit_mb),
        memory_limit_multiplier: limit_multiplier,
    }
}
