//! Prometheus metrics for the job engine
//!
//! Call `init_metrics()` at application startup to register all metrics.
//! If initialization fails, metrics operations become no-ops.

use prometheus::{
    register_counter, register_counter_vec, register_gauge, Counter, CounterVec, Encoder, Gauge,
    TextEncoder,
};
use std::sync::OnceLock;

use crate::scheduler::RebalanceReport;

// ============================================================================
// Metrics Storage
// ============================================================================

/// Container for all engine metrics
struct EngineMetrics {
    jobs_running: Gauge,
    executions: CounterVec,
    rebalance_moves: Counter,
    rebalance_skips: CounterVec,
    distribution_evenness: Gauge,
}

/// Global storage for engine metrics
static ENGINE_METRICS: OnceLock<EngineMetrics> = OnceLock::new();

/// Flag to track if initialization was attempted
static METRICS_INIT_ATTEMPTED: OnceLock<bool> = OnceLock::new();

// ============================================================================
// Initialization
// ============================================================================

/// Initialize all Prometheus metrics.
///
/// Should be called once at application startup. If registration fails,
/// subsequent metric operations become no-ops and the engine runs on
/// without them.
pub fn init_metrics() -> Result<(), Box<dyn std::error::Error>> {
    // Prevent double initialization
    if METRICS_INIT_ATTEMPTED.get().is_some() {
        return Ok(());
    }
    METRICS_INIT_ATTEMPTED.set(true).ok();

    let metrics = EngineMetrics {
        jobs_running: register_gauge!(
            "jangdan_jobs_running",
            "Number of jobs currently executing"
        )?,
        executions: register_counter_vec!(
            "jangdan_executions_total",
            "Job executions by outcome",
            &["outcome"]
        )?,
        rebalance_moves: register_counter!(
            "jangdan_rebalance_moves_total",
            "Jobs moved by rebalance passes"
        )?,
        rebalance_skips: register_counter_vec!(
            "jangdan_rebalance_skips_total",
            "Jobs skipped by rebalance passes, by reason",
            &["reason"]
        )?,
        distribution_evenness: register_gauge!(
            "jangdan_distribution_evenness",
            "Evenness score of the current load distribution (0-1)"
        )?,
    };

    ENGINE_METRICS.set(metrics).ok();
    Ok(())
}

// ============================================================================
// Recording Helpers
// ============================================================================

pub fn inc_jobs_running() {
    if let Some(m) = ENGINE_METRICS.get() {
        m.jobs_running.inc();
    }
}

pub fn dec_jobs_running() {
    if let Some(m) = ENGINE_METRICS.get() {
        m.jobs_running.dec();
    }
}

/// Count one execution with outcome `completed`, `retried`, or `failed`.
pub fn observe_execution(outcome: &str) {
    if let Some(m) = ENGINE_METRICS.get() {
        m.executions.with_label_values(&[outcome]).inc();
    }
}

/// Record the moves and skips of a completed rebalance pass.
pub fn record_rebalance(report: &RebalanceReport) {
    if let Some(m) = ENGINE_METRICS.get() {
        m.rebalance_moves.inc_by(report.moves.len() as f64);
        for skip in &report.skips {
            m.rebalance_skips
                .with_label_values(&[skip.reason.as_str()])
                .inc();
        }
        m.distribution_evenness.set(report.distribution.evenness);
    }
}

pub fn set_evenness(score: f64) {
    if let Some(m) = ENGINE_METRICS.get() {
        m.distribution_evenness.set(score);
    }
}

/// Encode the default registry as Prometheus text for the `/metrics`
/// endpoint.
pub fn gather() -> String {
    let encoder = TextEncoder::new();
    let families = prometheus::gather();
    let mut buffer = Vec::new();

    if encoder.encode(&families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        assert!(init_metrics().is_ok());
        assert!(init_metrics().is_ok());
    }

    #[test]
    fn test_helpers_are_safe_without_init() {
        // Whether or not another test initialized the registry, the
        // helpers must never panic.
        inc_jobs_running();
        dec_jobs_running();
        observe_execution("completed");
        set_evenness(0.5);
    }

    #[test]
    fn test_gather_after_init() {
        init_metrics().ok();
        inc_jobs_running();

        let text = gather();
        assert!(text.contains("jangdan_jobs_running"));
    }
}
