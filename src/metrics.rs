//! Prometheus metrics for the trading core.
//!
//! This module provides metrics for:
//! - Tick latency
//! - Opportunities, admissions and rejections
//! - Position opens and closes
//! - Execution failures and dropped price samples

use std::time::Instant;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::debug;

// === Metric Name Constants ===

/// Tick latency metric name.
pub const METRIC_TICK_LATENCY: &str = "tick_latency_ms";
/// Opportunities detected counter metric name.
pub const METRIC_OPPORTUNITIES_DETECTED: &str = "opportunities_detected_total";
/// Admissions granted counter metric name.
pub const METRIC_ADMISSIONS: &str = "admissions_total";
/// Admissions rejected counter metric name.
pub const METRIC_REJECTIONS: &str = "admission_rejections_total";
/// Positions opened counter metric name.
pub const METRIC_POSITIONS_OPENED: &str = "positions_opened_total";
/// Positions closed counter metric name.
pub const METRIC_POSITIONS_CLOSED: &str = "positions_closed_total";
/// Execution failures counter metric name.
pub const METRIC_EXECUTION_FAILURES: &str = "execution_failures_total";
/// Dropped price samples counter metric name.
pub const METRIC_SAMPLES_DROPPED: &str = "price_samples_dropped_total";

/// Initialize all metric descriptions.
/// Call this once at startup to register metrics with descriptions.
pub fn init_metrics() {
    describe_histogram!(METRIC_TICK_LATENCY, "Evaluation tick latency in milliseconds");

    describe_counter!(
        METRIC_OPPORTUNITIES_DETECTED,
        "Total number of actionable opportunities detected"
    );
    describe_counter!(METRIC_ADMISSIONS, "Total number of admissions granted");
    describe_counter!(
        METRIC_REJECTIONS,
        "Total number of admissions rejected, by reason"
    );
    describe_counter!(METRIC_POSITIONS_OPENED, "Total number of positions opened");
    describe_counter!(
        METRIC_POSITIONS_CLOSED,
        "Total number of positions closed, by exit reason"
    );
    describe_counter!(
        METRIC_EXECUTION_FAILURES,
        "Total number of failed executor calls, by operation"
    );
    describe_counter!(
        METRIC_SAMPLES_DROPPED,
        "Total number of out-of-order or invalid price samples dropped"
    );

    debug!("Metrics initialized");
}

/// Install the Prometheus recorder and return a handle for rendering.
pub fn install_prometheus() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    init_metrics();
    Ok(handle)
}

/// Increment opportunities detected counter.
pub fn inc_opportunities_detected(count: u64) {
    counter!(METRIC_OPPORTUNITIES_DETECTED).increment(count);
}

/// Increment admissions counter.
pub fn inc_admissions() {
    counter!(METRIC_ADMISSIONS).increment(1);
}

/// Increment rejections counter for `reason`.
pub fn inc_rejections(reason: &'static str) {
    counter!(METRIC_REJECTIONS, "reason" => reason).increment(1);
}

/// Increment positions opened counter.
pub fn inc_positions_opened() {
    counter!(METRIC_POSITIONS_OPENED).increment(1);
}

/// Increment positions closed counter for `reason`.
pub fn inc_positions_closed(reason: &'static str) {
    counter!(METRIC_POSITIONS_CLOSED, "reason" => reason).increment(1);
}

/// Increment execution failures counter for `operation`.
pub fn inc_execution_failures(operation: &'static str) {
    counter!(METRIC_EXECUTION_FAILURES, "operation" => operation).increment(1);
}

/// Increment dropped samples counter.
pub fn inc_samples_dropped() {
    counter!(METRIC_SAMPLES_DROPPED).increment(1);
}

/// RAII guard for timing operations.
/// Automatically records latency when dropped.
pub struct LatencyTimer {
    start: Instant,
    metric_name: &'static str,
}

impl LatencyTimer {
    /// Create a new latency timer for the given metric.
    pub fn new(metric_name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            metric_name,
        }
    }

    /// Get elapsed time in milliseconds (without recording).
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        histogram!(self.metric_name).record(self.elapsed_ms());
    }
}

/// Create a latency timer for one evaluation tick.
pub fn timer_tick() -> LatencyTimer {
    LatencyTimer::new(METRIC_TICK_LATENCY)
}
