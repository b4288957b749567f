//! Prometheus metrics for the reservation pipeline.
//!
//! Recording is always on; until [`MetricsRecorder::install`] runs the
//! `metrics` macros are no-ops, which is what unit tests rely on.
//!
//! # Example
//!
//! ```rust,no_run
//! use inventory_runtime::metrics::MetricsRecorder;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let recorder = MetricsRecorder::install()?;
//! let text = recorder.render(); // Prometheus exposition format
//! # Ok(())
//! # }
//! ```

use inventory_core::{FailureReason, OutcomeStatus};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;
use thiserror::Error;

pub use metrics::{counter, gauge, histogram};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Handle to the installed Prometheus recorder.
#[derive(Clone)]
pub struct MetricsRecorder {
    handle: PrometheusHandle,
}

impl MetricsRecorder {
    /// Describe all metrics and install the global Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::Install`] if a recorder is already installed.
    pub fn install() -> Result<Self, MetricsError> {
        register_metrics();

        let handle = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[
                    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
                ],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?
            .install_recorder()
            .map_err(|e| MetricsError::Install(e.to_string()))?;

        tracing::info!("Prometheus metrics recorder installed");
        Ok(Self { handle })
    }

    /// Render current metrics in Prometheus text format.
    #[must_use]
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Register all metric descriptions.
fn register_metrics() {
    describe_counter!(
        "inventory_reservations_total",
        "Reservation decisions by status and reason"
    );
    describe_counter!(
        "inventory_reservations_replayed_total",
        "Redelivered orders answered from the reservation ledger"
    );
    describe_histogram!(
        "inventory_reservation_duration_seconds",
        "Time from validation to decision, including store retries"
    );

    describe_counter!(
        "inventory_store_errors_total",
        "Stock store calls that returned an error, by operation"
    );
    describe_counter!(
        "inventory_stock_writes_total",
        "Stock rows created or overwritten over HTTP, by operation"
    );

    describe_counter!(
        "inventory_orders_received_total",
        "Order messages fetched from the log"
    );
    describe_counter!(
        "inventory_orders_malformed_total",
        "Order messages skipped because they could not be decoded"
    );
    describe_counter!(
        "inventory_order_log_read_errors_total",
        "Failed reads from the order log"
    );
    describe_gauge!(
        "inventory_order_log_consecutive_read_errors",
        "Read failures since the last successful read"
    );
    describe_counter!(
        "inventory_offset_commit_errors_total",
        "Offset commits rejected by the broker"
    );

    describe_counter!(
        "inventory_outcomes_published_total",
        "Outcome events acknowledged by the broker"
    );
    describe_counter!(
        "inventory_outcome_publish_errors_total",
        "Failed outcome publish attempts"
    );
    describe_counter!(
        "inventory_outcome_publish_escalations_total",
        "Outcomes still unpublished after the bounded retry budget"
    );
    describe_histogram!(
        "inventory_outcome_publish_duration_seconds",
        "Time to get a broker acknowledgement for an outcome"
    );

    describe_counter!("retry_attempts_total", "Retries scheduled, by operation");
    describe_counter!("retry_successes_total", "Operations that succeeded after retrying");
    describe_counter!("retry_exhausted_total", "Operations that ran out of retries");
}

/// Reservation engine metrics recorder.
pub struct ReservationMetrics;

impl ReservationMetrics {
    /// Record a decision.
    pub fn record_decision(
        status: OutcomeStatus,
        reason: Option<FailureReason>,
        duration: Duration,
    ) {
        let reason = reason.map_or("none", |r| r.label());
        counter!(
            "inventory_reservations_total",
            "status" => status.as_str(),
            "reason" => reason
        )
        .increment(1);
        histogram!("inventory_reservation_duration_seconds").record(duration.as_secs_f64());
    }

    /// Record a ledger replay.
    pub fn record_replay() {
        counter!("inventory_reservations_replayed_total").increment(1);
    }
}

/// Order consumer metrics recorder.
pub struct ConsumerMetrics;

impl ConsumerMetrics {
    /// Record a fetched message.
    pub fn record_received() {
        counter!("inventory_orders_received_total").increment(1);
    }

    /// Record a skipped, undecodable message.
    pub fn record_malformed() {
        counter!("inventory_orders_malformed_total").increment(1);
    }

    /// Record a read error and the current streak.
    #[allow(clippy::cast_precision_loss)] // streak counts stay far below 2^52
    pub fn record_read_error(consecutive: u64) {
        counter!("inventory_order_log_read_errors_total").increment(1);
        gauge!("inventory_order_log_consecutive_read_errors").set(consecutive as f64);
    }

    /// Record a successful read after errors.
    pub fn record_read_recovered() {
        gauge!("inventory_order_log_consecutive_read_errors").set(0.0);
    }

    /// Record a rejected offset commit.
    pub fn record_commit_error() {
        counter!("inventory_offset_commit_errors_total").increment(1);
    }
}

/// Outcome publishing metrics recorder.
pub struct PublishMetrics;

impl PublishMetrics {
    /// Record an acknowledged outcome.
    pub fn record_published(status: OutcomeStatus, duration: Duration) {
        counter!("inventory_outcomes_published_total", "status" => status.as_str()).increment(1);
        histogram!("inventory_outcome_publish_duration_seconds").record(duration.as_secs_f64());
    }

    /// Record a failed attempt.
    pub fn record_error() {
        counter!("inventory_outcome_publish_errors_total").increment(1);
    }

    /// Record an exhausted retry budget.
    pub fn record_escalation() {
        counter!("inventory_outcome_publish_escalations_total").increment(1);
    }
}

/// Retry metrics recorder.
pub struct RetryMetrics;

impl RetryMetrics {
    /// Record a scheduled retry.
    pub fn record_attempt(operation: &'static str) {
        counter!("retry_attempts_total", "operation" => operation).increment(1);
    }

    /// Record a success after at least one retry.
    pub fn record_success(operation: &'static str) {
        counter!("retry_successes_total", "operation" => operation).increment(1);
    }

    /// Record exhausted retries.
    pub fn record_exhausted(operation: &'static str) {
        counter!("retry_exhausted_total", "operation" => operation).increment(1);
    }
}
