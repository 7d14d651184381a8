//! Prometheus metrics for observability and monitoring.
//!
//! This module provides metric collection for the runtime:
//! - Stimulus dispatch (count, duration, watcher firings)
//! - Rollbacks of aborted stimuli
//! - Outbound commands by kind, render passes
//! - Storage failures
//!
//! # Example
//!
//! ```rust,no_run
//! use convergent_runtime::metrics::MetricsExporter;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut exporter = MetricsExporter::new();
//! exporter.install()?;
//!
//! // ... dispatch stimuli ...
//!
//! if let Some(text) = exporter.render() {
//!     println!("{text}");
//! }
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;
use thiserror::Error;

// Re-export metrics macros for use in other modules
pub use metrics::{counter, histogram};

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

/// Prometheus recorder with an in-process render handle.
#[derive(Default)]
pub struct MetricsExporter {
    handle: Option<PrometheusHandle>,
}

impl MetricsExporter {
    /// Create an exporter that is not installed yet.
    #[must_use]
    pub const fn new() -> Self {
        Self { handle: None }
    }

    /// Register metric descriptions and install the Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed.
    ///
    /// # Note
    ///
    /// If a metrics recorder is already installed (e.g., in tests), this
    /// logs a warning and leaves [`MetricsExporter::handle`] empty.
    pub fn install(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[
                    0.000_01, 0.000_05, 0.000_1, 0.000_5, 0.001, 0.005, 0.01, 0.05, 0.1,
                ],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!("Metrics recorder installed");
                Ok(())
            },
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!(
                        "Metrics recorder already initialized, skipping re-initialization"
                    );
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            },
        }
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if the exporter hasn't been installed.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
fn register_metrics() {
    describe_counter!(
        "convergent_stimuli_total",
        "Total number of stimuli dispatched to the graph"
    );
    describe_counter!(
        "convergent_rollbacks_total",
        "Total number of stimuli aborted and rolled back"
    );
    describe_counter!(
        "convergent_watcher_firings_total",
        "Total number of watcher invocations"
    );
    describe_histogram!(
        "convergent_dispatch_duration_seconds",
        "Time taken for a stimulus to converge and flush"
    );
    describe_counter!(
        "convergent_outbound_commands_total",
        "Total number of outbound commands flushed"
    );
    describe_counter!(
        "convergent_outbound_coalesced_total",
        "Total number of outbound commands dropped as superseded"
    );
    describe_counter!(
        "convergent_render_passes_total",
        "Total number of visible-children replacements"
    );
    describe_counter!(
        "convergent_storage_failures_total",
        "Total number of failed storage writes"
    );
}

/// Stimulus metrics recorder.
pub struct StimulusMetrics;

impl StimulusMetrics {
    /// Record a converged stimulus.
    pub fn record_dispatch(stimulus: &'static str, duration: Duration, firings: u64) {
        counter!("convergent_stimuli_total", "stimulus" => stimulus).increment(1);
        counter!("convergent_watcher_firings_total").increment(firings);
        histogram!("convergent_dispatch_duration_seconds").record(duration.as_secs_f64());
    }

    /// Record an aborted stimulus.
    pub fn record_rollback(stimulus: &'static str) {
        counter!("convergent_rollbacks_total", "stimulus" => stimulus).increment(1);
    }
}

/// Outbound command metrics recorder.
pub struct OutboundMetrics;

impl OutboundMetrics {
    /// Record a flushed command.
    pub fn record_command(kind: &'static str) {
        counter!("convergent_outbound_commands_total", "kind" => kind).increment(1);
        if kind == "set_children" {
            counter!("convergent_render_passes_total").increment(1);
        }
    }

    /// Record commands dropped by coalescing.
    pub fn record_coalesced(count: usize) {
        counter!("convergent_outbound_coalesced_total").increment(count as u64);
    }

    /// Record a failed storage write.
    pub fn record_storage_failure() {
        counter!("convergent_storage_failures_total").increment(1);
    }
}
