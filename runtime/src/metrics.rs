//! Prometheus metrics for the dispatch and append hot paths.
//!
//! Not wired to an exporter by default: this module only describes and
//! records the counters/histograms so that an embedding application can
//! install its own exporter if it wants one.
//!
//! # Example
//!
//! ```rust,no_run
//! use eventide_runtime::metrics::MetricsServer;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

pub use metrics::{counter, histogram};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build the metrics exporter.
    #[error("failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install the metrics exporter.
    #[error("failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus metrics server.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a new metrics server bound to `addr` once started.
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Register metric descriptions and install the Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::Build`] or [`MetricsError::Install`] if the
    /// exporter cannot be constructed or installed.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!(addr = %self.addr, "metrics server started");
                Ok(())
            }
            Err(e) => {
                let message = e.to_string();
                if message.contains("already initialized") {
                    tracing::warn!("metrics recorder already initialized, skipping");
                    Ok(())
                } else {
                    Err(MetricsError::Install(message))
                }
            }
        }
    }

    /// Render current metrics in Prometheus text format.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

fn register_metrics() {
    describe_counter!("dispatch_commands_total", "Total number of dispatched commands");
    describe_counter!("dispatch_errors_total", "Total number of dispatch failures");
    describe_histogram!("dispatch_duration_seconds", "Time taken to run a full dispatch");

    describe_counter!("log_events_appended_total", "Total number of events appended to the log");
    describe_counter!(
        "log_concurrency_conflicts_total",
        "Total number of OCC conflicts raised by append"
    );
    describe_histogram!("log_append_duration_seconds", "Time taken to append events");

    describe_counter!(
        "subscription_events_delivered_total",
        "Total number of events delivered to subscription handlers"
    );
    describe_counter!(
        "subscription_handler_errors_total",
        "Total number of subscription handler errors (still acknowledged)"
    );
}

/// Dispatcher metrics recorder.
pub struct DispatchMetrics;

impl DispatchMetrics {
    /// Record a completed dispatch attempt.
    pub fn record(duration: Duration) {
        counter!("dispatch_commands_total").increment(1);
        histogram!("dispatch_duration_seconds").record(duration.as_secs_f64());
    }

    /// Record a dispatch failure of any kind.
    pub fn record_error() {
        counter!("dispatch_errors_total").increment(1);
    }
}

/// Event Log metrics recorder.
pub struct LogMetrics;

impl LogMetrics {
    /// Record a successful append.
    pub fn record_append(event_count: usize, duration: Duration) {
        counter!("log_events_appended_total").increment(event_count as u64);
        histogram!("log_append_duration_seconds").record(duration.as_secs_f64());
    }

    /// Record an OCC conflict.
    pub fn record_conflict() {
        counter!("log_concurrency_conflicts_total").increment(1);
    }
}

/// Subscription runner metrics recorder.
pub struct SubscriptionMetrics;

impl SubscriptionMetrics {
    /// Record a delivered event.
    pub fn record_delivery() {
        counter!("subscription_events_delivered_total").increment(1);
    }

    /// Record a handler error (the event is still acknowledged).
    pub fn record_handler_error() {
        counter!("subscription_handler_errors_total").increment(1);
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)] // Panics: test will fail if the addr doesn't parse
mod tests {
    use super::*;

    #[test]
    fn metrics_server_starts_without_panicking() {
        let addr = "127.0.0.1:0".parse().expect("valid addr");
        let mut server = MetricsServer::new(addr);
        let _ = server.start();
        DispatchMetrics::record(Duration::from_millis(5));
        LogMetrics::record_append(2, Duration::from_millis(1));
        SubscriptionMetrics::record_delivery();
    }
}
