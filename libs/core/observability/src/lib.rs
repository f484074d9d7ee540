//! Observability utilities for Cassandra-backed services.
//!
//! This crate provides:
//! - Prometheus metrics recorder installation and rendering
//! - Cassandra session metrics (driver snapshot gauges, health checks, connects)
//!
//! # Example
//!
//! ```rust,ignore
//! use observability::{init_metrics, render_metrics, CassandraMetrics, MetricsSnapshot};
//!
//! init_metrics()?;
//! CassandraMetrics::record_snapshot("cluster1", &MetricsSnapshot::default());
//! println!("{}", render_metrics());
//! ```

pub mod cassandra;

pub use cassandra::{CassandraMetrics, MetricsSnapshot};

// Re-export metrics macros for convenience
pub use metrics::{counter, gauge, histogram};

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use tracing::info;

static METRICS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Initialize the Prometheus metrics recorder.
///
/// Call once at application startup; later calls return the same handle.
pub fn init_metrics() -> Result<&'static PrometheusHandle, BuildError> {
    METRICS_HANDLE.get_or_try_init(|| {
        let handle = PrometheusBuilder::new().install_recorder()?;

        info!("Prometheus metrics recorder initialized");
        register_metric_descriptions();

        Ok(handle)
    })
}

/// Get the metrics handle (must call init_metrics first)
pub fn get_metrics_handle() -> Option<&'static PrometheusHandle> {
    METRICS_HANDLE.get()
}

/// Render all recorded metrics in the Prometheus text format.
pub fn render_metrics() -> String {
    match get_metrics_handle() {
        Some(handle) => handle.render(),
        None => "# Metrics not initialized\n".to_string(),
    }
}

fn register_metric_descriptions() {
    use metrics::describe_counter;
    use metrics::describe_gauge;
    use metrics::describe_histogram;

    // Driver snapshot
    describe_gauge!(
        "cassandra_queries_total",
        "Non-paged requests executed by the driver"
    );
    describe_gauge!(
        "cassandra_query_iterators_total",
        "Paged (iterator) requests executed by the driver"
    );
    describe_gauge!(
        "cassandra_errors_total",
        "Non-paged requests that failed"
    );
    describe_gauge!(
        "cassandra_iterator_errors_total",
        "Paged requests that failed"
    );
    describe_gauge!("cassandra_retries_total", "Request retries performed");
    describe_gauge!(
        "cassandra_latency_avg_ms",
        "Average request latency reported by the driver"
    );
    describe_gauge!(
        "cassandra_known_nodes",
        "Nodes present in the driver's cluster metadata"
    );

    // Bundle
    describe_counter!(
        "cassandra_health_checks_total",
        "Health check executions by status"
    );
    describe_histogram!(
        "cassandra_health_check_duration_seconds",
        "Health check duration in seconds"
    );
    describe_counter!(
        "cassandra_connect_attempts_total",
        "Session connect attempts by outcome"
    );
}
