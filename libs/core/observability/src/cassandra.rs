//! Cassandra session metrics.

use metrics::{counter, gauge, histogram};

/// Point-in-time copy of the driver's counters for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub queries: u64,
    pub iter_queries: u64,
    pub errors: u64,
    pub iter_errors: u64,
    pub retries: u64,
    /// `None` until the driver has recorded at least one latency sample
    pub latency_avg_ms: Option<u64>,
    pub known_nodes: usize,
}

impl MetricsSnapshot {
    /// Fraction of failed requests, paged and non-paged combined.
    pub fn error_ratio(&self) -> f64 {
        let total = self.queries + self.iter_queries;
        if total == 0 {
            return 0.0;
        }
        (self.errors + self.iter_errors) as f64 / total as f64
    }
}

/// Cassandra metrics recorder
pub struct CassandraMetrics;

impl CassandraMetrics {
    /// Publish a driver snapshot as gauges labelled by cluster.
    pub fn record_snapshot(cluster: &str, snapshot: &MetricsSnapshot) {
        let cluster = cluster.to_string();

        gauge!("cassandra_queries_total", "cluster" => cluster.clone())
            .set(snapshot.queries as f64);
        gauge!("cassandra_query_iterators_total", "cluster" => cluster.clone())
            .set(snapshot.iter_queries as f64);
        gauge!("cassandra_errors_total", "cluster" => cluster.clone()).set(snapshot.errors as f64);
        gauge!("cassandra_iterator_errors_total", "cluster" => cluster.clone())
            .set(snapshot.iter_errors as f64);
        gauge!("cassandra_retries_total", "cluster" => cluster.clone())
            .set(snapshot.retries as f64);
        gauge!("cassandra_known_nodes", "cluster" => cluster.clone())
            .set(snapshot.known_nodes as f64);

        if let Some(latency) = snapshot.latency_avg_ms {
            gauge!("cassandra_latency_avg_ms", "cluster" => cluster.clone()).set(latency as f64);
        }

        tracing::trace!(
            cluster = %cluster,
            queries = snapshot.queries,
            errors = snapshot.errors,
            known_nodes = snapshot.known_nodes,
            "Recorded Cassandra metrics snapshot"
        );
    }

    /// Record the outcome and duration of a health check.
    pub fn record_health_check(cluster: &str, healthy: bool, duration_secs: f64) {
        let status = if healthy { "healthy" } else { "unhealthy" };

        counter!(
            "cassandra_health_checks_total",
            "cluster" => cluster.to_string(),
            "status" => status
        )
        .increment(1);

        histogram!(
            "cassandra_health_check_duration_seconds",
            "cluster" => cluster.to_string()
        )
        .record(duration_secs);
    }

    /// Record a session connect attempt.
    pub fn record_connect_attempt(cluster: &str, success: bool) {
        let outcome = if success { "success" } else { "failure" };

        counter!(
            "cassandra_connect_attempts_total",
            "cluster" => cluster.to_string(),
            "outcome" => outcome
        )
        .increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_ratio_empty_snapshot() {
        assert_eq!(MetricsSnapshot::default().error_ratio(), 0.0);
    }

    #[test]
    fn test_error_ratio_combines_paged_and_unpaged() {
        let snapshot = MetricsSnapshot {
            queries: 6,
            iter_queries: 2,
            errors: 1,
            iter_errors: 1,
            ..Default::default()
        };
        assert!((snapshot.error_ratio() - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_recording_does_not_panic() {
        CassandraMetrics::record_snapshot(
            "test",
            &MetricsSnapshot {
                latency_avg_ms: Some(3),
                ..Default::default()
            },
        );
        CassandraMetrics::record_health_check("test", false, 0.01);
        CassandraMetrics::record_connect_attempt("test", true);
    }
}
