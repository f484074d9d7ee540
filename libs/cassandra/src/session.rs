//! What the health check and metrics reporter need from a session.

use async_trait::async_trait;
use observability::MetricsSnapshot;
use scylla::client::session::Session;

use crate::common::CassandraResult;

/// A connected session as seen by [`CassandraHealthCheck`](crate::CassandraHealthCheck)
/// and the metrics reporter.
#[async_trait]
pub trait ClusterSession: Send + Sync {
    /// Run `query`, discarding any rows.
    async fn run_validation_query(&self, query: &str) -> CassandraResult<()>;

    /// Nodes in the driver's current view of the cluster.
    fn known_nodes(&self) -> usize;

    /// Copy of the driver's request counters.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

#[async_trait]
impl ClusterSession for Session {
    async fn run_validation_query(&self, query: &str) -> CassandraResult<()> {
        self.query_unpaged(query, &[]).await?;
        Ok(())
    }

    fn known_nodes(&self) -> usize {
        self.get_cluster_state().get_nodes_info().len()
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        let metrics = self.get_metrics();
        MetricsSnapshot {
            queries: metrics.get_queries_num(),
            iter_queries: metrics.get_queries_iter_num(),
            errors: metrics.get_errors_num(),
            iter_errors: metrics.get_errors_iter_num(),
            retries: metrics.get_retries_num(),
            latency_avg_ms: metrics.get_latency_avg_ms().ok(),
            known_nodes: self.known_nodes(),
        }
    }
}

#[cfg(test)]
pub(crate) mod stub {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::common::CassandraError;

    /// In-memory session with a scripted validation query.
    pub(crate) struct StubSession {
        delay: Duration,
        failure: Option<&'static str>,
        nodes: usize,
        snapshots: AtomicUsize,
    }

    impl StubSession {
        pub(crate) fn new(nodes: usize) -> Self {
            Self {
                delay: Duration::ZERO,
                failure: None,
                nodes,
                snapshots: AtomicUsize::new(0),
            }
        }

        pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        pub(crate) fn failing(mut self, reason: &'static str) -> Self {
            self.failure = Some(reason);
            self
        }

        pub(crate) fn snapshots(&self) -> usize {
            self.snapshots.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ClusterSession for StubSession {
        async fn run_validation_query(&self, _query: &str) -> CassandraResult<()> {
            tokio::time::sleep(self.delay).await;
            match self.failure {
                Some(reason) => Err(CassandraError::HealthCheckFailed(reason.to_string())),
                None => Ok(()),
            }
        }

        fn known_nodes(&self) -> usize {
            self.nodes
        }

        fn metrics_snapshot(&self) -> MetricsSnapshot {
            let queries = self.snapshots.fetch_add(1, Ordering::SeqCst) as u64;
            MetricsSnapshot {
                queries,
                known_nodes: self.nodes,
                ..MetricsSnapshot::default()
            }
        }
    }
}
