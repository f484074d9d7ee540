use std::sync::Arc;
use std::time::Duration;

use observability::CassandraMetrics;
use scylla::client::session::Session;
use serde::Serialize;
use tokio::time::Instant;
use tracing::warn;

use crate::common::CassandraResult;
use crate::config::CassandraConfig;
use crate::session::ClusterSession;

/// Health check status for Cassandra
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub healthy: bool,
    /// Error details when unhealthy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub response_time_ms: u64,
    /// Nodes in the driver's view of the cluster
    pub known_nodes: usize,
}

/// Runs the configured validation query against a session.
pub struct CassandraHealthCheck<S = Session> {
    session: Arc<S>,
    cluster_name: String,
    validation_query: String,
    timeout: Duration,
}

impl<S> Clone for CassandraHealthCheck<S> {
    fn clone(&self) -> Self {
        Self {
            session: Arc::clone(&self.session),
            cluster_name: self.cluster_name.clone(),
            validation_query: self.validation_query.clone(),
            timeout: self.timeout,
        }
    }
}

impl<S: ClusterSession> CassandraHealthCheck<S> {
    pub fn new(session: Arc<S>, config: &CassandraConfig) -> Self {
        Self {
            session,
            cluster_name: config.cluster_name().to_string(),
            validation_query: config.validation_query.clone(),
            timeout: config.health_check_timeout(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn cluster_name(&self) -> &str {
        &self.cluster_name
    }

    /// Run the validation query, giving up after the timeout.
    ///
    /// # Example
    /// ```ignore
    /// let status = health_check.check().await;
    /// if !status.healthy {
    ///     println!("Cassandra unhealthy: {:?}", status.message);
    /// }
    /// ```
    pub async fn check(&self) -> HealthStatus {
        let start = Instant::now();
        let query = self.session.run_validation_query(&self.validation_query);
        let outcome = tokio::time::timeout(self.timeout, query).await;
        let elapsed = start.elapsed();

        let message = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(_) => Some(format!(
                "validation query timed out after {}ms",
                self.timeout.as_millis()
            )),
        };
        let healthy = message.is_none();

        if let Some(reason) = &message {
            warn!(cluster = %self.cluster_name, %reason, "Cassandra health check failed");
        }
        CassandraMetrics::record_health_check(&self.cluster_name, healthy, elapsed.as_secs_f64());

        HealthStatus {
            healthy,
            message,
            response_time_ms: elapsed.as_millis() as u64,
            known_nodes: self.session.known_nodes(),
        }
    }
}

/// Information about the node the driver queried
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterInfo {
    pub cluster_name: Option<String>,
    pub datacenter: Option<String>,
    pub rack: Option<String>,
    pub release_version: Option<String>,
}

/// Read cluster information from `system.local`
///
/// # Example
/// ```ignore
/// let info = get_cluster_info(&session).await?;
/// println!("Cluster: {:?}, Datacenter: {:?}", info.cluster_name, info.datacenter);
/// ```
pub async fn get_cluster_info(session: &Session) -> CassandraResult<ClusterInfo> {
    let result = session
        .query_unpaged(
            "SELECT cluster_name, data_center, rack, release_version FROM system.local",
            &[],
        )
        .await?;

    let mut info = ClusterInfo::default();

    if let Ok(rows_result) = result.into_rows_result()
        && let Ok(mut rows) = rows_result.rows::<(
            Option<String>,
            Option<String>,
            Option<String>,
            Option<String>,
        )>()
        && let Some(Ok((cluster_name, datacenter, rack, release_version))) = rows.next()
    {
        info.cluster_name = cluster_name;
        info.datacenter = datacenter;
        info.rack = rack;
        info.release_version = release_version;
    }

    Ok(info)
}
