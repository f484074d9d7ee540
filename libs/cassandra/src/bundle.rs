use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::common::CassandraResult;
use crate::config::CassandraConfig;
use crate::connector::{CassandraSession, connect_from_config_with_retry};
use crate::health::CassandraHealthCheck;
use crate::manager::{CassandraManager, ShutdownOutcome};
use crate::metrics::spawn_reporter;

/// A connected session with its health check, metrics reporter and lifecycle
/// manager, all built from one config.
///
/// # Example
/// ```ignore
/// use cassandra_bundle::{CassandraBundle, CassandraConfig};
///
/// let config = CassandraConfig::from_json_file("cassandra.json")?;
/// let bundle = CassandraBundle::build(config).await?;
///
/// bundle.session().query_unpaged("SELECT now() FROM system.local", &[]).await?;
/// let status = bundle.health_check().check().await;
///
/// bundle.shutdown().await;
/// ```
pub struct CassandraBundle {
    config: CassandraConfig,
    session: CassandraSession,
    health_check: CassandraHealthCheck,
    manager: CassandraManager,
    reporter: Option<(watch::Sender<bool>, JoinHandle<()>)>,
}

impl CassandraBundle {
    /// Validate the config, connect with retry and start the metrics reporter.
    pub async fn build(config: CassandraConfig) -> CassandraResult<Self> {
        let config = config.validated()?;
        let session = connect_from_config_with_retry(&config, None).await?;

        let health_check = CassandraHealthCheck::new(session.clone(), &config);
        let manager = CassandraManager::new(
            session.clone(),
            config.cluster_name(),
            config.shutdown_grace_period(),
        );

        let reporter = config.metrics_enabled.then(|| {
            let (tx, rx) = watch::channel(false);
            let handle = spawn_reporter(
                session.clone(),
                config.cluster_name().to_string(),
                config.metrics_interval(),
                rx,
            );
            (tx, handle)
        });

        info!(
            cluster = config.cluster_name(),
            metrics = config.metrics_enabled,
            "Cassandra bundle ready"
        );

        Ok(Self {
            config,
            session,
            health_check,
            manager,
            reporter,
        })
    }

    pub fn session(&self) -> &CassandraSession {
        &self.session
    }

    pub fn health_check(&self) -> &CassandraHealthCheck {
        &self.health_check
    }

    pub fn config(&self) -> &CassandraConfig {
        &self.config
    }

    /// Stop the reporter and release the session, waiting up to the configured
    /// grace period for outstanding session handles.
    pub async fn shutdown(self) -> ShutdownOutcome {
        let Self {
            config,
            session,
            health_check,
            manager,
            reporter,
        } = self;

        if let Some((tx, handle)) = reporter {
            let _ = tx.send(true);
            if let Err(e) = handle.await {
                warn!(error = %e, "Cassandra metrics reporter ended abnormally");
            }
        }

        drop(health_check);
        drop(session);

        let outcome = manager.stop().await;
        info!(cluster = config.cluster_name(), ?outcome, "Cassandra bundle stopped");
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_build_rejects_invalid_config() {
        let config = CassandraConfig::default().with_load_balancing("TokenAwarePolicy(");
        assert!(CassandraBundle::build(config).await.is_err());
    }

    #[tokio::test]
    #[ignore] // Requires actual Cassandra
    async fn test_build_and_shutdown() {
        let bundle = CassandraBundle::build(CassandraConfig::default())
            .await
            .unwrap();
        assert!(bundle.health_check().check().await.healthy);
        assert_eq!(bundle.shutdown().await, ShutdownOutcome::Graceful);
    }
}
