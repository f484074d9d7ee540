//! Periodic export of the driver's session metrics.

use std::sync::Arc;
use std::time::Duration;

use observability::CassandraMetrics;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::session::ClusterSession;

/// Record a snapshot every `interval` until `shutdown` flips to `true` or its
/// sender is dropped.
pub fn spawn_reporter<S>(
    session: Arc<S>,
    cluster: String,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()>
where
    S: ClusterSession + 'static,
{
    tokio::spawn(async move {
        info!(
            cluster = %cluster,
            interval_secs = interval.as_secs(),
            "Starting Cassandra metrics reporter"
        );

        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    CassandraMetrics::record_snapshot(&cluster, &session.metrics_snapshot());
                }
            }
        }

        debug!(cluster = %cluster, "Cassandra metrics reporter stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::stub::StubSession;

    const INTERVAL: Duration = Duration::from_secs(10);

    #[tokio::test(start_paused = true)]
    async fn test_samples_until_shutdown() {
        let session = Arc::new(StubSession::new(3));
        let (tx, rx) = watch::channel(false);
        let handle = spawn_reporter(session.clone(), "orders".into(), INTERVAL, rx);

        tokio::time::sleep(Duration::from_secs(25)).await;
        assert!(session.snapshots() >= 2);

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("reporter stops after shutdown")
            .unwrap();

        let sampled = session.snapshots();
        tokio::time::sleep(INTERVAL * 3).await;
        assert_eq!(session.snapshots(), sampled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_when_sender_dropped() {
        let (tx, rx) = watch::channel(false);
        let handle = spawn_reporter(Arc::new(StubSession::new(1)), "orders".into(), INTERVAL, rx);

        drop(tx);
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("reporter stops when the sender is gone")
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_false_does_not_stop() {
        let session = Arc::new(StubSession::new(1));
        let (tx, rx) = watch::channel(false);
        let handle = spawn_reporter(session.clone(), "orders".into(), INTERVAL, rx);

        tx.send(false).unwrap();
        tokio::time::sleep(INTERVAL * 2).await;
        assert!(!handle.is_finished());

        tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
