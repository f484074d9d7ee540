//! Session lifecycle: graceful stop and process signals.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use scylla::client::session::Session;
use serde::Serialize;
use tokio::signal;
use tokio::time::Instant;
use tracing::{info, warn};

const RELEASE_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How `CassandraManager::stop` ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ShutdownOutcome {
    /// Every other holder released the session within the grace period
    Graceful,
    /// The grace period ran out; the manager dropped its handle anyway
    Forced,
    AlreadyStopped,
}

/// Owns the shared session and releases it on shutdown.
///
/// Handles returned by [`session`](Self::session) keep the session alive, so
/// `stop` waits for them to be dropped before letting go of its own.
pub struct CassandraManager<S = Session> {
    session: Mutex<Option<Arc<S>>>,
    cluster: String,
    grace_period: Duration,
}

impl<S> CassandraManager<S> {
    pub fn new(session: Arc<S>, cluster: impl Into<String>, grace_period: Duration) -> Self {
        Self {
            session: Mutex::new(Some(session)),
            cluster: cluster.into(),
            grace_period,
        }
    }

    /// A handle to the session, `None` once stopped.
    pub fn session(&self) -> Option<Arc<S>> {
        self.session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_stopped(&self) -> bool {
        self.session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    pub async fn stop(&self) -> ShutdownOutcome {
        let Some(session) = self
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            return ShutdownOutcome::AlreadyStopped;
        };

        info!(
            cluster = %self.cluster,
            grace_period_secs = self.grace_period.as_secs_f64(),
            "Stopping Cassandra session"
        );

        let deadline = Instant::now() + self.grace_period;
        loop {
            let holders = Arc::strong_count(&session) - 1;
            if holders == 0 {
                info!(cluster = %self.cluster, "Cassandra session closed");
                return ShutdownOutcome::Graceful;
            }

            let now = Instant::now();
            if now >= deadline {
                warn!(
                    cluster = %self.cluster,
                    holders,
                    "Grace period elapsed with the session still in use, releasing it anyway"
                );
                return ShutdownOutcome::Forced;
            }

            tokio::time::sleep(RELEASE_POLL_INTERVAL.min(deadline - now)).await;
        }
    }
}

/// Wait for SIGINT or SIGTERM.
pub async fn shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())?;
        tokio::select! {
            result = signal::ctrl_c() => {
                result?;
                info!("Received SIGINT (Ctrl+C), shutting down");
            }
            _ = terminate.recv() => {
                info!("Received SIGTERM, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await?;
        info!("Received Ctrl+C, shutting down");
    }

    Ok(())
}
