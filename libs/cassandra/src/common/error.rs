use scylla::errors::{ExecutionError, NewSessionError};

use crate::policies::PolicyError;

/// Error type for Cassandra operations
#[derive(Debug, thiserror::Error)]
pub enum CassandraError {
    #[error("Session error: {0}")]
    Session(#[from] NewSessionError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    /// A policy expression or policy setting could not be built
    #[error("Policy error: {0}")]
    Policy(#[from] PolicyError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration: {0}")]
    Validation(#[from] validator::ValidationErrors),

    /// Certificates or keys could not be loaded into a TLS configuration
    #[error("TLS error: {0}")]
    Tls(String),

    /// Connection failed after retries
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Health check failed: {0}")]
    HealthCheckFailed(String),

    #[error("Keyspace error: {0}")]
    KeyspaceError(String),
}

#[cfg(feature = "config")]
impl From<core_config::ConfigError> for CassandraError {
    fn from(err: core_config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

/// Result type alias for Cassandra operations
pub type CassandraResult<T> = Result<T, CassandraError>;
