//! Cassandra/ScyllaDB session bundle.
//!
//! Builds a driver session from configuration, including load balancing
//! policies written as expressions:
//!
//! ```ignore
//! use cassandra_bundle::{CassandraBundle, CassandraConfig};
//!
//! let config = CassandraConfig::new(vec!["10.0.0.1", "10.0.0.2"])
//!     .with_keyspace("orders")
//!     .with_load_balancing("TokenAwarePolicy(DCAwareRoundRobinPolicy('dc1'))");
//!
//! let bundle = CassandraBundle::build(config).await?;
//! bundle.session().query_unpaged("SELECT * FROM users", &[]).await?;
//! bundle.shutdown().await;
//! ```
//!
//! The policy parser is usable on its own:
//!
//! ```ignore
//! use cassandra_bundle::policies::PolicyParser;
//!
//! let policy = PolicyParser::default().parse_required("RoundRobinPolicy()")?;
//! ```

pub mod bundle;
pub mod common;
pub mod config;
pub mod connector;
pub mod health;
pub mod manager;
pub mod metrics;
pub mod policies;
pub mod session;

pub use bundle::CassandraBundle;
pub use common::{CassandraError, CassandraResult, RetryConfig};
pub use config::CassandraConfig;
pub use connector::{
    CassandraSession, connect_from_config, connect_from_config_with_retry,
    create_keyspace_if_not_exists, session_builder, use_keyspace,
};
pub use health::{CassandraHealthCheck, ClusterInfo, HealthStatus, get_cluster_info};
pub use manager::{CassandraManager, ShutdownOutcome, shutdown_signal};
pub use policies::{LoadBalancing, PolicyError, PolicyParser};
pub use session::ClusterSession;

// Re-export scylla types for convenience
pub use scylla::client::session::Session;
pub use scylla::client::session_builder::SessionBuilder;
