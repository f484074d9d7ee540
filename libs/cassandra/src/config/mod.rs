//! Cassandra connection configuration.
//!
//! `CassandraConfig` is usually deserialized from a JSON document:
//!
//! ```json
//! {
//!   "clusterName": "orders",
//!   "contactPoints": ["10.0.0.1", "10.0.0.2:19042"],
//!   "keyspace": "orders",
//!   "loadBalancingPolicy": "TokenAwarePolicy(DCAwareRoundRobinPolicy('dc1'))",
//!   "queryOptions": { "consistency": "LOCAL_QUORUM" }
//! }
//! ```
//!
//! or loaded from `CASSANDRA_*` environment variables (with the `config` feature).

#[cfg(feature = "config")]
mod env;
mod options;
mod ssl;

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

pub use options::{
    AddressTranslatorFactory, AuthProvider, CompressionSetting, ConsistencyLevel,
    PoolingOptions, QueryOptions, SerialConsistencyLevel, SocketOptions,
};
pub use ssl::SslOptions;

use crate::common::{CassandraError, RetryConfig};
use crate::policies::{
    LoadBalancing, LoadBalancingSetting, ReconnectionPolicy, RetryPolicyFactory,
    SpeculativeExecutionPolicyFactory,
};

pub const DEFAULT_PORT: u16 = 9042;
pub const DEFAULT_VALIDATION_QUERY: &str = "SELECT key FROM system.local";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CassandraConfig {
    /// Label for logs and metrics; the driver does not check it against the cluster
    #[serde(default)]
    pub cluster_name: Option<String>,

    /// Keyspace to use (similar to a database in SQL)
    #[serde(default)]
    #[validate(length(min = 1))]
    pub keyspace: Option<String>,

    /// Query run by the health check
    #[serde(default = "default_validation_query")]
    #[validate(length(min = 1))]
    pub validation_query: String,

    /// Hosts, optionally with a port
    #[validate(length(min = 1), custom(function = "validate_contact_points"))]
    pub contact_points: Vec<String>,

    /// Port appended to contact points that carry none
    #[serde(default = "default_port")]
    #[validate(range(min = 1))]
    pub port: u16,

    #[serde(default)]
    pub compression: CompressionSetting,

    /// Defaults to the driver's token-aware round robin when absent
    #[serde(default)]
    pub load_balancing_policy: Option<LoadBalancingSetting>,

    #[serde(default)]
    pub retry_policy: RetryPolicyFactory,

    /// Spacing of startup connection attempts
    #[serde(default)]
    #[validate(custom(function = "validate_reconnection_policy"))]
    pub reconnection_policy: ReconnectionPolicy,

    #[serde(default)]
    pub speculative_execution_policy: SpeculativeExecutionPolicyFactory,

    #[serde(default)]
    pub auth_provider: Option<AuthProvider>,

    /// Encrypt connections; plaintext when absent
    #[serde(default)]
    #[validate(nested)]
    pub ssl: Option<SslOptions>,

    #[serde(default)]
    #[validate(custom(function = "validate_address_translator"))]
    pub address_translator: AddressTranslatorFactory,

    #[serde(default)]
    #[validate(nested)]
    pub pooling_options: PoolingOptions,

    #[serde(default)]
    #[validate(nested)]
    pub query_options: QueryOptions,

    #[serde(default)]
    #[validate(nested)]
    pub socket_options: SocketOptions,

    #[serde(default)]
    #[validate(range(min = 1))]
    pub max_schema_agreement_wait_ms: Option<u64>,

    /// Publish driver metrics to the Prometheus recorder
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,

    #[serde(default = "default_metrics_interval_secs")]
    #[validate(range(min = 1))]
    pub metrics_interval_secs: u64,

    /// How long shutdown waits for in-flight users of the session
    #[serde(default = "default_shutdown_grace_period_secs")]
    pub shutdown_grace_period_secs: u64,

    #[serde(default = "default_health_check_timeout_secs")]
    #[validate(range(min = 1))]
    pub health_check_timeout_secs: u64,

    /// Startup connection attempts before giving up
    #[serde(default = "default_connect_attempts")]
    #[validate(range(min = 1))]
    pub connect_attempts: u32,
}

fn default_validation_query() -> String {
    DEFAULT_VALIDATION_QUERY.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_true() -> bool {
    true
}

fn default_metrics_interval_secs() -> u64 {
    60
}

fn default_shutdown_grace_period_secs() -> u64 {
    30
}

fn default_health_check_timeout_secs() -> u64 {
    2
}

fn default_connect_attempts() -> u32 {
    3
}

fn validate_contact_points(points: &[String]) -> Result<(), ValidationError> {
    if points.iter().any(|point| point.trim().is_empty()) {
        return Err(ValidationError::new("empty_contact_point"));
    }
    Ok(())
}

fn validate_address_translator(factory: &AddressTranslatorFactory) -> Result<(), ValidationError> {
    factory.address_map().map(|_| ())
}

fn validate_reconnection_policy(policy: &ReconnectionPolicy) -> Result<(), ValidationError> {
    policy.validate()
}

impl CassandraConfig {
    /// Create a config with contact points and defaults for everything else
    ///
    /// # Example
    /// ```ignore
    /// let config = CassandraConfig::new(vec!["127.0.0.1"]);
    /// ```
    pub fn new<S: Into<String>>(contact_points: Vec<S>) -> Self {
        Self {
            cluster_name: None,
            keyspace: None,
            validation_query: default_validation_query(),
            contact_points: contact_points.into_iter().map(Into::into).collect(),
            port: DEFAULT_PORT,
            compression: CompressionSetting::default(),
            load_balancing_policy: None,
            retry_policy: RetryPolicyFactory::default(),
            reconnection_policy: ReconnectionPolicy::default(),
            speculative_execution_policy: SpeculativeExecutionPolicyFactory::default(),
            auth_provider: None,
            ssl: None,
            address_translator: AddressTranslatorFactory::default(),
            pooling_options: PoolingOptions::default(),
            query_options: QueryOptions::default(),
            socket_options: SocketOptions::default(),
            max_schema_agreement_wait_ms: None,
            metrics_enabled: true,
            metrics_interval_secs: default_metrics_interval_secs(),
            shutdown_grace_period_secs: default_shutdown_grace_period_secs(),
            health_check_timeout_secs: default_health_check_timeout_secs(),
            connect_attempts: default_connect_attempts(),
        }
    }

    pub fn with_keyspace(mut self, keyspace: impl Into<String>) -> Self {
        self.keyspace = Some(keyspace.into());
        self
    }

    pub fn with_cluster_name(mut self, name: impl Into<String>) -> Self {
        self.cluster_name = Some(name.into());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the load balancing policy from an expression
    pub fn with_load_balancing(mut self, expression: impl Into<String>) -> Self {
        self.load_balancing_policy = Some(LoadBalancingSetting::Expression(expression.into()));
        self
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.auth_provider = Some(AuthProvider::PlainText {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    pub fn with_ssl(mut self, ssl: SslOptions) -> Self {
        self.ssl = Some(ssl);
        self
    }

    pub fn with_address_translator(mut self, translator: AddressTranslatorFactory) -> Self {
        self.address_translator = translator;
        self
    }

    pub fn with_compression(mut self, compression: CompressionSetting) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_consistency(mut self, consistency: ConsistencyLevel) -> Self {
        self.query_options.consistency = Some(consistency);
        self
    }

    pub fn with_connect_timeout(mut self, timeout_ms: u64) -> Self {
        self.socket_options.connect_timeout_ms = timeout_ms;
        self
    }

    pub fn with_connect_attempts(mut self, attempts: u32) -> Self {
        self.connect_attempts = attempts;
        self
    }

    pub fn without_metrics(mut self) -> Self {
        self.metrics_enabled = false;
        self
    }

    /// Get the keyspace
    pub fn keyspace(&self) -> Option<&str> {
        self.keyspace.as_deref()
    }

    /// Cluster label for logs and metrics, `"cassandra"` when unnamed
    pub fn cluster_name(&self) -> &str {
        self.cluster_name.as_deref().unwrap_or("cassandra")
    }

    /// Contact points as `host:port`, using `port` where none is given.
    pub fn known_nodes(&self) -> Vec<String> {
        self.contact_points
            .iter()
            .map(|point| with_port(point.trim(), self.port))
            .collect()
    }

    /// The configured load balancing policy; `None` keeps the driver default.
    pub fn load_balancing(&self) -> Result<Option<LoadBalancing>, CassandraError> {
        self.load_balancing_policy
            .as_ref()
            .map(LoadBalancingSetting::resolve)
            .transpose()
            .map_err(CassandraError::from)
    }

    /// Check field constraints and that every policy setting builds.
    pub fn validated(self) -> Result<Self, CassandraError> {
        self.validate()?;
        self.load_balancing()?;
        Ok(self)
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::new()
            .with_max_attempts(self.connect_attempts)
            .with_policy(self.reconnection_policy)
    }

    pub fn health_check_timeout(&self) -> Duration {
        Duration::from_secs(self.health_check_timeout_secs)
    }

    pub fn shutdown_grace_period(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_period_secs)
    }

    pub fn metrics_interval(&self) -> Duration {
        Duration::from_secs(self.metrics_interval_secs)
    }

    pub fn from_json_str(json: &str) -> Result<Self, CassandraError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| CassandraError::Config(format!("invalid JSON: {e}")))?;
        config.validated()
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, CassandraError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| CassandraError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&json)
    }
}

impl Default for CassandraConfig {
    fn default() -> Self {
        Self::new(vec!["127.0.0.1"])
    }
}

/// Append `port` unless `point` already carries one. Bare IPv6 addresses are
/// bracketed.
fn with_port(point: &str, port: u16) -> String {
    if point.starts_with('[') {
        return if point.contains("]:") {
            point.to_string()
        } else {
            format!("{point}:{port}")
        };
    }
    match point.matches(':').count() {
        0 => format!("{point}:{port}"),
        1 => point.to_string(),
        _ => format!("[{point}]:{port}"),
    }
}
