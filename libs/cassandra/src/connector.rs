use std::sync::Arc;

use observability::CassandraMetrics;
use scylla::client::execution_profile::ExecutionProfile;
use scylla::client::session::Session;
use scylla::client::session_builder::SessionBuilder;
use tracing::{debug, info};

use crate::common::{CassandraError, CassandraResult, RetryConfig, retry_with_backoff};
use crate::config::{AuthProvider, CassandraConfig};

/// Cassandra session wrapper for connection pooling
pub type CassandraSession = Arc<Session>;

/// Driver execution profile from the config's policies and query options.
///
/// Must run inside a tokio runtime when the load balancing policy is latency aware.
pub fn execution_profile(config: &CassandraConfig) -> CassandraResult<ExecutionProfile> {
    let mut profile = ExecutionProfile::builder()
        .retry_policy(config.retry_policy.build())
        .speculative_execution_policy(config.speculative_execution_policy.build())
        .serial_consistency(config.query_options.serial_consistency.map(Into::into))
        .request_timeout(config.query_options.request_timeout());

    if let Some(policy) = config.load_balancing()? {
        debug!(policy = %policy, "Using configured load balancing policy");
        profile = profile.load_balancing_policy(policy.build());
    }
    if let Some(consistency) = config.query_options.consistency {
        profile = profile.consistency(consistency.into());
    }

    Ok(profile.build())
}

/// Map a config onto a `SessionBuilder` without touching the network. The only
/// I/O is reading the PEM files named by `ssl`.
///
/// # Example
/// ```ignore
/// use cassandra_bundle::{connector::session_builder, CassandraConfig};
///
/// let config = CassandraConfig::new(vec!["127.0.0.1"]).with_keyspace("orders");
/// let session = session_builder(&config)?.build().await?;
/// ```
pub fn session_builder(config: &CassandraConfig) -> CassandraResult<SessionBuilder> {
    let socket = &config.socket_options;

    let mut builder = SessionBuilder::new()
        .known_nodes(config.known_nodes())
        .compression(config.compression.to_driver())
        .connection_timeout(socket.connect_timeout())
        .tcp_nodelay(socket.tcp_nodelay)
        .default_execution_profile_handle(execution_profile(config)?.into_handle());

    if let Some(AuthProvider::PlainText { username, password }) = &config.auth_provider {
        builder = builder.user(username, password);
    }
    if let Some(keyspace) = &config.keyspace {
        builder = builder.use_keyspace(keyspace, true);
    }
    if let Some(pool_size) = config.pooling_options.pool_size() {
        builder = builder.pool_size(pool_size);
    }
    if let Some(interval) = socket.keepalive_interval() {
        builder = builder.keepalive_interval(interval);
    }
    if let Some(wait_ms) = config.max_schema_agreement_wait_ms {
        builder = builder.schema_agreement_timeout(std::time::Duration::from_millis(wait_ms));
    }
    if let Some(ssl) = &config.ssl {
        builder = builder.tls_context(Some(ssl.client_config()?));
    }
    let translator = config
        .address_translator
        .build()
        .map_err(|e| CassandraError::Config(format!("addressTranslator: {e}")))?;
    if let Some(translator) = translator {
        builder = builder.address_translator(translator);
    }

    Ok(builder)
}

/// Build a session and check it answers the validation query.
async fn establish(builder: &SessionBuilder, config: &CassandraConfig) -> CassandraResult<Session> {
    let result = build_and_verify(builder, config).await;
    CassandraMetrics::record_connect_attempt(config.cluster_name(), result.is_ok());
    result
}

async fn build_and_verify(
    builder: &SessionBuilder,
    config: &CassandraConfig,
) -> CassandraResult<Session> {
    let session = builder.build().await?;

    session
        .query_unpaged(config.validation_query.as_str(), &[])
        .await
        .map_err(|e| CassandraError::ConnectionFailed(e.to_string()))?;

    Ok(session)
}

/// Connect using a CassandraConfig
///
/// With FromEnv (requires `config` feature):
/// ```ignore
/// use cassandra_bundle::connector::connect_from_config;
/// use core_config::FromEnv;
///
/// let config = CassandraConfig::from_env()?.validated()?;
/// let session = connect_from_config(&config).await?;
/// ```
pub async fn connect_from_config(config: &CassandraConfig) -> CassandraResult<CassandraSession> {
    info!(
        cluster = config.cluster_name(),
        nodes = ?config.known_nodes(),
        "Connecting to Cassandra"
    );

    let session = establish(&session_builder(config)?, config).await?;

    info!(cluster = config.cluster_name(), "Connected to Cassandra");
    Ok(Arc::new(session))
}

/// Connect from config, retrying failed attempts.
///
/// Without an explicit `RetryConfig` the attempts and their spacing come from
/// `connectAttempts` and `reconnectionPolicy`. Policy errors are not retried.
pub async fn connect_from_config_with_retry(
    config: &CassandraConfig,
    retry_config: Option<RetryConfig>,
) -> CassandraResult<CassandraSession> {
    let builder = session_builder(config)?;
    let retry_config = retry_config.unwrap_or_else(|| config.retry_config());

    info!(
        cluster = config.cluster_name(),
        nodes = ?config.known_nodes(),
        max_attempts = retry_config.max_attempts,
        "Connecting to Cassandra"
    );

    let session = retry_with_backoff(|| establish(&builder, config), retry_config).await?;

    info!(cluster = config.cluster_name(), "Connected to Cassandra");
    Ok(Arc::new(session))
}

fn check_keyspace_name(keyspace: &str) -> CassandraResult<()> {
    let valid = !keyspace.is_empty()
        && keyspace.len() <= 48
        && keyspace.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(CassandraError::KeyspaceError(format!(
            "invalid keyspace name '{keyspace}'"
        )))
    }
}

/// Create a keyspace with `SimpleStrategy` replication if it doesn't exist
pub async fn create_keyspace_if_not_exists(
    session: &Session,
    keyspace: &str,
    replication_factor: u32,
) -> CassandraResult<()> {
    check_keyspace_name(keyspace)?;

    let query = format!(
        "CREATE KEYSPACE IF NOT EXISTS {keyspace} WITH replication = {{'class': 'SimpleStrategy', 'replication_factor': {replication_factor}}}"
    );

    session
        .query_unpaged(query, &[])
        .await
        .map_err(|e| CassandraError::KeyspaceError(e.to_string()))?;

    info!(keyspace, "Keyspace ready");
    Ok(())
}

/// Switch the session's keyspace
pub async fn use_keyspace(session: &Session, keyspace: &str) -> CassandraResult<()> {
    check_keyspace_name(keyspace)?;

    session
        .use_keyspace(keyspace, true)
        .await
        .map_err(|e| CassandraError::KeyspaceError(e.to_string()))?;

    info!(keyspace, "Using keyspace");
    Ok(())
}
