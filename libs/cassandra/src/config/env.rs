use core_config::{ConfigError, FromEnv, env_list, env_optional, env_parse};

use super::{AuthProvider, CassandraConfig, CompressionSetting, SslOptions};
use crate::policies::LoadBalancingSetting;

/// Load CassandraConfig from environment variables
///
/// Environment variables:
/// - `CASSANDRA_CONTACT_POINTS` (required) - Comma-separated hosts, ports optional
/// - `CASSANDRA_PORT` (default: 9042)
/// - `CASSANDRA_CLUSTER_NAME`, `CASSANDRA_KEYSPACE`
/// - `CASSANDRA_VALIDATION_QUERY` (default: `SELECT key FROM system.local`)
/// - `CASSANDRA_LOAD_BALANCING_POLICY` - Policy expression
/// - `CASSANDRA_COMPRESSION` - `none`, `lz4` or `snappy`
/// - `CASSANDRA_USERNAME` / `CASSANDRA_PASSWORD` - Both or neither
/// - `CASSANDRA_SSL_TRUST_CERT_FILE` - Enables TLS with this CA bundle
/// - `CASSANDRA_SSL_CERT_FILE` / `CASSANDRA_SSL_KEY_FILE` - Client identity
/// - `CASSANDRA_SSL_HOSTNAME_VERIFICATION` (default: true)
/// - `CASSANDRA_CONSISTENCY`, `CASSANDRA_SERIAL_CONSISTENCY`
/// - `CASSANDRA_REQUEST_TIMEOUT_MS`, `CASSANDRA_CONNECT_TIMEOUT_MS`
/// - `CASSANDRA_CONNECTIONS_PER_HOST`
/// - `CASSANDRA_METRICS_ENABLED` (default: true)
/// - `CASSANDRA_CONNECT_ATTEMPTS` (default: 3)
/// - `CASSANDRA_HEALTH_CHECK_TIMEOUT_SECS` (default: 2)
/// - `CASSANDRA_SHUTDOWN_GRACE_PERIOD_SECS` (default: 30)
///
/// Policy expressions are checked by `CassandraConfig::validated`, not here.
impl FromEnv for CassandraConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let mut config = CassandraConfig::new(env_list("CASSANDRA_CONTACT_POINTS")?);

        config.port = env_parse("CASSANDRA_PORT", config.port)?;
        config.cluster_name = env_optional("CASSANDRA_CLUSTER_NAME")?;
        config.keyspace = env_optional("CASSANDRA_KEYSPACE")?;
        config.validation_query =
            env_parse("CASSANDRA_VALIDATION_QUERY", config.validation_query)?;
        config.load_balancing_policy = env_optional::<String>("CASSANDRA_LOAD_BALANCING_POLICY")?
            .map(LoadBalancingSetting::Expression);
        config.compression =
            env_parse("CASSANDRA_COMPRESSION", CompressionSetting::default())?;

        config.auth_provider = match (
            env_optional::<String>("CASSANDRA_USERNAME")?,
            env_optional::<String>("CASSANDRA_PASSWORD")?,
        ) {
            (Some(username), Some(password)) => {
                Some(AuthProvider::PlainText { username, password })
            }
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::MissingEnvVar("CASSANDRA_PASSWORD".into())),
            (None, Some(_)) => return Err(ConfigError::MissingEnvVar("CASSANDRA_USERNAME".into())),
        };

        if let Some(trust) = env_optional::<String>("CASSANDRA_SSL_TRUST_CERT_FILE")? {
            let mut ssl = SslOptions::new(trust);
            ssl.cert_chain_file =
                env_optional::<String>("CASSANDRA_SSL_CERT_FILE")?.map(Into::into);
            ssl.private_key_file =
                env_optional::<String>("CASSANDRA_SSL_KEY_FILE")?.map(Into::into);
            ssl.hostname_verification =
                env_parse("CASSANDRA_SSL_HOSTNAME_VERIFICATION", ssl.hostname_verification)?;
            config.ssl = Some(ssl);
        }

        config.query_options.consistency = env_optional("CASSANDRA_CONSISTENCY")?;
        config.query_options.serial_consistency = env_optional("CASSANDRA_SERIAL_CONSISTENCY")?;
        config.query_options.request_timeout_ms = env_optional("CASSANDRA_REQUEST_TIMEOUT_MS")?;
        config.socket_options.connect_timeout_ms = env_parse(
            "CASSANDRA_CONNECT_TIMEOUT_MS",
            config.socket_options.connect_timeout_ms,
        )?;
        config.pooling_options.connections_per_host =
            env_optional("CASSANDRA_CONNECTIONS_PER_HOST")?;

        config.metrics_enabled = env_parse("CASSANDRA_METRICS_ENABLED", config.metrics_enabled)?;
        config.connect_attempts = env_parse("CASSANDRA_CONNECT_ATTEMPTS", config.connect_attempts)?;
        config.health_check_timeout_secs = env_parse(
            "CASSANDRA_HEALTH_CHECK_TIMEOUT_SECS",
            config.health_check_timeout_secs,
        )?;
        config.shutdown_grace_period_secs = env_parse(
            "CASSANDRA_SHUTDOWN_GRACE_PERIOD_SECS",
            config.shutdown_grace_period_secs,
        )?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConsistencyLevel;

    #[test]
    fn test_from_env() {
        temp_env::with_vars(
            [
                ("CASSANDRA_CONTACT_POINTS", Some("10.0.0.1, 10.0.0.2:9043")),
                ("CASSANDRA_KEYSPACE", Some("testkeyspace")),
                (
                    "CASSANDRA_LOAD_BALANCING_POLICY",
                    Some("TokenAwarePolicy(RoundRobinPolicy())"),
                ),
                ("CASSANDRA_CONSISTENCY", Some("local_quorum")),
                ("CASSANDRA_COMPRESSION", Some("lz4")),
                ("CASSANDRA_CONNECT_ATTEMPTS", Some("5")),
            ],
            || {
                let config = CassandraConfig::from_env().unwrap();
                assert_eq!(config.known_nodes(), vec!["10.0.0.1:9042", "10.0.0.2:9043"]);
                assert_eq!(config.keyspace(), Some("testkeyspace"));
                assert_eq!(
                    config.query_options.consistency,
                    Some(ConsistencyLevel::LocalQuorum)
                );
                assert_eq!(config.compression, CompressionSetting::Lz4);
                assert_eq!(config.connect_attempts, 5);
                assert!(config.load_balancing().unwrap().is_some());
            },
        );
    }

    #[test]
    fn test_from_env_ssl() {
        temp_env::with_vars(
            [
                ("CASSANDRA_CONTACT_POINTS", Some("127.0.0.1")),
                ("CASSANDRA_SSL_TRUST_CERT_FILE", Some("/etc/cassandra/ca.pem")),
                ("CASSANDRA_SSL_HOSTNAME_VERIFICATION", Some("false")),
                ("CASSANDRA_SSL_CERT_FILE", None),
                ("CASSANDRA_SSL_KEY_FILE", None),
            ],
            || {
                let config = CassandraConfig::from_env().unwrap();
                assert_eq!(
                    config.ssl,
                    Some(SslOptions::new("/etc/cassandra/ca.pem").without_hostname_verification())
                );
            },
        );

        temp_env::with_vars(
            [
                ("CASSANDRA_CONTACT_POINTS", Some("127.0.0.1")),
                ("CASSANDRA_SSL_TRUST_CERT_FILE", None::<&str>),
            ],
            || assert!(CassandraConfig::from_env().unwrap().ssl.is_none()),
        );
    }

    #[test]
    fn test_from_env_missing_contact_points() {
        temp_env::with_vars([("CASSANDRA_CONTACT_POINTS", None::<&str>)], || {
            assert!(matches!(
                CassandraConfig::from_env(),
                Err(ConfigError::MissingEnvVar(_))
            ));
        });
    }

    #[test]
    fn test_from_env_username_without_password() {
        temp_env::with_vars(
            [
                ("CASSANDRA_CONTACT_POINTS", Some("127.0.0.1")),
                ("CASSANDRA_USERNAME", Some("cassandra")),
                ("CASSANDRA_PASSWORD", None),
            ],
            || {
                assert!(matches!(
                    CassandraConfig::from_env(),
                    Err(ConfigError::MissingEnvVar(key)) if key == "CASSANDRA_PASSWORD"
                ));
            },
        );
    }

    #[test]
    fn test_from_env_bad_consistency() {
        temp_env::with_vars(
            [
                ("CASSANDRA_CONTACT_POINTS", Some("127.0.0.1")),
                ("CASSANDRA_CONSISTENCY", Some("MOST")),
            ],
            || {
                assert!(matches!(
                    CassandraConfig::from_env(),
                    Err(ConfigError::ParseError { .. })
                ));
            },
        );
    }
}
