//! Integration tests for configuration loading
//!
//! Loads a complete JSON document and checks that policies and options map
//! onto the driver session builder.

use std::path::PathBuf;

use cassandra_bundle::config::{
    AuthProvider, CompressionSetting, ConsistencyLevel, SerialConsistencyLevel,
};
use cassandra_bundle::policies::{
    LoadBalancing, LoadBalancingPolicyFactory, LoadBalancingSetting, ReconnectionPolicy,
    RetryPolicyFactory, SpeculativeExecutionPolicyFactory,
};
use cassandra_bundle::{CassandraConfig, CassandraError, session_builder};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

#[test]
fn test_load_full_document() {
    let config = CassandraConfig::from_json_file(fixture("cassandra.json")).unwrap();

    assert_eq!(config.cluster_name(), "orders");
    assert_eq!(
        config.known_nodes(),
        vec!["10.0.0.1:9142", "10.0.0.2:19042"]
    );
    assert_eq!(config.compression, CompressionSetting::Lz4);
    assert_eq!(
        config.retry_policy,
        RetryPolicyFactory::Log {
            sub_policy: Box::new(RetryPolicyFactory::Default)
        }
    );
    assert_eq!(
        config.reconnection_policy,
        ReconnectionPolicy::Exponential {
            base_delay_ms: 500,
            max_delay_ms: 30_000
        }
    );
    assert_eq!(
        config.speculative_execution_policy,
        SpeculativeExecutionPolicyFactory::Constant {
            delay_ms: 100,
            max_speculative_executions: 2
        }
    );
    assert!(matches!(
        config.auth_provider,
        Some(AuthProvider::PlainText { ref username, .. }) if username == "orders_app"
    ));
    assert_eq!(
        config.query_options.consistency,
        Some(ConsistencyLevel::LocalQuorum)
    );
    assert_eq!(
        config.query_options.serial_consistency,
        Some(SerialConsistencyLevel::LocalSerial)
    );
    assert_eq!(config.pooling_options.connections_per_shard, Some(2));
    assert_eq!(config.connect_attempts, 5);
    assert!(config.metrics_enabled);

    let policy = config.load_balancing().unwrap().unwrap();
    assert_eq!(
        policy,
        LoadBalancing::token_aware(LoadBalancing::DcAwareRoundRobin {
            local_dc: Some("eu-west".to_string()),
            used_hosts_per_remote_dc: Some(1),
            allow_remote_dcs_for_local_consistency: false,
        })
    );

    assert_eq!(config.address_translator.address_map().unwrap().len(), 2);
    assert!(config.ssl.is_none());

    let builder = session_builder(&config).unwrap();
    assert_eq!(builder.config.known_nodes.len(), 2);
    assert!(builder.config.address_translator.is_some());
}

#[test]
fn test_expression_and_factory_are_interchangeable() {
    let from_expression = CassandraConfig::default()
        .with_load_balancing("TokenAwarePolicy(DCAwareRoundRobinPolicy('dc1'))");

    let mut from_factory = CassandraConfig::default();
    from_factory.load_balancing_policy = Some(LoadBalancingSetting::Factory(
        LoadBalancingPolicyFactory::TokenAware {
            sub_policy: Box::new(LoadBalancingPolicyFactory::DcAwareRoundRobin {
                local_dc: Some("dc1".to_string()),
                used_hosts_per_remote_dc: None,
                allow_remote_dcs_for_local_consistency_level: false,
            }),
            shuffle_replicas: None,
        },
    ));

    assert_eq!(
        from_expression.load_balancing().unwrap(),
        from_factory.load_balancing().unwrap()
    );
}

#[test]
fn test_policy_parse_failure_is_fatal() {
    let json = r#"{
        "contactPoints": ["127.0.0.1"],
        "loadBalancingPolicy": "TokenAwarePolicy(RoundRobinPolicy()"
    }"#;

    let err = CassandraConfig::from_json_str(json).unwrap_err();
    assert!(matches!(err, CassandraError::Policy(_)));
}

#[test]
fn test_conflicting_pool_sizes_rejected() {
    let json = r#"{
        "contactPoints": ["127.0.0.1"],
        "poolingOptions": { "connectionsPerHost": 2, "connectionsPerShard": 1 }
    }"#;

    let err = CassandraConfig::from_json_str(json).unwrap_err();
    assert!(matches!(err, CassandraError::Validation(_)));
}

#[test]
fn test_latency_threshold_rejected_in_either_form() {
    let expression = r#"{
        "contactPoints": ["127.0.0.1"],
        "loadBalancingPolicy": "LatencyAwarePolicy(RoundRobinPolicy(), (double) 0.5, (long) 100, (long) 10000, (long) 100, 50)"
    }"#;
    let factory = r#"{
        "contactPoints": ["127.0.0.1"],
        "loadBalancingPolicy": {
            "type": "latencyAware",
            "childPolicy": { "type": "roundRobin" },
            "exclusionThreshold": 0.5
        }
    }"#;

    for json in [expression, factory] {
        let err = CassandraConfig::from_json_str(json).unwrap_err();
        assert!(matches!(err, CassandraError::Policy(_)), "{json}");
    }
}

#[test]
fn test_missing_file() {
    let err = CassandraConfig::from_json_file(fixture("absent.json")).unwrap_err();
    assert!(matches!(err, CassandraError::Config(_)));
}
