//! Integration tests for policy expressions
//!
//! These tests go through the public parser API only:
//! - Documented expression forms build the expected policy tree
//! - Nested policies are built child first, at any depth
//! - Malformed and unknown input fails with a typed error

use std::time::Duration;

use cassandra_bundle::policies::{
    ArgumentKind, LatencyAwareness, LoadBalancing, PolicyError, PolicyExpression, PolicyParser,
};

fn parse(expression: &str) -> Option<LoadBalancing> {
    PolicyParser::default().parse(expression).unwrap()
}

fn dc1() -> LoadBalancing {
    LoadBalancing::dc_aware("dc1")
}

// ============================================================================
// Documented expressions
// ============================================================================

#[test]
fn test_round_robin() {
    assert_eq!(parse("RoundRobinPolicy()"), Some(LoadBalancing::RoundRobin));
}

#[test]
fn test_token_aware_wraps_round_robin() {
    assert_eq!(
        parse("TokenAwarePolicy(RoundRobinPolicy())"),
        Some(LoadBalancing::token_aware(LoadBalancing::RoundRobin))
    );
}

#[test]
fn test_dc_aware_with_quoted_datacenter() {
    assert_eq!(parse(r#"DCAwareRoundRobinPolicy("dc1")"#), Some(dc1()));
    assert_eq!(parse("DCAwareRoundRobinPolicy('dc1')"), Some(dc1()));
}

#[test]
fn test_two_levels_deep() {
    let policy = parse(r#"TokenAwarePolicy(DCAwareRoundRobinPolicy("dc1"))"#).unwrap();
    assert_eq!(policy, LoadBalancing::token_aware(dc1()));
    assert_eq!(policy.child(), Some(&dc1()));
}

#[test]
fn test_name_without_parentheses_is_absent() {
    assert_eq!(PolicyParser::default().parse("TokenAwarePolicy").unwrap(), None);
}

#[test]
fn test_latency_aware_full_form() {
    let expression =
        "LatencyAwarePolicy(TokenAwarePolicy(RoundRobinPolicy()), (double) 10.5, (long) 1, (long) 10, (long) 1, 10)";

    let tree = PolicyExpression::parse(expression).unwrap().unwrap();
    assert_eq!(
        tree.signature(),
        vec![
            ArgumentKind::Policy,
            ArgumentKind::Double,
            ArgumentKind::Long,
            ArgumentKind::Long,
            ArgumentKind::Long,
            ArgumentKind::Int,
        ]
    );

    assert_eq!(
        parse(expression),
        Some(LoadBalancing::latency_aware(
            LoadBalancing::token_aware(LoadBalancing::RoundRobin),
            LatencyAwareness {
                exclusion_threshold: 10.5,
                scale: Duration::from_millis(1),
                retry_period: Duration::from_millis(10),
                update_rate: Duration::from_millis(1),
                minimum_measurements: 10,
            },
        ))
    );
}

// ============================================================================
// Properties
// ============================================================================

#[test]
fn test_zero_argument_policies() {
    for (expression, expected) in [
        ("RoundRobinPolicy()", LoadBalancing::RoundRobin),
        (
            "DCAwareRoundRobinPolicy()",
            LoadBalancing::DcAwareRoundRobin {
                local_dc: None,
                used_hosts_per_remote_dc: None,
                allow_remote_dcs_for_local_consistency: false,
            },
        ),
    ] {
        assert_eq!(parse(expression), Some(expected), "{expression}");
    }
}

#[test]
fn test_nesting_to_arbitrary_depth() {
    let mut expression = "DCAwareRoundRobinPolicy('dc1')".to_string();
    let mut expected = dc1();
    for _ in 0..6 {
        expression = format!("TokenAwarePolicy({expression})");
        expected = LoadBalancing::token_aware(expected);
    }

    let policy = parse(&expression).unwrap();
    assert_eq!(policy, expected);
    assert_eq!(policy.local_datacenter(), Some("dc1"));
}

#[test]
fn test_commas_in_quotes_and_calls_do_not_split() {
    let tree = PolicyExpression::parse("Outer('a,b', Inner(1,2))")
        .unwrap()
        .unwrap();
    assert_eq!(tree.arguments.len(), 2);
    assert_eq!(tree.signature(), vec![ArgumentKind::String, ArgumentKind::Policy]);

    let policy = parse("DCAwareRoundRobinPolicy('dc,1', 2)").unwrap();
    assert_eq!(policy.local_datacenter(), Some("dc,1"));
}

#[test]
fn test_parsing_is_deterministic() {
    let expression = "LatencyAwarePolicy(TokenAwarePolicy(DCAwareRoundRobinPolicy('dc1', 2)))";
    let parser = PolicyParser::default();

    let first = parser.parse_required(expression).unwrap();
    let second = parser.parse_required(expression).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_parser_shared_across_threads() {
    let parser = std::sync::Arc::new(PolicyParser::default());

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let parser = parser.clone();
            std::thread::spawn(move || {
                parser
                    .parse_required(&format!("TokenAwarePolicy(DCAwareRoundRobinPolicy('dc{i}'))"))
                    .unwrap()
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        let policy = handle.join().unwrap();
        assert_eq!(policy.local_datacenter(), Some(format!("dc{i}").as_str()));
    }
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn test_failures_are_typed() {
    let parser = PolicyParser::default();

    assert!(matches!(
        parser.parse("TokenAwarePolicy(RoundRobinPolicy()"),
        Err(PolicyError::MalformedExpression { .. })
    ));
    assert!(matches!(
        parser.parse("DCAwareRoundRobinPolicy('dc1)"),
        Err(PolicyError::MalformedExpression { .. })
    ));
    assert!(matches!(
        parser.parse("FancyPolicy()"),
        Err(PolicyError::UnknownPolicy(_))
    ));
    assert!(matches!(
        parser.parse("TokenAwarePolicy(10)"),
        Err(PolicyError::ArgumentTypeMismatch { .. })
    ));
    assert!(matches!(
        parser.parse(
            "LatencyAwarePolicy(RoundRobinPolicy(), 10.5, (long) 1, (long) 10, (long) 1, 10)"
        ),
        Err(PolicyError::InvalidArgument { .. })
    ));
    assert!(matches!(
        parser.parse("TokenAwarePolicy(FancyPolicy())"),
        Err(PolicyError::NestedConstructionFailure { .. })
    ));
}

#[test]
fn test_nested_failure_keeps_cause() {
    let err = PolicyParser::default()
        .parse("TokenAwarePolicy(DCAwareRoundRobinPolicy(1))")
        .unwrap_err();

    let source = std::error::Error::source(&err).expect("nested error has a source");
    assert!(source.to_string().contains("DCAwareRoundRobinPolicy"));
    assert!(matches!(
        err.root_cause(),
        PolicyError::ArgumentTypeMismatch { kinds, .. } if kinds == &[ArgumentKind::Int]
    ));
}
