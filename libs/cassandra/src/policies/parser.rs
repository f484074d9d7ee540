use tracing::debug;

use super::PolicyError;
use super::expression::{Argument, PolicyExpression};
use super::load_balancing::LoadBalancing;
use super::registry::{PolicyRegistry, Value, qualified_name};

/// Namespace prepended to policy names written without one.
pub const DEFAULT_NAMESPACE: &str = "scylla.policies.load_balancing";

/// Turns policy expressions into constructed load balancing policies.
///
/// ```ignore
/// use cassandra_bundle::policies::PolicyParser;
///
/// let policy = PolicyParser::default()
///     .parse("TokenAwarePolicy(DCAwareRoundRobinPolicy('dc1'))")?
///     .expect("expression names a policy");
/// let driver_policy = policy.build();
/// ```
///
/// The parser holds no mutable state; one instance may be shared across threads.
#[derive(Debug, Clone)]
pub struct PolicyParser {
    namespace: String,
    registry: PolicyRegistry,
}

impl Default for PolicyParser {
    fn default() -> Self {
        Self::new()
    }
}

impl PolicyParser {
    pub fn new() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            registry: PolicyRegistry::builtin(),
        }
    }

    /// Resolve unqualified names under `namespace`, with the built-in policies
    /// registered there.
    pub fn with_namespace(namespace: impl Into<String>) -> Self {
        let namespace = namespace.into();
        Self {
            registry: PolicyRegistry::with_builtins(&namespace),
            namespace,
        }
    }

    /// Replace the registry, keeping the namespace.
    pub fn with_registry(mut self, registry: PolicyRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn registry(&self) -> &PolicyRegistry {
        &self.registry
    }

    /// Parse and construct the policy described by `expression`.
    ///
    /// Returns `Ok(None)` when the input does not name a policy call at all,
    /// e.g. `"TokenAwarePolicy"` without parentheses or an empty string.
    pub fn parse(&self, expression: &str) -> Result<Option<LoadBalancing>, PolicyError> {
        match PolicyExpression::parse(expression)? {
            Some(tree) => self.construct(&tree).map(Some),
            None => {
                debug!(expression, "No load balancing policy in expression");
                Ok(None)
            }
        }
    }

    /// Like [`parse`](Self::parse), but input that names no policy is an error.
    pub fn parse_required(&self, expression: &str) -> Result<LoadBalancing, PolicyError> {
        self.parse(expression)?
            .ok_or_else(|| PolicyError::NoPolicySpecified(expression.to_string()))
    }

    /// Construct an already parsed expression, children first.
    pub fn construct(&self, expression: &PolicyExpression) -> Result<LoadBalancing, PolicyError> {
        let name = qualified_name(&self.namespace, &expression.name);
        if !self.registry.contains(&name) {
            return Err(PolicyError::UnknownPolicy(name));
        }

        let mut values = Vec::with_capacity(expression.arguments.len());
        for argument in &expression.arguments {
            let value = match argument {
                Argument::Str(value) => Value::Str(value.clone()),
                Argument::Int(value) => Value::Int(*value),
                Argument::Long(value) => Value::Long(*value),
                Argument::Float(value) => Value::Float(*value),
                Argument::Double(value) => Value::Double(*value),
                Argument::Policy(child) => Value::Policy(self.construct(child).map_err(
                    |source| PolicyError::NestedConstructionFailure {
                        policy: name.clone(),
                        source: Box::new(source),
                    },
                )?),
            };
            values.push(value);
        }

        let policy = self.registry.construct(&name, values)?;
        debug!(policy = %name, constructed = %policy, "Constructed load balancing policy");
        Ok(policy)
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policies::ArgumentKind;
    use crate::policies::registry::Overload;

    #[test]
    fn test_parser_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PolicyParser>();
    }

    #[test]
    fn test_qualified_name_is_used_as_is() {
        let parser = PolicyParser::new();
        let policy = parser
            .parse("scylla.policies.load_balancing.RoundRobinPolicy()")
            .unwrap();
        assert_eq!(policy, Some(LoadBalancing::RoundRobin));
    }

    #[test]
    fn test_custom_namespace() {
        let parser = PolicyParser::with_namespace("com.example.lb");
        assert_eq!(parser.namespace(), "com.example.lb");
        assert_eq!(
            parser.parse("RoundRobinPolicy()").unwrap(),
            Some(LoadBalancing::RoundRobin)
        );

        let err = parser
            .parse("scylla.policies.load_balancing.RoundRobinPolicy()")
            .unwrap_err();
        assert!(matches!(err, PolicyError::UnknownPolicy(_)));
    }

    #[test]
    fn test_empty_namespace_resolves_builtins() {
        let parser = PolicyParser::with_namespace("");
        assert_eq!(
            parser
                .parse_required("TokenAwarePolicy(DCAwareRoundRobinPolicy('dc1'))")
                .unwrap(),
            LoadBalancing::token_aware(LoadBalancing::dc_aware("dc1"))
        );
        assert!(matches!(
            parser.parse("Missing()"),
            Err(PolicyError::UnknownPolicy(name)) if name == "Missing"
        ));
    }

    #[test]
    fn test_unknown_policy_reports_qualified_name() {
        let err = PolicyParser::new().parse("WhiteListPolicy()").unwrap_err();
        assert!(matches!(
            err,
            PolicyError::UnknownPolicy(name)
                if name == "scylla.policies.load_balancing.WhiteListPolicy"
        ));
    }

    #[test]
    fn test_unknown_outer_is_reported_before_children() {
        let err = PolicyParser::new()
            .parse("Mystery(NotRegisteredEither())")
            .unwrap_err();
        assert!(matches!(err, PolicyError::UnknownPolicy(name) if name.ends_with(".Mystery")));
    }

    #[test]
    fn test_child_failure_is_nested() {
        let err = PolicyParser::new()
            .parse("TokenAwarePolicy(LatencyAwarePolicy(Nope()))")
            .unwrap_err();

        match &err {
            PolicyError::NestedConstructionFailure { policy, source } => {
                assert!(policy.ends_with(".TokenAwarePolicy"));
                assert!(matches!(
                    source.as_ref(),
                    PolicyError::NestedConstructionFailure { .. }
                ));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(matches!(err.root_cause(), PolicyError::UnknownPolicy(_)));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_type_mismatch() {
        let err = PolicyParser::new()
            .parse("TokenAwarePolicy('dc1')")
            .unwrap_err();
        assert!(matches!(err, PolicyError::ArgumentTypeMismatch { .. }));
    }

    #[test]
    fn test_parse_required() {
        let parser = PolicyParser::new();
        assert!(matches!(
            parser.parse_required("  "),
            Err(PolicyError::NoPolicySpecified(_))
        ));
        assert_eq!(
            parser.parse_required("RoundRobinPolicy()").unwrap(),
            LoadBalancing::RoundRobin
        );
    }

    #[test]
    fn test_custom_registry() {
        let mut registry = PolicyRegistry::builtin();
        registry.register(
            "acme.PinnedPolicy",
            Overload::new(&[ArgumentKind::String], |mut args| {
                Ok(LoadBalancing::token_aware(LoadBalancing::dc_aware(
                    args.string()?,
                )))
            }),
        );
        let parser = PolicyParser::new().with_registry(registry);

        let policy = parser.parse_required("acme.PinnedPolicy('dc7')").unwrap();
        assert_eq!(policy.local_datacenter(), Some("dc7"));
        assert!(parser.parse("RoundRobinPolicy()").unwrap().is_some());
    }
}
