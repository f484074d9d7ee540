//! Name to constructor dispatch table for load balancing policies.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::time::Duration;

use super::PolicyError;
use super::expression::ArgumentKind;
use super::load_balancing::{LatencyAwareness, LoadBalancing};

/// An argument after nested policies have been constructed.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Policy(LoadBalancing),
}

impl Value {
    pub fn kind(&self) -> ArgumentKind {
        match self {
            Self::Str(_) => ArgumentKind::String,
            Self::Int(_) => ArgumentKind::Int,
            Self::Long(_) => ArgumentKind::Long,
            Self::Float(_) => ArgumentKind::Float,
            Self::Double(_) => ArgumentKind::Double,
            Self::Policy(_) => ArgumentKind::Policy,
        }
    }
}

/// Positional arguments handed to a constructor.
///
/// The registry only calls a constructor whose signature matches the argument
/// kinds, so the typed accessors fail only when a constructor reads its
/// arguments out of order or a value is out of range.
#[derive(Debug)]
pub struct Arguments {
    policy: String,
    values: VecDeque<Value>,
}

impl Arguments {
    pub fn new(policy: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            policy: policy.into(),
            values: values.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn take<T>(
        &mut self,
        expected: ArgumentKind,
        extract: fn(Value) -> Option<T>,
    ) -> Result<T, PolicyError> {
        let Some(value) = self.values.pop_front() else {
            return Err(PolicyError::invalid(
                &self.policy,
                format!("missing {expected} argument"),
            ));
        };
        let found = format!("{value:?}");
        extract(value).ok_or_else(|| {
            let reason = format!("`{}` expected a {expected} argument", self.policy);
            PolicyError::invalid(found, reason)
        })
    }

    pub fn policy(&mut self) -> Result<LoadBalancing, PolicyError> {
        self.take(ArgumentKind::Policy, |value| match value {
            Value::Policy(policy) => Some(policy),
            _ => None,
        })
    }

    pub fn string(&mut self) -> Result<String, PolicyError> {
        self.take(ArgumentKind::String, |value| match value {
            Value::Str(value) => Some(value),
            _ => None,
        })
    }

    pub fn int(&mut self) -> Result<i32, PolicyError> {
        self.take(ArgumentKind::Int, |value| match value {
            Value::Int(value) => Some(value),
            _ => None,
        })
    }

    pub fn long(&mut self) -> Result<i64, PolicyError> {
        self.take(ArgumentKind::Long, |value| match value {
            Value::Long(value) => Some(value),
            _ => None,
        })
    }

    pub fn double(&mut self) -> Result<f64, PolicyError> {
        self.take(ArgumentKind::Double, |value| match value {
            Value::Double(value) => Some(value),
            _ => None,
        })
    }

    /// A `long` read as a duration in milliseconds.
    pub fn millis(&mut self) -> Result<Duration, PolicyError> {
        let value = self.long()?;
        u64::try_from(value)
            .map(Duration::from_millis)
            .map_err(|_| PolicyError::invalid(value.to_string(), "duration must not be negative"))
    }

    /// An `int` read as a count.
    pub fn count(&mut self) -> Result<usize, PolicyError> {
        let value = self.int()?;
        usize::try_from(value)
            .map_err(|_| PolicyError::invalid(value.to_string(), "count must not be negative"))
    }
}

pub type Constructor = fn(Arguments) -> Result<LoadBalancing, PolicyError>;

/// One constructor of a policy and the argument kinds it accepts.
#[derive(Debug, Clone, Copy)]
pub struct Overload {
    pub signature: &'static [ArgumentKind],
    pub construct: Constructor,
}

impl Overload {
    pub const fn new(signature: &'static [ArgumentKind], construct: Constructor) -> Self {
        Self {
            signature,
            construct,
        }
    }
}

/// Join `namespace` and `name`. Names that already carry a namespace, or an
/// empty namespace, leave `name` as written.
pub fn qualified_name(namespace: &str, name: &str) -> String {
    if name.contains('.') || namespace.is_empty() {
        name.to_string()
    } else {
        format!("{namespace}.{name}")
    }
}

/// Fully qualified policy names mapped to their constructors.
#[derive(Debug, Clone, Default)]
pub struct PolicyRegistry {
    policies: HashMap<String, Vec<Overload>>,
}

impl PolicyRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in policies under the default namespace.
    pub fn builtin() -> Self {
        Self::with_builtins(super::DEFAULT_NAMESPACE)
    }

    /// The built-in policies registered under `namespace`.
    pub fn with_builtins(namespace: &str) -> Self {
        use ArgumentKind::{Double, Int, Long, Policy, String as Text};

        let mut registry = Self::new();
        let qualified = |name: &str| qualified_name(namespace, name);

        registry.register(
            qualified("RoundRobinPolicy"),
            Overload::new(&[], |_| Ok(LoadBalancing::RoundRobin)),
        );

        registry.register(
            qualified("DCAwareRoundRobinPolicy"),
            Overload::new(&[], |_| {
                Ok(LoadBalancing::DcAwareRoundRobin {
                    local_dc: None,
                    used_hosts_per_remote_dc: None,
                    allow_remote_dcs_for_local_consistency: false,
                })
            }),
        );
        registry.register(
            qualified("DCAwareRoundRobinPolicy"),
            Overload::new(&[Text], |mut args| {
                Ok(LoadBalancing::dc_aware(args.string()?))
            }),
        );
        registry.register(
            qualified("DCAwareRoundRobinPolicy"),
            Overload::new(&[Text, Int], |mut args| {
                let local_dc = args.string()?;
                let used_hosts = args.count()?;
                Ok(LoadBalancing::DcAwareRoundRobin {
                    local_dc: Some(local_dc),
                    used_hosts_per_remote_dc: Some(used_hosts as u32),
                    allow_remote_dcs_for_local_consistency: false,
                })
            }),
        );

        registry.register(
            qualified("TokenAwarePolicy"),
            Overload::new(&[Policy], |mut args| {
                Ok(LoadBalancing::token_aware(args.policy()?))
            }),
        );

        registry.register(
            qualified("LatencyAwarePolicy"),
            Overload::new(&[Policy], |mut args| {
                Ok(LoadBalancing::latency_aware(
                    args.policy()?,
                    LatencyAwareness::default(),
                ))
            }),
        );
        registry.register(
            qualified("LatencyAwarePolicy"),
            Overload::new(&[Policy, Double, Long, Long, Long, Int], |mut args| {
                let child = args.policy()?;
                let settings = LatencyAwareness {
                    exclusion_threshold: args.double()?,
                    scale: args.millis()?,
                    retry_period: args.millis()?,
                    update_rate: args.millis()?,
                    minimum_measurements: args.count()?,
                };
                settings.validate()?;
                Ok(LoadBalancing::latency_aware(child, settings))
            }),
        );

        registry
    }

    /// Add a constructor for `name`. Overloads are tried in registration order.
    pub fn register(&mut self, name: impl Into<String>, overload: Overload) -> &mut Self {
        self.policies.entry(name.into()).or_default().push(overload);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.policies.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.policies.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Invoke the overload of `name` whose signature equals the kinds of `values`.
    pub fn construct(&self, name: &str, values: Vec<Value>) -> Result<LoadBalancing, PolicyError> {
        let overloads = self
            .policies
            .get(name)
            .ok_or_else(|| PolicyError::UnknownPolicy(name.to_string()))?;

        let kinds: Vec<ArgumentKind> = values.iter().map(Value::kind).collect();
        let overload = overloads
            .iter()
            .find(|overload| overload.signature == kinds.as_slice())
            .ok_or_else(|| PolicyError::ArgumentTypeMismatch {
                policy: name.to_string(),
                kinds,
            })?;

        (overload.construct)(Arguments::new(name, values))
    }
}
