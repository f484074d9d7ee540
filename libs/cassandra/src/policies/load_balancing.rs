use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use scylla::policies::load_balancing::{
    DefaultPolicy, DefaultPolicyBuilder, LatencyAwarenessBuilder, LoadBalancingPolicy,
};
use serde::{Deserialize, Serialize, Serializer};

use super::{PolicyError, PolicyParser};

/// A constructed load balancing policy.
///
/// Each variant mirrors one of the classic driver policies. `build` compiles the
/// tree into the scylla driver's `DefaultPolicy`, which implements all of them as
/// options of one policy.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum LoadBalancing {
    /// Cycle over all known nodes
    RoundRobin,

    /// Prefer nodes in `local_dc`
    DcAwareRoundRobin {
        local_dc: Option<String>,
        used_hosts_per_remote_dc: Option<u32>,
        allow_remote_dcs_for_local_consistency: bool,
    },

    /// Route to replicas of the request's partition first
    TokenAware {
        child: Box<LoadBalancing>,
        shuffle_replicas: bool,
    },

    /// Penalize nodes whose latency lags behind the fastest ones
    LatencyAware {
        child: Box<LoadBalancing>,
        settings: LatencyAwareness,
    },
}

/// Latency-awareness tuning; see the driver's `LatencyAwarenessBuilder`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LatencyAwareness {
    pub exclusion_threshold: f64,
    #[serde(serialize_with = "as_millis")]
    pub scale: Duration,
    #[serde(serialize_with = "as_millis")]
    pub retry_period: Duration,
    #[serde(serialize_with = "as_millis")]
    pub update_rate: Duration,
    pub minimum_measurements: usize,
}

impl Default for LatencyAwareness {
    fn default() -> Self {
        Self {
            exclusion_threshold: 2.0,
            scale: Duration::from_millis(100),
            retry_period: Duration::from_secs(10),
            update_rate: Duration::from_millis(100),
            minimum_measurements: 50,
        }
    }
}

impl LatencyAwareness {
    /// Check the settings the driver would otherwise accept and misbehave on.
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.exclusion_threshold.is_nan() || self.exclusion_threshold < 1.0 {
            return Err(PolicyError::invalid(
                self.exclusion_threshold.to_string(),
                "exclusion threshold must be at least 1",
            ));
        }
        Ok(())
    }

    fn builder(&self) -> LatencyAwarenessBuilder {
        LatencyAwarenessBuilder::new()
            .exclusion_threshold(self.exclusion_threshold)
            .scale(self.scale)
            .retry_period(self.retry_period)
            .update_rate(self.update_rate)
            .minimum_measurements(self.minimum_measurements)
    }
}

fn as_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}

impl LoadBalancing {
    pub fn dc_aware(local_dc: impl Into<String>) -> Self {
        Self::DcAwareRoundRobin {
            local_dc: Some(local_dc.into()),
            used_hosts_per_remote_dc: None,
            allow_remote_dcs_for_local_consistency: false,
        }
    }

    pub fn token_aware(child: LoadBalancing) -> Self {
        Self::TokenAware {
            child: Box::new(child),
            shuffle_replicas: true,
        }
    }

    pub fn latency_aware(child: LoadBalancing, settings: LatencyAwareness) -> Self {
        Self::LatencyAware {
            child: Box::new(child),
            settings,
        }
    }

    /// The wrapped policy, for decorator variants.
    pub fn child(&self) -> Option<&LoadBalancing> {
        match self {
            Self::TokenAware { child, .. } | Self::LatencyAware { child, .. } => Some(child),
            _ => None,
        }
    }

    /// The datacenter requests are routed to first, if any policy in the chain sets one.
    pub fn local_datacenter(&self) -> Option<&str> {
        match self {
            Self::DcAwareRoundRobin { local_dc, .. } => local_dc.as_deref(),
            _ => self.child().and_then(LoadBalancing::local_datacenter),
        }
    }

    /// Build the driver policy.
    ///
    /// Latency awareness spawns a background task, so this must run inside a
    /// tokio runtime when the chain contains a latency-aware policy.
    pub fn build(&self) -> Arc<dyn LoadBalancingPolicy> {
        self.configure(DefaultPolicy::builder().token_aware(false)).build()
    }

    fn configure(&self, builder: DefaultPolicyBuilder) -> DefaultPolicyBuilder {
        match self {
            Self::RoundRobin => builder,
            Self::DcAwareRoundRobin {
                local_dc,
                used_hosts_per_remote_dc,
                allow_remote_dcs_for_local_consistency,
            } => {
                let builder = match local_dc {
                    Some(dc) => builder.prefer_datacenter(dc.clone()),
                    None => builder,
                };
                let failover = used_hosts_per_remote_dc.is_some_and(|hosts| hosts > 0)
                    || *allow_remote_dcs_for_local_consistency;
                builder.permit_dc_failover(failover)
            }
            Self::TokenAware {
                child,
                shuffle_replicas,
            } => child
                .configure(builder)
                .token_aware(true)
                .enable_shuffling_replicas(*shuffle_replicas),
            Self::LatencyAware { child, settings } => child
                .configure(builder)
                .latency_awareness(settings.builder()),
        }
    }
}

impl fmt::Display for LoadBalancing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RoundRobin => f.write_str("RoundRobin"),
            Self::DcAwareRoundRobin { local_dc, .. } => match local_dc {
                Some(dc) => write!(f, "DcAwareRoundRobin({dc})"),
                None => f.write_str("DcAwareRoundRobin"),
            },
            Self::TokenAware { child, .. } => write!(f, "TokenAware({child})"),
            Self::LatencyAware { child, .. } => write!(f, "LatencyAware({child})"),
        }
    }
}

/// Structured load balancing configuration, one variant per policy kind.
///
/// ```json
/// { "type": "tokenAware", "subPolicy": { "type": "dcAwareRoundRobin", "localDc": "dc1" } }
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum LoadBalancingPolicyFactory {
    RoundRobin,
    DcAwareRoundRobin {
        #[serde(default)]
        local_dc: Option<String>,
        #[serde(default)]
        used_hosts_per_remote_dc: Option<u32>,
        #[serde(default)]
        allow_remote_dcs_for_local_consistency_level: bool,
    },
    TokenAware {
        sub_policy: Box<LoadBalancingPolicyFactory>,
        #[serde(default)]
        shuffle_replicas: Option<bool>,
    },
    LatencyAware {
        child_policy: Box<LoadBalancingPolicyFactory>,
        #[serde(default)]
        exclusion_threshold: Option<f64>,
        #[serde(default)]
        minimum_measurements: Option<usize>,
        #[serde(default)]
        retry_period_ms: Option<u64>,
        #[serde(default)]
        scale_ms: Option<u64>,
        #[serde(default)]
        update_rate_ms: Option<u64>,
    },
}

impl LoadBalancingPolicyFactory {
    /// Build the policy tree, applying the same argument checks as expressions.
    pub fn build(&self) -> Result<LoadBalancing, PolicyError> {
        let policy = match self {
            Self::RoundRobin => LoadBalancing::RoundRobin,
            Self::DcAwareRoundRobin {
                local_dc,
                used_hosts_per_remote_dc,
                allow_remote_dcs_for_local_consistency_level,
            } => LoadBalancing::DcAwareRoundRobin {
                local_dc: local_dc.clone(),
                used_hosts_per_remote_dc: *used_hosts_per_remote_dc,
                allow_remote_dcs_for_local_consistency:
                    *allow_remote_dcs_for_local_consistency_level,
            },
            Self::TokenAware {
                sub_policy,
                shuffle_replicas,
            } => LoadBalancing::TokenAware {
                child: Box::new(sub_policy.build()?),
                shuffle_replicas: shuffle_replicas.unwrap_or(true),
            },
            Self::LatencyAware {
                child_policy,
                exclusion_threshold,
                minimum_measurements,
                retry_period_ms,
                scale_ms,
                update_rate_ms,
            } => {
                let defaults = LatencyAwareness::default();
                let millis = |ms: &Option<u64>, default: Duration| {
                    ms.map(Duration::from_millis).unwrap_or(default)
                };
                let settings = LatencyAwareness {
                    exclusion_threshold: exclusion_threshold
                        .unwrap_or(defaults.exclusion_threshold),
                    scale: millis(scale_ms, defaults.scale),
                    retry_period: millis(retry_period_ms, defaults.retry_period),
                    update_rate: millis(update_rate_ms, defaults.update_rate),
                    minimum_measurements: minimum_measurements
                        .unwrap_or(defaults.minimum_measurements),
                };
                settings.validate()?;
                LoadBalancing::latency_aware(child_policy.build()?, settings)
            }
        };
        Ok(policy)
    }
}

/// Either a policy expression string or a structured factory.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum LoadBalancingSetting {
    Expression(String),
    Factory(LoadBalancingPolicyFactory),
}

impl LoadBalancingSetting {
    /// Resolve to a constructed policy. Expressions use the default parser and
    /// must name a policy.
    pub fn resolve(&self) -> Result<LoadBalancing, PolicyError> {
        match self {
            Self::Expression(expression) => PolicyParser::default().parse_required(expression),
            Self::Factory(factory) => factory.build(),
        }
    }
}

impl From<LoadBalancingPolicyFactory> for LoadBalancingSetting {
    fn from(factory: LoadBalancingPolicyFactory) -> Self {
        Self::Factory(factory)
    }
}
