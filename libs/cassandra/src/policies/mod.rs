//! Driver policies built from configuration.
//!
//! Load balancing policies can be written as expressions such as
//! `TokenAwarePolicy(DCAwareRoundRobinPolicy('dc1'))` and turned into driver
//! policies by [`PolicyParser`], or described as typed JSON objects through
//! [`LoadBalancingPolicyFactory`]. Retry, speculative execution and reconnection
//! policies are configured through their factory enums.

mod error;
pub mod expression;
mod load_balancing;
mod parser;
pub mod reconnection;
pub mod registry;
mod retry;
mod speculative;

pub use error::PolicyError;
pub use expression::{Argument, ArgumentKind, PolicyExpression};
pub use load_balancing::{
    LatencyAwareness, LoadBalancing, LoadBalancingPolicyFactory, LoadBalancingSetting,
};
pub use parser::{DEFAULT_NAMESPACE, PolicyParser};
pub use reconnection::ReconnectionPolicy;
pub use registry::{Overload, PolicyRegistry, qualified_name};
pub use retry::{LoggingRetryPolicy, RetryPolicyFactory};
pub use speculative::SpeculativeExecutionPolicyFactory;
