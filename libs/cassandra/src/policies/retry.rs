use std::sync::Arc;

use scylla::policies::retry::{
    DefaultRetryPolicy, DowngradingConsistencyRetryPolicy, FallthroughRetryPolicy, RequestInfo,
    RetryDecision, RetryPolicy, RetrySession,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Retry policy configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum RetryPolicyFactory {
    #[default]
    Default,
    Fallthrough,
    DowngradingConsistency,
    /// Wraps `sub_policy` and logs each decision it makes
    Log { sub_policy: Box<RetryPolicyFactory> },
}

impl RetryPolicyFactory {
    pub fn build(&self) -> Arc<dyn RetryPolicy> {
        match self {
            Self::Default => Arc::new(DefaultRetryPolicy::new()),
            Self::Fallthrough => Arc::new(FallthroughRetryPolicy::new()),
            Self::DowngradingConsistency => Arc::new(DowngradingConsistencyRetryPolicy::new()),
            Self::Log { sub_policy } => Arc::new(LoggingRetryPolicy::new(sub_policy.build())),
        }
    }
}

/// Logs every retry decision of the wrapped policy.
#[derive(Debug)]
pub struct LoggingRetryPolicy {
    inner: Arc<dyn RetryPolicy>,
}

impl LoggingRetryPolicy {
    pub fn new(inner: Arc<dyn RetryPolicy>) -> Self {
        Self { inner }
    }
}

impl RetryPolicy for LoggingRetryPolicy {
    fn new_session(&self) -> Box<dyn RetrySession> {
        Box::new(LoggingRetrySession {
            inner: self.inner.new_session(),
        })
    }
}

struct LoggingRetrySession {
    inner: Box<dyn RetrySession>,
}

impl RetrySession for LoggingRetrySession {
    fn decide_should_retry(&mut self, request_info: RequestInfo) -> RetryDecision {
        let error = request_info.error.to_string();
        let consistency = request_info.consistency;
        let idempotent = request_info.is_idempotent;
        let decision = self.inner.decide_should_retry(request_info);

        match decision {
            RetryDecision::DontRetry => {
                debug!(%error, ?consistency, idempotent, "Not retrying request");
            }
            _ => {
                info!(%error, ?consistency, idempotent, ?decision, "Retrying request");
            }
        }
        decision
    }

    fn reset(&mut self) {
        self.inner.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_when_absent() {
        assert_eq!(RetryPolicyFactory::default(), RetryPolicyFactory::Default);
    }

    #[test]
    fn test_nested_log_from_json() {
        let factory: RetryPolicyFactory = serde_json::from_str(
            r#"{ "type": "log", "subPolicy": { "type": "downgradingConsistency" } }"#,
        )
        .unwrap();
        assert_eq!(
            factory,
            RetryPolicyFactory::Log {
                sub_policy: Box::new(RetryPolicyFactory::DowngradingConsistency)
            }
        );
    }

    #[test]
    fn test_build_all_variants() {
        for factory in [
            RetryPolicyFactory::Default,
            RetryPolicyFactory::Fallthrough,
            RetryPolicyFactory::DowngradingConsistency,
            RetryPolicyFactory::Log {
                sub_policy: Box::new(RetryPolicyFactory::Fallthrough),
            },
        ] {
            let policy = factory.build();
            let mut session = policy.new_session();
            session.reset();
        }
    }
}
