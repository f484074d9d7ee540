use std::sync::Arc;
use std::time::Duration;

use scylla::policies::speculative_execution::{
    SimpleSpeculativeExecutionPolicy, SpeculativeExecutionPolicy,
};
use serde::{Deserialize, Serialize};

/// Speculative execution configuration. Disabled unless configured.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum SpeculativeExecutionPolicyFactory {
    #[default]
    #[serde(rename = "none")]
    Disabled,
    /// Start another execution every `delay_ms` until the request completes
    Constant {
        delay_ms: u64,
        max_speculative_executions: usize,
    },
}

impl SpeculativeExecutionPolicyFactory {
    pub fn build(&self) -> Option<Arc<dyn SpeculativeExecutionPolicy>> {
        match self {
            Self::Disabled => None,
            Self::Constant {
                delay_ms,
                max_speculative_executions,
            } => Some(Arc::new(SimpleSpeculativeExecutionPolicy {
                max_retry_count: *max_speculative_executions,
                retry_interval: Duration::from_millis(*delay_ms),
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_builds_nothing() {
        let factory: SpeculativeExecutionPolicyFactory =
            serde_json::from_str(r#"{ "type": "none" }"#).unwrap();
        assert_eq!(factory, SpeculativeExecutionPolicyFactory::Disabled);
        assert!(factory.build().is_none());
    }

    #[test]
    fn test_constant() {
        let factory: SpeculativeExecutionPolicyFactory = serde_json::from_str(
            r#"{ "type": "constant", "delayMs": 50, "maxSpeculativeExecutions": 2 }"#,
        )
        .unwrap();
        assert!(factory.build().is_some());
    }
}
