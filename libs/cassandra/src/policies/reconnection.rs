//! Delays between connection attempts.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ReconnectionPolicy {
    Constant { delay_ms: u64 },
    /// Doubles from `base_delay_ms` up to `max_delay_ms`
    Exponential { base_delay_ms: u64, max_delay_ms: u64 },
}

impl Default for ReconnectionPolicy {
    fn default() -> Self {
        Self::Exponential {
            base_delay_ms: 1_000,
            max_delay_ms: 600_000,
        }
    }
}

impl ReconnectionPolicy {
    /// Delay before attempt `attempt + 1`, where `attempt` counts from zero.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match *self {
            Self::Constant { delay_ms } => Duration::from_millis(delay_ms),
            Self::Exponential {
                base_delay_ms,
                max_delay_ms,
            } => {
                let factor = 1u64.checked_shl(attempt.min(63)).unwrap_or(u64::MAX);
                Duration::from_millis(base_delay_ms.saturating_mul(factor).min(max_delay_ms))
            }
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        match *self {
            Self::Constant { .. } => Ok(()),
            Self::Exponential {
                base_delay_ms,
                max_delay_ms,
            } => {
                if base_delay_ms == 0 {
                    Err(ValidationError::new("base_delay_not_positive")
                        .with_message("baseDelayMs must be positive".into()))
                } else if max_delay_ms < base_delay_ms {
                    Err(ValidationError::new("max_delay_below_base").with_message(
                        format!("maxDelayMs must be at least baseDelayMs ({base_delay_ms})")
                            .into(),
                    ))
                } else {
                    Ok(())
                }
            }
        }
    }
}
