//! Retry policy for oracle calls

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Exponential backoff with jitter
///
/// After failed attempt `k` (0-based) the client waits
/// `base_delay * 2^k + U(0, max_jitter)` before the next attempt. No wait
/// follows the final attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base delay in milliseconds (default: 1000)
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Upper bound of the uniform jitter in milliseconds (default: 1000)
    #[serde(default = "default_max_jitter_ms")]
    pub max_jitter_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_jitter_ms() -> u64 {
    1000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_jitter_ms: default_max_jitter_ms(),
        }
    }
}

impl RetryPolicy {
    /// Policy with the given attempt bound and default delays
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Default::default()
        }
    }

    /// Policy that never sleeps between attempts
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay_ms: 0,
            max_jitter_ms: 0,
        }
    }

    /// Attempt bound, never below one
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Deterministic part of the wait after failed attempt `attempt`
    pub fn base_backoff(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt);
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor))
    }

    /// Full wait after failed attempt `attempt`, jitter included
    pub fn backoff(&self, attempt: u32) -> Duration {
        let jitter = if self.max_jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(self.max_jitter_ms).mul_f64(rand::random::<f64>())
        };
        self.base_backoff(attempt) + jitter
    }

    /// Validate the policy
    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("max_attempts must be at least 1".to_string());
        }
        if self.max_attempts > 10 {
            return Err("max_attempts must be at most 10".to_string());
        }
        Ok(())
    }
}
