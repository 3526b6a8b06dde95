//! Retry budget and backoff schedule for a single send.

use std::time::Duration;

use super::config::TransportConfig;

/// Retry settings taken from the transport configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub limit: u32,
    pub interval: Duration,
    pub exponential: bool,
}

impl From<&TransportConfig> for RetryPolicy {
    fn from(config: &TransportConfig) -> Self {
        Self {
            limit: config.retry_limit,
            interval: config.retry_interval,
            exponential: config.exponential_backoff,
        }
    }
}

/// Per-send retry bookkeeping. A new value is created for every top-level
/// send, so nothing carries over between calls.
#[derive(Clone, Debug)]
pub struct RetryState {
    policy: RetryPolicy,
    attempts: u32,
    current: Duration,
}

impl RetryState {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            current: policy.interval,
            attempts: 0,
            policy,
        }
    }

    /// Retries consumed so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Consume one retry and return how long to sleep before it, or `None`
    /// once the budget is spent.
    pub fn next_sleep(&mut self) -> Option<Duration> {
        if self.attempts >= self.policy.limit {
            return None;
        }
        let sleep = self.current;
        self.attempts += 1;
        if self.policy.exponential {
            self.current = self.current.saturating_mul(2);
        }
        Some(sleep)
    }
}
