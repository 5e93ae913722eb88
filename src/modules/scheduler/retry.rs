// Copyright © 2025 the MailStash authors
// Licensed under the MIT License

use serde::{Deserialize, Serialize};

/// Exponential backoff starts here: 5s, then 10s, 20s, ...
pub const BASE_RETRY_DELAY_SECS: u32 = 5;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum RetryStrategy {
    /// Fixed interval between attempts.
    Linear { interval: u32 },
    /// `BASE_RETRY_DELAY_SECS * base^(attempt-1)` seconds.
    Exponential { base: u32 },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub strategy: RetryStrategy,
    pub max_retries: Option<u32>,
}

impl RetryPolicy {
    /// Seconds to wait before the given attempt (1-based).
    pub fn wait_time(&self, attempt: u32) -> u32 {
        let attempt = attempt.max(1);
        match self.strategy {
            RetryStrategy::Linear { interval } => interval.saturating_mul(attempt),
            RetryStrategy::Exponential { base } => BASE_RETRY_DELAY_SECS
                .saturating_mul(base.saturating_pow(attempt.saturating_sub(1))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_backoff_starts_at_five_seconds() {
        let policy = RetryPolicy {
            strategy: RetryStrategy::Exponential { base: 2 },
            max_retries: Some(3),
        };
        assert_eq!(policy.wait_time(1), 5);
        assert_eq!(policy.wait_time(2), 10);
        assert_eq!(policy.wait_time(3), 20);
    }

    #[test]
    fn linear_backoff_scales_with_attempts() {
        let policy = RetryPolicy {
            strategy: RetryStrategy::Linear { interval: 7 },
            max_retries: None,
        };
        assert_eq!(policy.wait_time(1), 7);
        assert_eq!(policy.wait_time(3), 21);
    }
}
