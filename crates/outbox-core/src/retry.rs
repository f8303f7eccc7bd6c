//! Bounded retry budget with exponential backoff
//!
//! A [`RetryBudget`] is a plain value describing how often an operation may be
//! retried and how long to wait before each retry. Callers keep their attempt
//! counter as a local, so unrelated operations never share retry state.
//!
//! Backoff schedule for `base = 500ms`: 500ms, 1s, 2s, 4s, ...

use std::time::Duration;

/// Retry ceiling plus base delay for exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    /// Retries allowed after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry; doubles for every following retry
    pub base_delay: Duration,
}

impl RetryBudget {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Returns the delay to wait before retry number `retry` (1-based).
    ///
    /// `delay_for(1) == base`, `delay_for(n) == base * 2^(n-1)`. Saturates
    /// instead of overflowing for very large retry numbers.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(31);
        self.base_delay.saturating_mul(1u32 << exponent)
    }

    /// Returns true if retry number `retry` (1-based) is still within budget.
    pub fn allows(&self, retry: u32) -> bool {
        retry <= self.max_retries
    }

    /// Iterates over every backoff delay the budget permits, in order.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        (1..=self.max_retries).map(|retry| self.delay_for(retry))
    }
}
