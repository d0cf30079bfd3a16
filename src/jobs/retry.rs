//! Exponential backoff with jitter, and the retry/dead-letter decision.

use rand::Rng;

use crate::config::RetryConfig;

/// What the worker does with a job whose handler just failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureDecision {
    /// Back to `failed`, eligible again after `delay_ms`
    Retry { delay_ms: u64 },
    /// Retries exhausted
    DeadLetter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    base_delay_ms: u64,
    max_delay_ms: u64,
    jitter_ms: u64,
}

impl RetryPolicy {
    pub fn new(base_delay_ms: u64, max_delay_ms: u64, jitter_ms: u64) -> Self {
        Self {
            base_delay_ms,
            max_delay_ms,
            jitter_ms,
        }
    }

    /// `min(cap, base * 2^retries)`, saturating at the cap.
    pub fn backoff_ms(&self, retries: i32) -> u64 {
        let exponent = u32::try_from(retries.max(0)).unwrap_or(u32::MAX);
        2u64.checked_pow(exponent)
            .and_then(|factor| self.base_delay_ms.checked_mul(factor))
            .map_or(self.max_delay_ms, |delay| delay.min(self.max_delay_ms))
    }

    /// Delay for a given jitter sample; `jitter` is clamped below `jitter_ms`.
    pub fn delay_with_jitter(&self, retries: i32, jitter: u64) -> u64 {
        let jitter = if self.jitter_ms == 0 {
            0
        } else {
            jitter.min(self.jitter_ms - 1)
        };
        self.backoff_ms(retries).saturating_add(jitter)
    }

    /// Delay before the next attempt, `retries` counted before this failure.
    pub fn delay(&self, retries: i32) -> u64 {
        let jitter = if self.jitter_ms == 0 {
            0
        } else {
            rand::rng().random_range(0..self.jitter_ms)
        };
        self.delay_with_jitter(retries, jitter)
    }

    /// Dead-letter once the incremented count reaches the ceiling.
    pub fn decide(&self, retries: i32, max_retries: i32) -> FailureDecision {
        if retries.saturating_add(1) >= max_retries {
            FailureDecision::DeadLetter
        } else {
            FailureDecision::Retry {
                delay_ms: self.delay(retries),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::new(config.base_delay_ms, config.max_delay_ms, config.jitter_ms)
    }
}
