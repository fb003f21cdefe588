//! Retry policy
//!
//! Retrying is an explicit state machine: [`RetryState`] records attempts and
//! asks the pure [`RetryPolicy::decide`] what to do after each failure.
//! Jitter is applied afterwards so the decision itself stays deterministic.

use crate::error::ErrorKind;
use crate::types::{BackoffType, Jitter};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Outcome of a retry decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Sleep for the delay, then try again
    Retry(Duration),
    /// Surface the error to the caller
    Fail,
}

/// Serializable retry settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total HTTP attempts per logical call, including the first
    pub max_attempts: u32,
    /// Delay before the first retry
    pub base_delay_ms: u64,
    /// Upper bound on computed backoff
    pub max_backoff_ms: u64,
    /// Upper bound on a server-provided `Retry-After`
    pub max_retry_after_secs: u64,
    /// Backoff growth
    pub backoff: BackoffType,
    /// Backoff randomisation
    pub jitter: Jitter,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 500,
            max_backoff_ms: 30_000,
            max_retry_after_secs: 60,
            backoff: BackoffType::Exponential,
            jitter: Jitter::Equal,
        }
    }
}

/// Retry policy applied to every logical call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_backoff: Duration,
    pub max_retry_after: Duration,
    pub backoff_type: BackoffType,
    pub jitter: Jitter,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
            max_retry_after: Duration::from_secs(config.max_retry_after_secs),
            backoff_type: config.backoff,
            jitter: config.jitter,
        }
    }
}

impl RetryPolicy {
    /// Decide what follows a failed attempt.
    ///
    /// `attempt` is the number of attempts made so far (1 after the first
    /// call). `retry_after` is the server hint from a 429, if any.
    pub fn decide(&self, attempt: u32, kind: ErrorKind, retry_after: Option<Duration>) -> Decision {
        if !kind.is_transient() || attempt >= self.max_attempts {
            return Decision::Fail;
        }

        let retry = attempt.saturating_sub(1);
        match (kind, retry_after) {
            (ErrorKind::RateLimited, Some(hint)) => Decision::Retry(hint.min(self.max_retry_after)),
            _ => Decision::Retry(self.calculate_backoff(retry)),
        }
    }

    /// Backoff before retry number `retry` (0 for the first retry)
    pub fn calculate_backoff(&self, retry: u32) -> Duration {
        let delay = match self.backoff_type {
            BackoffType::Constant => self.base_delay,
            BackoffType::Linear => self.base_delay.saturating_mul(retry.saturating_add(1)),
            BackoffType::Exponential => {
                let factor = 2u32.saturating_pow(retry);
                self.base_delay.saturating_mul(factor)
            }
        };

        std::cmp::min(delay, self.max_backoff)
    }

    /// Randomise a computed delay with the thread-local RNG
    pub fn apply_jitter(&self, delay: Duration) -> Duration {
        self.apply_jitter_with(delay, &mut rand::thread_rng())
    }

    /// Randomise a computed delay with the given RNG
    pub fn apply_jitter_with<R: Rng + ?Sized>(&self, delay: Duration, rng: &mut R) -> Duration {
        let millis = delay.as_millis() as u64;
        if millis == 0 {
            return delay;
        }
        match self.jitter {
            Jitter::None => delay,
            Jitter::Equal => {
                let half = millis / 2;
                Duration::from_millis(half + rng.gen_range(0..=millis - half))
            }
            Jitter::Full => Duration::from_millis(rng.gen_range(0..=millis)),
        }
    }
}

/// Attempt record for one logical call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryState {
    attempts: u32,
    last_error: Option<ErrorKind>,
    last_delay: Option<Duration>,
}

impl RetryState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a new HTTP attempt
    pub fn begin_attempt(&mut self) -> u32 {
        self.attempts += 1;
        self.attempts
    }

    /// Record a failed attempt and decide what follows.
    ///
    /// Server-provided `Retry-After` delays are used verbatim; computed
    /// backoff is jittered.
    pub fn on_failure(
        &mut self,
        policy: &RetryPolicy,
        kind: ErrorKind,
        retry_after: Option<Duration>,
    ) -> Decision {
        self.last_error = Some(kind);
        let decision = match policy.decide(self.attempts, kind, retry_after) {
            Decision::Retry(delay) if kind == ErrorKind::RateLimited && retry_after.is_some() => {
                Decision::Retry(delay)
            }
            Decision::Retry(delay) => Decision::Retry(policy.apply_jitter(delay)),
            Decision::Fail => Decision::Fail,
        };
        self.last_delay = match decision {
            Decision::Retry(delay) => Some(delay),
            Decision::Fail => None,
        };
        decision
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn last_error(&self) -> Option<ErrorKind> {
        self.last_error
    }

    pub fn last_delay(&self) -> Option<Duration> {
        self.last_delay
    }
}
