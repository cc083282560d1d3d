//! Capped exponential backoff shared by every collaborator that talks to a
//! rate-limited upstream.
//!
//! The runner never retries on its own; processors wrap their calls in
//! [`retry`] or drive a [`Backoff`] by hand when the delay has to be carried
//! across items.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::sleep;
use tracing::warn;

/// Retry behavior for transient failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of consecutive retries before giving up.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Delay before the first retry, in milliseconds.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Upper bound for any single delay, in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Ignore `max_retries` and keep retrying until the upstream recovers.
    #[serde(default)]
    pub unbounded: bool,
}

fn default_max_retries() -> u32 {
    5
}

fn default_base_delay_ms() -> u64 {
    100
}

fn default_max_delay_ms() -> u64 {
    60_000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            unbounded: false,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// delay = min(base_delay_ms * 2^(attempt - 1), max_delay_ms)
    pub fn delay_for_attempt(&self, attempt: u32) -> u64 {
        let exponent = attempt.saturating_sub(1).min(63);
        self.base_delay_ms
            .saturating_mul(1u64 << exponent)
            .min(self.max_delay_ms)
    }

    /// Whether another retry is allowed after `retries_done` retries.
    pub fn allows(&self, retries_done: u32) -> bool {
        self.unbounded || retries_done < self.max_retries
    }

    pub fn backoff(&self) -> Backoff {
        Backoff {
            policy: self.clone(),
            attempt: 0,
        }
    }
}

/// Stateful backoff cursor. The delay grows with every call to
/// [`Backoff::next_delay`] until [`Backoff::reset`] is called.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: RetryPolicy,
    attempt: u32,
}

impl Backoff {
    /// Returns the next delay, or `None` once the retry ceiling is reached.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if !self.policy.allows(self.attempt) {
            return None;
        }
        Some(self.advance())
    }

    /// Grow the delay without consulting the retry ceiling. Callers that
    /// carry one cursor across items count their per-item retries themselves.
    pub fn advance(&mut self) -> Duration {
        self.attempt = self.attempt.saturating_add(1);
        Duration::from_millis(self.policy.delay_for_attempt(self.attempt))
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Number of retries handed out since the last reset.
    pub fn attempts(&self) -> u32 {
        self.attempt
    }
}

#[derive(Debug, Error)]
pub enum RetryError<E> {
    #[error("gave up after {attempts} retries: {last}")]
    Exhausted { attempts: u32, last: E },

    #[error("{0}")]
    Permanent(E),
}

impl<E> RetryError<E> {
    pub fn into_inner(self) -> E {
        match self {
            RetryError::Exhausted { last, .. } => last,
            RetryError::Permanent(e) => e,
        }
    }
}

/// Run `op` until it succeeds, fails with a non-transient error, or the
/// policy's retry ceiling is reached.
pub async fn retry<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    mut op: F,
    is_transient: P,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut backoff = policy.backoff();
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if is_transient(&e) => match backoff.next_delay() {
                Some(delay) => {
                    warn!(
                        attempt = backoff.attempts(),
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient failure, backing off"
                    );
                    sleep(delay).await;
                }
                None => {
                    return Err(RetryError::Exhausted {
                        attempts: backoff.attempts(),
                        last: e,
                    });
                }
            },
            Err(e) => return Err(RetryError::Permanent(e)),
        }
    }
}
