use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::DeliveryStatus;

/// Default cap on the delivery backoff, in minutes.
pub const DEFAULT_BACKOFF_CAP_MINUTES: u32 = 60;

/// Outcome of recording one failed delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Schedule another attempt at `next_retry_at`.
    Retry {
        attempts: u32,
        next_retry_at: DateTime<Utc>,
    },
    /// `attempts` reached the limit; the entry becomes terminal.
    Exhausted { attempts: u32 },
}

impl RetryDecision {
    /// Status the entry moves to after this decision.
    pub fn status(&self) -> DeliveryStatus {
        match self {
            Self::Retry { .. } => DeliveryStatus::Error,
            Self::Exhausted { .. } => DeliveryStatus::Failed,
        }
    }

    /// Attempt counter after this decision.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Retry { attempts, .. } | Self::Exhausted { attempts } => *attempts,
        }
    }

    pub fn next_retry_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Retry { next_retry_at, .. } => Some(*next_retry_at),
            Self::Exhausted { .. } => None,
        }
    }
}

/// Delivery retry policy: `max_retries` attempts, capped exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_cap_minutes: u32,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff_cap_minutes: u32) -> Self {
        Self {
            max_retries,
            backoff_cap_minutes,
        }
    }

    /// Record a failure for an entry that had `previous_attempts` failures so far.
    pub fn record_failure(&self, previous_attempts: u32, now: DateTime<Utc>) -> RetryDecision {
        let attempts = previous_attempts.saturating_add(1);
        if attempts >= self.max_retries {
            RetryDecision::Exhausted { attempts }
        } else {
            RetryDecision::Retry {
                attempts,
                next_retry_at: now + delivery_backoff(attempts, self.backoff_cap_minutes),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, DEFAULT_BACKOFF_CAP_MINUTES)
    }
}

/// Delay before the next delivery attempt after `attempts` consecutive failures.
///
/// Formula: `min(cap, 2^attempts)` minutes, so 2, 4, 8, 16, 32, 60, 60, ...
pub fn delivery_backoff(attempts: u32, cap_minutes: u32) -> chrono::Duration {
    let exp = 2u64.saturating_pow(attempts);
    let minutes = exp.min(u64::from(cap_minutes));
    chrono::Duration::minutes(minutes as i64)
}

/// Run `op` up to `attempts` times with a fixed `delay` between tries.
///
/// Only errors for which `is_transient` returns true are retried; any other
/// error, and the last transient one, is returned as-is.
pub async fn retry_transient<T, E, F, Fut, P>(
    attempts: u32,
    delay: Duration,
    is_transient: P,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < attempts && is_transient(&e) => {
                warn!(
                    attempt,
                    attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Transient failure, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
