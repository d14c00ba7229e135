//! Retry/backoff policy for task notification work items.
//!
//! Per work item: `Pending -> Attempting -> {Succeeded | Pending (retry) | Failed}`.
//! The schedule is a fixed table rather than a formula: attempt 2 runs 60s
//! after the first failure, attempt 3 runs 180s after the second. A failure
//! of attempt 3 is terminal and the item moves to the failed store.

use std::time::Duration;

/// Total attempts allowed per work item, including the first.
pub const MAX_ATTEMPTS: i32 = 3;

/// Delay before the next attempt, indexed by the number of attempts already made minus one.
///
/// The last entry is only reached if `MAX_ATTEMPTS` is raised above 3.
pub const BACKOFF_SCHEDULE_SECS: [u64; 3] = [60, 180, 360];

/// Execution budget for a single attempt. Exceeding it counts as a failure.
pub const ATTEMPT_TIMEOUT_SECS: u64 = 30;

/// After this long a reservation is considered abandoned and the item can be claimed again.
pub const RESERVATION_TIMEOUT_SECS: u64 = 60;

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Release the item back to pending, available after `delay`.
    Retry { delay: Duration },
    /// Move the item to the failed store.
    GiveUp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: i32,
    pub backoff: Vec<Duration>,
    pub attempt_timeout: Duration,
    pub reservation_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            backoff: BACKOFF_SCHEDULE_SECS
                .iter()
                .map(|secs| Duration::from_secs(*secs))
                .collect(),
            attempt_timeout: Duration::from_secs(ATTEMPT_TIMEOUT_SECS),
            reservation_timeout: Duration::from_secs(RESERVATION_TIMEOUT_SECS),
        }
    }
}

impl RetryPolicy {
    /// Decide after a failure, given the attempts made so far (including the one that failed).
    pub fn decide(&self, attempts: i32) -> RetryDecision {
        if attempts >= self.max_attempts {
            RetryDecision::GiveUp
        } else {
            RetryDecision::Retry {
                delay: self.backoff_for(attempts),
            }
        }
    }

    /// Whether a claim would start an attempt beyond the cap.
    pub fn exceeded(&self, attempts: i32) -> bool {
        attempts > self.max_attempts
    }

    /// Delay before the attempt following `attempts` completed ones.
    pub fn backoff_for(&self, attempts: i32) -> Duration {
        let Some(last) = self.backoff.len().checked_sub(1) else {
            return Duration::ZERO;
        };
        let index = usize::try_from(attempts.saturating_sub(1))
            .unwrap_or(0)
            .min(last);
        self.backoff[index]
    }
}
