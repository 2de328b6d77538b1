//! Retry budget and read state machine for convergent reads.
//!
//! A read moves through explicit states so the retry policy can be tested
//! without a control plane:
//!
//! ```text
//! Querying --found-------> Found
//!          --not found---> NotFoundRetry --wait--> Querying
//!          --not found---> Exhausted          (budget spent)
//!          --other error-> HardFailure
//! ```

use std::time::Duration;

use crate::controlplane::ApplicationResult;
use crate::error::ConvergeError;

/// Default number of lookups before a not-found read gives up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 30;

/// Default delay after the first not-found answer.
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(1);

/// Default ceiling for the backoff delay.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(10);

/// Bounds how long a read waits for a not-found application to appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    max_attempts: u32,
    initial_delay: Duration,
    max_delay: Duration,
}

/// Outcome of one info lookup.
#[derive(Debug)]
pub enum LookupOutcome {
    /// The application record was returned.
    Found(ApplicationResult),
    /// The control plane reported the application as not found.
    NotFound,
    /// Any other failure.
    Failed(ConvergeError),
}

/// State of a convergent read.
#[derive(Debug)]
pub enum ReadState {
    /// About to issue lookup number `attempt` (1-based).
    Querying {
        /// Attempt about to be issued.
        attempt: u32,
    },
    /// Lookup `attempt` answered not-found; wait `delay` and query again.
    NotFoundRetry {
        /// Attempt that answered not-found.
        attempt: u32,
        /// Wait before the next attempt.
        delay: Duration,
    },
    /// The application is visible.
    Found(Box<ApplicationResult>),
    /// Every attempt of the budget answered not-found.
    Exhausted {
        /// Number of lookups issued.
        attempts: u32,
    },
    /// A non-retryable error ended the read.
    HardFailure(ConvergeError),
}

impl RetryBudget {
    /// Creates a budget; `max_attempts` is at least one.
    #[must_use]
    pub fn new(max_attempts: u32, initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            max_delay: max_delay.max(initial_delay),
        }
    }

    /// Returns the maximum number of lookups.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns the delay to wait after not-found attempt `attempt`.
    ///
    /// The delay doubles on each attempt and is capped at the maximum delay.
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 1u32
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.initial_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Computes the state that follows the outcome of lookup `attempt`.
    #[must_use]
    pub fn next_state(&self, attempt: u32, outcome: LookupOutcome) -> ReadState {
        match outcome {
            LookupOutcome::Found(result) => ReadState::Found(Box::new(result)),
            LookupOutcome::Failed(err) => ReadState::HardFailure(err),
            LookupOutcome::NotFound if attempt >= self.max_attempts => {
                ReadState::Exhausted { attempts: attempt }
            }
            LookupOutcome::NotFound => ReadState::NotFoundRetry {
                attempt,
                delay: self.delay_after(attempt),
            },
        }
    }
}

impl Default for RetryBudget {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_INITIAL_DELAY, DEFAULT_MAX_DELAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ControlPlaneError, RemoteCall};

    fn budget(max_attempts: u32) -> RetryBudget {
        RetryBudget::new(max_attempts, Duration::from_millis(100), Duration::from_millis(350))
    }

    #[test]
    fn test_delay_doubles_and_caps() {
        let budget = budget(10);
        assert_eq!(budget.delay_after(1), Duration::from_millis(100));
        assert_eq!(budget.delay_after(2), Duration::from_millis(200));
        assert_eq!(budget.delay_after(3), Duration::from_millis(350));
        assert_eq!(budget.delay_after(64), Duration::from_millis(350));
    }

    #[test]
    fn test_zero_attempts_still_queries_once() {
        assert_eq!(RetryBudget::new(0, Duration::ZERO, Duration::ZERO).max_attempts(), 1);
    }

    #[test]
    fn test_not_found_within_budget_retries() {
        let state = budget(3).next_state(2, LookupOutcome::NotFound);
        assert!(matches!(
            state,
            ReadState::NotFoundRetry { attempt: 2, delay } if delay == Duration::from_millis(200)
        ));
    }

    #[test]
    fn test_not_found_on_last_attempt_exhausts() {
        let state = budget(3).next_state(3, LookupOutcome::NotFound);
        assert!(matches!(state, ReadState::Exhausted { attempts: 3 }));
    }

    #[test]
    fn test_failure_is_terminal_on_first_attempt() {
        let err = ControlPlaneError::network(RemoteCall::ApplicationInfo, "reset").into();
        let state = budget(3).next_state(1, LookupOutcome::Failed(err));
        assert!(matches!(state, ReadState::HardFailure(_)));
    }

    #[test]
    fn test_found_is_terminal() {
        let result = ApplicationResult {
            tag: String::from("application-app"),
            ..ApplicationResult::default()
        };
        let state = budget(3).next_state(1, LookupOutcome::Found(result));
        assert!(matches!(state, ReadState::Found(found) if found.tag == "application-app"));
    }
}
