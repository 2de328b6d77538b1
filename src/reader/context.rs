//! Caller context bounding remote calls and retry waits.

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::ReadError;

/// Reason a call was interrupted by its context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    /// The cancellation token fired.
    Cancelled,
    /// The deadline passed.
    DeadlineExceeded,
}

/// Cancellation and deadline shared by every step of one request.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl CallContext {
    /// Creates a context with no deadline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets an absolute deadline.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Sets a deadline relative to now.
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Uses an existing cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Returns the cancellation token.
    #[must_use]
    pub const fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Returns the deadline, if any.
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Runs `fut` unless the context is cancelled or its deadline passes first.
    ///
    /// # Errors
    ///
    /// Returns the interrupt reason if the context ends before `fut` does.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, Interrupt> {
        if self.cancel.is_cancelled() {
            return Err(Interrupt::Cancelled);
        }
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Err(Interrupt::DeadlineExceeded);
        }

        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(Interrupt::Cancelled),
            () = deadline => Err(Interrupt::DeadlineExceeded),
            output = fut => Ok(output),
        }
    }

    /// Sleeps for `delay`, waking early if the context ends.
    ///
    /// # Errors
    ///
    /// Returns the interrupt reason if the context ends during the wait.
    pub async fn sleep(&self, delay: Duration) -> Result<(), Interrupt> {
        self.run(tokio::time::sleep(delay)).await
    }
}

impl Interrupt {
    /// Converts the interrupt into a read error for `application`.
    #[must_use]
    pub fn into_read_error(self, application: &str, attempts: u32) -> ReadError {
        match self {
            Self::Cancelled => ReadError::Cancelled {
                application: application.to_string(),
            },
            Self::DeadlineExceeded => ReadError::DeadlineExceeded {
                application: application.to_string(),
                attempts,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_completes_without_deadline() {
        let ctx = CallContext::new();
        assert_eq!(ctx.run(async { 7 }).await, Ok(7));
    }

    #[tokio::test]
    async fn test_expired_deadline_interrupts_before_running() {
        let ctx = CallContext::new().with_deadline(Instant::now());
        let result = ctx.run(async { 7 }).await;
        assert_eq!(result, Err(Interrupt::DeadlineExceeded));
    }

    #[tokio::test]
    async fn test_deadline_cuts_sleep_short() {
        let ctx = CallContext::new().with_timeout(Duration::from_millis(20));
        let started = std::time::Instant::now();

        let result = ctx.sleep(Duration::from_secs(30)).await;

        assert_eq!(result, Err(Interrupt::DeadlineExceeded));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_cancellation_interrupts_sleep() {
        let token = CancellationToken::new();
        let ctx = CallContext::new().with_cancellation(token.clone());

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            token.cancel();
        });

        let result = ctx.sleep(Duration::from_secs(30)).await;
        assert_eq!(result, Err(Interrupt::Cancelled));
        canceller.await.unwrap();
    }

    #[test]
    fn test_interrupt_into_read_error() {
        let err = Interrupt::DeadlineExceeded.into_read_error("app", 3);
        assert!(matches!(err, ReadError::DeadlineExceeded { attempts: 3, .. }));
        let err = Interrupt::Cancelled.into_read_error("app", 1);
        assert!(matches!(err, ReadError::Cancelled { .. }));
    }
}
