//! Info lookup that tolerates a just-written application being invisible.
//!
//! The control plane acknowledges a create before the application is
//! indexed for lookup, so a read right after a write is expected to see
//! "not found" a few times. Only exhausting the retry budget turns that
//! into an error.

use tracing::{debug, warn};

use crate::controlplane::{ApplicationResult, ControlPlane, application_tag};
use crate::error::{ControlPlaneError, ReadError, RemoteCall, Result};

use super::context::CallContext;
use super::retry::{LookupOutcome, ReadState, RetryBudget};

/// Reads an application by name, retrying while it is not found.
#[derive(Debug)]
pub struct ConvergentReader<'a, C: ControlPlane + ?Sized> {
    client: &'a C,
    budget: RetryBudget,
}

impl<'a, C: ControlPlane + ?Sized> ConvergentReader<'a, C> {
    /// Creates a reader over `client` with the given budget.
    #[must_use]
    pub const fn new(client: &'a C, budget: RetryBudget) -> Self {
        Self { client, budget }
    }

    /// Looks up `application` until it is found, the budget is spent, or a
    /// hard error occurs.
    ///
    /// # Errors
    ///
    /// Returns [`ReadError::NotFound`] once every attempt answered not-found,
    /// the first hard control plane error unchanged, or an interrupt error if
    /// the context ends.
    pub async fn read_by_name(
        &self,
        ctx: &CallContext,
        model: &str,
        application: &str,
    ) -> Result<ApplicationResult> {
        let mut state = ReadState::Querying { attempt: 1 };

        loop {
            state = match state {
                ReadState::Querying { attempt } => {
                    let outcome = ctx
                        .run(self.lookup(model, application))
                        .await
                        .map_err(|i| i.into_read_error(application, attempt))?;
                    self.budget.next_state(attempt, outcome)
                }
                ReadState::NotFoundRetry { attempt, delay } => {
                    debug!(
                        "Application {application} not found yet (attempt {attempt}/{}), retrying in {delay:?}",
                        self.budget.max_attempts()
                    );
                    ctx.sleep(delay)
                        .await
                        .map_err(|i| i.into_read_error(application, attempt))?;
                    ReadState::Querying {
                        attempt: attempt + 1,
                    }
                }
                ReadState::Found(result) => {
                    debug!("Application {application} found");
                    return Ok(*result);
                }
                ReadState::Exhausted { attempts } => {
                    warn!("Application {application} still not found after {attempts} attempts");
                    return Err(ReadError::NotFound {
                        model: model.to_string(),
                        application: application.to_string(),
                        attempts,
                    }
                    .into());
                }
                ReadState::HardFailure(err) => return Err(err),
            };
        }
    }

    /// Issues one info lookup and classifies its outcome.
    async fn lookup(&self, model: &str, application: &str) -> LookupOutcome {
        let call = RemoteCall::ApplicationInfo;
        let tags = [application_tag(application)];

        let mut results = match self.client.application_info(model, &tags).await {
            Ok(results) => results,
            Err(err) => return LookupOutcome::Failed(err),
        };

        if results.len() != 1 {
            return LookupOutcome::Failed(
                ControlPlaneError::UnexpectedResultCount {
                    call,
                    expected: 1,
                    actual: results.len(),
                }
                .into(),
            );
        }

        let entry = results.remove(0);
        match (entry.result, entry.error) {
            (_, Some(error)) if error.is_not_found() => LookupOutcome::NotFound,
            (_, Some(error)) => LookupOutcome::Failed(
                ControlPlaneError::Remote {
                    call,
                    code: error.code,
                    message: error.message,
                }
                .into(),
            ),
            (Some(result), None) => LookupOutcome::Found(result),
            (None, None) => LookupOutcome::Failed(
                ControlPlaneError::invalid_response(call, "entry has neither result nor error")
                    .into(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controlplane::{ApiError, InfoResult, MockControlPlane};
    use crate::error::ConvergeError;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn fast_budget(max_attempts: u32) -> RetryBudget {
        RetryBudget::new(max_attempts, Duration::from_millis(1), Duration::from_millis(2))
    }

    fn not_found() -> InfoResult {
        InfoResult {
            result: None,
            error: Some(ApiError {
                message: String::from("application \"testapplication\" not found"),
                code: String::from("not found"),
            }),
        }
    }

    fn found() -> InfoResult {
        InfoResult {
            result: Some(ApplicationResult {
                tag: String::from("application-testapplication"),
                charm: String::from("ch:amd64/jammy/testcharm-5"),
                channel: String::from("stable"),
                principal: true,
                ..ApplicationResult::default()
            }),
            error: None,
        }
    }

    #[tokio::test]
    async fn test_not_found_twice_then_found() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let mut client = MockControlPlane::new();
        client
            .expect_application_info()
            .withf(|model, tags| model == "testmodel" && tags == ["application-testapplication"])
            .times(3)
            .returning(move |_, _| {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Ok(vec![not_found()])
                } else {
                    Ok(vec![found()])
                }
            });

        let reader = ConvergentReader::new(&client, fast_budget(5));
        let result = reader
            .read_by_name(&CallContext::new(), "testmodel", "testapplication")
            .await
            .unwrap();

        assert_eq!(result.channel, "stable");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_budget_exhaustion_reports_not_found() {
        let mut client = MockControlPlane::new();
        client
            .expect_application_info()
            .times(4)
            .returning(|_, _| Ok(vec![not_found()]));

        let reader = ConvergentReader::new(&client, fast_budget(4));
        let err = reader
            .read_by_name(&CallContext::new(), "testmodel", "testapplication")
            .await
            .unwrap_err();

        match err {
            ConvergeError::Read(ReadError::NotFound {
                model,
                application,
                attempts,
            }) => {
                assert_eq!(model, "testmodel");
                assert_eq!(application, "testapplication");
                assert_eq!(attempts, 4);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_hard_error_is_not_retried() {
        let mut client = MockControlPlane::new();
        client.expect_application_info().times(1).returning(|_, _| {
            Err(ControlPlaneError::network(RemoteCall::ApplicationInfo, "connection reset").into())
        });

        let reader = ConvergentReader::new(&client, fast_budget(5));
        let err = reader
            .read_by_name(&CallContext::new(), "testmodel", "testapplication")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ConvergeError::ControlPlane(ControlPlaneError::Network { .. })
        ));
    }

    #[tokio::test]
    async fn test_structured_non_not_found_error_is_hard() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let mut client = MockControlPlane::new();
        client
            .expect_application_info()
            .times(2)
            .returning(move |_, _| {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Ok(vec![not_found()])
                } else {
                    Ok(vec![InfoResult {
                        result: None,
                        error: Some(ApiError {
                            message: String::from("permission denied"),
                            code: String::from("unauthorized access"),
                        }),
                    }])
                }
            });

        let reader = ConvergentReader::new(&client, fast_budget(5));
        let err = reader
            .read_by_name(&CallContext::new(), "testmodel", "testapplication")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ConvergeError::ControlPlane(ControlPlaneError::Remote {
                call: RemoteCall::ApplicationInfo,
                ..
            })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_wrong_result_count_is_hard() {
        let mut client = MockControlPlane::new();
        client
            .expect_application_info()
            .times(1)
            .returning(|_, _| Ok(vec![]));

        let reader = ConvergentReader::new(&client, fast_budget(5));
        let err = reader
            .read_by_name(&CallContext::new(), "testmodel", "testapplication")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ConvergeError::ControlPlane(ControlPlaneError::UnexpectedResultCount { actual: 0, .. })
        ));
    }

    #[tokio::test]
    async fn test_deadline_unwinds_retry_wait() {
        let mut client = MockControlPlane::new();
        client
            .expect_application_info()
            .times(1)
            .returning(|_, _| Ok(vec![not_found()]));

        let budget = RetryBudget::new(10, Duration::from_secs(60), Duration::from_secs(60));
        let reader = ConvergentReader::new(&client, budget);
        let ctx = CallContext::new().with_timeout(Duration::from_millis(20));

        let err = reader
            .read_by_name(&ctx, "testmodel", "testapplication")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ConvergeError::Read(ReadError::DeadlineExceeded { attempts: 1, .. })
        ));
    }

    #[tokio::test]
    async fn test_cancelled_context_issues_no_lookup() {
        let mut client = MockControlPlane::new();
        client.expect_application_info().never();

        let ctx = CallContext::new();
        ctx.cancellation_token().cancel();

        let reader = ConvergentReader::new(&client, fast_budget(5));
        let err = reader
            .read_by_name(&ctx, "testmodel", "testapplication")
            .await
            .unwrap_err();

        assert!(matches!(err, ConvergeError::Read(ReadError::Cancelled { .. })));
    }
}
