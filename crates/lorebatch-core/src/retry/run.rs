//! Retry loop: run a closure until success, exhaustion, or cancellation.

use std::fmt;
use std::time::SystemTime;

use super::error::RetryError;
use super::policy::{RetryDecision, RetryPolicy};
use super::sleep::{Sleeper, ThreadSleeper};
use crate::control::CancelToken;

/// How one attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Succeeded,
    Failed(String),
}

/// Record of a single execution attempt; lives only for one retry loop.
#[derive(Debug, Clone)]
pub struct RetryAttempt {
    /// 0-based attempt index.
    pub index: u32,
    pub at: SystemTime,
    pub outcome: AttemptOutcome,
}

/// Runs `operation` under `policy`, sleeping on the calling thread between attempts.
///
/// Attempts run 0..=max_retries. The first `Ok` is returned immediately; after the
/// last failure the last error is returned inside [`RetryError::Exhausted`].
pub fn execute_with_retry<T, E, F>(
    policy: &RetryPolicy,
    operation_name: &str,
    operation: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Result<T, E>,
    E: fmt::Display,
{
    execute_with_retry_using(policy, operation_name, &ThreadSleeper, None, operation)
}

/// Like [`execute_with_retry`] with an explicit sleeper and optional cancel token.
///
/// The token is checked before every attempt and again after every backoff sleep.
pub fn execute_with_retry_using<T, E, F, S>(
    policy: &RetryPolicy,
    operation_name: &str,
    sleeper: &S,
    cancel: Option<&CancelToken>,
    mut operation: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Result<T, E>,
    E: fmt::Display,
    S: Sleeper + ?Sized,
{
    let total = policy.total_attempts();
    let mut history: Vec<RetryAttempt> = Vec::with_capacity(total.min(16) as usize);
    let mut attempt = 0u32;

    let source = loop {
        if is_cancelled(cancel) {
            tracing::warn!(
                operation = operation_name,
                attempts = attempt,
                "cancelled before attempt"
            );
            return Err(RetryError::Cancelled {
                operation: operation_name.to_string(),
                attempts: attempt,
            });
        }

        let error = match operation() {
            Ok(value) => {
                history.push(RetryAttempt {
                    index: attempt,
                    at: SystemTime::now(),
                    outcome: AttemptOutcome::Succeeded,
                });
                tracing::debug!(
                    operation = operation_name,
                    attempts = history.len(),
                    "operation completed"
                );
                if attempt > 0 {
                    tracing::info!(
                        operation = operation_name,
                        attempt = attempt + 1,
                        "{} succeeded on retry attempt {}",
                        operation_name,
                        attempt + 1
                    );
                }
                return Ok(value);
            }
            Err(e) => e,
        };
        tracing::warn!(
            operation = operation_name,
            attempt = attempt + 1,
            total,
            error = %error,
            "{} failed on attempt {}",
            operation_name,
            attempt + 1
        );
        history.push(RetryAttempt {
            index: attempt,
            at: SystemTime::now(),
            outcome: AttemptOutcome::Failed(error.to_string()),
        });

        match policy.decide(attempt) {
            RetryDecision::NoRetry => break error,
            RetryDecision::RetryAfter(delay) => {
                attempt += 1;
                tracing::info!(
                    operation = operation_name,
                    attempt = attempt + 1,
                    total,
                    delay_secs = delay.as_secs_f64(),
                    "retrying {} (attempt {}/{}) after {:?}",
                    operation_name,
                    attempt + 1,
                    total,
                    delay
                );
                sleeper.sleep(delay);
                if is_cancelled(cancel) {
                    tracing::warn!(
                        operation = operation_name,
                        attempts = attempt,
                        "cancelled during backoff"
                    );
                    return Err(RetryError::Cancelled {
                        operation: operation_name.to_string(),
                        attempts: attempt,
                    });
                }
            }
        }
    };

    let attempts = history.len() as u32;
    tracing::error!(
        operation = operation_name,
        attempts,
        first_failure = ?history.first().map(|a| a.at),
        "{} failed after {} attempts",
        operation_name,
        attempts
    );
    Err(RetryError::Exhausted {
        operation: operation_name.to_string(),
        attempts,
        source,
    })
}

fn is_cancelled(cancel: Option<&CancelToken>) -> bool {
    cancel.is_some_and(CancelToken::is_cancelled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingSleeper {
        slept: RefCell<Vec<Duration>>,
    }

    impl Sleeper for RecordingSleeper {
        fn sleep(&self, duration: Duration) {
            self.slept.borrow_mut().push(duration);
        }
    }

    #[derive(Debug, PartialEq)]
    struct Boom(u32);

    impl fmt::Display for Boom {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "boom #{}", self.0)
        }
    }

    #[test]
    fn always_failing_is_attempted_max_retries_plus_one_times() {
        for n in 0..5u32 {
            let policy = RetryPolicy::new(n, Duration::from_secs(1));
            let sleeper = RecordingSleeper::default();
            let calls = Cell::new(0u32);
            let res: Result<(), _> =
                execute_with_retry_using(&policy, "always_fails", &sleeper, None, || {
                    calls.set(calls.get() + 1);
                    Err(Boom(calls.get()))
                });
            assert_eq!(calls.get(), n + 1);
            match res {
                Err(RetryError::Exhausted { attempts, source, operation }) => {
                    assert_eq!(attempts, n + 1);
                    assert_eq!(source, Boom(n + 1), "last error is surfaced");
                    assert_eq!(operation, "always_fails");
                }
                other => panic!("expected Exhausted, got {:?}", other.map(|_| ())),
            }
        }
    }

    #[test]
    fn success_on_attempt_k_stops_retrying() {
        let policy = RetryPolicy::new(4, Duration::from_secs(1));
        for k in 0..=4u32 {
            let sleeper = RecordingSleeper::default();
            let calls = Cell::new(0u32);
            let res = execute_with_retry_using(&policy, "flaky", &sleeper, None, || {
                let attempt = calls.get();
                calls.set(attempt + 1);
                if attempt == k {
                    Ok(attempt)
                } else {
                    Err(Boom(attempt))
                }
            });
            assert_eq!(res.unwrap(), k);
            assert_eq!(calls.get(), k + 1);
            assert_eq!(sleeper.slept.borrow().len() as u32, k);
        }
    }

    #[test]
    fn backoff_delays_follow_base_times_power_of_two() {
        let policy = RetryPolicy::new(3, Duration::from_secs(30));
        let sleeper = RecordingSleeper::default();
        let res: Result<(), _> =
            execute_with_retry_using(&policy, "submit batch", &sleeper, None, || Err(Boom(0)));
        assert!(res.is_err());
        assert_eq!(
            *sleeper.slept.borrow(),
            vec![
                Duration::from_secs(30),
                Duration::from_secs(60),
                Duration::from_secs(120),
            ]
        );
    }

    #[test]
    fn immediate_success_never_sleeps() {
        let policy = RetryPolicy::default();
        let sleeper = RecordingSleeper::default();
        let res: Result<&str, RetryError<Boom>> =
            execute_with_retry_using(&policy, "ok", &sleeper, None, || Ok("success"));
        assert_eq!(res.unwrap(), "success");
        assert!(sleeper.slept.borrow().is_empty());
    }

    #[test]
    fn cancel_during_backoff_stops_further_attempts() {
        struct CancellingSleeper(CancelToken);
        impl Sleeper for CancellingSleeper {
            fn sleep(&self, _duration: Duration) {
                self.0.cancel();
            }
        }

        let token = CancelToken::new();
        let sleeper = CancellingSleeper(token.clone());
        let policy = RetryPolicy::new(5, Duration::from_secs(1));
        let calls = Cell::new(0u32);
        let res: Result<(), _> =
            execute_with_retry_using(&policy, "poll", &sleeper, Some(&token), || {
                calls.set(calls.get() + 1);
                Err(Boom(0))
            });
        assert_eq!(calls.get(), 1);
        match res {
            Err(e @ RetryError::Cancelled { .. }) => {
                assert_eq!(e.attempts(), 1);
                assert_eq!(e.operation(), "poll");
                assert!(e.into_source().is_none());
            }
            other => panic!("expected Cancelled, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn already_cancelled_token_makes_no_attempt() {
        let token = CancelToken::new();
        token.cancel();
        let calls = Cell::new(0u32);
        let res: Result<(), RetryError<Boom>> = execute_with_retry_using(
            &RetryPolicy::default(),
            "submit",
            &RecordingSleeper::default(),
            Some(&token),
            || {
                calls.set(calls.get() + 1);
                Ok(())
            },
        );
        assert_eq!(calls.get(), 0);
        assert!(matches!(res, Err(RetryError::Cancelled { attempts: 0, .. })));
    }

    #[test]
    fn exhausted_error_message_names_operation_and_attempts() {
        let policy = RetryPolicy::new(1, Duration::ZERO);
        let err =
            execute_with_retry(&policy, "retrieve results", || Err::<(), _>(Boom(7))).unwrap_err();
        assert_eq!(err.to_string(), "retrieve results failed after 2 attempt(s): boom #7");
    }
}
