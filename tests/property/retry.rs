//! Property tests for the retry policy.
//!
//! Invariants tested:
//! - Never exceeds max_attempts
//! - Stops at the first success
//! - Non-retryable failures are never retried

use fortify_core::PolicyError;
use fortify_retry::{RetryConfig, RetryExecutor};
use proptest::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::runtime::Runtime;

/// A cloneable error type for testing
#[derive(Debug, Clone, PartialEq)]
enum TestError {
    Retryable,
    Fatal,
}

fn executor(max_attempts: usize) -> RetryExecutor<TestError> {
    RetryExecutor::new(
        RetryConfig::<TestError>::builder()
            .max_attempts(max_attempts)
            .fixed_backoff(Duration::from_millis(1))
            .retry_on(|e: &TestError| *e == TestError::Retryable)
            .build(),
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// Property: attempts = min(failures + 1, max_attempts)
    #[test]
    fn attempts_are_bounded(
        max_attempts in 1usize..=8,
        failures in 0usize..=10,
    ) {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let calls = Arc::new(AtomicUsize::new(0));
            let executor = executor(max_attempts);

            let result = executor
                .execute(|| {
                    let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    async move {
                        if attempt <= failures {
                            Err(PolicyError::Inner(TestError::Retryable))
                        } else {
                            Ok(attempt)
                        }
                    }
                })
                .await;

            let expected_calls = (failures + 1).min(max_attempts);
            prop_assert_eq!(calls.load(Ordering::SeqCst), expected_calls);
            if failures < max_attempts {
                prop_assert_eq!(result, Ok(failures + 1));
            } else {
                prop_assert_eq!(result, Err(PolicyError::Inner(TestError::Retryable)));
            }
            Ok(())
        })?;
    }

    /// Property: a non-retryable failure ends the loop on the spot
    #[test]
    fn fatal_failure_is_never_retried(max_attempts in 1usize..=8) {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let calls = Arc::new(AtomicUsize::new(0));
            let result: Result<(), _> = executor(max_attempts)
                .execute(|| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err(PolicyError::Inner(TestError::Fatal)) }
                })
                .await;

            prop_assert_eq!(calls.load(Ordering::SeqCst), 1);
            prop_assert_eq!(result, Err(PolicyError::Inner(TestError::Fatal)));
            Ok(())
        })?;
    }
}
