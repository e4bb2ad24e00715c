//! The retry loop.

use crate::config::RetryConfig;
use crate::events::RetryEvent;
use fortify_core::PolicyError;
#[cfg(feature = "metrics")]
use metrics::counter;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Drives repeated invocations of an operation.
///
/// Only [`PolicyError::Inner`] failures are classified; synthetic failures
/// such as [`PolicyError::CircuitOpen`] are returned immediately without
/// consuming further attempts.
///
/// ```rust
/// use fortify_core::PolicyError;
/// use fortify_retry::{RetryConfig, RetryExecutor};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread", start_paused = true)]
/// # async fn main() {
/// let executor = RetryExecutor::new(
///     RetryConfig::<&str>::builder()
///         .max_attempts(3)
///         .fixed_backoff(Duration::from_millis(10))
///         .build(),
/// );
///
/// let calls = AtomicUsize::new(0);
/// let result = executor
///     .execute(|| async {
///         if calls.fetch_add(1, Ordering::SeqCst) < 2 {
///             Err(PolicyError::Inner("flaky"))
///         } else {
///             Ok("done")
///         }
///     })
///     .await;
///
/// assert_eq!(result, Ok("done"));
/// assert_eq!(calls.load(Ordering::SeqCst), 3);
/// # }
/// ```
pub struct RetryExecutor<E> {
    config: Arc<RetryConfig<E>>,
}

impl<E> Clone for RetryExecutor<E> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
        }
    }
}

impl<E> RetryExecutor<E> {
    /// Creates an executor owning `config`.
    pub fn new(config: RetryConfig<E>) -> Self {
        Self::from_shared(Arc::new(config))
    }

    /// Creates an executor over an already shared configuration.
    pub fn from_shared(config: Arc<RetryConfig<E>>) -> Self {
        Self { config }
    }

    /// The configuration driving this executor.
    pub fn config(&self) -> &RetryConfig<E> {
        &self.config
    }

    /// Runs `operation` until it succeeds, fails with a non-retryable error or
    /// runs out of attempts.
    ///
    /// Honours the configuration's cancellation token, if one was set.
    pub async fn execute<T, F, Fut>(&self, operation: F) -> Result<T, PolicyError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, PolicyError<E>>>,
    {
        self.run(operation, self.config.cancellation.as_ref()).await
    }

    /// Like [`execute`](Self::execute), but aborts with
    /// [`PolicyError::Cancelled`] as soon as `token` fires during a backoff
    /// wait.
    pub async fn execute_with_cancel<T, F, Fut>(
        &self,
        operation: F,
        token: &CancellationToken,
    ) -> Result<T, PolicyError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, PolicyError<E>>>,
    {
        self.run(operation, Some(token)).await
    }

    async fn run<T, F, Fut>(
        &self,
        mut operation: F,
        token: Option<&CancellationToken>,
    ) -> Result<T, PolicyError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, PolicyError<E>>>,
    {
        let config = &*self.config;
        let mut delays = config.backoff.sequence();
        let mut attempt = 1;

        loop {
            let error = match operation().await {
                Ok(response) => {
                    config.event_listeners.emit_with(|| RetryEvent::Success {
                        policy_name: config.name.clone(),
                        timestamp: Instant::now(),
                        attempts: attempt,
                    });

                    #[cfg(feature = "metrics")]
                    counter!(
                        "retry_calls_total",
                        "retry" => config.name.clone(),
                        "result" => "success"
                    )
                    .increment(1);

                    return Ok(response);
                }
                Err(PolicyError::Inner(error)) => error,
                Err(other) => return Err(other),
            };

            if !config.should_retry(&error) {
                config.event_listeners.emit_with(|| RetryEvent::IgnoredError {
                    policy_name: config.name.clone(),
                    timestamp: Instant::now(),
                    attempt,
                });

                #[cfg(feature = "metrics")]
                counter!(
                    "retry_calls_total",
                    "retry" => config.name.clone(),
                    "result" => "not_retryable"
                )
                .increment(1);

                return Err(PolicyError::Inner(error));
            }

            if attempt >= config.max_attempts {
                config.event_listeners.emit_with(|| RetryEvent::Error {
                    policy_name: config.name.clone(),
                    timestamp: Instant::now(),
                    attempts: attempt,
                });

                #[cfg(feature = "tracing")]
                tracing::warn!(
                    retry = %config.name,
                    attempts = attempt,
                    "retry attempts exhausted"
                );

                #[cfg(feature = "metrics")]
                counter!(
                    "retry_calls_total",
                    "retry" => config.name.clone(),
                    "result" => "exhausted"
                )
                .increment(1);

                return Err(PolicyError::Inner(error));
            }

            let delay = delays.advance();
            config.event_listeners.emit_with(|| RetryEvent::Retry {
                policy_name: config.name.clone(),
                timestamp: Instant::now(),
                attempt,
                delay,
            });

            #[cfg(feature = "tracing")]
            tracing::debug!(
                retry = %config.name,
                attempt,
                max_attempts = config.max_attempts,
                delay = ?delay,
                "retrying after failure"
            );

            #[cfg(feature = "metrics")]
            counter!("retry_attempts_total", "retry" => config.name.clone()).increment(1);

            if wait(delay, token).await.is_err() {
                config.event_listeners.emit_with(|| RetryEvent::Cancelled {
                    policy_name: config.name.clone(),
                    timestamp: Instant::now(),
                    attempt,
                });

                #[cfg(feature = "tracing")]
                tracing::debug!(retry = %config.name, attempt, "retry cancelled during backoff");

                #[cfg(feature = "metrics")]
                counter!(
                    "retry_calls_total",
                    "retry" => config.name.clone(),
                    "result" => "cancelled"
                )
                .increment(1);

                return Err(PolicyError::Cancelled);
            }

            attempt += 1;
        }
    }
}

/// Marker for a wait cut short by cancellation.
struct Interrupted;

async fn wait(delay: Duration, token: Option<&CancellationToken>) -> Result<(), Interrupted> {
    match token {
        Some(token) => tokio::select! {
            biased;
            _ = token.cancelled() => Err(Interrupted),
            _ = tokio::time::sleep(delay) => Ok(()),
        },
        None => {
            tokio::time::sleep(delay).await;
            Ok(())
        }
    }
}
