//! Bounded retries with multiplicative backoff for Tower services.
//!
//! A retry policy re-invokes an operation until it succeeds, fails with a
//! failure its classifier marks as non-retryable, or runs out of attempts.
//! Between attempts it waits out a [`BackoffSequence`]; the wait is
//! cancellable through a [`CancellationToken`], in which case the call ends
//! with [`PolicyError::Cancelled`] instead of consuming the remaining attempts.
//!
//! # Examples
//!
//! ```
//! use fortify_core::PolicyError;
//! use fortify_retry::RetryConfig;
//! use tower::{Layer, Service, ServiceExt};
//! use std::io::{Error, ErrorKind};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), PolicyError<Error>> {
//! let retry_config = RetryConfig::<Error>::builder()
//!     .max_attempts(5)
//!     .exponential_backoff(Duration::from_millis(100), 2.0)
//!     .max_delay(Duration::from_secs(2))
//!     .retry_on(|e: &Error| e.kind() == ErrorKind::TimedOut)
//!     .on_retry(|attempt, delay| {
//!         println!("attempt {} failed, retrying in {:?}", attempt, delay);
//!     })
//!     .build();
//!
//! let mut service = retry_config.layer().layer(
//!     tower::service_fn(|req: String| async move { Ok::<_, Error>(format!("echo {req}")) })
//!         .map_err(PolicyError::Inner),
//! );
//!
//! let response = service.ready().await?.call("ping".to_string()).await?;
//! assert_eq!(response, "echo ping");
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `metrics`: `retry_calls_total` (by result) and `retry_attempts_total`
//! - `tracing`: debug logs per retry, a warning on exhaustion
//! - `serde`: `Serialize`/`Deserialize` for [`BackoffConfig`]

mod backoff;
mod config;
mod events;
mod executor;
mod layer;

pub use backoff::{next_delay, BackoffConfig, BackoffSequence};
pub use config::{RetryConfig, RetryConfigBuilder};
pub use events::RetryEvent;
pub use executor::RetryExecutor;
pub use layer::RetryLayer;
pub use tokio_util::sync::CancellationToken;

use fortify_core::PolicyError;
use futures::future::BoxFuture;
#[cfg(feature = "metrics")]
use metrics::describe_counter;
#[cfg(feature = "metrics")]
use std::sync::Once;
use std::task::{Context, Poll};
use tower::{Service, ServiceExt};

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

pub(crate) fn describe_metrics() {
    #[cfg(feature = "metrics")]
    METRICS_INIT.call_once(|| {
        describe_counter!(
            "retry_calls_total",
            "Total number of calls through the retry policy, by final result"
        );
        describe_counter!(
            "retry_attempts_total",
            "Total number of retry attempts made after a failure"
        );
    });
}

/// A Tower [`Service`] that retries failed requests.
///
/// Each attempt calls a fresh clone of the inner service with a clone of the
/// request.
pub struct Retry<S, E> {
    inner: S,
    executor: RetryExecutor<E>,
}

impl<S, E> Retry<S, E> {
    /// Creates a new `Retry` service wrapping the given service.
    pub fn new(inner: S, executor: RetryExecutor<E>) -> Self {
        Self { inner, executor }
    }
}

impl<S, E> Clone for Retry<S, E>
where
    S: Clone,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            executor: self.executor.clone(),
        }
    }
}

impl<S, Req, E> Service<Req> for Retry<S, E>
where
    S: Service<Req, Error = PolicyError<E>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
    Req: Clone + Send + 'static,
    E: Send + 'static,
{
    type Response = S::Response;
    type Error = PolicyError<E>;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let service = self.inner.clone();
        let executor = self.executor.clone();

        Box::pin(async move {
            executor
                .execute(move || service.clone().oneshot(req.clone()))
                .await
        })
    }
}
