//! Typed fallback-handler dispatch for Tower services.
//!
//! When the inner service fails with an eligible failure, the fallback looks
//! up the handler registered under its `handler_id` and returns that
//! handler's result instead. Handlers are registered ahead of time in a
//! [`FallbackHandlers`] set whose types are pinned to the protected
//! operation, so a handler with the wrong shape does not compile.
//!
//! Two handler forms exist per id. The failure-aware form receives the
//! request and the [`PolicyError`] that triggered it and is preferred; the
//! arguments-only form is used when it is the only one registered.
//!
//! ```rust
//! use fortify_core::PolicyError;
//! use fortify_fallback::{FallbackConfig, FallbackHandlers, FallbackLayer};
//! use tower::{Layer, ServiceExt};
//!
//! #[derive(Debug)]
//! enum LookupError {
//!     Unavailable,
//! }
//!
//! # async fn example() -> Result<(), PolicyError<LookupError>> {
//! let mut handlers = FallbackHandlers::<u64, String, LookupError>::new();
//! handlers
//!     .register_with_failure("profile_cache", |user_id: u64, failure| async move {
//!         Ok(format!("cached profile {user_id} ({failure:?})"))
//!     })
//!     .expect("unique handler");
//!
//! let config = FallbackConfig::<LookupError>::builder()
//!     .handler_id("profile_cache")
//!     .apply_on(|e: &LookupError| matches!(e, LookupError::Unavailable))
//!     .on_fallback_applied(|handler_id| println!("served by {handler_id}"))
//!     .build();
//!
//! let service = FallbackLayer::new(config, handlers).layer(
//!     tower::service_fn(|_user_id: u64| async { Err::<String, _>(LookupError::Unavailable) })
//!         .map_err(PolicyError::Inner),
//! );
//!
//! let profile = service.oneshot(42).await?;
//! assert!(profile.starts_with("cached profile 42"));
//! # Ok(())
//! # }
//! ```
//!
//! # Errors
//!
//! - An ineligible failure is returned unchanged.
//! - A handler's own failure is returned as [`PolicyError::Inner`].
//! - An eligible failure with no handler registered becomes
//!   [`PolicyError::FallbackResolution`], carrying the original as its cause.
//!
//! Cancellations and resolution errors are never eligible. Circuit-open
//! rejections are eligible when `apply_on` names no kinds; see
//! [`FallbackConfigBuilder::apply_on_circuit_open`] and
//! [`FallbackConfigBuilder::except_circuit_open`].
//!
//! ## Feature Flags
//!
//! - `metrics`: `fallback_calls_total` by result and handler form
//! - `tracing`: debug logs when a handler runs, a warning when none is found

mod config;
mod error;
mod events;
mod handlers;
mod layer;
mod resolver;

pub use config::{CircuitOpenPolicy, FallbackConfig, FallbackConfigBuilder};
pub use error::{HandlerForm, RegistrationError};
pub use events::FallbackEvent;
pub use handlers::{ArgsOnlyFn, FallbackHandlers, WithFailureFn};
pub use layer::FallbackLayer;
pub use resolver::FallbackResolver;

use fortify_core::PolicyError;
use futures::future::BoxFuture;
#[cfg(feature = "metrics")]
use metrics::describe_counter;
#[cfg(feature = "metrics")]
use std::sync::Once;
use std::task::{Context, Poll};
use tower::ServiceExt;
use tower_service::Service;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

pub(crate) fn describe_metrics() {
    #[cfg(feature = "metrics")]
    METRICS_INIT.call_once(|| {
        describe_counter!(
            "fallback_calls_total",
            "Total number of calls through the fallback policy, by result"
        );
    });
}

/// A Tower service that substitutes a handler's result for eligible failures.
///
/// The request is cloned before the inner call so the handler receives the
/// original arguments.
pub struct Fallback<S, Req, Res, E> {
    inner: S,
    resolver: FallbackResolver<Req, Res, E>,
}

impl<S, Req, Res, E> Fallback<S, Req, Res, E> {
    /// Creates a new `Fallback` service wrapping the given service.
    pub fn new(inner: S, resolver: FallbackResolver<Req, Res, E>) -> Self {
        Self { inner, resolver }
    }

    /// The resolver consulted on failure.
    pub fn resolver(&self) -> &FallbackResolver<Req, Res, E> {
        &self.resolver
    }
}

impl<S, Req, Res, E> Clone for Fallback<S, Req, Res, E>
where
    S: Clone,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            resolver: self.resolver.clone(),
        }
    }
}

impl<S, Req, Res, E> Service<Req> for Fallback<S, Req, Res, E>
where
    S: Service<Req, Response = Res, Error = PolicyError<E>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    Req: Clone + Send + 'static,
    Res: Send + 'static,
    E: Send + 'static,
{
    type Response = Res;
    type Error = PolicyError<E>;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let service = self.inner.clone();
        let resolver = self.resolver.clone();
        let args = req.clone();

        Box::pin(async move {
            match service.oneshot(req).await {
                Ok(response) => {
                    resolver.record_success();
                    Ok(response)
                }
                Err(failure) => resolver.recover(args, failure).await,
            }
        })
    }
}
