//! Retry, circuit breaker and fallback policies composed around Tower services.
//!
//! `fortify` wraps an operation (any cloneable [`tower::Service`]) in up to
//! three policies and always layers them the same way, outermost first:
//!
//! 1. **Fallback**: substitutes a registered handler's result for failures the
//!    inner layers give up on.
//! 2. **Circuit breaker**: rejects calls while the named breaker is OPEN and
//!    records one outcome per logical call.
//! 3. **Retry**: re-invokes the raw operation with backoff.
//!
//! Each policy also lives in its own crate, re-exported here as
//! [`retry`], [`circuitbreaker`] and [`fallback`].
//!
//! # Example
//!
//! ```rust
//! use fortify::circuitbreaker::{CircuitBreakerConfig, CircuitBreakerRegistry};
//! use fortify::fallback::{FallbackConfig, FallbackHandlers};
//! use fortify::retry::RetryConfig;
//! use fortify::{wrap, PolicyKind, Policies};
//! use std::time::Duration;
//!
//! #[derive(Debug, Clone, PartialEq)]
//! enum QuoteError {
//!     Timeout,
//!     UnknownSymbol,
//! }
//!
//! # #[tokio::main(flavor = "current_thread", start_paused = true)]
//! # async fn main() {
//! let registry = CircuitBreakerRegistry::new();
//!
//! let mut handlers = FallbackHandlers::<String, f64, QuoteError>::new();
//! handlers
//!     .register("last_known_quote", |_symbol: String| async { Ok(99.5) })
//!     .expect("unique handler");
//!
//! let policies = Policies::new()
//!     .retry(
//!         RetryConfig::<QuoteError>::builder()
//!             .max_attempts(3)
//!             .exponential_backoff(Duration::from_millis(50), 2.0)
//!             .retry_on(|e: &QuoteError| *e == QuoteError::Timeout)
//!             .build(),
//!     )
//!     .circuit_breaker(
//!         CircuitBreakerConfig::<QuoteError>::builder()
//!             .name("quotes")
//!             .failure_threshold(5)
//!             .reset_timeout(Duration::from_secs(30))
//!             .build(),
//!     )
//!     .fallback(
//!         FallbackConfig::<QuoteError>::builder().handler_id("last_known_quote").build(),
//!         handlers,
//!     );
//!
//! let quote = wrap(
//!     tower::service_fn(|_symbol: String| async { Err::<f64, _>(QuoteError::Timeout) }),
//!     &registry,
//!     policies,
//! );
//!
//! assert_eq!(
//!     quote.order(),
//!     &[PolicyKind::Fallback, PolicyKind::CircuitBreaker, PolicyKind::Retry]
//! );
//! assert_eq!(quote.invoke("ACME".to_string()).await, Ok(99.5));
//! assert_eq!(registry.get("quotes").unwrap().failure_count(), 1);
//! # }
//! ```
//!
//! # Failures
//!
//! A wrapped call ends in a success, a fallback handler's result, or one of:
//!
//! - [`PolicyError::Inner`]: the operation's own failure, unchanged, or the
//!   failure raised by a fallback handler
//! - [`PolicyError::CircuitOpen`]: the breaker rejected the call
//! - [`PolicyError::FallbackResolution`]: a fallback was due but no handler
//!   was registered under its id
//! - [`PolicyError::Cancelled`]: the retry loop was cancelled during backoff
//!
//! # Feature Flags
//!
//! - `tracing`, `metrics`, `serde`: forwarded to every policy crate
//! - `full`: all of the above

pub use fortify_circuitbreaker as circuitbreaker;
pub use fortify_core as core;
pub use fortify_fallback as fallback;
pub use fortify_retry as retry;

pub use fortify_core::{Classifier, ConfigError, ErrorType, PolicyError};

mod policies;
mod stack;

pub use policies::Policies;
pub use stack::{PolicyKind, PolicyStack, Protected};

use fortify_circuitbreaker::CircuitBreakerRegistry;
use tower::{Layer, Service, ServiceExt};

/// Wraps `operation` in `policies`.
///
/// The operation's error is lifted into [`PolicyError::Inner`]; the returned
/// [`Protected`] service keeps its request and response types. Any circuit
/// breaker is acquired from `registry` by name, so operations configured with
/// the same breaker name share one breaker.
pub fn wrap<S, Req, Res, E>(
    operation: S,
    registry: &CircuitBreakerRegistry,
    policies: Policies<Req, Res, E>,
) -> Protected<Req, Res, E>
where
    S: Service<Req, Response = Res, Error = E> + Clone + Send + 'static,
    S::Future: Send + 'static,
    Req: Clone + Send + 'static,
    Res: Send + 'static,
    E: Send + 'static,
{
    PolicyStack::new(policies, registry).layer(operation.map_err(PolicyError::Inner))
}
