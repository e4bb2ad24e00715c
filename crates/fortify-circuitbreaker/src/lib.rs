//! Named, shared circuit breakers for Tower services.
//!
//! A circuit breaker prevents cascading failures by rejecting calls to a
//! dependency that keeps failing, giving it time to recover.
//!
//! ## States
//! - **Closed**: calls pass through; consecutive countable failures are tallied
//! - **Open**: the threshold was reached; calls fail fast with
//!   [`PolicyError::CircuitOpen`] without invoking the operation
//! - **Half-Open**: `reset_timeout` has elapsed; calls go through as trial
//!   calls. A success closes the circuit, a countable failure reopens it.
//!
//! Breakers live in a [`CircuitBreakerRegistry`] keyed by name. Every
//! operation configured with the same name shares one state machine, which is
//! why the registry is passed to [`CircuitBreakerLayer::new`].
//!
//! ## Usage
//!
//! ```rust
//! use fortify_core::PolicyError;
//! use fortify_circuitbreaker::{CircuitBreakerConfig, CircuitBreakerRegistry, CircuitState};
//! use tower::{Layer, Service, ServiceExt, service_fn};
//! use std::time::Duration;
//!
//! # #[derive(Debug)]
//! # struct Unavailable;
//! # async fn example() {
//! let registry = CircuitBreakerRegistry::new();
//! let layer = CircuitBreakerConfig::<Unavailable>::builder()
//!     .name("payments")
//!     .failure_threshold(2)
//!     .reset_timeout(Duration::from_secs(30))
//!     .on_state_transition(|from, to| println!("payments: {from} -> {to}"))
//!     .build()
//!     .layer(&registry);
//!
//! let mut service = layer.layer(
//!     service_fn(|_req: ()| async { Err::<(), _>(Unavailable) }).map_err(PolicyError::Inner),
//! );
//!
//! for _ in 0..2 {
//!     let _ = service.ready().await.unwrap().call(()).await;
//! }
//!
//! let rejected = service.ready().await.unwrap().call(()).await;
//! assert!(matches!(rejected, Err(PolicyError::CircuitOpen { .. })));
//! assert_eq!(layer.handle().current_state(), CircuitState::Open);
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `metrics`: enables metrics collection using the `metrics` crate
//! - `tracing`: enables logging and tracing using the `tracing` crate
//! - `serde`: enables `Serialize`/`Deserialize` for [`CircuitState`]

use fortify_core::PolicyError;
use futures::future::BoxFuture;
#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter, describe_gauge};
use std::sync::Arc;
#[cfg(feature = "metrics")]
use std::sync::Once;
use std::task::{Context, Poll};
use std::time::Instant;
use tower::{Service, ServiceExt};

use config::emit_transition;

pub use config::{CircuitBreakerConfig, CircuitBreakerConfigBuilder};
pub use events::CircuitBreakerEvent;
pub use layer::CircuitBreakerLayer;
pub use registry::CircuitBreakerRegistry;
pub use state::{
    CircuitBreakerHandle, CircuitBreakerState, CircuitSnapshot, CircuitState, StateTransition,
};

mod config;
mod events;
mod layer;
mod registry;
mod state;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

pub(crate) fn describe_metrics() {
    #[cfg(feature = "metrics")]
    METRICS_INIT.call_once(|| {
        describe_counter!(
            "circuitbreaker_calls_total",
            "Total number of calls through the circuit breaker"
        );
        describe_counter!(
            "circuitbreaker_transitions_total",
            "Total number of circuit breaker state transitions"
        );
        describe_gauge!(
            "circuitbreaker_state",
            "Current state of the circuit breaker (0 = closed, 1 = open, 2 = half-open)"
        );
    });
}

/// A Tower Service that applies circuit breaker logic to an inner service.
///
/// Before each call the breaker's state is read (which may move it from OPEN
/// to HALF_OPEN). An OPEN breaker rejects the call; otherwise the inner
/// service runs and its outcome is recorded: a success closes the circuit, an
/// [`PolicyError::Inner`] failure matching `fail_on` counts against it. Other
/// outcomes leave the breaker untouched.
pub struct CircuitBreaker<S, E> {
    inner: S,
    config: Arc<CircuitBreakerConfig<E>>,
    handle: CircuitBreakerHandle,
}

impl<S, E> CircuitBreaker<S, E> {
    pub(crate) fn new(
        inner: S,
        config: Arc<CircuitBreakerConfig<E>>,
        handle: CircuitBreakerHandle,
    ) -> Self {
        Self {
            inner,
            config,
            handle,
        }
    }

    /// The shared breaker behind this service.
    pub fn handle(&self) -> &CircuitBreakerHandle {
        &self.handle
    }

    /// Returns the current state of the circuit.
    pub fn state(&self) -> CircuitState {
        self.handle.current_state()
    }

    /// Forces the circuit into the open state.
    pub fn force_open(&self) {
        if let Some(transition) = self.handle.force_open() {
            emit_transition(&self.config, &self.handle, transition);
        }
    }

    /// Resets the circuit to the closed state and clears the count.
    pub fn reset(&self) {
        if let Some(transition) = self.handle.reset() {
            emit_transition(&self.config, &self.handle, transition);
        }
    }
}

impl<S, E> Clone for CircuitBreaker<S, E>
where
    S: Clone,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            config: Arc::clone(&self.config),
            handle: self.handle.clone(),
        }
    }
}

impl<S, Req, E> Service<Req> for CircuitBreaker<S, E>
where
    S: Service<Req, Error = PolicyError<E>> + Clone + Send + 'static,
    S::Response: Send + 'static,
    S::Future: Send + 'static,
    Req: Send + 'static,
    E: Send + 'static,
{
    type Response = S::Response;
    type Error = PolicyError<E>;
    type Future = BoxFuture<'static, Result<S::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let config = Arc::clone(&self.config);
        let handle = self.handle.clone();
        let inner = self.inner.clone();

        Box::pin(async move {
            let (state, transition) = handle.poll_state();
            if let Some(transition) = transition {
                emit_transition(&config, &handle, transition);
            }

            if state == CircuitState::Open {
                config.event_listeners.emit_with(|| CircuitBreakerEvent::CallRejected {
                    policy_name: config.name.clone(),
                    timestamp: Instant::now(),
                });

                #[cfg(feature = "tracing")]
                tracing::debug!(breaker = %config.name, "circuit breaker is OPEN, rejecting call");

                #[cfg(feature = "metrics")]
                counter!(
                    "circuitbreaker_calls_total",
                    "circuitbreaker" => config.name.clone(),
                    "outcome" => "rejected"
                )
                .increment(1);

                return Err(PolicyError::CircuitOpen {
                    name: handle.name().to_string(),
                });
            }

            config.event_listeners.emit_with(|| CircuitBreakerEvent::CallPermitted {
                policy_name: config.name.clone(),
                timestamp: Instant::now(),
                state,
            });

            #[cfg(feature = "tracing")]
            tracing::trace!(
                breaker = %config.name,
                state = %state,
                "circuit breaker permitted call"
            );

            let result = inner.oneshot(req).await;

            match &result {
                Ok(_) => {
                    let transition = handle.record_success();
                    config.event_listeners.emit_with(|| CircuitBreakerEvent::SuccessRecorded {
                        policy_name: config.name.clone(),
                        timestamp: Instant::now(),
                        state,
                    });
                    if let Some(transition) = transition {
                        emit_transition(&config, &handle, transition);
                    }

                    #[cfg(feature = "metrics")]
                    counter!(
                        "circuitbreaker_calls_total",
                        "circuitbreaker" => config.name.clone(),
                        "outcome" => "success"
                    )
                    .increment(1);
                }
                Err(PolicyError::Inner(error)) if config.is_countable(error) => {
                    let transition = handle.record_failure();
                    config.event_listeners.emit_with(|| CircuitBreakerEvent::FailureRecorded {
                        policy_name: config.name.clone(),
                        timestamp: Instant::now(),
                        state,
                        failure_count: handle.failure_count(),
                    });
                    if let Some(transition) = transition {
                        emit_transition(&config, &handle, transition);
                    }

                    #[cfg(feature = "metrics")]
                    counter!(
                        "circuitbreaker_calls_total",
                        "circuitbreaker" => config.name.clone(),
                        "outcome" => "failure"
                    )
                    .increment(1);
                }
                Err(_) => {
                    #[cfg(feature = "metrics")]
                    counter!(
                        "circuitbreaker_calls_total",
                        "circuitbreaker" => config.name.clone(),
                        "outcome" => "ignored"
                    )
                    .increment(1);
                }
            }

            result
        })
    }
}
