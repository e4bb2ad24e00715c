//! Circuit breaker tests.
//!
//! Test organization:
//! - thresholds.rs: counting consecutive failures up to the threshold
//! - half_open.rs: reset timeout, trial calls, reopening
//! - classification.rs: which failures count against the breaker
//! - shared_state.rs: registry sharing and concurrent callers
//! - events.rs: listener callbacks

mod classification;
mod half_open;
mod thresholds;

use fortify_circuitbreaker::{CircuitBreakerConfig, CircuitBreakerRegistry};
use fortify_core::PolicyError;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tower::util::{BoxCloneService, Oneshot};
use tower::{Layer, Service, ServiceExt};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Fault {
    Unavailable,
    NotFound,
}

impl std::fmt::Display for Fault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Fault::Unavailable => write!(f, "backend unavailable"),
            Fault::NotFound => write!(f, "item not found"),
        }
    }
}

/// A downstream dependency that can be switched between healthy and failing.
#[derive(Clone, Default)]
pub(crate) struct Backend {
    failing: Arc<AtomicBool>,
    not_found: Arc<AtomicBool>,
    calls: Arc<AtomicUsize>,
}

impl Backend {
    pub(crate) fn failing() -> Self {
        let backend = Self::default();
        backend.fail();
        backend
    }

    pub(crate) fn fail(&self) {
        self.not_found.store(false, Ordering::SeqCst);
        self.failing.store(true, Ordering::SeqCst);
    }

    pub(crate) fn fail_with_not_found(&self) {
        self.not_found.store(true, Ordering::SeqCst);
        self.failing.store(true, Ordering::SeqCst);
    }

    pub(crate) fn recover(&self) {
        self.failing.store(false, Ordering::SeqCst);
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn service(&self) -> BoxCloneService<u32, String, PolicyError<Fault>> {
        let backend = self.clone();
        let service = tower::service_fn(move |req: u32| {
            backend.calls.fetch_add(1, Ordering::SeqCst);
            let outcome = match (
                backend.failing.load(Ordering::SeqCst),
                backend.not_found.load(Ordering::SeqCst),
            ) {
                (false, _) => Ok(format!("item {req}")),
                (true, false) => Err(Fault::Unavailable),
                (true, true) => Err(Fault::NotFound),
            };
            async move { outcome }
        })
        .map_err(PolicyError::Inner);
        BoxCloneService::new(service)
    }
}

pub(crate) fn config(
    name: &str,
    threshold: u32,
    reset_timeout: Duration,
) -> CircuitBreakerConfig<Fault> {
    CircuitBreakerConfig::builder()
        .name(name)
        .failure_threshold(threshold)
        .reset_timeout(reset_timeout)
        .build()
}

/// Wraps `backend` in the breaker named by `config`, acquired from `registry`.
pub(crate) fn protect(
    backend: &Backend,
    registry: &CircuitBreakerRegistry,
    config: CircuitBreakerConfig<Fault>,
) -> BoxCloneService<u32, String, PolicyError<Fault>> {
    BoxCloneService::new(config.layer(registry).layer(backend.service()))
}

/// Calls a clone of `service` once.
pub(crate) fn call<S>(service: &S, req: u32) -> Oneshot<S, u32>
where
    S: Service<u32, Response = String, Error = PolicyError<Fault>> + Clone,
{
    service.clone().oneshot(req)
}
