//! Which failures count against the breaker.

use super::{Backend, Fault, call, config};
use fortify_circuitbreaker::{CircuitBreakerConfig, CircuitBreakerRegistry, CircuitState};
use fortify_core::PolicyError;
use std::time::Duration;
use tower::{Layer, ServiceExt};

fn only_unavailable(name: &str) -> CircuitBreakerConfig<Fault> {
    CircuitBreakerConfig::builder()
        .name(name)
        .failure_threshold(1)
        .reset_timeout(Duration::from_secs(60))
        .fail_on(|f: &Fault| *f == Fault::Unavailable)
        .build()
}

#[tokio::test]
async fn non_countable_failures_leave_the_state_untouched() {
    let registry = CircuitBreakerRegistry::new();
    let backend = Backend::default();
    backend.fail_with_not_found();
    let service = only_unavailable("catalog").layer(&registry).layer(backend.service());
    let handle = registry.get("catalog").unwrap();

    for _ in 0..5 {
        assert_eq!(call(&service, 1).await, Err(PolicyError::Inner(Fault::NotFound)));
    }
    assert_eq!(handle.failure_count(), 0);
    assert_eq!(handle.current_state(), CircuitState::Closed);
}

#[tokio::test]
async fn non_countable_failure_does_not_reset_the_count() {
    let registry = CircuitBreakerRegistry::new();
    let backend = Backend::failing();
    let config = CircuitBreakerConfig::<Fault>::builder()
        .name("catalog")
        .failure_threshold(2)
        .fail_on(|f: &Fault| *f == Fault::Unavailable)
        .build();
    let service = config.layer(&registry).layer(backend.service());
    let handle = registry.get("catalog").unwrap();

    let _ = call(&service, 1).await;
    backend.fail_with_not_found();
    let _ = call(&service, 1).await;
    assert_eq!(handle.failure_count(), 1);

    backend.fail();
    let _ = call(&service, 1).await;
    assert_eq!(handle.current_state(), CircuitState::Open);
}

#[tokio::test]
async fn ignored_kinds_never_count() {
    let registry = CircuitBreakerRegistry::new();
    let backend = Backend::default();
    backend.fail_with_not_found();
    let config = CircuitBreakerConfig::<Fault>::builder()
        .name("catalog")
        .failure_threshold(1)
        .ignore(|f: &Fault| *f == Fault::NotFound)
        .build();
    let service = config.layer(&registry).layer(backend.service());

    let _ = call(&service, 1).await;
    assert_eq!(registry.get("catalog").unwrap().failure_count(), 0);

    backend.fail();
    let _ = call(&service, 1).await;
    assert!(call(&service, 1).await.unwrap_err().is_circuit_open());
}

#[tokio::test]
async fn synthetic_failures_are_not_recorded() {
    let registry = CircuitBreakerRegistry::new();
    let service = config("edge", 1, Duration::from_secs(60)).layer(&registry).layer(
        tower::service_fn(|_req: u32| async {
            Err::<String, _>(PolicyError::<Fault>::Cancelled)
        }),
    );

    assert_eq!(service.clone().oneshot(1).await, Err(PolicyError::Cancelled));
    assert_eq!(registry.get("edge").unwrap().failure_count(), 0);
}
