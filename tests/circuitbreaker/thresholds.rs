//! Consecutive failure counting.

use super::{Backend, Fault, call, config, protect};
use fortify_circuitbreaker::{CircuitBreakerRegistry, CircuitState};
use fortify_core::PolicyError;
use std::time::Duration;

#[tokio::test]
async fn opens_exactly_at_the_threshold() {
    let registry = CircuitBreakerRegistry::new();
    let backend = Backend::failing();
    let service = protect(&backend, &registry, config("inventory", 3, Duration::from_secs(60)));
    let handle = registry.get("inventory").unwrap();

    for expected in 1..=2 {
        assert_eq!(call(&service, 1).await, Err(PolicyError::Inner(Fault::Unavailable)));
        assert_eq!(handle.failure_count(), expected);
        assert_eq!(handle.current_state(), CircuitState::Closed);
    }

    assert_eq!(call(&service, 1).await, Err(PolicyError::Inner(Fault::Unavailable)));
    assert_eq!(handle.current_state(), CircuitState::Open);
    assert!(handle.opened_at().is_some());
}

#[tokio::test]
async fn open_circuit_rejects_without_calling_the_backend() {
    let registry = CircuitBreakerRegistry::new();
    let backend = Backend::failing();
    let service = protect(&backend, &registry, config("inventory", 2, Duration::from_secs(60)));

    let _ = call(&service, 1).await;
    let _ = call(&service, 1).await;
    assert_eq!(backend.calls(), 2);

    backend.recover();
    for _ in 0..5 {
        let result = call(&service, 1).await;
        assert_eq!(
            result,
            Err(PolicyError::CircuitOpen {
                name: "inventory".to_string()
            })
        );
    }
    assert_eq!(backend.calls(), 2);
}

#[tokio::test]
async fn success_resets_the_consecutive_count() {
    let registry = CircuitBreakerRegistry::new();
    let backend = Backend::failing();
    let service = protect(&backend, &registry, config("inventory", 3, Duration::from_secs(60)));
    let handle = registry.get("inventory").unwrap();

    let _ = call(&service, 1).await;
    let _ = call(&service, 1).await;
    assert_eq!(handle.failure_count(), 2);

    backend.recover();
    assert_eq!(call(&service, 7).await, Ok("item 7".to_string()));
    assert_eq!(handle.failure_count(), 0);

    backend.fail();
    let _ = call(&service, 1).await;
    let _ = call(&service, 1).await;
    assert_eq!(handle.current_state(), CircuitState::Closed);
}

#[tokio::test]
async fn threshold_of_one_opens_on_first_failure() {
    let registry = CircuitBreakerRegistry::new();
    let backend = Backend::failing();
    let service = protect(&backend, &registry, config("fragile", 1, Duration::from_secs(60)));

    let _ = call(&service, 1).await;
    assert!(call(&service, 1).await.unwrap_err().is_circuit_open());
}

#[tokio::test]
async fn circuit_open_message_names_the_breaker() {
    let registry = CircuitBreakerRegistry::new();
    let backend = Backend::failing();
    let service = protect(&backend, &registry, config("payments", 1, Duration::from_secs(60)));

    let _ = call(&service, 1).await;
    let err = call(&service, 1).await.unwrap_err();
    assert_eq!(err.circuit_name(), Some("payments"));
    assert_eq!(err.to_string(), "circuit breaker 'payments' is OPEN");
}
