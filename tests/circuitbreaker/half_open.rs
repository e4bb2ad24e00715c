//! Reset timeout, trial calls and reopening.

use super::{Backend, Fault, call, config, protect};
use fortify_circuitbreaker::{CircuitBreakerConfig, CircuitBreakerRegistry, CircuitState};
use fortify_core::PolicyError;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::Layer;
use tower::util::BoxCloneService;

const RESET: Duration = Duration::from_secs(30);

#[tokio::test(start_paused = true)]
async fn stays_open_until_the_reset_timeout_elapses() {
    let registry = CircuitBreakerRegistry::new();
    let backend = Backend::failing();
    let service = protect(&backend, &registry, config("search", 1, RESET));
    let handle = registry.get("search").unwrap();

    let _ = call(&service, 1).await;
    tokio::time::advance(RESET - Duration::from_millis(1)).await;
    assert_eq!(handle.current_state(), CircuitState::Open);
    assert!(call(&service, 1).await.unwrap_err().is_circuit_open());

    tokio::time::advance(Duration::from_millis(1)).await;
    assert_eq!(handle.current_state(), CircuitState::HalfOpen);
}

#[tokio::test(start_paused = true)]
async fn successful_trial_closes_the_circuit() {
    let registry = CircuitBreakerRegistry::new();
    let backend = Backend::failing();
    let service = protect(&backend, &registry, config("search", 2, RESET));
    let handle = registry.get("search").unwrap();

    let _ = call(&service, 1).await;
    let _ = call(&service, 1).await;
    assert_eq!(handle.current_state(), CircuitState::Open);

    tokio::time::advance(RESET).await;
    backend.recover();

    assert_eq!(call(&service, 3).await, Ok("item 3".to_string()));
    let snapshot = handle.snapshot();
    assert_eq!(snapshot.state, CircuitState::Closed);
    assert_eq!(snapshot.failure_count, 0);
    assert_eq!(snapshot.opened_at, None);
}

#[tokio::test(start_paused = true)]
async fn failed_trial_reopens_regardless_of_threshold() {
    let registry = CircuitBreakerRegistry::new();
    let backend = Backend::failing();
    let service = protect(&backend, &registry, config("search", 3, RESET));
    let handle = registry.get("search").unwrap();

    for _ in 0..3 {
        let _ = call(&service, 1).await;
    }
    let first_opened = handle.opened_at().unwrap();

    tokio::time::advance(RESET).await;
    assert_eq!(handle.current_state(), CircuitState::HalfOpen);

    let _ = call(&service, 1).await;
    assert_eq!(handle.current_state(), CircuitState::Open);
    assert!(handle.opened_at().unwrap() > first_opened);
    assert_eq!(backend.calls(), 4);
}

#[tokio::test(start_paused = true)]
async fn half_open_admits_every_caller() {
    let registry = CircuitBreakerRegistry::new();
    let admitted = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&admitted);
    let layer = CircuitBreakerConfig::<Fault>::builder()
        .name("search")
        .failure_threshold(1)
        .reset_timeout(RESET)
        .on_call_permitted(move |state| recorder.lock().unwrap().push(state))
        .build()
        .layer(&registry);

    let failing = Arc::new(AtomicBool::new(true));
    let calls = Arc::new(AtomicUsize::new(0));
    let service = BoxCloneService::new(layer.layer(tower::service_fn({
        let failing = Arc::clone(&failing);
        let calls = Arc::clone(&calls);
        move |req: u32| {
            calls.fetch_add(1, Ordering::SeqCst);
            let fail = failing.load(Ordering::SeqCst);
            async move {
                // keep both trial calls in flight at once
                tokio::time::sleep(Duration::from_millis(50)).await;
                if fail {
                    Err(PolicyError::Inner(Fault::Unavailable))
                } else {
                    Ok(format!("item {req}"))
                }
            }
        }
    })));

    let _ = call(&service, 1).await;
    tokio::time::advance(RESET).await;
    failing.store(false, Ordering::SeqCst);

    let (a, b) = tokio::join!(call(&service, 1), call(&service, 2));
    assert_eq!(a, Ok("item 1".to_string()));
    assert_eq!(b, Ok("item 2".to_string()));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(
        *admitted.lock().unwrap(),
        vec![
            CircuitState::Closed,
            CircuitState::HalfOpen,
            CircuitState::HalfOpen
        ]
    );
    assert_eq!(layer.handle().current_state(), CircuitState::Closed);
}

#[tokio::test(start_paused = true)]
async fn force_open_and_reset() {
    let registry = CircuitBreakerRegistry::new();
    let backend = Backend::default();
    let service = protect(&backend, &registry, config("search", 5, RESET));
    let handle = registry.get("search").unwrap();

    handle.force_open();
    assert!(call(&service, 1).await.unwrap_err().is_circuit_open());
    assert_eq!(backend.calls(), 0);

    handle.reset();
    assert_eq!(handle.current_state(), CircuitState::Closed);
    assert_eq!(call(&service, 1).await, Ok("item 1".to_string()));
}
