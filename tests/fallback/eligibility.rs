//! Which failures a fallback may replace.

use super::{Lookup, StoreError, call, lookup, store_failing_with};
use fortify_core::PolicyError;
use fortify_fallback::{FallbackConfig, FallbackHandlers, FallbackLayer};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tower::Layer;

fn handlers() -> FallbackHandlers<Lookup, String, StoreError> {
    let mut handlers = FallbackHandlers::new();
    handlers
        .register_with_failure("degraded", |_args: Lookup, failure| async move {
            Ok(format!("degraded after: {failure}"))
        })
        .unwrap();
    handlers
}

fn open() -> PolicyError<StoreError> {
    PolicyError::CircuitOpen {
        name: "profile_store".to_string(),
    }
}

#[tokio::test]
async fn apply_on_limits_the_replaced_kinds() {
    let config = FallbackConfig::<StoreError>::builder()
        .handler_id("degraded")
        .apply_on(|e: &StoreError| *e == StoreError::Timeout)
        .build();
    let layer = FallbackLayer::new(config, handlers());

    let timeout = layer.layer(store_failing_with(PolicyError::Inner(StoreError::Timeout)));
    let forbidden = layer.layer(store_failing_with(PolicyError::Inner(StoreError::Forbidden)));

    assert_eq!(
        call(&timeout, lookup("acme", 1)).await,
        Ok("degraded after: store timed out".to_string())
    );
    assert_eq!(
        call(&forbidden, lookup("acme", 1)).await,
        Err(PolicyError::Inner(StoreError::Forbidden))
    );
}

#[tokio::test]
async fn ignore_takes_precedence_over_apply_on() {
    let config = FallbackConfig::<StoreError>::builder()
        .handler_id("degraded")
        .apply_on(|_: &StoreError| true)
        .ignore(|e: &StoreError| *e == StoreError::Forbidden)
        .build();
    let service = FallbackLayer::new(config, handlers())
        .layer(store_failing_with(PolicyError::Inner(StoreError::Forbidden)));

    assert_eq!(
        call(&service, lookup("acme", 1)).await,
        Err(PolicyError::Inner(StoreError::Forbidden))
    );
}

#[tokio::test]
async fn circuit_open_is_replaced_by_an_unrestricted_fallback() {
    let config = FallbackConfig::<StoreError>::builder()
        .handler_id("degraded")
        .build();
    let service = FallbackLayer::new(config, handlers()).layer(store_failing_with(open()));

    assert_eq!(
        call(&service, lookup("acme", 1)).await,
        Ok("degraded after: circuit breaker 'profile_store' is OPEN".to_string())
    );
}

#[tokio::test]
async fn circuit_open_follows_a_restricted_apply_on() {
    let restricted = || {
        FallbackConfig::<StoreError>::builder()
            .handler_id("degraded")
            .apply_on(|e: &StoreError| *e == StoreError::Timeout)
    };

    let skipping =
        FallbackLayer::new(restricted().build(), handlers()).layer(store_failing_with(open()));
    assert_eq!(call(&skipping, lookup("acme", 1)).await, Err(open()));

    let applying = FallbackLayer::new(restricted().apply_on_circuit_open().build(), handlers())
        .layer(store_failing_with(open()));
    assert!(call(&applying, lookup("acme", 1)).await.is_ok());
}

#[tokio::test]
async fn except_circuit_open_surfaces_the_rejection() {
    let skipped = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&skipped);
    let config = FallbackConfig::<StoreError>::builder()
        .handler_id("degraded")
        .except_circuit_open()
        .on_skipped(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .build();
    let service = FallbackLayer::new(config, handlers()).layer(store_failing_with(open()));

    let err = call(&service, lookup("acme", 1)).await.unwrap_err();
    assert_eq!(err.circuit_name(), Some("profile_store"));
    assert_eq!(skipped.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn cancellation_is_never_replaced() {
    let config = FallbackConfig::<StoreError>::builder()
        .handler_id("degraded")
        .build();
    let service =
        FallbackLayer::new(config, handlers()).layer(store_failing_with(PolicyError::Cancelled));

    assert_eq!(
        call(&service, lookup("acme", 1)).await,
        Err(PolicyError::Cancelled)
    );
}
