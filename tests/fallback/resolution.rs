//! Handler resolution and invocation.

use super::{Lookup, StoreError, call, healthy_store, lookup, store_failing_with};
use fortify_core::PolicyError;
use fortify_fallback::{FallbackConfig, FallbackHandlers, FallbackLayer, HandlerForm};
use std::error::Error as _;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tower::Layer;

fn config(handler_id: &str) -> FallbackConfig<StoreError> {
    FallbackConfig::builder().handler_id(handler_id).build()
}

#[tokio::test]
async fn handler_receives_the_original_arguments() {
    let mut handlers = FallbackHandlers::<Lookup, String, StoreError>::new();
    handlers
        .register("cached_profile", |(tenant, user_id): Lookup| async move {
            Ok(format!("{tenant}/{user_id} from cache"))
        })
        .unwrap();

    let service = FallbackLayer::new(config("cached_profile"), handlers)
        .layer(store_failing_with(PolicyError::Inner(StoreError::Timeout)));

    let result = call(&service, lookup("acme", 42)).await;
    assert_eq!(result, Ok("acme/42 from cache".to_string()));
}

#[tokio::test]
async fn failure_aware_form_wins_over_args_only() {
    let args_only = Arc::new(AtomicUsize::new(0));
    let args_only_calls = Arc::clone(&args_only);

    let mut handlers = FallbackHandlers::<Lookup, String, StoreError>::new();
    handlers
        .register("cached_profile", move |_args: Lookup| {
            args_only_calls.fetch_add(1, Ordering::SeqCst);
            async { Ok("args only".to_string()) }
        })
        .unwrap()
        .register_with_failure("cached_profile", |(tenant, _): Lookup, failure| async move {
            Ok(format!("{tenant} after: {failure}"))
        })
        .unwrap();
    assert_eq!(
        handlers.form_for("cached_profile"),
        Some(HandlerForm::WithFailure)
    );

    let service = FallbackLayer::new(config("cached_profile"), handlers)
        .layer(store_failing_with(PolicyError::Inner(StoreError::Timeout)));

    let result = call(&service, lookup("acme", 1)).await;
    assert_eq!(result, Ok("acme after: store timed out".to_string()));
    assert_eq!(args_only.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn success_never_invokes_the_handler() {
    let invoked = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&invoked);
    let mut handlers = FallbackHandlers::<Lookup, String, StoreError>::new();
    handlers
        .register("cached_profile", move |_args: Lookup| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok("cached".to_string()) }
        })
        .unwrap();

    let service = FallbackLayer::new(config("cached_profile"), handlers).layer(healthy_store());

    assert_eq!(
        call(&service, lookup("acme", 7)).await,
        Ok("acme/7 from store".to_string())
    );
    assert_eq!(invoked.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn missing_handler_reports_the_id_and_the_cause() {
    let mut handlers = FallbackHandlers::<Lookup, String, StoreError>::new();
    handlers
        .register("other_handler", |_args: Lookup| async { Ok(String::new()) })
        .unwrap();

    let service = FallbackLayer::new(config("cached_profile"), handlers)
        .layer(store_failing_with(PolicyError::Inner(StoreError::Timeout)));

    let err = call(&service, lookup("acme", 3)).await.unwrap_err();
    assert!(err.is_fallback_resolution());
    assert_eq!(
        err.resolution_cause(),
        Some(&PolicyError::Inner(StoreError::Timeout))
    );
    assert!(err.to_string().contains("'cached_profile'"));
    assert!(err.to_string().contains("store timed out"));
    assert_eq!(
        err.source().map(ToString::to_string),
        Some("store timed out".to_string())
    );
}

#[tokio::test]
async fn handler_failure_surfaces_as_the_new_failure() {
    let mut handlers = FallbackHandlers::<Lookup, String, StoreError>::new();
    handlers
        .register("cached_profile", |_args: Lookup| async {
            Err(StoreError::Forbidden)
        })
        .unwrap();

    let failed = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&failed);
    let config = FallbackConfig::<StoreError>::builder()
        .handler_id("cached_profile")
        .on_fallback_failed(move |handler_id| {
            assert_eq!(handler_id, "cached_profile");
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .build();

    let service = FallbackLayer::new(config, handlers)
        .layer(store_failing_with(PolicyError::Inner(StoreError::Timeout)));

    assert_eq!(
        call(&service, lookup("acme", 5)).await,
        Err(PolicyError::Inner(StoreError::Forbidden))
    );
    assert_eq!(failed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn applied_listener_receives_the_handler_id() {
    let applied = Arc::new(std::sync::Mutex::new(Vec::new()));
    let recorder = Arc::clone(&applied);
    let config = FallbackConfig::<StoreError>::builder()
        .handler_id("cached_profile")
        .name("profiles")
        .on_fallback_applied(move |handler_id| {
            recorder.lock().unwrap().push(handler_id.to_string())
        })
        .build();
    assert_eq!(config.name(), "profiles");

    let mut handlers = FallbackHandlers::<Lookup, String, StoreError>::new();
    handlers
        .register("cached_profile", |_args: Lookup| async { Ok("cached".to_string()) })
        .unwrap();

    let service = FallbackLayer::new(config, handlers)
        .layer(store_failing_with(PolicyError::Inner(StoreError::Timeout)));
    let _ = call(&service, lookup("acme", 1)).await;
    let _ = call(&service, lookup("acme", 2)).await;

    assert_eq!(
        *applied.lock().unwrap(),
        vec!["cached_profile".to_string(), "cached_profile".to_string()]
    );
}
