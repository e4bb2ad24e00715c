//! A flaky payment gateway protected by retry, a circuit breaker and a fallback.
//!
//! Run with: cargo run --example payment_gateway
//! With logs: RUST_LOG=debug cargo run --example payment_gateway

use fortify::circuitbreaker::{CircuitBreakerConfig, CircuitBreakerRegistry};
use fortify::fallback::{FallbackConfig, FallbackHandlers};
use fortify::retry::RetryConfig;
use fortify::{Policies, wrap};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tower::service_fn;

#[derive(Debug, Clone, PartialEq)]
enum GatewayError {
    Timeout,
    Declined,
}

impl std::fmt::Display for GatewayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GatewayError::Timeout => write!(f, "gateway timeout"),
            GatewayError::Declined => write!(f, "card declined"),
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // Times out on every call until it has been hit 8 times.
    let calls = Arc::new(AtomicUsize::new(0));
    let gateway_calls = Arc::clone(&calls);
    let gateway = service_fn(move |(account, cents): (String, u64)| {
        let call = gateway_calls.fetch_add(1, Ordering::SeqCst) + 1;
        async move {
            if cents == 0 {
                Err(GatewayError::Declined)
            } else if call <= 8 {
                Err(GatewayError::Timeout)
            } else {
                Ok(format!("charged {account} {cents}c"))
            }
        }
    });

    let mut handlers = FallbackHandlers::<(String, u64), String, GatewayError>::new();
    handlers
        .register_with_failure(
            "queue_charge",
            |(account, cents): (String, u64), failure| async move {
                Ok(format!("queued {account} {cents}c ({failure})"))
            },
        )
        .expect("handler id is unique");

    let registry = CircuitBreakerRegistry::new();
    let policies = Policies::new()
        .retry(
            RetryConfig::<GatewayError>::builder()
                .name("gateway")
                .max_attempts(3)
                .exponential_backoff(Duration::from_millis(50), 2.0)
                .max_delay(Duration::from_millis(150))
                .retry_on(|e: &GatewayError| *e == GatewayError::Timeout)
                .on_retry(|attempt, delay| println!("  retry #{attempt} in {delay:?}"))
                .build(),
        )
        .circuit_breaker(
            CircuitBreakerConfig::<GatewayError>::builder()
                .name("gateway")
                .failure_threshold(2)
                .reset_timeout(Duration::from_millis(500))
                .on_state_transition(|from, to| println!("  breaker {from} -> {to}"))
                .build(),
        )
        .fallback(
            FallbackConfig::<GatewayError>::builder()
                .handler_id("queue_charge")
                .apply_on(|e: &GatewayError| *e == GatewayError::Timeout)
                .build(),
            handlers,
        );

    let charge = wrap(gateway, &registry, policies);
    println!("layers: {:?}", charge.order());

    for cents in [1200, 900, 450] {
        println!("charging {cents}c");
        println!("  -> {:?}", charge.invoke(("alice".to_string(), cents)).await);
    }

    println!("waiting for the breaker to half-open");
    tokio::time::sleep(Duration::from_millis(600)).await;

    for cents in [300, 0] {
        println!("charging {cents}c");
        println!("  -> {:?}", charge.invoke(("alice".to_string(), cents)).await);
    }

    println!("gateway was called {} times", calls.load(Ordering::SeqCst));
}
