use crate::config::CircuitBreakerConfig;
use crate::registry::CircuitBreakerRegistry;
use crate::state::CircuitBreakerHandle;
use crate::CircuitBreaker;
use std::sync::Arc;
use tower::Layer;

/// A Tower Layer that applies circuit breaker behavior to an inner service.
///
/// The breaker is acquired from the registry when the layer is built, so
/// every service produced by this layer (and every other layer configured
/// with the same name) shares its state.
///
/// ```rust
/// use fortify_core::PolicyError;
/// use fortify_circuitbreaker::{CircuitBreakerConfig, CircuitBreakerLayer, CircuitBreakerRegistry};
/// use tower::{ServiceBuilder, ServiceExt, service_fn};
/// use std::time::Duration;
///
/// let registry = CircuitBreakerRegistry::new();
/// let config = CircuitBreakerConfig::<std::io::Error>::builder()
///     .name("inventory")
///     .failure_threshold(3)
///     .reset_timeout(Duration::from_secs(10))
///     .build();
///
/// let service = ServiceBuilder::new()
///     .layer(CircuitBreakerLayer::new(config, &registry))
///     .service(
///         service_fn(|req: String| async move { Ok::<_, std::io::Error>(req) })
///             .map_err(PolicyError::Inner),
///     );
///
/// assert!(registry.contains("inventory"));
/// ```
pub struct CircuitBreakerLayer<E> {
    config: Arc<CircuitBreakerConfig<E>>,
    handle: CircuitBreakerHandle,
}

impl<E> Clone for CircuitBreakerLayer<E> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            handle: self.handle.clone(),
        }
    }
}

impl<E> CircuitBreakerLayer<E> {
    /// Creates a layer, acquiring the named breaker from `registry`.
    ///
    /// If a breaker with this name already exists, its threshold and reset
    /// timeout stay in force and the ones in `config` are ignored.
    pub fn new(config: CircuitBreakerConfig<E>, registry: &CircuitBreakerRegistry) -> Self {
        let handle = registry.acquire(&config.name, config.failure_threshold, config.reset_timeout);
        let layer = Self {
            config: Arc::new(config),
            handle,
        };

        #[cfg(feature = "tracing")]
        if !layer.uses_configured_parameters() {
            tracing::debug!(
                breaker = %layer.config.name,
                configured_threshold = layer.config.failure_threshold,
                effective_threshold = layer.handle.failure_threshold(),
                configured_reset_timeout = ?layer.config.reset_timeout,
                effective_reset_timeout = ?layer.handle.reset_timeout(),
                "breaker already registered with different parameters, keeping existing ones"
            );
        }

        layer
    }

    /// Returns `false` if the shared breaker was registered earlier with a
    /// different threshold or reset timeout than this layer's configuration.
    pub fn uses_configured_parameters(&self) -> bool {
        self.handle.failure_threshold() == self.config.failure_threshold
            && self.handle.reset_timeout() == self.config.reset_timeout
    }

    /// Creates a new builder for configuring a circuit breaker.
    pub fn builder() -> crate::CircuitBreakerConfigBuilder<E> {
        crate::CircuitBreakerConfigBuilder::new()
    }

    /// The shared breaker this layer records outcomes against.
    pub fn handle(&self) -> &CircuitBreakerHandle {
        &self.handle
    }
}

impl<S, E> Layer<S> for CircuitBreakerLayer<E> {
    type Service = CircuitBreaker<S, E>;

    fn layer(&self, service: S) -> Self::Service {
        CircuitBreaker::new(service, Arc::clone(&self.config), self.handle.clone())
    }
}
