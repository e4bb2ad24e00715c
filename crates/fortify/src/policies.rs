use fortify_circuitbreaker::CircuitBreakerConfig;
use fortify_fallback::{FallbackConfig, FallbackHandlers, FallbackResolver};
use fortify_retry::RetryConfig;
use std::fmt;

/// The policies to apply to one operation.
///
/// Every policy is optional; an empty `Policies` leaves the operation as is
/// apart from lifting its error into [`PolicyError`](fortify_core::PolicyError).
pub struct Policies<Req, Res, E> {
    /// Retry with backoff around the raw operation.
    pub retry: Option<RetryConfig<E>>,
    /// Circuit breaker around the retry loop.
    pub circuit_breaker: Option<CircuitBreakerConfig<E>>,
    /// Fallback around everything else.
    pub fallback: Option<FallbackResolver<Req, Res, E>>,
}

impl<Req, Res, E> Policies<Req, Res, E> {
    /// No policies.
    pub fn new() -> Self {
        Self {
            retry: None,
            circuit_breaker: None,
            fallback: None,
        }
    }

    /// Adds a retry policy.
    pub fn retry(mut self, config: RetryConfig<E>) -> Self {
        self.retry = Some(config);
        self
    }

    /// Adds a circuit breaker.
    pub fn circuit_breaker(mut self, config: CircuitBreakerConfig<E>) -> Self {
        self.circuit_breaker = Some(config);
        self
    }

    /// Adds a fallback resolving `config.handler_id()` in `handlers`.
    pub fn fallback(
        mut self,
        config: FallbackConfig<E>,
        handlers: FallbackHandlers<Req, Res, E>,
    ) -> Self {
        self.fallback = Some(FallbackResolver::new(config, handlers));
        self
    }

    /// Adds a fallback around an existing resolver.
    pub fn fallback_resolver(mut self, resolver: FallbackResolver<Req, Res, E>) -> Self {
        self.fallback = Some(resolver);
        self
    }
}

impl<Req, Res, E> Default for Policies<Req, Res, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Req, Res, E> fmt::Debug for Policies<Req, Res, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Policies")
            .field("retry", &self.retry)
            .field("circuit_breaker", &self.circuit_breaker)
            .field("fallback", &self.fallback)
            .finish()
    }
}
