use crate::policies::Policies;
use fortify_circuitbreaker::{CircuitBreakerLayer, CircuitBreakerRegistry};
use fortify_core::PolicyError;
use fortify_fallback::FallbackLayer;
use fortify_retry::RetryLayer;
use std::fmt;
use std::task::{Context, Poll};
use tower::util::{BoxCloneService, Oneshot};
use tower::{Layer, Service, ServiceExt};

/// One layer of a [`PolicyStack`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyKind {
    /// Substitutes a handler's result for eligible failures.
    Fallback,
    /// Rejects calls while the named breaker is OPEN.
    CircuitBreaker,
    /// Re-invokes the operation with backoff.
    Retry,
}

impl PolicyKind {
    /// Stable lowercase label.
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyKind::Fallback => "fallback",
            PolicyKind::CircuitBreaker => "circuit_breaker",
            PolicyKind::Retry => "retry",
        }
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The configured policies as an ordered decorator chain.
///
/// The order is fixed, outermost first: fallback, circuit breaker, retry.
/// Retry sits closest to the operation so the breaker records one outcome
/// per logical call, and fallback sees whatever the inner layers give up on,
/// including circuit-open rejections.
///
/// `PolicyStack` is a [`Layer`], so it can also be used inside a
/// `ServiceBuilder`.
pub struct PolicyStack<Req, Res, E> {
    fallback: Option<FallbackLayer<Req, Res, E>>,
    circuit_breaker: Option<CircuitBreakerLayer<E>>,
    retry: Option<RetryLayer<E>>,
}

impl<Req, Res, E> PolicyStack<Req, Res, E> {
    /// Builds the layers for `policies`, acquiring any breaker from `registry`.
    pub fn new(policies: Policies<Req, Res, E>, registry: &CircuitBreakerRegistry) -> Self {
        let Policies {
            retry,
            circuit_breaker,
            fallback,
        } = policies;

        Self {
            fallback: fallback.map(FallbackLayer::from_resolver),
            circuit_breaker: circuit_breaker.map(|config| config.layer(registry)),
            retry: retry.map(|config| config.layer()),
        }
    }

    /// The configured layers, outermost first.
    pub fn order(&self) -> Vec<PolicyKind> {
        let mut order = Vec::with_capacity(3);
        if self.fallback.is_some() {
            order.push(PolicyKind::Fallback);
        }
        if self.circuit_breaker.is_some() {
            order.push(PolicyKind::CircuitBreaker);
        }
        if self.retry.is_some() {
            order.push(PolicyKind::Retry);
        }
        order
    }

    /// Returns `true` if no policy is configured.
    pub fn is_empty(&self) -> bool {
        self.fallback.is_none() && self.circuit_breaker.is_none() && self.retry.is_none()
    }

    /// The fallback layer, if configured.
    pub fn fallback(&self) -> Option<&FallbackLayer<Req, Res, E>> {
        self.fallback.as_ref()
    }

    /// The circuit breaker layer, if configured.
    pub fn circuit_breaker(&self) -> Option<&CircuitBreakerLayer<E>> {
        self.circuit_breaker.as_ref()
    }

    /// The retry layer, if configured.
    pub fn retry(&self) -> Option<&RetryLayer<E>> {
        self.retry.as_ref()
    }
}

impl<Req, Res, E> Clone for PolicyStack<Req, Res, E> {
    fn clone(&self) -> Self {
        Self {
            fallback: self.fallback.clone(),
            circuit_breaker: self.circuit_breaker.clone(),
            retry: self.retry.clone(),
        }
    }
}

impl<Req, Res, E> fmt::Debug for PolicyStack<Req, Res, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyStack")
            .field("order", &self.order())
            .finish()
    }
}

impl<S, Req, Res, E> Layer<S> for PolicyStack<Req, Res, E>
where
    S: Service<Req, Response = Res, Error = PolicyError<E>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    Req: Clone + Send + 'static,
    Res: Send + 'static,
    E: Send + 'static,
{
    type Service = Protected<Req, Res, E>;

    fn layer(&self, service: S) -> Self::Service {
        // Innermost first.
        let mut service = BoxCloneService::new(service);
        if let Some(retry) = &self.retry {
            service = BoxCloneService::new(retry.layer(service));
        }
        if let Some(circuit_breaker) = &self.circuit_breaker {
            service = BoxCloneService::new(circuit_breaker.layer(service));
        }
        if let Some(fallback) = &self.fallback {
            service = BoxCloneService::new(fallback.layer(service));
        }

        Protected {
            inner: service,
            order: self.order(),
        }
    }
}

/// An operation wrapped in its policies.
///
/// Keeps the operation's request and response types; failures are
/// [`PolicyError<E>`]. Clones share breaker state and fallback handlers.
pub struct Protected<Req, Res, E> {
    inner: BoxCloneService<Req, Res, PolicyError<E>>,
    order: Vec<PolicyKind>,
}

impl<Req, Res, E> Protected<Req, Res, E>
where
    Req: 'static,
    Res: 'static,
    E: 'static,
{
    /// Calls the protected operation once with `req`.
    ///
    /// The returned future owns a clone of the service, so it is `Send` and
    /// can be spawned.
    pub fn invoke(&self, req: Req) -> Oneshot<BoxCloneService<Req, Res, PolicyError<E>>, Req> {
        self.inner.clone().oneshot(req)
    }

    /// The layers around the operation, outermost first.
    pub fn order(&self) -> &[PolicyKind] {
        &self.order
    }
}

impl<Req, Res, E> Clone for Protected<Req, Res, E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            order: self.order.clone(),
        }
    }
}

impl<Req, Res, E> fmt::Debug for Protected<Req, Res, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Protected")
            .field("order", &self.order)
            .finish()
    }
}

impl<Req, Res, E> Service<Req> for Protected<Req, Res, E> {
    type Response = Res;
    type Error = PolicyError<E>;
    type Future = <BoxCloneService<Req, Res, PolicyError<E>> as Service<Req>>::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        self.inner.call(req)
    }
}
