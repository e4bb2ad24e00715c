//! Tower layer for fallback.

use crate::config::{FallbackConfig, FallbackConfigBuilder};
use crate::handlers::FallbackHandlers;
use crate::resolver::FallbackResolver;
use crate::Fallback;
use tower_layer::Layer;

/// A Tower layer that applies fallback behavior to a service.
///
/// See the [module-level documentation](crate) for usage examples.
pub struct FallbackLayer<Req, Res, E> {
    resolver: FallbackResolver<Req, Res, E>,
}

impl<Req, Res, E> FallbackLayer<Req, Res, E> {
    /// Creates a new fallback layer from a configuration and its handlers.
    pub fn new(config: FallbackConfig<E>, handlers: FallbackHandlers<Req, Res, E>) -> Self {
        Self {
            resolver: FallbackResolver::new(config, handlers),
        }
    }

    /// Creates a layer around an existing resolver.
    pub fn from_resolver(resolver: FallbackResolver<Req, Res, E>) -> Self {
        Self { resolver }
    }

    /// Creates a new builder for the layer's configuration.
    pub fn builder() -> FallbackConfigBuilder<E> {
        FallbackConfigBuilder::new()
    }

    /// The resolver shared by every service this layer produces.
    pub fn resolver(&self) -> &FallbackResolver<Req, Res, E> {
        &self.resolver
    }
}

impl<Req, Res, E> Clone for FallbackLayer<Req, Res, E> {
    fn clone(&self) -> Self {
        Self {
            resolver: self.resolver.clone(),
        }
    }
}

impl<S, Req, Res, E> Layer<S> for FallbackLayer<Req, Res, E> {
    type Service = Fallback<S, Req, Res, E>;

    fn layer(&self, service: S) -> Self::Service {
        Fallback::new(service, self.resolver.clone())
    }
}
