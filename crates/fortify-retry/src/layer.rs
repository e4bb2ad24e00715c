use crate::{Retry, RetryConfig, RetryExecutor};
use tower::Layer;

/// A Tower [`Layer`] that applies retry logic to a service.
///
/// The wrapped service must already speak [`PolicyError`](fortify_core::PolicyError);
/// lift a raw service with `map_err(PolicyError::Inner)`.
///
/// ```
/// use fortify_core::PolicyError;
/// use fortify_retry::RetryLayer;
/// use tower::{ServiceBuilder, ServiceExt};
/// use std::time::Duration;
///
/// # #[derive(Debug, Clone)]
/// # struct MyError;
/// # async fn example() {
/// let retry_layer = RetryLayer::<MyError>::builder()
///     .max_attempts(5)
///     .exponential_backoff(Duration::from_millis(100), 2.0)
///     .build()
///     .layer();
///
/// let service = ServiceBuilder::new()
///     .layer(retry_layer)
///     .service(my_service().map_err(PolicyError::Inner));
/// # }
/// # fn my_service() -> impl tower::Service<String, Response = String, Error = MyError> + Clone {
/// #     tower::service_fn(|req: String| async move { Ok::<_, MyError>(req) })
/// # }
/// ```
pub struct RetryLayer<E> {
    executor: RetryExecutor<E>,
}

impl<E> Clone for RetryLayer<E> {
    fn clone(&self) -> Self {
        Self {
            executor: self.executor.clone(),
        }
    }
}

impl<E> RetryLayer<E> {
    /// Creates a new `RetryLayer` with the given configuration.
    pub fn new(config: RetryConfig<E>) -> Self {
        Self {
            executor: RetryExecutor::new(config),
        }
    }

    /// Creates a new builder for configuring a retry policy.
    pub fn builder() -> crate::RetryConfigBuilder<E> {
        crate::RetryConfigBuilder::new()
    }

    /// The executor shared by every service this layer produces.
    pub fn executor(&self) -> &RetryExecutor<E> {
        &self.executor
    }
}

impl<S, E> Layer<S> for RetryLayer<E> {
    type Service = Retry<S, E>;

    fn layer(&self, service: S) -> Self::Service {
        Retry::new(service, self.executor.clone())
    }
}
