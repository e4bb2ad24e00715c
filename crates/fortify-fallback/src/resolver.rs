use crate::config::FallbackConfig;
use crate::error::HandlerForm;
use crate::events::FallbackEvent;
use crate::handlers::{FallbackHandlers, Resolved};
use fortify_core::PolicyError;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

#[cfg(feature = "metrics")]
use metrics::counter;

/// Substitutes a registered handler's result for an eligible failure.
///
/// Cloning is cheap; clones share the configuration and handler set.
pub struct FallbackResolver<Req, Res, E> {
    config: Arc<FallbackConfig<E>>,
    handlers: Arc<FallbackHandlers<Req, Res, E>>,
}

impl<Req, Res, E> FallbackResolver<Req, Res, E> {
    /// Creates a resolver over `handlers` for the id named in `config`.
    pub fn new(config: FallbackConfig<E>, handlers: FallbackHandlers<Req, Res, E>) -> Self {
        Self::from_shared(Arc::new(config), Arc::new(handlers))
    }

    /// Creates a resolver from already shared parts.
    pub fn from_shared(
        config: Arc<FallbackConfig<E>>,
        handlers: Arc<FallbackHandlers<Req, Res, E>>,
    ) -> Self {
        #[cfg(feature = "tracing")]
        if !handlers.contains(&config.handler_id) {
            tracing::debug!(
                fallback = %config.name,
                handler_id = %config.handler_id,
                "no handler registered yet for fallback id"
            );
        }

        Self { config, handlers }
    }

    /// The configuration in use.
    pub fn config(&self) -> &FallbackConfig<E> {
        &self.config
    }

    /// The handler set in use.
    pub fn handlers(&self) -> &FallbackHandlers<Req, Res, E> {
        &self.handlers
    }

    /// Returns `true` if `failure` would be offered to a handler.
    pub fn applies_to(&self, failure: &PolicyError<E>) -> bool {
        self.config.applies_to(failure)
    }

    /// Returns `true` if a handler is registered for the configured id.
    pub fn is_resolvable(&self) -> bool {
        self.handlers.contains(&self.config.handler_id)
    }

    /// Records that the protected call succeeded without needing a fallback.
    pub(crate) fn record_success(&self) {
        #[cfg(feature = "metrics")]
        counter!(
            "fallback_calls_total",
            "fallback" => self.config.name.clone(),
            "result" => "success"
        )
        .increment(1);

        self.config.event_listeners.emit_with(|| FallbackEvent::Success {
            policy_name: self.config.name.clone(),
            timestamp: Instant::now(),
        });
    }

    /// Handles a failed call made with `args`.
    ///
    /// Ineligible failures come back unchanged. Eligible ones are handed to
    /// the registered handler, preferring the form that also receives the
    /// failure. A handler's own failure replaces the original as
    /// [`PolicyError::Inner`]. With no handler registered the result is
    /// [`PolicyError::FallbackResolution`] wrapping the original failure.
    pub async fn recover(&self, args: Req, failure: PolicyError<E>) -> Result<Res, PolicyError<E>> {
        let config = &self.config;

        if !config.applies_to(&failure) {
            #[cfg(feature = "tracing")]
            tracing::debug!(fallback = %config.name, "failure not eligible, skipping fallback");

            #[cfg(feature = "metrics")]
            counter!(
                "fallback_calls_total",
                "fallback" => config.name.clone(),
                "result" => "skipped"
            )
            .increment(1);

            config.event_listeners.emit_with(|| FallbackEvent::Skipped {
                policy_name: config.name.clone(),
                timestamp: Instant::now(),
            });
            return Err(failure);
        }

        let (form, pending) = match self.handlers.resolve(&config.handler_id) {
            Some(Resolved::WithFailure(handler)) => {
                (HandlerForm::WithFailure, handler(args, failure))
            }
            Some(Resolved::ArgsOnly(handler)) => (HandlerForm::ArgsOnly, handler(args)),
            None => {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    fallback = %config.name,
                    handler_id = %config.handler_id,
                    "no fallback handler registered"
                );

                #[cfg(feature = "metrics")]
                counter!(
                    "fallback_calls_total",
                    "fallback" => config.name.clone(),
                    "result" => "unresolved"
                )
                .increment(1);

                config.event_listeners.emit_with(|| FallbackEvent::ResolutionFailed {
                    policy_name: config.name.clone(),
                    timestamp: Instant::now(),
                    handler_id: config.handler_id.clone(),
                });
                return Err(PolicyError::FallbackResolution {
                    handler_id: config.handler_id.clone(),
                    cause: Box::new(failure),
                });
            }
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(
            fallback = %config.name,
            handler_id = %config.handler_id,
            form = form.as_str(),
            "invoking fallback handler"
        );

        match pending.await {
            Ok(response) => {
                #[cfg(feature = "metrics")]
                counter!(
                    "fallback_calls_total",
                    "fallback" => config.name.clone(),
                    "result" => "applied",
                    "form" => form.as_str()
                )
                .increment(1);

                config.event_listeners.emit_with(|| FallbackEvent::Applied {
                    policy_name: config.name.clone(),
                    timestamp: Instant::now(),
                    handler_id: config.handler_id.clone(),
                    form: form.as_str(),
                });
                Ok(response)
            }
            Err(error) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(
                    fallback = %config.name,
                    handler_id = %config.handler_id,
                    "fallback handler failed"
                );

                #[cfg(feature = "metrics")]
                counter!(
                    "fallback_calls_total",
                    "fallback" => config.name.clone(),
                    "result" => "failed",
                    "form" => form.as_str()
                )
                .increment(1);

                config.event_listeners.emit_with(|| FallbackEvent::Failed {
                    policy_name: config.name.clone(),
                    timestamp: Instant::now(),
                    handler_id: config.handler_id.clone(),
                });
                Err(PolicyError::Inner(error))
            }
        }
    }
}

impl<Req, Res, E> Clone for FallbackResolver<Req, Res, E> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            handlers: Arc::clone(&self.handlers),
        }
    }
}

impl<Req, Res, E> fmt::Debug for FallbackResolver<Req, Res, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FallbackResolver")
            .field("config", &self.config)
            .field("handlers", &self.handlers)
            .finish()
    }
}
