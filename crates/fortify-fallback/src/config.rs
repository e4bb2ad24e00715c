//! Configuration for the fallback policy.

use crate::FallbackEvent;
use fortify_core::{Classifier, ConfigError, EventListeners, FailureKind, PolicyError};
use std::fmt;

/// How a [`PolicyError::CircuitOpen`] rejection is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CircuitOpenPolicy {
    /// Eligible only when `apply_on` has no `only_on` kinds.
    #[default]
    FollowApplyOn,
    /// Always eligible.
    Apply,
    /// Never eligible.
    Skip,
}

/// Configuration for the fallback policy.
pub struct FallbackConfig<E> {
    pub(crate) name: String,
    pub(crate) handler_id: String,
    pub(crate) apply_on: Classifier<E>,
    pub(crate) circuit_open: CircuitOpenPolicy,
    pub(crate) event_listeners: EventListeners<FallbackEvent>,
}

impl<E> FallbackConfig<E> {
    /// Creates a new builder.
    pub fn builder() -> FallbackConfigBuilder<E> {
        FallbackConfigBuilder::new()
    }

    /// The instance name used in events, logs and metrics.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The handler id looked up on failure.
    pub fn handler_id(&self) -> &str {
        &self.handler_id
    }

    /// Decides whether `failure` may be replaced by a handler's result.
    ///
    /// Operation failures are tested against `apply_on`. Circuit-open
    /// rejections follow [`CircuitOpenPolicy`]. Cancellations and resolution
    /// errors are never eligible.
    pub fn applies_to(&self, failure: &PolicyError<E>) -> bool {
        match failure {
            PolicyError::Inner(error) => self.apply_on.matches(error),
            PolicyError::CircuitOpen { .. } => match self.circuit_open {
                CircuitOpenPolicy::FollowApplyOn => self.apply_on.matches_all_kinds(),
                CircuitOpenPolicy::Apply => true,
                CircuitOpenPolicy::Skip => false,
            },
            PolicyError::FallbackResolution { .. } | PolicyError::Cancelled => false,
        }
    }
}

impl<E> fmt::Debug for FallbackConfig<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FallbackConfig")
            .field("name", &self.name)
            .field("handler_id", &self.handler_id)
            .field("apply_on", &self.apply_on)
            .field("circuit_open", &self.circuit_open)
            .finish()
    }
}

/// Builder for [`FallbackConfig`].
pub struct FallbackConfigBuilder<E> {
    name: Option<String>,
    handler_id: String,
    apply_on: Classifier<E>,
    circuit_open: CircuitOpenPolicy,
    event_listeners: EventListeners<FallbackEvent>,
}

impl<E> Default for FallbackConfigBuilder<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> FallbackConfigBuilder<E> {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        crate::describe_metrics();
        Self {
            name: None,
            handler_id: String::new(),
            apply_on: Classifier::new(),
            circuit_open: CircuitOpenPolicy::default(),
            event_listeners: EventListeners::new(),
        }
    }

    /// Sets the handler id to invoke on failure. Required.
    pub fn handler_id(mut self, handler_id: impl Into<String>) -> Self {
        self.handler_id = handler_id.into();
        self
    }

    /// Sets the name for this fallback instance (used in metrics and events).
    ///
    /// Defaults to the handler id.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Applies the fallback only to failures of this kind (may be called repeatedly).
    pub fn apply_on<K>(mut self, kind: K) -> Self
    where
        K: FailureKind<E> + 'static,
    {
        self.apply_on = self.apply_on.only_on(kind);
        self
    }

    /// Never applies the fallback to failures of this kind.
    pub fn ignore<K>(mut self, kind: K) -> Self
    where
        K: FailureKind<E> + 'static,
    {
        self.apply_on = self.apply_on.except_for(kind);
        self
    }

    /// Replaces the eligibility classifier wholesale.
    pub fn classifier(mut self, classifier: Classifier<E>) -> Self {
        self.apply_on = classifier;
        self
    }

    /// Applies the fallback to circuit-open rejections even when `apply_on`
    /// lists specific kinds.
    pub fn apply_on_circuit_open(mut self) -> Self {
        self.circuit_open = CircuitOpenPolicy::Apply;
        self
    }

    /// Lets circuit-open rejections through to the caller.
    pub fn except_circuit_open(mut self) -> Self {
        self.circuit_open = CircuitOpenPolicy::Skip;
        self
    }

    /// Registers a callback when a handler result replaces a failure.
    ///
    /// Called with the handler id.
    pub fn on_fallback_applied<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.event_listeners.on(move |event| {
            if let FallbackEvent::Applied { handler_id, .. } = event {
                f(handler_id);
            }
        });
        self
    }

    /// Registers a callback when the handler itself fails.
    pub fn on_fallback_failed<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.event_listeners.on(move |event| {
            if let FallbackEvent::Failed { handler_id, .. } = event {
                f(handler_id);
            }
        });
        self
    }

    /// Registers a callback when a failure is not eligible.
    pub fn on_skipped<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners.on(move |event| {
            if matches!(event, FallbackEvent::Skipped { .. }) {
                f();
            }
        });
        self
    }

    /// Registers a callback when no handler is registered for the id.
    pub fn on_resolution_failed<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.event_listeners.on(move |event| {
            if let FallbackEvent::ResolutionFailed { handler_id, .. } = event {
                f(handler_id);
            }
        });
        self
    }

    /// Builds the configuration, validating every value.
    pub fn try_build(self) -> Result<FallbackConfig<E>, ConfigError> {
        if self.handler_id.is_empty() {
            return Err(ConfigError::Empty("handler_id"));
        }
        let name = self.name.unwrap_or_else(|| self.handler_id.clone());
        if name.is_empty() {
            return Err(ConfigError::Empty("name"));
        }

        Ok(FallbackConfig {
            name,
            handler_id: self.handler_id,
            apply_on: self.apply_on,
            circuit_open: self.circuit_open,
            event_listeners: self.event_listeners,
        })
    }

    /// Builds the configuration.
    ///
    /// # Panics
    ///
    /// Panics if no handler id was set or the name is empty.
    pub fn build(self) -> FallbackConfig<E> {
        match self.try_build() {
            Ok(config) => config,
            Err(err) => panic!("invalid fallback configuration: {err}"),
        }
    }
}
