use crate::events::CircuitBreakerEvent;
use crate::registry::CircuitBreakerRegistry;
use crate::state::{CircuitBreakerHandle, CircuitState, StateTransition};
use fortify_core::events::EventListeners;
use fortify_core::{Classifier, ConfigError, FailureKind};
use std::fmt;
use std::time::Duration;

/// Configuration for the circuit breaker pattern.
pub struct CircuitBreakerConfig<E> {
    pub(crate) name: String,
    pub(crate) failure_threshold: u32,
    pub(crate) reset_timeout: Duration,
    pub(crate) fail_on: Classifier<E>,
    pub(crate) event_listeners: EventListeners<CircuitBreakerEvent>,
}

impl<E> CircuitBreakerConfig<E> {
    /// Creates a new configuration builder.
    pub fn builder() -> CircuitBreakerConfigBuilder<E> {
        CircuitBreakerConfigBuilder::new()
    }

    /// Acquires this configuration's breaker from `registry` and returns the layer.
    pub fn layer(self, registry: &CircuitBreakerRegistry) -> crate::CircuitBreakerLayer<E> {
        crate::CircuitBreakerLayer::new(self, registry)
    }

    /// The breaker name; operations sharing it share state.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Consecutive countable failures that open the circuit.
    pub fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }

    /// How long the circuit stays OPEN before admitting trial calls.
    pub fn reset_timeout(&self) -> Duration {
        self.reset_timeout
    }

    /// Returns `true` if `error` counts against the breaker.
    pub fn is_countable(&self, error: &E) -> bool {
        self.fail_on.matches(error)
    }
}

impl<E> fmt::Debug for CircuitBreakerConfig<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreakerConfig")
            .field("name", &self.name)
            .field("failure_threshold", &self.failure_threshold)
            .field("reset_timeout", &self.reset_timeout)
            .field("fail_on", &self.fail_on)
            .finish()
    }
}

/// Builder for configuring and constructing a circuit breaker.
pub struct CircuitBreakerConfigBuilder<E> {
    name: Option<String>,
    failure_threshold: u32,
    reset_timeout: Duration,
    fail_on: Classifier<E>,
    event_listeners: EventListeners<CircuitBreakerEvent>,
}

impl<E> Default for CircuitBreakerConfigBuilder<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> CircuitBreakerConfigBuilder<E> {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        crate::describe_metrics();
        Self {
            name: None,
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(30),
            fail_on: Classifier::new(),
            event_listeners: EventListeners::new(),
        }
    }

    /// Sets the breaker name. Required.
    ///
    /// Every layer configured with the same name shares one breaker.
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the number of consecutive countable failures that open the circuit.
    ///
    /// Default: 5
    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Sets how long the circuit stays open before the next call becomes a trial.
    ///
    /// Default: 30 seconds
    pub fn reset_timeout(mut self, timeout: Duration) -> Self {
        self.reset_timeout = timeout;
        self
    }

    /// Counts only failures of this kind (may be called repeatedly).
    ///
    /// With no `fail_on` kinds every operation failure counts.
    pub fn fail_on<K>(mut self, kind: K) -> Self
    where
        K: FailureKind<E> + 'static,
    {
        self.fail_on = self.fail_on.only_on(kind);
        self
    }

    /// Never counts failures of this kind.
    pub fn ignore<K>(mut self, kind: K) -> Self
    where
        K: FailureKind<E> + 'static,
    {
        self.fail_on = self.fail_on.except_for(kind);
        self
    }

    /// Replaces the countable-failure classifier wholesale.
    pub fn classifier(mut self, classifier: Classifier<E>) -> Self {
        self.fail_on = classifier;
        self
    }

    /// Registers a callback for state transitions.
    ///
    /// Transitions are reported by the layer that caused them, including the
    /// lazy OPEN to HALF_OPEN change performed by a state read.
    pub fn on_state_transition<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState, CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners.on(move |event| {
            if let CircuitBreakerEvent::StateTransition {
                from_state,
                to_state,
                ..
            } = event
            {
                f(*from_state, *to_state);
            }
        });
        self
    }

    /// Registers a callback when a call is permitted.
    pub fn on_call_permitted<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners.on(move |event| {
            if let CircuitBreakerEvent::CallPermitted { state, .. } = event {
                f(*state);
            }
        });
        self
    }

    /// Registers a callback when a call is rejected because the circuit is open.
    pub fn on_call_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners.on(move |event| {
            if matches!(event, CircuitBreakerEvent::CallRejected { .. }) {
                f();
            }
        });
        self
    }

    /// Registers a callback when a success is recorded.
    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners.on(move |event| {
            if let CircuitBreakerEvent::SuccessRecorded { state, .. } = event {
                f(*state);
            }
        });
        self
    }

    /// Registers a callback when a countable failure is recorded.
    ///
    /// Called with the state before the failure and the resulting count.
    pub fn on_failure<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState, u32) + Send + Sync + 'static,
    {
        self.event_listeners.on(move |event| {
            if let CircuitBreakerEvent::FailureRecorded {
                state,
                failure_count,
                ..
            } = event
            {
                f(*state, *failure_count);
            }
        });
        self
    }

    /// Builds the configuration, validating every value.
    pub fn try_build(self) -> Result<CircuitBreakerConfig<E>, ConfigError> {
        let name = match self.name {
            Some(name) if !name.is_empty() => name,
            _ => return Err(ConfigError::Empty("name")),
        };
        if self.failure_threshold == 0 {
            return Err(ConfigError::InvalidFailureThreshold(self.failure_threshold));
        }

        Ok(CircuitBreakerConfig {
            name,
            failure_threshold: self.failure_threshold,
            reset_timeout: self.reset_timeout,
            fail_on: self.fail_on,
            event_listeners: self.event_listeners,
        })
    }

    /// Builds the configuration.
    ///
    /// # Panics
    ///
    /// Panics if no name was set, the name is empty or `failure_threshold` is 0.
    pub fn build(self) -> CircuitBreakerConfig<E> {
        match self.try_build() {
            Ok(config) => config,
            Err(err) => panic!("invalid circuit breaker configuration: {err}"),
        }
    }
}

#[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
pub(crate) fn emit_transition<E>(
    config: &CircuitBreakerConfig<E>,
    handle: &CircuitBreakerHandle,
    transition: StateTransition,
) {
    config
        .event_listeners
        .emit_with(|| CircuitBreakerEvent::StateTransition {
            policy_name: config.name.clone(),
            timestamp: std::time::Instant::now(),
            from_state: transition.from,
            to_state: transition.to,
        });

    #[cfg(feature = "tracing")]
    match (transition.from, transition.to) {
        (_, CircuitState::Open) => tracing::warn!(
            breaker = %config.name,
            from = %transition.from,
            failure_threshold = handle.failure_threshold(),
            "circuit breaker opened"
        ),
        (CircuitState::HalfOpen, CircuitState::Closed) => tracing::info!(
            breaker = %config.name,
            "circuit breaker recovered, now CLOSED"
        ),
        (from, to) => tracing::info!(
            breaker = %config.name,
            from = %from,
            to = %to,
            "circuit state transition"
        ),
    }

    #[cfg(feature = "metrics")]
    {
        use metrics::{counter, gauge};

        counter!(
            "circuitbreaker_transitions_total",
            "circuitbreaker" => config.name.clone(),
            "from" => transition.from.as_str(),
            "to" => transition.to.as_str()
        )
        .increment(1);

        gauge!("circuitbreaker_state", "circuitbreaker" => config.name.clone()).set(
            match transition.to {
                CircuitState::Closed => 0.0,
                CircuitState::Open => 1.0,
                CircuitState::HalfOpen => 2.0,
            },
        );
    }
}
