use crate::backoff::BackoffConfig;
use crate::events::RetryEvent;
use fortify_core::events::EventListeners;
use fortify_core::{Classifier, ConfigError, FailureKind};
use std::fmt;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Configuration for the retry policy.
pub struct RetryConfig<E> {
    pub(crate) max_attempts: usize,
    pub(crate) backoff: BackoffConfig,
    pub(crate) retry_on: Classifier<E>,
    pub(crate) event_listeners: EventListeners<RetryEvent>,
    pub(crate) name: String,
    pub(crate) cancellation: Option<CancellationToken>,
}

impl<E> RetryConfig<E> {
    /// Creates a new builder with defaults.
    pub fn builder() -> RetryConfigBuilder<E> {
        RetryConfigBuilder::new()
    }

    /// Wraps this configuration in a [`RetryLayer`](crate::RetryLayer).
    pub fn layer(self) -> crate::RetryLayer<E> {
        crate::RetryLayer::new(self)
    }

    /// Maximum number of invocations, counting the initial one.
    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Backoff applied between attempts.
    pub fn backoff(&self) -> BackoffConfig {
        self.backoff
    }

    /// The instance name used in events, logs and metrics.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The retryable-failure classifier.
    pub fn classifier(&self) -> &Classifier<E> {
        &self.retry_on
    }

    /// Token observed by [`RetryExecutor::execute`](crate::RetryExecutor::execute).
    pub fn cancellation_token(&self) -> Option<&CancellationToken> {
        self.cancellation.as_ref()
    }

    /// Returns `true` if `error` should be retried.
    ///
    /// A `no_retry_on` match always wins; otherwise an empty `retry_on` set
    /// retries everything.
    pub fn should_retry(&self, error: &E) -> bool {
        self.retry_on.matches(error)
    }
}

impl<E> fmt::Debug for RetryConfig<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryConfig")
            .field("name", &self.name)
            .field("max_attempts", &self.max_attempts)
            .field("backoff", &self.backoff)
            .field("retry_on", &self.retry_on)
            .field("cancellable", &self.cancellation.is_some())
            .finish()
    }
}

/// Builder for [`RetryConfig`].
pub struct RetryConfigBuilder<E> {
    max_attempts: usize,
    backoff: BackoffConfig,
    retry_on: Classifier<E>,
    event_listeners: EventListeners<RetryEvent>,
    name: String,
    cancellation: Option<CancellationToken>,
}

impl<E> Default for RetryConfigBuilder<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> RetryConfigBuilder<E> {
    /// Creates a new builder with defaults.
    ///
    /// Defaults:
    /// - max_attempts: 3
    /// - backoff: 100ms constant delay, uncapped
    /// - retry_on: every failure
    /// - name: `"<unnamed>"`
    pub fn new() -> Self {
        crate::describe_metrics();
        Self {
            max_attempts: 3,
            backoff: BackoffConfig::default(),
            retry_on: Classifier::new(),
            event_listeners: EventListeners::new(),
            name: "<unnamed>".to_string(),
            cancellation: None,
        }
    }

    /// Sets the maximum number of attempts.
    ///
    /// This includes the initial attempt, so `max_attempts = 3` means
    /// 1 initial attempt + 2 retries. `1` disables retrying.
    pub fn max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Replaces the whole backoff configuration.
    pub fn backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    /// Waits `delay` between every pair of attempts.
    pub fn fixed_backoff(mut self, delay: Duration) -> Self {
        let max_delay = self.backoff.max_delay().unwrap_or_default();
        self.backoff = BackoffConfig::fixed(delay).with_max_delay(max_delay);
        self
    }

    /// Starts at `initial` and multiplies the delay by `multiplier` after each retry.
    pub fn exponential_backoff(mut self, initial: Duration, multiplier: f64) -> Self {
        self.backoff = BackoffConfig::exponential(initial, multiplier)
            .with_max_delay(self.backoff.max_delay().unwrap_or_default());
        self
    }

    /// Caps the delay. `Duration::ZERO` removes the cap.
    pub fn max_delay(mut self, max: Duration) -> Self {
        self.backoff = self.backoff.with_max_delay(max);
        self
    }

    /// Retries only failures of this kind (may be called repeatedly).
    ///
    /// ```rust
    /// use fortify_retry::RetryConfig;
    /// use std::io::{Error, ErrorKind};
    ///
    /// let config = RetryConfig::<Error>::builder()
    ///     .retry_on(|e: &Error| e.kind() == ErrorKind::TimedOut)
    ///     .no_retry_on(|e: &Error| e.to_string().contains("quota"))
    ///     .build();
    ///
    /// assert!(config.should_retry(&Error::new(ErrorKind::TimedOut, "slow")));
    /// assert!(!config.should_retry(&Error::new(ErrorKind::TimedOut, "quota exceeded")));
    /// assert!(!config.should_retry(&Error::new(ErrorKind::NotFound, "gone")));
    /// ```
    pub fn retry_on<K>(mut self, kind: K) -> Self
    where
        K: FailureKind<E> + 'static,
    {
        self.retry_on = self.retry_on.only_on(kind);
        self
    }

    /// Never retries failures of this kind, even if they match `retry_on`.
    pub fn no_retry_on<K>(mut self, kind: K) -> Self
    where
        K: FailureKind<E> + 'static,
    {
        self.retry_on = self.retry_on.except_for(kind);
        self
    }

    /// Replaces the retry classifier wholesale.
    pub fn classifier(mut self, classifier: Classifier<E>) -> Self {
        self.retry_on = classifier;
        self
    }

    /// Sets the name for this retry instance (used in events).
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Aborts backoff waits when `token` is cancelled.
    ///
    /// The token is honoured by every call made through this configuration;
    /// use [`RetryExecutor::execute_with_cancel`](crate::RetryExecutor::execute_with_cancel)
    /// for per-call tokens.
    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Registers a callback when a retry attempt is about to be made.
    ///
    /// Called with the number of the attempt that just failed (1-indexed) and
    /// the delay before the next one.
    pub fn on_retry<F>(mut self, f: F) -> Self
    where
        F: Fn(usize, Duration) + Send + Sync + 'static,
    {
        self.event_listeners.on(move |event| {
            if let RetryEvent::Retry { attempt, delay, .. } = event {
                f(*attempt, *delay);
            }
        });
        self
    }

    /// Registers a callback when an operation succeeds.
    ///
    /// Called with the total number of attempts made, so `1` means success on
    /// the first try.
    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.event_listeners.on(move |event| {
            if let RetryEvent::Success { attempts, .. } = event {
                f(*attempts);
            }
        });
        self
    }

    /// Registers a callback when all retry attempts are exhausted.
    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.event_listeners.on(move |event| {
            if let RetryEvent::Error { attempts, .. } = event {
                f(*attempts);
            }
        });
        self
    }

    /// Registers a callback when a failure is not retryable.
    pub fn on_ignored_error<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners.on(move |event| {
            if matches!(event, RetryEvent::IgnoredError { .. }) {
                f();
            }
        });
        self
    }

    /// Registers a callback when a backoff wait is cancelled.
    pub fn on_cancelled<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.event_listeners.on(move |event| {
            if let RetryEvent::Cancelled { attempt, .. } = event {
                f(*attempt);
            }
        });
        self
    }

    /// Builds the configuration, validating every value.
    pub fn try_build(self) -> Result<RetryConfig<E>, ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::InvalidMaxAttempts(self.max_attempts));
        }
        self.backoff.validate()?;
        if self.name.is_empty() {
            return Err(ConfigError::Empty("name"));
        }

        Ok(RetryConfig {
            max_attempts: self.max_attempts,
            backoff: self.backoff,
            retry_on: self.retry_on,
            event_listeners: self.event_listeners,
            name: self.name,
            cancellation: self.cancellation,
        })
    }

    /// Builds the configuration.
    ///
    /// # Panics
    ///
    /// Panics if `max_attempts` is 0, the multiplier is below 1.0 or not
    /// finite, or the name is empty. Use [`try_build`](Self::try_build) to
    /// handle these as errors.
    pub fn build(self) -> RetryConfig<E> {
        match self.try_build() {
            Ok(config) => config,
            Err(err) => panic!("invalid retry configuration: {err}"),
        }
    }
}
