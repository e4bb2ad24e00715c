//! Multiplicative backoff between retry attempts.
//!
//! Delays are whole milliseconds. Each step multiplies the current delay by a
//! floating point `multiplier`, truncates toward zero and, when a cap is
//! configured, clamps the result to `max_delay_ms`.
//!
//! ```rust
//! use fortify_retry::BackoffConfig;
//! use std::time::Duration;
//!
//! let backoff = BackoffConfig::new(100, 2.0, 800);
//! let delays: Vec<_> = backoff.sequence().take(6).collect();
//! assert_eq!(
//!     delays,
//!     [100, 200, 400, 800, 800, 800].map(Duration::from_millis)
//! );
//! ```

use fortify_core::ConfigError;
use std::time::Duration;

/// Backoff parameters for a retry policy.
///
/// `multiplier == 1.0` yields a constant delay. `max_delay_ms == 0` means the
/// delay is never capped.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BackoffConfig {
    /// Delay before the first retry, in milliseconds.
    pub initial_delay_ms: u64,
    /// Growth factor applied after every retry.
    pub multiplier: f64,
    /// Upper bound on the delay in milliseconds; `0` disables the cap.
    pub max_delay_ms: u64,
}

impl BackoffConfig {
    /// Creates a backoff from raw millisecond values.
    pub const fn new(initial_delay_ms: u64, multiplier: f64, max_delay_ms: u64) -> Self {
        Self {
            initial_delay_ms,
            multiplier,
            max_delay_ms,
        }
    }

    /// A constant delay between attempts.
    pub fn fixed(delay: Duration) -> Self {
        Self::new(duration_to_ms(delay), 1.0, 0)
    }

    /// An uncapped exponential delay starting at `initial`.
    pub fn exponential(initial: Duration, multiplier: f64) -> Self {
        Self::new(duration_to_ms(initial), multiplier, 0)
    }

    /// Caps every subsequent delay at `max`.
    pub fn with_max_delay(mut self, max: Duration) -> Self {
        self.max_delay_ms = duration_to_ms(max);
        self
    }

    /// The first delay as a [`Duration`].
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    /// The configured cap, or `None` when uncapped.
    pub fn max_delay(&self) -> Option<Duration> {
        (self.max_delay_ms > 0).then(|| Duration::from_millis(self.max_delay_ms))
    }

    /// Starts a fresh delay sequence.
    pub fn sequence(&self) -> BackoffSequence {
        BackoffSequence::new(*self)
    }

    /// Checks that the multiplier is finite and not below 1.0.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(ConfigError::InvalidMultiplier(self.multiplier));
        }
        Ok(())
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self::new(100, 1.0, 0)
    }
}

/// Computes the delay that follows `current_ms`.
///
/// The product is truncated toward zero and saturates at `u64::MAX`. When
/// `max_delay_ms > 0` the result never exceeds it.
///
/// ```rust
/// use fortify_retry::next_delay;
///
/// assert_eq!(next_delay(100, 1.5, 0), 150);
/// assert_eq!(next_delay(5, 1.5, 0), 7);
/// assert_eq!(next_delay(400, 2.0, 500), 500);
/// ```
pub fn next_delay(current_ms: u64, multiplier: f64, max_delay_ms: u64) -> u64 {
    // float-to-int `as` truncates and saturates
    let next = (current_ms as f64 * multiplier) as u64;
    if max_delay_ms > 0 {
        next.min(max_delay_ms)
    } else {
        next
    }
}

/// An endless sequence of retry delays.
///
/// The first item is always `initial_delay_ms`; every later item is
/// [`next_delay`] of the previous one.
#[derive(Debug, Clone)]
pub struct BackoffSequence {
    current_ms: u64,
    multiplier: f64,
    max_delay_ms: u64,
}

impl BackoffSequence {
    /// Starts a sequence from `config`.
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            current_ms: config.initial_delay_ms,
            multiplier: config.multiplier,
            max_delay_ms: config.max_delay_ms,
        }
    }

    /// Returns the delay to wait now and advances to the next one.
    pub fn advance(&mut self) -> Duration {
        let delay = Duration::from_millis(self.current_ms);
        self.current_ms = next_delay(self.current_ms, self.multiplier, self.max_delay_ms);
        delay
    }

    /// The delay [`advance`](Self::advance) will return next.
    pub fn peek(&self) -> Duration {
        Duration::from_millis(self.current_ms)
    }
}

impl Iterator for BackoffSequence {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        Some(self.advance())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (usize::MAX, None)
    }
}

fn duration_to_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
