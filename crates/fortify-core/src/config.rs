//! Configuration validation errors.

use thiserror::Error;

/// A policy configuration value was out of range.
///
/// Returned by every `try_build()`; `build()` panics with the same message.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// `max_attempts` must allow at least the initial call.
    #[error("max_attempts must be at least 1, got {0}")]
    InvalidMaxAttempts(usize),

    /// Backoff multipliers below 1.0 would shrink the delay.
    #[error("backoff multiplier must be a finite value >= 1.0, got {0}")]
    InvalidMultiplier(f64),

    /// A breaker must tolerate at least one failure before opening.
    #[error("failure_threshold must be at least 1, got {0}")]
    InvalidFailureThreshold(u32),

    /// The named field was empty.
    #[error("{0} must not be empty")]
    Empty(&'static str),
}
