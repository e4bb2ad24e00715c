use fortify_core::events::PolicyEvent;
use std::time::{Duration, Instant};

/// Events emitted by the retry policy.
#[derive(Debug, Clone)]
pub enum RetryEvent {
    /// An attempt failed with a retryable error; the policy waits `delay`
    /// before attempt `attempt + 1`.
    Retry {
        policy_name: String,
        timestamp: Instant,
        attempt: usize,
        delay: Duration,
    },
    /// The operation succeeded after `attempts` invocations.
    Success {
        policy_name: String,
        timestamp: Instant,
        attempts: usize,
    },
    /// Every allowed attempt failed; the last failure is returned.
    Error {
        policy_name: String,
        timestamp: Instant,
        attempts: usize,
    },
    /// A failure did not match the retry classifier and was returned as-is.
    IgnoredError {
        policy_name: String,
        timestamp: Instant,
        attempt: usize,
    },
    /// The caller cancelled while the policy waited out a backoff delay.
    Cancelled {
        policy_name: String,
        timestamp: Instant,
        attempt: usize,
    },
}

impl PolicyEvent for RetryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RetryEvent::Retry { .. } => "Retry",
            RetryEvent::Success { .. } => "Success",
            RetryEvent::Error { .. } => "Error",
            RetryEvent::IgnoredError { .. } => "IgnoredError",
            RetryEvent::Cancelled { .. } => "Cancelled",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            RetryEvent::Retry { timestamp, .. }
            | RetryEvent::Success { timestamp, .. }
            | RetryEvent::Error { timestamp, .. }
            | RetryEvent::IgnoredError { timestamp, .. }
            | RetryEvent::Cancelled { timestamp, .. } => *timestamp,
        }
    }

    fn policy_name(&self) -> &str {
        match self {
            RetryEvent::Retry { policy_name, .. }
            | RetryEvent::Success { policy_name, .. }
            | RetryEvent::Error { policy_name, .. }
            | RetryEvent::IgnoredError { policy_name, .. }
            | RetryEvent::Cancelled { policy_name, .. } => policy_name,
        }
    }
}
