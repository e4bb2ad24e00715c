//! Events emitted by the fallback policy.

use fortify_core::PolicyEvent;
use std::time::Instant;

/// Events emitted by the fallback policy.
#[derive(Debug, Clone)]
pub enum FallbackEvent {
    /// The inner service succeeded; no fallback was needed.
    Success {
        /// Name of the fallback instance.
        policy_name: String,
        /// When the event occurred.
        timestamp: Instant,
    },

    /// The failure was eligible and a handler produced the response.
    Applied {
        /// Name of the fallback instance.
        policy_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// The handler id that was invoked.
        handler_id: String,
        /// Label of the handler form that was invoked.
        form: &'static str,
    },

    /// The handler itself failed; its failure replaces the original one.
    Failed {
        /// Name of the fallback instance.
        policy_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// The handler id that was invoked.
        handler_id: String,
    },

    /// The failure was not eligible; it was propagated as-is.
    Skipped {
        /// Name of the fallback instance.
        policy_name: String,
        /// When the event occurred.
        timestamp: Instant,
    },

    /// The failure was eligible but no handler is registered for the id.
    ResolutionFailed {
        /// Name of the fallback instance.
        policy_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// The handler id that could not be resolved.
        handler_id: String,
    },
}

impl PolicyEvent for FallbackEvent {
    fn event_type(&self) -> &'static str {
        match self {
            FallbackEvent::Success { .. } => "success",
            FallbackEvent::Applied { .. } => "applied",
            FallbackEvent::Failed { .. } => "failed",
            FallbackEvent::Skipped { .. } => "skipped",
            FallbackEvent::ResolutionFailed { .. } => "resolution_failed",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            FallbackEvent::Success { timestamp, .. }
            | FallbackEvent::Applied { timestamp, .. }
            | FallbackEvent::Failed { timestamp, .. }
            | FallbackEvent::Skipped { timestamp, .. }
            | FallbackEvent::ResolutionFailed { timestamp, .. } => *timestamp,
        }
    }

    fn policy_name(&self) -> &str {
        match self {
            FallbackEvent::Success { policy_name, .. }
            | FallbackEvent::Applied { policy_name, .. }
            | FallbackEvent::Failed { policy_name, .. }
            | FallbackEvent::Skipped { policy_name, .. }
            | FallbackEvent::ResolutionFailed { policy_name, .. } => policy_name,
        }
    }
}
