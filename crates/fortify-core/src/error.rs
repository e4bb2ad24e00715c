//! The failure taxonomy shared by every policy layer.
//!
//! All fortify layers speak [`PolicyError<E>`], where `E` is the protected
//! operation's own error type. A caller therefore only ever sees one of:
//!
//! - [`PolicyError::Inner`]: the operation's failure (after retries were
//!   exhausted or when the failure was not retryable), or the failure raised by
//!   a fallback handler, exactly as it was produced;
//! - [`PolicyError::CircuitOpen`]: the breaker rejected the call without
//!   invoking the operation;
//! - [`PolicyError::FallbackResolution`]: a fallback was due but no handler was
//!   registered under the configured id;
//! - [`PolicyError::Cancelled`]: the caller cancelled while a retry loop was
//!   waiting out a backoff delay.
//!
//! ```rust
//! use fortify_core::PolicyError;
//!
//! #[derive(Debug)]
//! enum AppError {
//!     Unavailable,
//! }
//!
//! fn describe(err: PolicyError<AppError>) -> String {
//!     match err {
//!         PolicyError::Inner(AppError::Unavailable) => "dependency unavailable".into(),
//!         PolicyError::CircuitOpen { name } => format!("breaker {name} is open"),
//!         PolicyError::FallbackResolution { handler_id, .. } => {
//!             format!("fallback {handler_id} is not registered")
//!         }
//!         PolicyError::Cancelled => "cancelled".into(),
//!     }
//! }
//!
//! assert_eq!(describe(PolicyError::Cancelled), "cancelled");
//! ```

use std::fmt;

/// Unified error returned by protected operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyError<E> {
    /// The operation (or a fallback handler) failed with its own error.
    Inner(E),

    /// The circuit breaker is open; the operation was not invoked.
    CircuitOpen {
        /// Name of the breaker that rejected the call.
        name: String,
    },

    /// A fallback applied but no handler is registered for `handler_id`.
    ///
    /// This is a configuration defect, not a business failure.
    FallbackResolution {
        /// The handler id the fallback policy was configured with.
        handler_id: String,
        /// The failure that triggered the fallback.
        cause: Box<PolicyError<E>>,
    },

    /// The caller cancelled while the retry loop was suspended in backoff.
    Cancelled,
}

impl<E> PolicyError<E> {
    /// Returns `true` if the breaker rejected the call.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, PolicyError::CircuitOpen { .. })
    }

    /// Returns `true` if no fallback handler could be resolved.
    pub fn is_fallback_resolution(&self) -> bool {
        matches!(self, PolicyError::FallbackResolution { .. })
    }

    /// Returns `true` if the call was cancelled during backoff.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PolicyError::Cancelled)
    }

    /// Returns `true` if this carries the operation's own error.
    pub fn is_inner(&self) -> bool {
        matches!(self, PolicyError::Inner(_))
    }

    /// Returns a reference to the operation's error, if this is `Inner`.
    pub fn inner(&self) -> Option<&E> {
        match self {
            PolicyError::Inner(e) => Some(e),
            _ => None,
        }
    }

    /// Extracts the operation's error, if this is `Inner`.
    pub fn into_inner(self) -> Option<E> {
        match self {
            PolicyError::Inner(e) => Some(e),
            _ => None,
        }
    }

    /// Returns the breaker name carried by a `CircuitOpen` rejection.
    pub fn circuit_name(&self) -> Option<&str> {
        match self {
            PolicyError::CircuitOpen { name } => Some(name),
            _ => None,
        }
    }

    /// Returns the triggering failure of a `FallbackResolution` error.
    pub fn resolution_cause(&self) -> Option<&PolicyError<E>> {
        match self {
            PolicyError::FallbackResolution { cause, .. } => Some(cause),
            _ => None,
        }
    }

    /// Maps the operation error, preserving every synthetic variant.
    ///
    /// ```
    /// use fortify_core::PolicyError;
    ///
    /// let err: PolicyError<String> = PolicyError::Inner("boom".to_string());
    /// assert_eq!(err.map_inner(|s| s.len()).into_inner(), Some(4));
    /// ```
    pub fn map_inner<F, T>(self, f: F) -> PolicyError<T>
    where
        F: FnOnce(E) -> T,
    {
        match self {
            PolicyError::Inner(e) => PolicyError::Inner(f(e)),
            PolicyError::CircuitOpen { name } => PolicyError::CircuitOpen { name },
            PolicyError::FallbackResolution { handler_id, cause } => {
                PolicyError::FallbackResolution {
                    handler_id,
                    cause: Box::new(cause.map_inner(f)),
                }
            }
            PolicyError::Cancelled => PolicyError::Cancelled,
        }
    }
}

impl<E> From<E> for PolicyError<E> {
    fn from(err: E) -> Self {
        PolicyError::Inner(err)
    }
}

impl<E> fmt::Display for PolicyError<E>
where
    E: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyError::Inner(e) => write!(f, "{}", e),
            PolicyError::CircuitOpen { name } => {
                write!(f, "circuit breaker '{}' is OPEN", name)
            }
            PolicyError::FallbackResolution { handler_id, cause } => write!(
                f,
                "no suitable fallback handler '{}' registered; expected the operation's \
                 arguments, optionally followed by the failure (triggered by: {})",
                handler_id, cause
            ),
            PolicyError::Cancelled => write!(f, "cancelled while waiting to retry"),
        }
    }
}

impl<E> std::error::Error for PolicyError<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PolicyError::Inner(e) => e.source(),
            PolicyError::FallbackResolution { cause, .. } => Some(cause.as_ref()),
            _ => None,
        }
    }
}
