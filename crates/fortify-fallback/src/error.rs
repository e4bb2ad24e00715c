//! Handler registration errors.

use std::fmt;
use thiserror::Error;

/// The two handler shapes a fallback id can resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerForm {
    /// Takes the operation's arguments followed by the failure.
    WithFailure,
    /// Takes only the operation's arguments.
    ArgsOnly,
}

impl HandlerForm {
    /// Stable label used in events and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            HandlerForm::WithFailure => "with_failure",
            HandlerForm::ArgsOnly => "args_only",
        }
    }
}

impl fmt::Display for HandlerForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerForm::WithFailure => f.write_str("(arguments, failure)"),
            HandlerForm::ArgsOnly => f.write_str("(arguments)"),
        }
    }
}

/// A handler could not be registered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    /// A handler of the same form already exists for this id.
    #[error("fallback handler '{handler_id}' already has a {form} handler")]
    Duplicate {
        /// The id that was registered twice.
        handler_id: String,
        /// The form that was registered twice.
        form: HandlerForm,
    },

    /// Handler ids must not be empty.
    #[error("fallback handler id must not be empty")]
    EmptyId,
}
