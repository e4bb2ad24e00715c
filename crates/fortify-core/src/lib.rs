//! Core infrastructure for fortify.
//!
//! This crate provides the pieces every policy crate shares:
//! - [`PolicyError`], the failure taxonomy surfaced to callers
//! - [`Classifier`] and [`FailureKind`], allow/deny failure classification
//! - [`ConfigError`], returned by the policy builders' `try_build`
//! - the event system used for observability

pub mod classifier;
pub mod config;
pub mod error;
pub mod events;

pub use classifier::{BoxError, Classifier, ErrorType, FailureKind, SharedKind};
pub use config::ConfigError;
pub use error::PolicyError;
pub use events::{EventListener, EventListeners, FnListener, PolicyEvent};
