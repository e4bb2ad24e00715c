//! Failure classification.
//!
//! A [`Classifier`] decides whether an observed failure belongs to a policy's
//! set of interesting kinds: which failures are retryable, which count against
//! a circuit breaker, which a fallback may replace. It holds two sets of
//! [`FailureKind`]s:
//!
//! - `only_on`: when empty every failure matches, otherwise the failure must
//!   match at least one kind;
//! - `except_for`: a failure matching any of these never matches, regardless
//!   of `only_on`.
//!
//! ```rust
//! use fortify_core::Classifier;
//! use std::io::{Error, ErrorKind};
//!
//! let retryable = Classifier::<Error>::new()
//!     .only_on(|e: &Error| e.kind() == ErrorKind::TimedOut)
//!     .only_on(|e: &Error| e.kind() == ErrorKind::ConnectionReset)
//!     .except_for(|e: &Error| e.to_string().contains("permanent"));
//!
//! assert!(retryable.matches(&Error::new(ErrorKind::TimedOut, "slow")));
//! assert!(!retryable.matches(&Error::new(ErrorKind::TimedOut, "permanent")));
//! assert!(!retryable.matches(&Error::new(ErrorKind::NotFound, "gone")));
//! ```

use std::error::Error as StdError;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// A kind of failure a [`Classifier`] can test against.
///
/// Any `Fn(&E) -> bool` closure is a kind. [`ErrorType`] provides the type-tag
/// flavour for boxed errors.
pub trait FailureKind<E>: Send + Sync {
    /// Returns `true` if `failure` is of this kind.
    fn matches(&self, failure: &E) -> bool;
}

impl<E, F> FailureKind<E> for F
where
    F: Fn(&E) -> bool + Send + Sync,
{
    fn matches(&self, failure: &E) -> bool {
        self(failure)
    }
}

/// Boxed error type commonly used by tower services.
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Matches a boxed error whose concrete type is `T`.
///
/// ```rust
/// use fortify_core::{BoxError, Classifier, ErrorType};
///
/// let classifier = Classifier::<BoxError>::new().only_on(ErrorType::<std::io::Error>::new());
///
/// let io: BoxError = Box::new(std::io::Error::other("disk"));
/// let fmt: BoxError = Box::new(std::fmt::Error);
/// assert!(classifier.matches(&io));
/// assert!(!classifier.matches(&fmt));
/// ```
pub struct ErrorType<T> {
    _type: PhantomData<fn() -> T>,
}

impl<T> ErrorType<T> {
    /// Creates a kind matching errors of type `T`.
    pub fn new() -> Self {
        Self { _type: PhantomData }
    }
}

impl<T> Default for ErrorType<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for ErrorType<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for ErrorType<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ErrorType<{}>", std::any::type_name::<T>())
    }
}

impl<T> FailureKind<BoxError> for ErrorType<T>
where
    T: StdError + 'static,
{
    fn matches(&self, failure: &BoxError) -> bool {
        failure.is::<T>()
    }
}

/// Shared, type-erased failure kind.
pub type SharedKind<E> = Arc<dyn FailureKind<E>>;

/// Allow/deny classifier over failure kinds.
///
/// Immutable once built into a policy config; cloning is cheap.
pub struct Classifier<E> {
    only_on: Vec<SharedKind<E>>,
    except_for: Vec<SharedKind<E>>,
}

impl<E> Classifier<E> {
    /// Creates a classifier that matches every failure.
    pub fn new() -> Self {
        Self {
            only_on: Vec::new(),
            except_for: Vec::new(),
        }
    }

    /// Adds a kind to the `only_on` set.
    pub fn only_on<K>(mut self, kind: K) -> Self
    where
        K: FailureKind<E> + 'static,
    {
        self.only_on.push(Arc::new(kind));
        self
    }

    /// Adds a kind to the `except_for` set.
    pub fn except_for<K>(mut self, kind: K) -> Self
    where
        K: FailureKind<E> + 'static,
    {
        self.except_for.push(Arc::new(kind));
        self
    }

    /// Adds an already shared kind to the `only_on` set.
    pub fn only_on_shared(mut self, kind: SharedKind<E>) -> Self {
        self.only_on.push(kind);
        self
    }

    /// Adds an already shared kind to the `except_for` set.
    pub fn except_for_shared(mut self, kind: SharedKind<E>) -> Self {
        self.except_for.push(kind);
        self
    }

    /// Decides whether `failure` belongs to this classifier's set.
    pub fn matches(&self, failure: &E) -> bool {
        if self.is_excluded(failure) {
            return false;
        }
        self.only_on.is_empty() || self.only_on.iter().any(|kind| kind.matches(failure))
    }

    /// Returns `true` if `failure` matches an `except_for` kind.
    pub fn is_excluded(&self, failure: &E) -> bool {
        self.except_for.iter().any(|kind| kind.matches(failure))
    }

    /// Returns `true` if no `only_on` kinds are configured.
    pub fn matches_all_kinds(&self) -> bool {
        self.only_on.is_empty()
    }

    /// Returns `true` if neither set has any kinds.
    pub fn is_unrestricted(&self) -> bool {
        self.only_on.is_empty() && self.except_for.is_empty()
    }
}

impl<E> Default for Classifier<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Clone for Classifier<E> {
    fn clone(&self) -> Self {
        Self {
            only_on: self.only_on.clone(),
            except_for: self.except_for.clone(),
        }
    }
}

impl<E> fmt::Debug for Classifier<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Classifier")
            .field("only_on", &self.only_on.len())
            .field("except_for", &self.except_for.len())
            .finish()
    }
}
