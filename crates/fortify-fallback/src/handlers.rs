//! Validated registration of fallback handlers.

use crate::error::{HandlerForm, RegistrationError};
use fortify_core::PolicyError;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Handler taking the operation's arguments and the failure that triggered it.
pub type WithFailureFn<Req, Res, E> =
    Arc<dyn Fn(Req, PolicyError<E>) -> BoxFuture<'static, Result<Res, E>> + Send + Sync>;

/// Handler taking only the operation's arguments.
pub type ArgsOnlyFn<Req, Res, E> =
    Arc<dyn Fn(Req) -> BoxFuture<'static, Result<Res, E>> + Send + Sync>;

struct Slot<Req, Res, E> {
    with_failure: Option<WithFailureFn<Req, Res, E>>,
    args_only: Option<ArgsOnlyFn<Req, Res, E>>,
}

impl<Req, Res, E> Default for Slot<Req, Res, E> {
    fn default() -> Self {
        Self {
            with_failure: None,
            args_only: None,
        }
    }
}

/// The handler chosen for a fallback id.
pub(crate) enum Resolved<'a, Req, Res, E> {
    WithFailure(&'a WithFailureFn<Req, Res, E>),
    ArgsOnly(&'a ArgsOnlyFn<Req, Res, E>),
}

/// Fallback handlers for one operation shape, keyed by handler id.
///
/// Each id may carry one handler of each [`HandlerForm`]. The argument and
/// result types are fixed by the operation (`Req`, `Res`, `E`), so a handler
/// with the wrong shape is rejected by the compiler at registration rather
/// than discovered at call time.
///
/// ```rust
/// use fortify_fallback::{FallbackHandlers, RegistrationError};
///
/// let mut handlers = FallbackHandlers::<u32, String, std::io::Error>::new();
/// handlers
///     .register("cached", |id: u32| async move { Ok(format!("cached #{id}")) })
///     .unwrap();
/// handlers
///     .register_with_failure("cached", |id: u32, failure| async move {
///         Ok(format!("cached #{id} after {failure}"))
///     })
///     .unwrap();
///
/// assert!(matches!(
///     handlers.register("cached", |_id: u32| async { Ok(String::new()) }),
///     Err(RegistrationError::Duplicate { .. })
/// ));
/// ```
pub struct FallbackHandlers<Req, Res, E> {
    slots: HashMap<String, Slot<Req, Res, E>>,
}

impl<Req, Res, E> Default for FallbackHandlers<Req, Res, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Req, Res, E> FallbackHandlers<Req, Res, E> {
    /// Creates an empty handler set.
    pub fn new() -> Self {
        Self {
            slots: HashMap::new(),
        }
    }

    /// Registers a handler that receives the arguments and the failure.
    ///
    /// This form is preferred over [`register`](Self::register) when both
    /// exist for the same id.
    pub fn register_with_failure<F, Fut>(
        &mut self,
        handler_id: impl Into<String>,
        handler: F,
    ) -> Result<&mut Self, RegistrationError>
    where
        F: Fn(Req, PolicyError<E>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Res, E>> + Send + 'static,
        Req: 'static,
        Res: 'static,
        E: 'static,
    {
        let handler_id = handler_id.into();
        let slot = self.slot(&handler_id, HandlerForm::WithFailure)?;
        slot.with_failure = Some(Arc::new(
            move |req: Req, failure: PolicyError<E>| -> BoxFuture<'static, Result<Res, E>> {
                Box::pin(handler(req, failure))
            },
        ));
        Ok(self)
    }

    /// Registers a handler that receives only the arguments.
    pub fn register<F, Fut>(
        &mut self,
        handler_id: impl Into<String>,
        handler: F,
    ) -> Result<&mut Self, RegistrationError>
    where
        F: Fn(Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Res, E>> + Send + 'static,
        Req: 'static,
        Res: 'static,
        E: 'static,
    {
        let handler_id = handler_id.into();
        let slot = self.slot(&handler_id, HandlerForm::ArgsOnly)?;
        slot.args_only = Some(Arc::new(
            move |req: Req| -> BoxFuture<'static, Result<Res, E>> { Box::pin(handler(req)) },
        ));
        Ok(self)
    }

    fn slot(
        &mut self,
        handler_id: &str,
        form: HandlerForm,
    ) -> Result<&mut Slot<Req, Res, E>, RegistrationError> {
        if handler_id.is_empty() {
            return Err(RegistrationError::EmptyId);
        }

        let slot = self.slots.entry(handler_id.to_string()).or_default();
        let taken = match form {
            HandlerForm::WithFailure => slot.with_failure.is_some(),
            HandlerForm::ArgsOnly => slot.args_only.is_some(),
        };
        if taken {
            return Err(RegistrationError::Duplicate {
                handler_id: handler_id.to_string(),
                form,
            });
        }
        Ok(slot)
    }

    /// Returns `true` if any handler is registered under `handler_id`.
    pub fn contains(&self, handler_id: &str) -> bool {
        self.resolve(handler_id).is_some()
    }

    /// The form [`FallbackResolver`](crate::FallbackResolver) would invoke for `handler_id`.
    pub fn form_for(&self, handler_id: &str) -> Option<HandlerForm> {
        self.resolve(handler_id).map(|resolved| match resolved {
            Resolved::WithFailure(_) => HandlerForm::WithFailure,
            Resolved::ArgsOnly(_) => HandlerForm::ArgsOnly,
        })
    }

    /// Registered handler ids, sorted.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.slots.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Number of registered ids.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Picks the handler for `handler_id`, preferring the failure-aware form.
    pub(crate) fn resolve(&self, handler_id: &str) -> Option<Resolved<'_, Req, Res, E>> {
        let slot = self.slots.get(handler_id)?;
        if let Some(handler) = &slot.with_failure {
            return Some(Resolved::WithFailure(handler));
        }
        slot.args_only.as_ref().map(Resolved::ArgsOnly)
    }
}

impl<Req, Res, E> fmt::Debug for FallbackHandlers<Req, Res, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FallbackHandlers")
            .field("ids", &self.ids())
            .finish()
    }
}
