//! Listener plumbing for policy events.
//!
//! Retry, circuit breaker and fallback each define an event enum and keep an
//! [`EventListeners`] on their configuration. The builders register closures
//! with [`EventListeners::on`]; the policies report with
//! [`EventListeners::emit_with`], which skips building the event when nobody
//! is listening.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// An event reported by a policy instance.
pub trait PolicyEvent: Send + Sync + fmt::Debug {
    /// Short label for the variant, such as `"Retry"` or `"StateTransition"`.
    fn event_type(&self) -> &'static str;

    /// When the policy observed it.
    fn timestamp(&self) -> Instant;

    /// Name of the retry, breaker or fallback instance that emitted it.
    fn policy_name(&self) -> &str;
}

/// Receives policy events.
pub trait EventListener<E: PolicyEvent>: Send + Sync {
    fn on_event(&self, event: &E);
}

/// Listeners registered on one policy configuration.
///
/// Clones share the registered listeners.
pub struct EventListeners<E: PolicyEvent> {
    listeners: Vec<Arc<dyn EventListener<E>>>,
}

impl<E: PolicyEvent> EventListeners<E> {
    /// An empty set.
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    /// Registers `listener` after the existing ones.
    pub fn add<L>(&mut self, listener: L)
    where
        L: EventListener<E> + 'static,
    {
        self.listeners.push(Arc::new(listener));
    }

    /// Registers a closure called with every event.
    pub fn on<F>(&mut self, f: F)
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.add(FnListener::new(f));
    }

    /// Delivers `event` to each listener in registration order.
    ///
    /// A listener that panics is skipped; the others still see the event.
    pub fn emit(&self, event: &E) {
        for listener in &self.listeners {
            let delivered = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                listener.on_event(event);
            }));

            #[cfg(feature = "tracing")]
            if delivered.is_err() {
                tracing::warn!(
                    policy = event.policy_name(),
                    event = event.event_type(),
                    "event listener panicked"
                );
            }
            #[cfg(not(feature = "tracing"))]
            let _ = delivered;
        }
    }

    /// Builds the event with `make` and delivers it, unless the set is empty.
    pub fn emit_with<F>(&self, make: F)
    where
        F: FnOnce() -> E,
    {
        if !self.listeners.is_empty() {
            self.emit(&make());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }
}

impl<E: PolicyEvent> Clone for EventListeners<E> {
    fn clone(&self) -> Self {
        Self {
            listeners: self.listeners.clone(),
        }
    }
}

impl<E: PolicyEvent> Default for EventListeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: PolicyEvent> fmt::Debug for EventListeners<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventListeners")
            .field("len", &self.listeners.len())
            .finish()
    }
}

/// Adapts a closure into an [`EventListener`].
pub struct FnListener<F> {
    f: F,
}

impl<F> FnListener<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<E, F> EventListener<E> for FnListener<F>
where
    E: PolicyEvent,
    F: Fn(&E) + Send + Sync,
{
    fn on_event(&self, event: &E) {
        (self.f)(event)
    }
}
