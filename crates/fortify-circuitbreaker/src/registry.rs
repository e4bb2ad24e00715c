use crate::state::{CircuitBreakerHandle, CircuitBreakerState};
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Owns every named circuit breaker in the application.
///
/// Build one at the composition root and hand it to each
/// [`CircuitBreakerLayer`](crate::CircuitBreakerLayer) that needs breaker
/// semantics. Clones share the same breakers.
///
/// The first `acquire` for a name decides its threshold and timeout; later
/// calls return the existing breaker and ignore differing arguments.
///
/// ```rust
/// use fortify_circuitbreaker::CircuitBreakerRegistry;
/// use std::time::Duration;
///
/// let registry = CircuitBreakerRegistry::new();
/// let a = registry.acquire("inventory", 3, Duration::from_secs(10));
/// let b = registry.acquire("inventory", 99, Duration::from_secs(1));
///
/// assert!(a.ptr_eq(&b));
/// assert_eq!(b.failure_threshold(), 3);
/// ```
#[derive(Clone, Default)]
pub struct CircuitBreakerRegistry {
    breakers: Arc<DashMap<String, CircuitBreakerHandle>>,
}

impl CircuitBreakerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the breaker registered under `name`, creating it CLOSED if absent.
    pub fn acquire(
        &self,
        name: &str,
        failure_threshold: u32,
        reset_timeout: Duration,
    ) -> CircuitBreakerHandle {
        if let Some(existing) = self.breakers.get(name) {
            return existing.clone();
        }

        self.breakers
            .entry(name.to_string())
            .or_insert_with(|| {
                #[cfg(feature = "tracing")]
                tracing::debug!(
                    breaker = name,
                    failure_threshold,
                    reset_timeout = ?reset_timeout,
                    "registering circuit breaker"
                );

                CircuitBreakerHandle::new(CircuitBreakerState::new(
                    name.to_string(),
                    failure_threshold,
                    reset_timeout,
                ))
            })
            .clone()
    }

    /// Looks up an existing breaker without creating one.
    pub fn get(&self, name: &str) -> Option<CircuitBreakerHandle> {
        self.breakers.get(name).map(|entry| entry.clone())
    }

    /// Returns `true` if a breaker is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.breakers.contains_key(name)
    }

    /// Number of registered breakers.
    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    /// Returns `true` if no breaker has been acquired yet.
    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }

    /// Names of every registered breaker, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.breakers.iter().map(|e| e.key().clone()).collect();
        names.sort_unstable();
        names
    }

    /// Forgets the breaker under `name`.
    ///
    /// Handles already handed out keep working but no longer share state with
    /// breakers acquired afterwards.
    pub fn remove(&self, name: &str) -> Option<CircuitBreakerHandle> {
        self.breakers.remove(name).map(|(_, handle)| handle)
    }

    /// Forgets every breaker.
    pub fn clear(&self) {
        self.breakers.clear();
    }
}

impl fmt::Debug for CircuitBreakerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreakerRegistry")
            .field("breakers", &self.names())
            .finish()
    }
}
