//! The per-name circuit breaker state machine.
//!
//! ```text
//!            failure_count >= threshold
//!   CLOSED ─────────────────────────────▶ OPEN
//!     ▲                                   │  ▲
//!     │ success                 read after│  │ failure
//!     │                      reset_timeout▼  │
//!     └──────────────────────────────── HALF_OPEN
//! ```
//!
//! The OPEN to HALF_OPEN edge is taken lazily, by whichever caller next reads
//! the state once `reset_timeout` has elapsed. There is no background timer.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// Represents the state of the circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum CircuitState {
    /// Calls are allowed and countable failures are tallied.
    Closed,
    /// Calls are rejected without invoking the operation.
    Open,
    /// The reset timeout elapsed; calls are let through as trial calls.
    HalfOpen,
}

impl CircuitState {
    /// Stable upper-case label, used in logs and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A state change caused by a read or a recorded outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateTransition {
    /// State before the change.
    pub from: CircuitState,
    /// State after the change.
    pub to: CircuitState,
}

/// A consistent view of every field, taken under one lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitSnapshot {
    /// Current state (after any due lazy transition).
    pub state: CircuitState,
    /// Consecutive countable failures since the last success or reset.
    pub failure_count: u32,
    /// When the circuit last opened, if it is not closed.
    pub opened_at: Option<Instant>,
}

#[derive(Debug)]
struct Fields {
    state: CircuitState,
    failure_count: u32,
    opened_at: Option<Instant>,
}

/// State shared by every operation protected under one breaker name.
///
/// Instances are created only by
/// [`CircuitBreakerRegistry`](crate::CircuitBreakerRegistry) and reached
/// through a [`CircuitBreakerHandle`]. All three fields live behind a single
/// per-breaker mutex, so readers never observe a torn combination.
pub struct CircuitBreakerState {
    name: String,
    failure_threshold: u32,
    reset_timeout: Duration,
    fields: Mutex<Fields>,
}

impl CircuitBreakerState {
    pub(crate) fn new(name: String, failure_threshold: u32, reset_timeout: Duration) -> Self {
        Self {
            name,
            failure_threshold,
            reset_timeout,
            fields: Mutex::new(Fields {
                state: CircuitState::Closed,
                failure_count: 0,
                opened_at: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Fields> {
        // fields are never left half-updated
        self.fields.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The breaker's registry key.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Countable failures needed to open from CLOSED.
    pub fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }

    /// Time spent OPEN before the next read moves to HALF_OPEN.
    pub fn reset_timeout(&self) -> Duration {
        self.reset_timeout
    }

    /// Returns the current state, first applying a due OPEN to HALF_OPEN
    /// transition.
    pub fn current_state(&self) -> CircuitState {
        self.poll_state().0
    }

    /// Like [`current_state`](Self::current_state), also reporting the lazy
    /// transition if this read performed it.
    pub fn poll_state(&self) -> (CircuitState, Option<StateTransition>) {
        let mut fields = self.lock();
        let transition = self.refresh(&mut fields, Instant::now());
        (fields.state, transition)
    }

    /// Reads every field at once, applying a due lazy transition first.
    pub fn snapshot(&self) -> CircuitSnapshot {
        let mut fields = self.lock();
        self.refresh(&mut fields, Instant::now());
        CircuitSnapshot {
            state: fields.state,
            failure_count: fields.failure_count,
            opened_at: fields.opened_at,
        }
    }

    /// Consecutive countable failures recorded since the last success.
    pub fn failure_count(&self) -> u32 {
        self.lock().failure_count
    }

    /// When the circuit last opened. `None` while closed.
    pub fn opened_at(&self) -> Option<Instant> {
        self.lock().opened_at
    }

    /// Records a successful call: the circuit closes and the count resets.
    pub fn record_success(&self) -> Option<StateTransition> {
        let mut fields = self.lock();
        let from = fields.state;
        fields.state = CircuitState::Closed;
        fields.failure_count = 0;
        fields.opened_at = None;
        changed(from, CircuitState::Closed)
    }

    /// Records a countable failure.
    ///
    /// In HALF_OPEN the trial call failed and the circuit reopens regardless
    /// of the threshold. Otherwise the count grows and the circuit opens once
    /// it reaches `failure_threshold`.
    pub fn record_failure(&self) -> Option<StateTransition> {
        let mut fields = self.lock();
        let from = fields.state;
        let now = Instant::now();
        fields.failure_count = fields.failure_count.saturating_add(1);

        if from == CircuitState::HalfOpen || fields.failure_count >= self.failure_threshold {
            fields.state = CircuitState::Open;
            fields.opened_at = Some(now);
        }
        changed(from, fields.state)
    }

    /// Opens the circuit now, regardless of the failure count.
    pub fn force_open(&self) -> Option<StateTransition> {
        let mut fields = self.lock();
        let from = fields.state;
        fields.state = CircuitState::Open;
        fields.opened_at = Some(Instant::now());
        changed(from, CircuitState::Open)
    }

    /// Returns to CLOSED with a zero count.
    pub fn reset(&self) -> Option<StateTransition> {
        self.record_success()
    }

    fn refresh(&self, fields: &mut Fields, now: Instant) -> Option<StateTransition> {
        match (fields.state, fields.opened_at) {
            (CircuitState::Open, Some(opened_at))
                if now.saturating_duration_since(opened_at) >= self.reset_timeout =>
            {
                fields.state = CircuitState::HalfOpen;
                changed(CircuitState::Open, CircuitState::HalfOpen)
            }
            _ => None,
        }
    }
}

fn changed(from: CircuitState, to: CircuitState) -> Option<StateTransition> {
    (from != to).then_some(StateTransition { from, to })
}

impl fmt::Debug for CircuitBreakerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields = self.lock();
        f.debug_struct("CircuitBreakerState")
            .field("name", &self.name)
            .field("failure_threshold", &self.failure_threshold)
            .field("reset_timeout", &self.reset_timeout)
            .field("state", &fields.state)
            .field("failure_count", &fields.failure_count)
            .field("opened_at", &fields.opened_at)
            .finish()
    }
}

/// A cheap, cloneable reference to a registered breaker.
///
/// Every handle acquired for the same name points at the same
/// [`CircuitBreakerState`].
#[derive(Clone, Debug)]
pub struct CircuitBreakerHandle {
    state: Arc<CircuitBreakerState>,
}

impl CircuitBreakerHandle {
    pub(crate) fn new(state: CircuitBreakerState) -> Self {
        Self {
            state: Arc::new(state),
        }
    }

    /// Returns `true` if both handles refer to the same breaker.
    pub fn ptr_eq(&self, other: &CircuitBreakerHandle) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }
}

impl std::ops::Deref for CircuitBreakerHandle {
    type Target = CircuitBreakerState;

    fn deref(&self) -> &CircuitBreakerState {
        &self.state
    }
}
