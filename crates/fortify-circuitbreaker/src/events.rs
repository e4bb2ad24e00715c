use crate::state::CircuitState;
use fortify_core::events::PolicyEvent;
use std::time::Instant;

/// Events emitted by the circuit breaker.
#[derive(Debug, Clone)]
pub enum CircuitBreakerEvent {
    /// The circuit changed state.
    StateTransition {
        policy_name: String,
        timestamp: Instant,
        from_state: CircuitState,
        to_state: CircuitState,
    },
    /// A call was let through in `state` (CLOSED or HALF_OPEN).
    CallPermitted {
        policy_name: String,
        timestamp: Instant,
        state: CircuitState,
    },
    /// A call was rejected because the circuit is open.
    CallRejected {
        policy_name: String,
        timestamp: Instant,
    },
    /// A successful outcome was recorded while the circuit was in `state`.
    SuccessRecorded {
        policy_name: String,
        timestamp: Instant,
        state: CircuitState,
    },
    /// A countable failure was recorded while the circuit was in `state`.
    FailureRecorded {
        policy_name: String,
        timestamp: Instant,
        state: CircuitState,
        failure_count: u32,
    },
}

impl PolicyEvent for CircuitBreakerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CircuitBreakerEvent::StateTransition { .. } => "state_transition",
            CircuitBreakerEvent::CallPermitted { .. } => "call_permitted",
            CircuitBreakerEvent::CallRejected { .. } => "call_rejected",
            CircuitBreakerEvent::SuccessRecorded { .. } => "success_recorded",
            CircuitBreakerEvent::FailureRecorded { .. } => "failure_recorded",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            CircuitBreakerEvent::StateTransition { timestamp, .. }
            | CircuitBreakerEvent::CallPermitted { timestamp, .. }
            | CircuitBreakerEvent::CallRejected { timestamp, .. }
            | CircuitBreakerEvent::SuccessRecorded { timestamp, .. }
            | CircuitBreakerEvent::FailureRecorded { timestamp, .. } => *timestamp,
        }
    }

    fn policy_name(&self) -> &str {
        match self {
            CircuitBreakerEvent::StateTransition { policy_name, .. }
            | CircuitBreakerEvent::CallPermitted { policy_name, .. }
            | CircuitBreakerEvent::CallRejected { policy_name, .. }
            | CircuitBreakerEvent::SuccessRecorded { policy_name, .. }
            | CircuitBreakerEvent::FailureRecorded { policy_name, .. } => policy_name,
        }
    }
}
