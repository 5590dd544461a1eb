//! The process-wide circuit breaker registry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use crate::config::CircuitBreakerPolicy;
use crate::state::{CircuitBreakerState, CircuitMetrics};

/// A handle to one named circuit's shared state.
///
/// Cloning a handle is cheap (an `Arc` clone); every clone observes the
/// same underlying circuit.
#[derive(Clone)]
pub struct CircuitBreakerHandle {
    state: Arc<CircuitBreakerState>,
}

impl CircuitBreakerHandle {
    /// A read-only snapshot of the circuit's counters and disposition.
    pub fn metrics(&self) -> CircuitMetrics {
        self.state.metrics()
    }

    /// Forces the circuit back to a clean Closed state.
    pub fn reset(&self) {
        self.state.reset();
    }

    /// The event stream this circuit emits `CircuitOpen` transitions on.
    pub fn open_events(&self) -> &resilient_http_core::EventListeners<resilient_http_core::CircuitOpenEvent> {
        &self.state.events_open
    }

    /// The event stream this circuit emits `CircuitClose` transitions on.
    pub fn close_events(&self) -> &resilient_http_core::EventListeners<resilient_http_core::CircuitCloseEvent> {
        &self.state.events_close
    }

    pub(crate) fn state(&self) -> &Arc<CircuitBreakerState> {
        &self.state
    }
}

/// Maps circuit name to shared state.
///
/// `get_or_create` is first-writer-wins: if a circuit with the given name
/// already exists, its existing configuration (thresholds, break
/// duration) is kept and the policy passed on this call is ignored. This
/// is a deliberate, documented choice among two defensible options
/// (SPEC_FULL §9's Open Question) since the source left the behavior
/// ambiguous.
pub struct CircuitBreakerRegistry {
    circuits: Mutex<HashMap<String, Arc<CircuitBreakerState>>>,
}

impl Default for CircuitBreakerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CircuitBreakerRegistry {
    /// A fresh, empty registry. Production code should generally use
    /// [`CircuitBreakerRegistry::global`]; a fresh instance exists so
    /// tests can have deterministic isolation from each other.
    pub fn new() -> Self {
        Self {
            circuits: Mutex::new(HashMap::new()),
        }
    }

    /// The process-wide registry instance.
    pub fn global() -> &'static CircuitBreakerRegistry {
        static INSTANCE: OnceLock<CircuitBreakerRegistry> = OnceLock::new();
        INSTANCE.get_or_init(CircuitBreakerRegistry::new)
    }

    /// Returns the circuit named by `policy.circuit_name`, creating it
    /// (with `policy`'s thresholds) if this is the first reference.
    pub fn get_or_create(&self, policy: &CircuitBreakerPolicy) -> CircuitBreakerHandle {
        let mut circuits = self.circuits.lock().unwrap();
        let state = circuits
            .entry(policy.circuit_name.clone())
            .or_insert_with(|| {
                Arc::new(CircuitBreakerState::new(
                    policy.circuit_name.clone(),
                    policy.failure_threshold,
                    policy.success_threshold,
                    policy.break_duration,
                ))
            })
            .clone();
        CircuitBreakerHandle { state }
    }

    /// Names of every circuit referenced so far.
    pub fn names(&self) -> Vec<String> {
        self.circuits.lock().unwrap().keys().cloned().collect()
    }

    /// A snapshot of every circuit's metrics, keyed by name.
    pub fn snapshot(&self) -> HashMap<String, CircuitMetrics> {
        self.circuits
            .lock()
            .unwrap()
            .iter()
            .map(|(name, state)| (name.clone(), state.metrics()))
            .collect()
    }

    /// `true` iff every known circuit is Closed.
    pub fn is_healthy(&self) -> bool {
        self.circuits
            .lock()
            .unwrap()
            .values()
            .all(|state| state.current_state() == crate::state::CircuitState::Closed)
    }

    /// Resets a single named circuit, if it exists.
    pub fn reset(&self, name: &str) {
        if let Some(state) = self.circuits.lock().unwrap().get(name) {
            state.reset();
        }
    }

    /// Resets every known circuit.
    pub fn reset_all(&self) {
        for state in self.circuits.lock().unwrap().values() {
            state.reset();
        }
    }
}
