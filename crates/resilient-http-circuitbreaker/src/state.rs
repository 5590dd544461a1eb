//! The shared, concurrency-safe per-circuit state machine.

use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use resilient_http_core::{CircuitCloseEvent, CircuitOpenEvent, EventListeners};

/// The circuit's current disposition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CircuitState {
    Closed = 0,
    Open = 1,
    HalfOpen = 2,
}

impl CircuitState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => CircuitState::Closed,
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            other => unreachable!("invalid CircuitState encoding {other}"),
        }
    }
}

/// A read-only snapshot of a circuit's counters, for the registry's
/// `snapshot`/`is_healthy` surface.
#[derive(Debug, Clone)]
pub struct CircuitMetrics {
    pub state: CircuitState,
    pub consecutive_failures: usize,
    pub consecutive_successes: usize,
}

/// Whether the caller may proceed, and if not, how long to advise waiting.
pub enum Admission {
    Allowed,
    Rejected { retry_after: Duration },
}

/// The mutable state backing one named circuit, shared by every handler
/// configured with that name via the registry.
///
/// All transitions happen under `transition_guard`, a single mutex, so the
/// state machine advances in a linearizable order per circuit even though
/// `is_allowing`/counters are also readable lock-free via atomics.
pub struct CircuitBreakerState {
    name: String,
    failure_threshold: usize,
    success_threshold: usize,
    break_duration: Duration,
    state: AtomicU8,
    consecutive_failures: AtomicUsize,
    consecutive_successes: AtomicUsize,
    probe_in_flight: AtomicBool,
    retry_after: Mutex<Option<Instant>>,
    transition_guard: Mutex<()>,
    pub(crate) events_open: EventListeners<CircuitOpenEvent>,
    pub(crate) events_close: EventListeners<CircuitCloseEvent>,
}

impl CircuitBreakerState {
    pub fn new(name: String, failure_threshold: usize, success_threshold: usize, break_duration: Duration) -> Self {
        Self {
            name,
            failure_threshold,
            success_threshold,
            break_duration,
            state: AtomicU8::new(CircuitState::Closed as u8),
            consecutive_failures: AtomicUsize::new(0),
            consecutive_successes: AtomicUsize::new(0),
            probe_in_flight: AtomicBool::new(false),
            retry_after: Mutex::new(None),
            transition_guard: Mutex::new(()),
            events_open: EventListeners::new(),
            events_close: EventListeners::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn current_state(&self) -> CircuitState {
        CircuitState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn metrics(&self) -> CircuitMetrics {
        CircuitMetrics {
            state: self.current_state(),
            consecutive_failures: self.consecutive_failures.load(Ordering::SeqCst),
            consecutive_successes: self.consecutive_successes.load(Ordering::SeqCst),
        }
    }

    /// Consults and, if the Open break duration has elapsed, advances the
    /// state to HalfOpen and grants the single probe slot. Must be called
    /// before every attempt.
    pub fn admit(&self) -> Admission {
        let _guard = self.transition_guard.lock().unwrap();
        match self.current_state() {
            CircuitState::Closed => Admission::Allowed,
            CircuitState::HalfOpen => {
                if self
                    .probe_in_flight
                    .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                    .is_ok()
                {
                    Admission::Allowed
                } else {
                    Admission::Rejected {
                        retry_after: Duration::from_millis(0),
                    }
                }
            }
            CircuitState::Open => {
                let retry_after = *self.retry_after.lock().unwrap();
                match retry_after {
                    Some(deadline) if Instant::now() >= deadline => {
                        self.state.store(CircuitState::HalfOpen as u8, Ordering::SeqCst);
                        self.consecutive_successes.store(0, Ordering::SeqCst);
                        self.probe_in_flight.store(true, Ordering::SeqCst);
                        Admission::Allowed
                    }
                    Some(deadline) => Admission::Rejected {
                        retry_after: deadline.saturating_duration_since(Instant::now()),
                    },
                    None => Admission::Allowed,
                }
            }
        }
    }

    /// Records a classified success.
    pub fn record_success(&self) {
        let _guard = self.transition_guard.lock().unwrap();
        match self.current_state() {
            CircuitState::Closed => {
                self.consecutive_failures.store(0, Ordering::SeqCst);
            }
            CircuitState::HalfOpen => {
                self.probe_in_flight.store(false, Ordering::SeqCst);
                let successes = self.consecutive_successes.fetch_add(1, Ordering::SeqCst) + 1;
                if successes >= self.success_threshold {
                    self.close(&_guard);
                }
            }
            CircuitState::Open => {
                // A stray success after the state flipped back to Closed
                // concurrently; nothing to do.
            }
        }
    }

    /// Records a classified failure.
    pub fn record_failure(&self) {
        let _guard = self.transition_guard.lock().unwrap();
        match self.current_state() {
            CircuitState::Closed => {
                let failures = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
                if failures >= self.failure_threshold {
                    self.open(&_guard, failures);
                }
            }
            CircuitState::HalfOpen => {
                self.probe_in_flight.store(false, Ordering::SeqCst);
                self.open(&_guard, 1);
            }
            CircuitState::Open => {}
        }
    }

    fn open(&self, _guard: &std::sync::MutexGuard<'_, ()>, consecutive_failures: usize) {
        self.state.store(CircuitState::Open as u8, Ordering::SeqCst);
        *self.retry_after.lock().unwrap() = Some(Instant::now() + self.break_duration);
        self.consecutive_successes.store(0, Ordering::SeqCst);
        self.events_open.emit(&CircuitOpenEvent {
            timestamp: std::time::SystemTime::now(),
            source: self.name.clone(),
            consecutive_failures,
        });
    }

    fn close(&self, _guard: &std::sync::MutexGuard<'_, ()>) {
        self.state.store(CircuitState::Closed as u8, Ordering::SeqCst);
        self.consecutive_failures.store(0, Ordering::SeqCst);
        self.consecutive_successes.store(0, Ordering::SeqCst);
        *self.retry_after.lock().unwrap() = None;
        self.events_close.emit(&CircuitCloseEvent {
            timestamp: std::time::SystemTime::now(),
            source: self.name.clone(),
        });
    }

    /// Forces the circuit back to a clean Closed state, for tests and the
    /// registry's `reset`/`reset_all`.
    pub fn reset(&self) {
        let _guard = self.transition_guard.lock().unwrap();
        self.state.store(CircuitState::Closed as u8, Ordering::SeqCst);
        self.consecutive_failures.store(0, Ordering::SeqCst);
        self.consecutive_successes.store(0, Ordering::SeqCst);
        self.probe_in_flight.store(false, Ordering::SeqCst);
        *self.retry_after.lock().unwrap() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_exactly_on_kth_failure() {
        let state = CircuitBreakerState::new("svc".into(), 3, 1, Duration::from_secs(1));
        state.record_failure();
        assert_eq!(state.current_state(), CircuitState::Closed);
        state.record_failure();
        assert_eq!(state.current_state(), CircuitState::Closed);
        state.record_failure();
        assert_eq!(state.current_state(), CircuitState::Open);
    }

    #[test]
    fn open_rejects_until_break_duration_elapses() {
        let state = CircuitBreakerState::new("svc".into(), 1, 1, Duration::from_millis(20));
        state.record_failure();
        assert!(matches!(state.admit(), Admission::Rejected { .. }));
        std::thread::sleep(Duration::from_millis(25));
        assert!(matches!(state.admit(), Admission::Allowed));
        assert_eq!(state.current_state(), CircuitState::HalfOpen);
    }

    #[test]
    fn half_open_allows_exactly_one_probe() {
        let state = CircuitBreakerState::new("svc".into(), 1, 1, Duration::from_millis(1));
        state.record_failure();
        std::thread::sleep(Duration::from_millis(5));
        assert!(matches!(state.admit(), Admission::Allowed));
        assert!(matches!(state.admit(), Admission::Rejected { .. }));
    }

    #[test]
    fn half_open_closes_after_success_threshold() {
        let state = CircuitBreakerState::new("svc".into(), 1, 2, Duration::from_millis(1));
        state.record_failure();
        std::thread::sleep(Duration::from_millis(5));
        assert!(matches!(state.admit(), Admission::Allowed));
        state.record_success();
        assert_eq!(state.current_state(), CircuitState::HalfOpen);
        assert!(matches!(state.admit(), Admission::Allowed));
        state.record_success();
        assert_eq!(state.current_state(), CircuitState::Closed);
    }

    #[test]
    fn half_open_failure_reopens() {
        let state = CircuitBreakerState::new("svc".into(), 1, 1, Duration::from_millis(1));
        state.record_failure();
        std::thread::sleep(Duration::from_millis(5));
        assert!(matches!(state.admit(), Admission::Allowed));
        state.record_failure();
        assert_eq!(state.current_state(), CircuitState::Open);
    }
}
