//! Circuit breaker configuration.

use std::sync::Arc;
use std::time::Duration;

use resilient_http_core::{HttpResponse, ResilienceError};

/// Decides whether an outcome counts as a circuit failure.
pub type FailureClassifier = Arc<dyn Fn(Option<&HttpResponse>, Option<&ResilienceError>) -> bool + Send + Sync>;

/// Immutable circuit breaker configuration.
///
/// `circuit_name` is the registry key: every handler configured with the
/// same name shares one [`crate::state::CircuitBreakerState`].
#[derive(Clone)]
pub struct CircuitBreakerPolicy {
    pub circuit_name: String,
    pub failure_threshold: usize,
    pub success_threshold: usize,
    pub break_duration: Duration,
    pub should_count: FailureClassifier,
}

impl CircuitBreakerPolicy {
    /// Builds a policy with the default classifier (5xx responses and any
    /// non-rejection resilience error count as failures).
    pub fn new(
        circuit_name: impl Into<String>,
        failure_threshold: usize,
        success_threshold: usize,
        break_duration: Duration,
    ) -> Self {
        Self {
            circuit_name: circuit_name.into(),
            failure_threshold,
            success_threshold,
            break_duration,
            should_count: default_classifier(),
        }
    }

    /// Returns a copy with a custom failure classifier.
    pub fn with_classifier(mut self, classifier: FailureClassifier) -> Self {
        self.should_count = classifier;
        self
    }
}

/// The default failure classifier: 5xx responses and transport errors
/// count; client errors, cancellations, and rejections from other
/// policies (circuit-open, bulkhead-rejected) do not, since they were
/// never attempts against the protected resource.
pub fn default_classifier() -> FailureClassifier {
    Arc::new(|response, error| {
        if let Some(response) = response {
            return response.is_server_error();
        }
        if let Some(error) = error {
            return matches!(error, ResilienceError::Transport { .. } | ResilienceError::Timeout { .. });
        }
        false
    })
}
