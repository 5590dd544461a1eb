//! Circuit breaker handler: a consecutive-failure-threshold state machine
//! shared across every handler referencing the same circuit name via
//! [`CircuitBreakerRegistry`].

mod config;
mod registry;
mod state;

pub use config::{default_classifier, CircuitBreakerPolicy, FailureClassifier};
pub use registry::{CircuitBreakerHandle, CircuitBreakerRegistry};
pub use state::{Admission, CircuitMetrics, CircuitState};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use resilient_http_core::{DelegatingHandler, Handler, HttpContext, HttpResponse, ResilienceError};

/// Wraps an inner handler with a named circuit breaker.
pub struct CircuitBreakerHandler {
    policy: CircuitBreakerPolicy,
    handle: CircuitBreakerHandle,
    inner: Arc<dyn Handler>,
}

impl CircuitBreakerHandler {
    /// Looks up (or creates) the named circuit in `registry` and wraps
    /// `inner` with it.
    pub fn new(policy: CircuitBreakerPolicy, registry: &CircuitBreakerRegistry, inner: Arc<dyn Handler>) -> Self {
        let handle = registry.get_or_create(&policy);
        Self { policy, handle, inner }
    }

    /// Builds a handler against the process-wide registry.
    pub fn with_global_registry(policy: CircuitBreakerPolicy, inner: Arc<dyn Handler>) -> Self {
        Self::new(policy, CircuitBreakerRegistry::global(), inner)
    }

    /// The handle to this handler's circuit, for tests and introspection.
    pub fn handle(&self) -> &CircuitBreakerHandle {
        &self.handle
    }
}

#[async_trait]
impl Handler for CircuitBreakerHandler {
    async fn handle(&self, ctx: &mut HttpContext) -> Result<HttpResponse, ResilienceError> {
        ctx.throw_if_cancelled()?;

        match self.handle.state().admit() {
            state::Admission::Rejected { retry_after } => {
                return Err(ResilienceError::CircuitOpen {
                    circuit_name: self.policy.circuit_name.clone(),
                    retry_after,
                });
            }
            state::Admission::Allowed => {}
        }

        let outcome = self.inner.handle(ctx).await;

        let is_failure = match &outcome {
            Ok(response) => (self.policy.should_count)(Some(response), None),
            Err(error) => (self.policy.should_count)(None, Some(error)),
        };

        if is_failure {
            self.handle.state().record_failure();
        } else {
            self.handle.state().record_success();
        }

        outcome
    }
}

impl DelegatingHandler for CircuitBreakerHandler {
    fn inner(&self) -> &Arc<dyn Handler> {
        &self.inner
    }
}

/// An advisory duration of zero, used when a HalfOpen probe slot is
/// already taken and no real break deadline applies.
pub const NO_RETRY_AFTER: Duration = Duration::from_millis(0);

#[cfg(test)]
mod tests {
    use super::*;
    use resilient_http_core::{HeaderMap, HttpRequest};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct AlwaysErrors {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Handler for AlwaysErrors {
        async fn handle(&self, _ctx: &mut HttpContext) -> Result<HttpResponse, ResilienceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(ResilienceError::Transport {
                message: "connection refused".into(),
            })
        }
    }

    struct AlwaysOk;

    #[async_trait]
    impl Handler for AlwaysOk {
        async fn handle(&self, _ctx: &mut HttpContext) -> Result<HttpResponse, ResilienceError> {
            Ok(HttpResponse::buffered(200, HeaderMap::new(), "ok"))
        }
    }

    #[tokio::test]
    async fn opens_after_threshold_and_rejects_without_calling_inner() {
        let calls = Arc::new(AtomicUsize::new(0));
        let inner = Arc::new(AlwaysErrors { calls: Arc::clone(&calls) });
        let registry = CircuitBreakerRegistry::new();
        let policy = CircuitBreakerPolicy::new("svc", 3, 1, Duration::from_secs(60));
        let handler = CircuitBreakerHandler::new(policy, &registry, inner);

        for _ in 0..3 {
            let mut ctx = HttpContext::new(HttpRequest::get("https://example.test/"));
            assert!(handler.handle(&mut ctx).await.is_err());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        for _ in 0..2 {
            let mut ctx = HttpContext::new(HttpRequest::get("https://example.test/"));
            let err = handler.handle(&mut ctx).await.unwrap_err();
            assert!(err.is_circuit_open());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn emits_circuit_open_event_exactly_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let inner = Arc::new(AlwaysErrors { calls });
        let registry = CircuitBreakerRegistry::new();
        let policy = CircuitBreakerPolicy::new("svc", 3, 1, Duration::from_secs(60));
        let handler = CircuitBreakerHandler::new(policy, &registry, inner);

        let opens = Arc::new(AtomicUsize::new(0));
        let opens_clone = Arc::clone(&opens);
        handler
            .handle
            .state()
            .events_open
            .subscribe_fn(move |_| {
                opens_clone.fetch_add(1, Ordering::SeqCst);
            });

        for _ in 0..5 {
            let mut ctx = HttpContext::new(HttpRequest::get("https://example.test/"));
            let _ = handler.handle(&mut ctx).await;
        }

        assert_eq!(opens.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn closed_circuit_allows_success_through() {
        let inner = Arc::new(AlwaysOk);
        let registry = CircuitBreakerRegistry::new();
        let policy = CircuitBreakerPolicy::new("svc", 3, 1, Duration::from_secs(60));
        let handler = CircuitBreakerHandler::new(policy, &registry, inner);

        let mut ctx = HttpContext::new(HttpRequest::get("https://example.test/"));
        let response = handler.handle(&mut ctx).await.unwrap();
        assert!(response.is_success());
    }
}
