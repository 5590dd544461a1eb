//! Scenario: a consistently failing destination trips its circuit.
//!
//! failure_threshold=3, break_duration=1s. Five consecutive transport
//! errors through one handler: the first 3 reach the transport, the
//! circuit flips to Open after the 3rd, and calls 4 and 5 fail with
//! CircuitOpen without reaching the transport. A CircuitOpen event is
//! emitted exactly once.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use resilient_http_circuitbreaker::{CircuitBreakerRegistry, CircuitBreakerPolicy};
use resilient_http_client::ClientBuilder;
use resilient_http_core::{Event, HeaderMap, HttpRequest, HttpResponse, ResilienceError, Transport};

struct AlwaysFails {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Transport for AlwaysFails {
    async fn send(&self, _request: HttpRequest) -> Result<HttpResponse, ResilienceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(ResilienceError::Transport {
            message: "connection refused".into(),
        })
    }
}

#[tokio::test]
async fn circuit_opens_after_threshold() {
    let calls = Arc::new(AtomicUsize::new(0));
    let transport = Arc::new(AlwaysFails { calls: Arc::clone(&calls) });
    let registry = Arc::new(CircuitBreakerRegistry::new());

    let builder = ClientBuilder::new()
        .http_client(transport)
        .with_circuit_registry(Arc::clone(&registry))
        .circuit_breaker(CircuitBreakerPolicy::new("payments", 3, 1, Duration::from_secs(1)));

    let hub = Arc::clone(builder.event_hub());
    let opens = Arc::new(AtomicUsize::new(0));
    let opens_clone = Arc::clone(&opens);
    hub.subscribe_all(move |event| {
        if matches!(event, Event::CircuitOpen(_)) {
            opens_clone.fetch_add(1, Ordering::SeqCst);
        }
    });

    let client = builder.build().unwrap();

    for _ in 0..5 {
        let _ = client.get("/").await;
    }

    assert_eq!(calls.load(Ordering::SeqCst), 3, "only the first 3 calls should reach the transport");
    assert_eq!(opens.load(Ordering::SeqCst), 1, "the open event should fire exactly once");
}

#[tokio::test]
async fn rejected_calls_fail_with_circuit_open_and_never_reach_the_transport() {
    let calls = Arc::new(AtomicUsize::new(0));
    let transport = Arc::new(AlwaysFails { calls: Arc::clone(&calls) });
    let registry = Arc::new(CircuitBreakerRegistry::new());

    let client = ClientBuilder::new()
        .http_client(transport)
        .with_circuit_registry(registry)
        .circuit_breaker(CircuitBreakerPolicy::new("payments", 3, 1, Duration::from_secs(1)))
        .build()
        .unwrap();

    for _ in 0..3 {
        let _ = client.get("/").await;
    }

    let fourth = client.get("/").await.unwrap_err();
    let fifth = client.get("/").await.unwrap_err();
    assert!(fourth.is_circuit_open());
    assert!(fifth.is_circuit_open());
    assert_eq!(calls.load(Ordering::SeqCst), 3, "rejected calls must not reach the transport");
}
