//! Scenario: a per-attempt timeout nested inside retry.
//!
//! Timeout=50ms wraps a transport that always hangs, with Retry(max_retries=1)
//! around it and a predicate that treats Timeout as retryable. Expected:
//! two Timeout failures, then RetryExhausted wrapping the last Timeout.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use resilient_http_client::ClientBuilder;
use resilient_http_core::{HeaderMap, HttpRequest, HttpResponse, ResilienceError, Transport};
use resilient_http_retry::RetryPolicy;
use resilient_http_timeout::TimeoutPolicy;

struct HangingTransport {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Transport for HangingTransport {
    async fn send(&self, _request: HttpRequest) -> Result<HttpResponse, ResilienceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(10)).await;
        Ok(HttpResponse::buffered(200, HeaderMap::new(), "too late"))
    }
}

#[tokio::test]
async fn timeout_failures_are_retried_then_exhausted() {
    let calls = Arc::new(AtomicUsize::new(0));
    let transport = Arc::new(HangingTransport { calls: Arc::clone(&calls) });

    let retries_on_timeout = RetryPolicy::constant(1, Duration::from_millis(0))
        .with_predicate(Arc::new(|_response, error, _ctx| matches!(error, Some(ResilienceError::Timeout { .. }))));

    let client = ClientBuilder::new()
        .http_client(transport)
        .retry(retries_on_timeout)
        .timeout(TimeoutPolicy::new(Duration::from_millis(50)))
        .build()
        .unwrap();

    let err = client.get("/").await.unwrap_err();

    assert_eq!(calls.load(Ordering::SeqCst), 2, "the hung transport should have been entered twice");
    match err {
        ResilienceError::RetryExhausted { attempts, last } => {
            assert_eq!(attempts, 2);
            assert!(last.is_timeout(), "the wrapped failure should be the final Timeout, got {last:?}");
        }
        other => panic!("expected RetryExhausted, got {other:?}"),
    }
}
