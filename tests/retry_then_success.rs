//! Scenario: a flaky transport recovers within the retry budget.
//!
//! Transport returns 503, 503, 200. RetryPolicy.constant(max_retries=2,
//! delay=0). Expected: final status 200, exactly 3 transport calls, 2
//! Retry events emitted.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use resilient_http_client::ClientBuilder;
use resilient_http_core::{Event, HeaderMap, HttpRequest, HttpResponse, ResilienceError, Transport};
use resilient_http_retry::RetryPolicy;

struct ScriptedTransport {
    responses: Mutex<Vec<u16>>,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, _request: HttpRequest) -> Result<HttpResponse, ResilienceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let status = self.responses.lock().unwrap().remove(0);
        Ok(HttpResponse::buffered(status, HeaderMap::new(), "ok"))
    }
}

#[tokio::test]
async fn retry_then_success() {
    let calls = Arc::new(AtomicUsize::new(0));
    let transport = Arc::new(ScriptedTransport {
        responses: Mutex::new(vec![503, 503, 200]),
        calls: Arc::clone(&calls),
    });

    let builder = ClientBuilder::new()
        .http_client(transport)
        .retry(RetryPolicy::constant(2, Duration::from_millis(0)));
    let hub = Arc::clone(builder.event_hub());
    let retries = Arc::new(AtomicUsize::new(0));
    let retries_clone = Arc::clone(&retries);
    hub.subscribe_all(move |event| {
        if matches!(event, Event::Retry(_)) {
            retries_clone.fetch_add(1, Ordering::SeqCst);
        }
    });

    let client = builder.build().unwrap();
    let response = client.get("/").await.unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(retries.load(Ordering::SeqCst), 2);
}
