//! Scenario: a bulkhead rejects once its queue is full.
//!
//! max_concurrency=1, max_queue_depth=1, queue_timeout=10ms. Three calls
//! whose inner handler blocks 100ms are launched together. Expected: call
//! 1 runs, call 2 queues then runs, call 3 fails with
//! BulkheadRejected/QueueFull; never more than 1 in-flight.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use resilient_http_bulkhead::BulkheadPolicy;
use resilient_http_client::ClientBuilder;
use resilient_http_core::{BulkheadRejectReason, HeaderMap, HttpRequest, HttpResponse, ResilienceError, Transport};
use tokio::sync::Barrier;

struct SlowTransport {
    delay: Duration,
    peak_in_flight: Arc<AtomicUsize>,
    current: Arc<AtomicUsize>,
}

#[async_trait]
impl Transport for SlowTransport {
    async fn send(&self, _request: HttpRequest) -> Result<HttpResponse, ResilienceError> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.current.fetch_sub(1, Ordering::SeqCst);
        Ok(HttpResponse::buffered(200, HeaderMap::new(), "ok"))
    }
}

#[tokio::test]
async fn third_concurrent_call_is_rejected() {
    let peak = Arc::new(AtomicUsize::new(0));
    let current = Arc::new(AtomicUsize::new(0));
    let transport = Arc::new(SlowTransport {
        delay: Duration::from_millis(100),
        peak_in_flight: Arc::clone(&peak),
        current,
    });

    let client = Arc::new(
        ClientBuilder::new()
            .http_client(transport)
            .bulkhead(BulkheadPolicy::new(1, 1, Duration::from_millis(10)))
            .build()
            .unwrap(),
    );

    let barrier = Arc::new(Barrier::new(3));
    let mut tasks = Vec::new();
    for _ in 0..3 {
        let client = Arc::clone(&client);
        let barrier = Arc::clone(&barrier);
        tasks.push(tokio::spawn(async move {
            barrier.wait().await;
            client.get("/").await
        }));
    }

    let mut oks = 0;
    let mut rejections = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => oks += 1,
            Err(ResilienceError::BulkheadRejected { reason: BulkheadRejectReason::QueueFull, .. }) => {
                rejections += 1;
            }
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!(oks, 2, "the first call and the queued second call should both succeed");
    assert_eq!(rejections, 1, "the third call should be rejected since the queue is already full");
    assert_eq!(peak.load(Ordering::SeqCst), 1, "never more than one call should be in flight");
}
