use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use proptest::prelude::*;
use resilient_http_bulkhead::{BulkheadHandler, BulkheadPolicy};
use resilient_http_core::{Handler, HeaderMap, HttpContext, HttpRequest, HttpResponse, ResilienceError};
use tokio::runtime::Runtime;

struct ConcurrencyTracker {
    work: Duration,
    current: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

#[async_trait]
impl Handler for ConcurrencyTracker {
    async fn handle(&self, _ctx: &mut HttpContext) -> Result<HttpResponse, ResilienceError> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.work).await;
        self.current.fetch_sub(1, Ordering::SeqCst);
        Ok(HttpResponse::buffered(200, HeaderMap::new(), "ok"))
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(30))]

    /// Property: for arbitrary interleavings of concurrent enter/exit
    /// operations, observed in-flight never exceeds max_concurrency.
    #[test]
    fn in_flight_never_exceeds_max_concurrency(
        max_concurrency in 1usize..=8,
        num_requests in 1usize..=40,
        work_micros in 100u64..=2_000,
    ) {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let current = Arc::new(AtomicUsize::new(0));
            let peak = Arc::new(AtomicUsize::new(0));
            let inner = Arc::new(ConcurrencyTracker {
                work: Duration::from_micros(work_micros),
                current,
                peak: Arc::clone(&peak),
            });
            let handler = Arc::new(BulkheadHandler::new(
                BulkheadPolicy::new(max_concurrency, num_requests, Duration::from_secs(5)),
                "test",
                inner,
            ));

            let mut tasks = Vec::new();
            for _ in 0..num_requests {
                let handler = Arc::clone(&handler);
                tasks.push(tokio::spawn(async move {
                    let mut ctx = HttpContext::new(HttpRequest::get("https://example.test/"));
                    handler.handle(&mut ctx).await
                }));
            }

            for task in tasks {
                let _ = task.await.unwrap();
            }

            prop_assert!(
                peak.load(Ordering::SeqCst) <= max_concurrency,
                "observed {} concurrent calls but the limit was {}",
                peak.load(Ordering::SeqCst),
                max_concurrency
            );

            Ok(())
        })?;
    }
}
