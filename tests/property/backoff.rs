use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use proptest::prelude::*;
use resilient_http_client::ClientBuilder;
use resilient_http_core::{Event, HeaderMap, HttpRequest, HttpResponse, ResilienceError, Transport};
use resilient_http_retry::{Backoff, RetryPolicy};
use tokio::runtime::Runtime;

struct AlwaysFails {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Transport for AlwaysFails {
    async fn send(&self, _request: HttpRequest) -> Result<HttpResponse, ResilienceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(HttpResponse::buffered(503, HeaderMap::new(), "oops"))
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// Property: exponential backoff is monotonically non-decreasing and
    /// never exceeds its configured cap, for any attempt number.
    #[test]
    fn exponential_backoff_is_monotonic_and_capped(
        base_ms in 1u64..=200,
        cap_ms in 1u64..=5_000,
        attempt in 1usize..=20,
    ) {
        let backoff = Backoff::exponential(Duration::from_millis(base_ms), Duration::from_millis(cap_ms));
        let this = backoff.delay_for(attempt);
        let next = backoff.delay_for(attempt + 1);

        prop_assert!(this <= Duration::from_millis(cap_ms));
        prop_assert!(next <= Duration::from_millis(cap_ms));
        prop_assert!(next >= this, "backoff must never shrink between consecutive attempts");
    }

    /// Property: every jittered delay the retry handler actually waits
    /// falls within `[0, unjittered_delay_for_that_attempt]`.
    #[test]
    fn jittered_delay_is_bounded_by_the_unjittered_delay(
        base_ms in 1u64..=50,
        cap_ms in 50u64..=2_000,
        max_retries in 1usize..=5,
    ) {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let base = Duration::from_millis(base_ms);
            let cap = Duration::from_millis(cap_ms);
            let backoff = Backoff::exponential(base, cap);

            let calls = Arc::new(AtomicUsize::new(0));
            let transport = Arc::new(AlwaysFails { calls: Arc::clone(&calls) });

            let builder = ClientBuilder::new()
                .http_client(transport)
                .retry(RetryPolicy::exponential_backoff(max_retries, base, cap));
            let hub = Arc::clone(builder.event_hub());
            let delays: Arc<Mutex<Vec<(usize, Duration)>>> = Arc::new(Mutex::new(Vec::new()));
            let delays_clone = Arc::clone(&delays);
            hub.subscribe_all(move |event| {
                if let Event::Retry(e) = event {
                    delays_clone.lock().unwrap().push((e.attempt, e.delay));
                }
            });

            let client = builder.build().unwrap();
            let _ = client.get("/").await;

            let observed = delays.lock().unwrap();
            prop_assert_eq!(observed.len(), max_retries);
            for (attempt, delay) in observed.iter() {
                let computed = backoff.delay_for(*attempt);
                prop_assert!(*delay <= computed, "jittered delay {:?} exceeded computed delay {:?}", delay, computed);
            }

            Ok(())
        })?;
    }
}
