//! Bounded concurrency + bounded FIFO queue isolation handler.
//!
//! Built on a [`tokio::sync::Semaphore`] for the concurrency bound (whose
//! waiter wake order is already FIFO) plus an explicit waiter counter so
//! the handler can distinguish "the queue was already full" from "you
//! queued, then your budget ran out" — a distinction a bare semaphore
//! cannot express since it only knows how many permits exist, not how
//! many callers are currently waiting for one.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use resilient_http_core::{
    BulkheadRejectReason, BulkheadRejectedEvent, DelegatingHandler, EventListeners, Handler,
    HttpContext, HttpResponse, ResilienceError,
};
use tokio::sync::Semaphore;

/// Immutable bulkhead configuration.
#[derive(Clone, Copy, Debug)]
pub struct BulkheadPolicy {
    pub max_concurrency: usize,
    pub max_queue_depth: usize,
    pub queue_timeout: Duration,
}

impl BulkheadPolicy {
    pub fn new(max_concurrency: usize, max_queue_depth: usize, queue_timeout: Duration) -> Self {
        assert!(max_concurrency >= 1, "max_concurrency must be at least 1");
        Self {
            max_concurrency,
            max_queue_depth,
            queue_timeout,
        }
    }
}

/// Wraps an inner handler with bounded concurrency and a bounded FIFO
/// wait queue.
pub struct BulkheadHandler {
    policy: BulkheadPolicy,
    source: String,
    semaphore: Arc<Semaphore>,
    waiters: AtomicUsize,
    events: EventListeners<BulkheadRejectedEvent>,
    inner: Arc<dyn Handler>,
}

impl BulkheadHandler {
    pub fn new(policy: BulkheadPolicy, source: impl Into<String>, inner: Arc<dyn Handler>) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(policy.max_concurrency)),
            policy,
            source: source.into(),
            waiters: AtomicUsize::new(0),
            events: EventListeners::new(),
            inner,
        }
    }

    pub fn events(&self) -> &EventListeners<BulkheadRejectedEvent> {
        &self.events
    }

    /// Requests in flight right now (held permits).
    pub fn in_flight(&self) -> usize {
        self.policy.max_concurrency - self.semaphore.available_permits()
    }

    /// Requests currently queued waiting for a slot.
    pub fn queue_length(&self) -> usize {
        self.waiters.load(Ordering::SeqCst)
    }

    fn reject(&self, reason: BulkheadRejectReason) -> ResilienceError {
        self.events.emit(&BulkheadRejectedEvent {
            timestamp: std::time::SystemTime::now(),
            source: self.source.clone(),
            reason,
            max_concurrency: self.policy.max_concurrency,
            max_queue_depth: self.policy.max_queue_depth,
        });
        ResilienceError::BulkheadRejected {
            reason,
            max_concurrency: self.policy.max_concurrency,
            max_queue_depth: self.policy.max_queue_depth,
        }
    }
}

#[async_trait]
impl Handler for BulkheadHandler {
    async fn handle(&self, ctx: &mut HttpContext) -> Result<HttpResponse, ResilienceError> {
        ctx.throw_if_cancelled()?;

        let permit = if let Ok(permit) = self.semaphore.clone().try_acquire_owned() {
            permit
        } else {
            // No slot free. Reserve a queue position, bounded by max_queue_depth.
            loop {
                let current = self.waiters.load(Ordering::SeqCst);
                if current >= self.policy.max_queue_depth {
                    return Err(self.reject(BulkheadRejectReason::QueueFull));
                }
                if self
                    .waiters
                    .compare_exchange(current, current + 1, Ordering::SeqCst, Ordering::SeqCst)
                    .is_ok()
                {
                    break;
                }
            }

            let acquire = self.semaphore.clone().acquire_owned();
            let outcome = tokio::select! {
                biased;
                _ = ctx.cancellation().cancelled() => {
                    Err(ResilienceError::cancelled(ctx.cancellation().reason()))
                }
                _ = tokio::time::sleep(self.policy.queue_timeout) => {
                    Err(self.reject(BulkheadRejectReason::QueueTimeout))
                }
                permit = acquire => {
                    Ok(permit.expect("semaphore is never closed"))
                }
            };
            self.waiters.fetch_sub(1, Ordering::SeqCst);
            outcome?
        };

        let result = self.inner.handle(ctx).await;
        drop(permit);
        result
    }
}

impl DelegatingHandler for BulkheadHandler {
    fn inner(&self) -> &Arc<dyn Handler> {
        &self.inner
    }
}
