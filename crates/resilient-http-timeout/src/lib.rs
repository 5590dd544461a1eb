//! Per-attempt deadline handler.
//!
//! Wraps the inner call with a fixed deadline measured from the moment
//! this handler is entered. Each call gets its own forked context and
//! therefore its own deadline: stacking this handler under Retry or
//! Hedging naturally gives every attempt a fresh timeout, since each
//! retried/hedged attempt is itself a separate call into this handler.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use resilient_http_core::{DelegatingHandler, EventListeners, Handler, HttpContext, HttpResponse, ResilienceError, TimeoutEvent};

/// Immutable timeout configuration.
#[derive(Clone, Copy, Debug)]
pub struct TimeoutPolicy {
    pub limit: Duration,
}

impl TimeoutPolicy {
    pub fn new(limit: Duration) -> Self {
        Self { limit }
    }
}

/// Wraps an inner handler with a deadline.
pub struct TimeoutHandler {
    policy: TimeoutPolicy,
    source: String,
    events: EventListeners<TimeoutEvent>,
    inner: Arc<dyn Handler>,
}

impl TimeoutHandler {
    pub fn new(policy: TimeoutPolicy, source: impl Into<String>, inner: Arc<dyn Handler>) -> Self {
        Self {
            policy,
            source: source.into(),
            events: EventListeners::new(),
            inner,
        }
    }

    pub fn events(&self) -> &EventListeners<TimeoutEvent> {
        &self.events
    }
}

#[async_trait]
impl Handler for TimeoutHandler {
    async fn handle(&self, ctx: &mut HttpContext) -> Result<HttpResponse, ResilienceError> {
        ctx.throw_if_cancelled()?;
        let mut attempt_ctx = ctx.fork();
        let started = Instant::now();

        tokio::select! {
            result = self.inner.handle(&mut attempt_ctx) => result,
            _ = tokio::time::sleep(self.policy.limit) => {
                attempt_ctx.cancellation().cancel("attempt exceeded timeout");
                self.events.emit(&TimeoutEvent {
                    timestamp: std::time::SystemTime::now(),
                    source: self.source.clone(),
                    limit: self.policy.limit,
                });
                Err(ResilienceError::Timeout {
                    elapsed: started.elapsed(),
                    limit: self.policy.limit,
                })
            }
        }
    }
}

impl DelegatingHandler for TimeoutHandler {
    fn inner(&self) -> &Arc<dyn Handler> {
        &self.inner
    }
}
