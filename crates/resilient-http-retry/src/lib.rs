//! Retry-with-backoff handler.
//!
//! Wraps an inner handler and re-attempts the call when the configured
//! predicate says the outcome is retryable, waiting `backoff(attempt)`
//! (optionally jittered) between attempts and giving up with
//! `ResilienceError::RetryExhausted` once `max_retries` is spent.

mod policy;

pub use policy::{default_predicate, Backoff, RetryPolicy, RetryPredicate};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use resilient_http_core::{
    DelegatingHandler, Handler, HttpContext, HttpResponse, ResilienceError, RetryEvent,
};

/// Streaming responses that have already been materialized downstream
/// cannot be safely retried against the same attempt (the body is
/// consumed). The handler checks `HttpResponse::is_streaming` on the
/// response it receives and, if streaming, evaluates the predicate using
/// status/headers only, without attempting to read or re-read the body.
pub struct RetryHandler {
    policy: RetryPolicy,
    source: String,
    events: resilient_http_core::EventListeners<RetryEvent>,
    inner: Arc<dyn Handler>,
}

impl RetryHandler {
    /// Wraps `inner` with `policy`, tagging emitted events with `source`.
    pub fn new(policy: RetryPolicy, source: impl Into<String>, inner: Arc<dyn Handler>) -> Self {
        Self {
            policy,
            source: source.into(),
            events: resilient_http_core::EventListeners::new(),
            inner,
        }
    }

    /// The event stream this handler emits `Retry` events on.
    pub fn events(&self) -> &resilient_http_core::EventListeners<RetryEvent> {
        &self.events
    }

    fn jittered_delay(&self, attempt: usize) -> Duration {
        let computed = self.policy.backoff.delay_for(attempt);
        if self.policy.use_jitter {
            let millis = computed.as_millis() as u64;
            if millis == 0 {
                return computed;
            }
            let sampled = rand::thread_rng().gen_range(0..=millis);
            Duration::from_millis(sampled)
        } else {
            computed
        }
    }

    async fn sleep_cancellation_aware(
        &self,
        delay: Duration,
        ctx: &HttpContext,
    ) -> Result<(), ResilienceError> {
        tokio::select! {
            _ = tokio::time::sleep(delay) => Ok(()),
            _ = ctx.cancellation().cancelled() => Err(ResilienceError::cancelled(ctx.cancellation().reason())),
        }
    }
}

#[async_trait]
impl Handler for RetryHandler {
    async fn handle(&self, ctx: &mut HttpContext) -> Result<HttpResponse, ResilienceError> {
        let mut attempt: usize = 1;
        loop {
            ctx.throw_if_cancelled()?;
            let outcome = self.inner.handle(ctx).await;

            let (response_for_predicate, error_for_predicate) = match &outcome {
                Ok(response) => (Some(response), None),
                Err(error) => (None, Some(error)),
            };
            let retryable = (self.policy.should_retry)(response_for_predicate, error_for_predicate, ctx);

            if !retryable {
                return outcome;
            }

            if attempt > self.policy.max_retries {
                let last = match outcome {
                    Ok(response) => ResilienceError::HttpStatus {
                        status: response.status(),
                        response: Box::new(response),
                    },
                    Err(error) => error,
                };
                return Err(ResilienceError::RetryExhausted {
                    attempts: attempt,
                    last: Box::new(last),
                });
            }

            let triggering_reason = match &outcome {
                Ok(response) => format!("status {}", response.status()),
                Err(error) => error.to_string(),
            };
            let delay = self.jittered_delay(attempt);

            self.events.emit(&RetryEvent {
                timestamp: std::time::SystemTime::now(),
                source: self.source.clone(),
                attempt,
                max: Some(self.policy.max_retries + 1),
                delay,
                reason: triggering_reason,
            });

            self.sleep_cancellation_aware(delay, ctx).await?;
            attempt += 1;
        }
    }
}

impl DelegatingHandler for RetryHandler {
    fn inner(&self) -> &Arc<dyn Handler> {
        &self.inner
    }
}
