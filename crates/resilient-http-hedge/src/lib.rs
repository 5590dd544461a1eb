//! N-way speculative dispatch with first-win cancellation.
//!
//! Not a [`DelegatingHandler`](resilient_http_core::DelegatingHandler):
//! hedging calls its inner handler more than once, concurrently, so it
//! implements [`Handler`] directly rather than the single-inner-call
//! contract `DelegatingHandler` assumes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use resilient_http_core::{
    CancellationToken, EventListeners, Handler, HedgingEvent, HedgingOutcomeEvent, HttpContext,
    HttpResponse, ResilienceError,
};
use tokio::sync::mpsc;

/// Decides whether an outcome should keep the race running (`true`) or
/// wins it (`false`).
pub type ShouldHedge = Arc<dyn Fn(Option<&HttpResponse>, Option<&ResilienceError>) -> bool + Send + Sync>;

/// Immutable hedging configuration.
#[derive(Clone)]
pub struct HedgingPolicy {
    pub hedge_after: Duration,
    pub max_hedged_attempts: usize,
    pub should_hedge: ShouldHedge,
}

impl HedgingPolicy {
    pub fn new(hedge_after: Duration, max_hedged_attempts: usize) -> Self {
        Self {
            hedge_after,
            max_hedged_attempts,
            should_hedge: default_should_hedge(),
        }
    }

    pub fn with_should_hedge(mut self, should_hedge: ShouldHedge) -> Self {
        self.should_hedge = should_hedge;
        self
    }
}

/// Default: any non-2xx response or any error counts as non-winning.
pub fn default_should_hedge() -> ShouldHedge {
    Arc::new(|response, error| {
        if let Some(response) = response {
            return !response.is_success();
        }
        error.is_some()
    })
}

struct AttemptOutcome {
    index: usize,
    result: Result<HttpResponse, ResilienceError>,
}

/// Races up to `max_hedged_attempts + 1` concurrent calls through the
/// inner handler and returns the first winning outcome.
pub struct HedgingHandler {
    policy: HedgingPolicy,
    source: String,
    events_hedging: EventListeners<HedgingEvent>,
    events_outcome: EventListeners<HedgingOutcomeEvent>,
    inner: Arc<dyn Handler>,
}

impl HedgingHandler {
    pub fn new(policy: HedgingPolicy, source: impl Into<String>, inner: Arc<dyn Handler>) -> Self {
        Self {
            policy,
            source: source.into(),
            events_hedging: EventListeners::new(),
            events_outcome: EventListeners::new(),
            inner,
        }
    }

    pub fn hedging_events(&self) -> &EventListeners<HedgingEvent> {
        &self.events_hedging
    }

    pub fn outcome_events(&self) -> &EventListeners<HedgingOutcomeEvent> {
        &self.events_outcome
    }

    fn launch_attempt(
        &self,
        index: usize,
        ctx: &HttpContext,
        tx: mpsc::Sender<AttemptOutcome>,
    ) -> CancellationToken {
        let mut attempt_ctx = ctx.fork();
        let token = attempt_ctx.cancellation().clone();
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let result = inner.handle(&mut attempt_ctx).await;
            let _ = tx.send(AttemptOutcome { index, result }).await;
        });
        token
    }
}

#[async_trait]
impl Handler for HedgingHandler {
    async fn handle(&self, ctx: &mut HttpContext) -> Result<HttpResponse, ResilienceError> {
        ctx.throw_if_cancelled()?;

        let total_cap = self.policy.max_hedged_attempts + 1;
        let (tx, mut rx) = mpsc::channel::<AttemptOutcome>(total_cap);

        let mut sibling_tokens: Vec<CancellationToken> = Vec::with_capacity(total_cap);
        sibling_tokens.push(self.launch_attempt(1, ctx, tx.clone()));
        let mut launched = 1usize;
        let mut last_outcome: Option<Result<HttpResponse, ResilienceError>> = None;
        let mut received = 0usize;

        loop {
            tokio::select! {
                biased;

                Some(outcome) = rx.recv() => {
                    received += 1;
                    let is_winner = !(self.policy.should_hedge)(outcome.result.as_ref().ok(), outcome.result.as_ref().err());
                    if is_winner {
                        for (i, token) in sibling_tokens.iter().enumerate() {
                            if i + 1 != outcome.index {
                                token.cancel("hedging: a sibling attempt won");
                            }
                        }
                        self.events_outcome.emit(&HedgingOutcomeEvent {
                            timestamp: std::time::SystemTime::now(),
                            source: self.source.clone(),
                            winning_attempt_index: Some(outcome.index),
                            total_attempts: launched,
                        });
                        return outcome.result;
                    }

                    last_outcome = Some(outcome.result);
                    if received == total_cap {
                        self.events_outcome.emit(&HedgingOutcomeEvent {
                            timestamp: std::time::SystemTime::now(),
                            source: self.source.clone(),
                            winning_attempt_index: None,
                            total_attempts: launched,
                        });
                        return last_outcome.expect("just set above");
                    }
                }

                _ = tokio::time::sleep(self.policy.hedge_after), if launched < total_cap => {
                    launched += 1;
                    self.events_hedging.emit(&HedgingEvent {
                        timestamp: std::time::SystemTime::now(),
                        source: self.source.clone(),
                        attempt_index: launched,
                    });
                    sibling_tokens.push(self.launch_attempt(launched, ctx, tx.clone()));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resilient_http_core::{HeaderMap, HttpRequest};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct DelayedHandler {
        delay: Duration,
        status: u16,
    }

    #[async_trait]
    impl Handler for DelayedHandler {
        async fn handle(&self, ctx: &mut HttpContext) -> Result<HttpResponse, ResilienceError> {
            tokio::select! {
                _ = tokio::time::sleep(self.delay) => {
                    Ok(HttpResponse::buffered(self.status, HeaderMap::new(), "body"))
                }
                _ = ctx.cancellation().cancelled() => {
                    Err(ResilienceError::cancelled(ctx.cancellation().reason()))
                }
            }
        }
    }

    struct PerAttemptHandler {
        delays: Vec<Duration>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Handler for PerAttemptHandler {
        async fn handle(&self, ctx: &mut HttpContext) -> Result<HttpResponse, ResilienceError> {
            let index = self.calls.fetch_add(1, Ordering::SeqCst);
            let delay = self.delays[index];
            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    Ok(HttpResponse::buffered(200, HeaderMap::new(), "ok"))
                }
                _ = ctx.cancellation().cancelled() => {
                    Err(ResilienceError::cancelled(ctx.cancellation().reason()))
                }
            }
        }
    }

    #[tokio::test]
    async fn primary_wins_when_fast() {
        let inner = Arc::new(DelayedHandler {
            delay: Duration::from_millis(5),
            status: 200,
        });
        let handler = HedgingHandler::new(
            HedgingPolicy::new(Duration::from_millis(50), 1),
            "test",
            inner,
        );
        let mut ctx = HttpContext::new(HttpRequest::get("https://example.test/"));
        let response = handler.handle(&mut ctx).await.unwrap();
        assert_eq!(response.status(), 200);
    }

    #[tokio::test]
    async fn second_attempt_wins_the_race() {
        let inner = Arc::new(PerAttemptHandler {
            delays: vec![Duration::from_millis(100), Duration::from_millis(10)],
            calls: Arc::new(AtomicUsize::new(0)),
        });
        let handler = HedgingHandler::new(
            HedgingPolicy::new(Duration::from_millis(20), 1),
            "test",
            inner,
        );

        let winner = Arc::new(std::sync::Mutex::new(None));
        let winner_clone = Arc::clone(&winner);
        handler.outcome_events().subscribe_fn(move |event| {
            *winner_clone.lock().unwrap() = Some((event.winning_attempt_index, event.total_attempts));
        });

        let mut ctx = HttpContext::new(HttpRequest::get("https://example.test/"));
        let response = handler.handle(&mut ctx).await.unwrap();
        assert!(response.is_success());
        assert_eq!(*winner.lock().unwrap(), Some((Some(2), 2)));
    }

    #[tokio::test]
    async fn never_launches_more_than_the_cap() {
        let calls = Arc::new(AtomicUsize::new(0));
        let inner = Arc::new(PerAttemptHandler {
            delays: vec![Duration::from_millis(500); 5],
            calls: Arc::clone(&calls),
        });
        let handler = HedgingHandler::new(
            HedgingPolicy::new(Duration::from_millis(5), 2),
            "test",
            inner,
        );

        let mut ctx = HttpContext::new(HttpRequest::get("https://example.test/"));
        let result = tokio::time::timeout(Duration::from_millis(50), handler.handle(&mut ctx)).await;
        assert!(result.is_err(), "nothing should have won yet");
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
