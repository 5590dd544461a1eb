//! Substitutes a response for a classified failure.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use resilient_http_core::{
    DelegatingHandler, EventListeners, FallbackEvent, Handler, HttpContext, HttpResponse, ResilienceError,
};

/// Produces a substitute response for a classified failure.
///
/// Implemented directly (rather than as a bare closure type alias) so
/// that fallback actions needing `&mut self` state (a static cached
/// response, a counter) have somewhere to put it.
#[async_trait]
pub trait FallbackAction: Send + Sync {
    /// Builds the substitute response for the given failed outcome.
    /// `error` is `None` when the trigger was a classified response
    /// rather than a propagated error.
    async fn fallback(&self, ctx: &HttpContext, error: Option<&ResilienceError>) -> Result<HttpResponse, ResilienceError>;
}

/// Adapts a plain async closure into a [`FallbackAction`].
pub struct FallbackFn<F>(F);

impl<F> FallbackFn<F> {
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F, Fut> FallbackAction for FallbackFn<F>
where
    F: Fn(&HttpContext, Option<&ResilienceError>) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<HttpResponse, ResilienceError>> + Send,
{
    async fn fallback(&self, ctx: &HttpContext, error: Option<&ResilienceError>) -> Result<HttpResponse, ResilienceError> {
        (self.0)(ctx, error).await
    }
}

/// Which outcomes trigger the fallback.
#[derive(Clone, Default)]
pub struct FallbackTrigger {
    status_codes: HashSet<u16>,
    classify_errors: bool,
}

impl FallbackTrigger {
    /// Triggers on any of these status codes, plus every propagated error.
    pub fn on_status_codes(codes: impl IntoIterator<Item = u16>) -> Self {
        Self {
            status_codes: codes.into_iter().collect(),
            classify_errors: true,
        }
    }

    /// Triggers on every server error (5xx) and propagated error.
    pub fn on_server_errors() -> Self {
        Self {
            status_codes: HashSet::new(),
            classify_errors: true,
        }
    }

    fn triggers(&self, response: Option<&HttpResponse>, error: Option<&ResilienceError>) -> bool {
        if let Some(response) = response {
            if self.status_codes.contains(&response.status()) {
                return true;
            }
            return self.status_codes.is_empty() && response.is_server_error();
        }
        error.is_some() && self.classify_errors
    }
}

/// Wraps an inner handler with a fallback action.
pub struct FallbackHandler {
    trigger: FallbackTrigger,
    action: Arc<dyn FallbackAction>,
    source: String,
    events: EventListeners<FallbackEvent>,
    inner: Arc<dyn Handler>,
}

impl FallbackHandler {
    pub fn new(
        trigger: FallbackTrigger,
        action: Arc<dyn FallbackAction>,
        source: impl Into<String>,
        inner: Arc<dyn Handler>,
    ) -> Self {
        Self {
            trigger,
            action,
            source: source.into(),
            events: EventListeners::new(),
            inner,
        }
    }

    pub fn events(&self) -> &EventListeners<FallbackEvent> {
        &self.events
    }
}

#[async_trait]
impl Handler for FallbackHandler {
    async fn handle(&self, ctx: &mut HttpContext) -> Result<HttpResponse, ResilienceError> {
        let outcome = self.inner.handle(ctx).await;

        let (response_for_trigger, error_for_trigger) = match &outcome {
            Ok(response) => (Some(response), None),
            Err(error) => (None, Some(error)),
        };

        if !self.trigger.triggers(response_for_trigger, error_for_trigger) {
            return outcome;
        }

        let triggering_error = match &outcome {
            Ok(response) => format!("status {}", response.status()),
            Err(error) => error.to_string(),
        };
        self.events.emit(&FallbackEvent {
            timestamp: std::time::SystemTime::now(),
            source: self.source.clone(),
            triggering_error,
        });

        let error_ref = outcome.as_ref().err();
        self.action.fallback(ctx, error_ref).await.map_err(|fallback_error| {
            ResilienceError::FallbackFailed {
                message: fallback_error.to_string(),
            }
        })
    }
}

impl DelegatingHandler for FallbackHandler {
    fn inner(&self) -> &Arc<dyn Handler> {
        &self.inner
    }
}
