//! The chain-of-responsibility contract every policy implements.

use std::sync::Arc;

use async_trait::async_trait;

use crate::context::HttpContext;
use crate::error::ResilienceError;
use crate::response::HttpResponse;

/// One link in the resilience pipeline.
///
/// A handler receives the current [`HttpContext`] (which it may mutate,
/// e.g. to add a header or record a property) and either short-circuits
/// with its own result or delegates to `inner` by calling
/// [`DelegatingHandler::call_inner`]. The pipeline is built outermost
/// first: the first handler added sees the request first and the final
/// response last.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Processes `ctx`, producing a response or a resilience error.
    async fn handle(&self, ctx: &mut HttpContext) -> Result<HttpResponse, ResilienceError>;
}

#[async_trait]
impl Handler for Arc<dyn Handler> {
    async fn handle(&self, ctx: &mut HttpContext) -> Result<HttpResponse, ResilienceError> {
        (**self).handle(ctx).await
    }
}

/// A [`Handler`] that wraps exactly one inner handler and delegates to it.
///
/// Most policies (retry, timeout, circuit breaker, bulkhead, logging) are
/// delegating handlers: they do some bookkeeping before and/or after
/// calling through to `inner`. Hedging and fallback are the exceptions
/// (hedging calls `inner` more than once concurrently; fallback may call
/// it zero times on a synthesized response) and implement [`Handler`]
/// directly instead.
pub trait DelegatingHandler: Handler {
    /// The next handler in the chain.
    fn inner(&self) -> &Arc<dyn Handler>;
}

/// Convenience helper for a [`DelegatingHandler`] to invoke its inner
/// handler, threading the cancellation check through first.
pub async fn call_inner(
    inner: &Arc<dyn Handler>,
    ctx: &mut HttpContext,
) -> Result<HttpResponse, ResilienceError> {
    ctx.throw_if_cancelled()?;
    inner.handle(ctx).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{HeaderMap, HttpRequest};

    struct Echo;

    #[async_trait]
    impl Handler for Echo {
        async fn handle(&self, _ctx: &mut HttpContext) -> Result<HttpResponse, ResilienceError> {
            Ok(HttpResponse::buffered(200, HeaderMap::new(), "ok"))
        }
    }

    #[tokio::test]
    async fn call_inner_propagates_cancellation_before_delegating() {
        let inner: Arc<dyn Handler> = Arc::new(Echo);
        let mut ctx = HttpContext::new(HttpRequest::get("https://example.test/"));
        ctx.cancellation().cancel("gave up");

        let result = call_inner(&inner, &mut ctx).await;
        assert!(result.unwrap_err().is_cancellation());
    }

    #[tokio::test]
    async fn call_inner_delegates_when_not_cancelled() {
        let inner: Arc<dyn Handler> = Arc::new(Echo);
        let mut ctx = HttpContext::new(HttpRequest::get("https://example.test/"));

        let result = call_inner(&inner, &mut ctx).await.unwrap();
        assert!(result.is_success());
    }
}
