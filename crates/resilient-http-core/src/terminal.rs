//! The innermost handler: the one that actually dispatches to a [`Transport`].

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use crate::context::HttpContext;
use crate::error::ResilienceError;
use crate::handler::Handler;
use crate::response::HttpResponse;
use crate::transport::Transport;

/// The leaf of the handler chain.
///
/// `Terminal` is the only handler that talks to a [`Transport`] rather than
/// to another handler. It records the wall-clock duration of the call as
/// the `elapsed_ms` context property so that the logging handler (which
/// typically sits outermost) can report end-to-end latency without timing
/// it a second time itself.
///
/// A `Terminal` built from an externally-owned transport (e.g. a shared
/// connection pool the caller also uses for other traffic) never closes
/// it; `Terminal` has no `Drop` impl of its own; ownership is simply an
/// `Arc`, so the transport outlives the pipeline for as long as anything
/// else still holds a reference to it.
pub struct Terminal {
    transport: Arc<dyn Transport>,
}

impl Terminal {
    /// Wraps `transport` as the pipeline's terminal handler.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }
}

/// Context property key set by [`Terminal`] after every call, holding the
/// elapsed duration of the dispatch in milliseconds.
pub const PROPERTY_ELAPSED_MS: &str = "resilient_http.elapsed_ms";

#[async_trait]
impl Handler for Terminal {
    async fn handle(&self, ctx: &mut HttpContext) -> Result<HttpResponse, ResilienceError> {
        ctx.throw_if_cancelled()?;
        let started = Instant::now();
        let result = self.transport.send(ctx.request().clone()).await;
        ctx.set_property(PROPERTY_ELAPSED_MS, started.elapsed().as_millis() as u64);
        result
    }
}
