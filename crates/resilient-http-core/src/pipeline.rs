//! Assembles policy layers and a terminal handler into one callable chain.

use std::sync::Arc;

use crate::handler::Handler;
use crate::terminal::Terminal;
use crate::transport::Transport;

/// A constructor for one layer: given the handler it should delegate to,
/// produces the wrapping handler.
pub type Layer = Box<dyn FnOnce(Arc<dyn Handler>) -> Arc<dyn Handler>>;

/// Builds a handler chain outermost-layer-first.
///
/// Layers are pushed in the order a caller wants them to see the request:
/// the first layer pushed is the first to see the request and the last to
/// see the response. [`PipelineBuilder::build`] wires them around a
/// terminal handler in that order.
pub struct PipelineBuilder {
    layers: Vec<Layer>,
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineBuilder {
    /// An empty builder.
    pub fn new() -> Self {
        Self { layers: Vec::new() }
    }

    /// Appends a layer constructor. Layers are applied in push order,
    /// outermost first.
    pub fn layer(mut self, layer: impl FnOnce(Arc<dyn Handler>) -> Arc<dyn Handler> + 'static) -> Self {
        self.layers.push(Box::new(layer));
        self
    }

    /// Wires every pushed layer around `terminal`, returning the outermost
    /// handler of the assembled chain.
    pub fn build(self, terminal: Arc<dyn Handler>) -> Arc<dyn Handler> {
        self.layers
            .into_iter()
            .rev()
            .fold(terminal, |inner, layer| layer(inner))
    }

    /// Wires every pushed layer around a [`Terminal`] wrapping `transport`.
    pub fn build_with_transport(self, transport: Arc<dyn Transport>) -> Arc<dyn Handler> {
        self.build(Arc::new(Terminal::new(transport)))
    }

    /// Builds a chain from a pre-built list of layer constructors where the
    /// last entry is treated as the non-delegating terminal itself (it
    /// receives no inner handler and is returned as-is), rather than a
    /// [`Terminal`] wrapping a [`Transport`]. Useful for tests that want to
    /// substitute a stub handler in place of a real transport.
    ///
    /// Panics if `handlers` is empty.
    pub fn from_list(mut handlers: Vec<Layer>) -> Arc<dyn Handler> {
        let terminal_ctor = handlers.pop().expect("pipeline must have at least a terminal");
        // The terminal constructor never reads its `inner` argument; any
        // placeholder satisfies the signature.
        let placeholder: Arc<dyn Handler> = Arc::new(NoOp);
        let terminal = terminal_ctor(placeholder);
        handlers.into_iter().rev().fold(terminal, |inner, layer| layer(inner))
    }
}

/// A handler that short-circuits with an empty 200 response without
/// consulting any transport or policy. Used as a placeholder terminal in
/// tests that don't care about the actual response.
pub struct NoOp;

#[async_trait::async_trait]
impl Handler for NoOp {
    async fn handle(
        &self,
        _ctx: &mut crate::context::HttpContext,
    ) -> Result<crate::response::HttpResponse, crate::error::ResilienceError> {
        Ok(crate::response::HttpResponse::buffered(
            200,
            crate::request::HeaderMap::new(),
            bytes::Bytes::new(),
        ))
    }
}
