//! Core types shared by every resilient-http policy crate: the request and
//! response values, the per-call context, the handler chain contract, the
//! terminal/transport seam, cancellation, and the event bus policies report
//! through.

pub mod cancellation;
pub mod context;
pub mod error;
pub mod events;
pub mod handler;
pub mod method;
pub mod pipeline;
pub mod request;
pub mod response;
pub mod terminal;
pub mod transport;

pub use cancellation::CancellationToken;
pub use context::HttpContext;
pub use error::{BulkheadRejectReason, ResilienceError};
pub use events::{
    BulkheadRejectedEvent, CircuitCloseEvent, CircuitOpenEvent, Event, EventHub, EventListener,
    EventListeners, FallbackEvent, FnListener, HedgingEvent, HedgingOutcomeEvent, ResilienceEvent,
    RetryEvent, TimeoutEvent,
};
pub use handler::{call_inner, DelegatingHandler, Handler};
pub use method::HttpMethod;
pub use pipeline::{Layer, NoOp, PipelineBuilder};
pub use request::{HeaderMap, HttpRequest, HttpRequestBuildError, HttpRequestBuilder, MetadataValue};
pub use response::{BodyStream, HttpResponse};
pub use terminal::Terminal;
pub use transport::Transport;

/// Re-exports the types most pipeline-building code needs in one `use`.
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::context::HttpContext;
    pub use crate::error::{BulkheadRejectReason, ResilienceError};
    pub use crate::events::{Event, EventHub, EventListener, EventListeners, ResilienceEvent};
    pub use crate::handler::{call_inner, DelegatingHandler, Handler};
    pub use crate::method::HttpMethod;
    pub use crate::pipeline::PipelineBuilder;
    pub use crate::request::{HeaderMap, HttpRequest, HttpRequestBuilder};
    pub use crate::response::HttpResponse;
    pub use crate::terminal::Terminal;
    pub use crate::transport::Transport;
}
