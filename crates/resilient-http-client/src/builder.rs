//! Fluent pipeline composition: the same shape as [`PipelineBuilder`], but
//! speaking in terms of named policies instead of raw layer closures, and
//! wiring every handler's typed events into one shared [`EventHub`] as it
//! goes.

use std::sync::Arc;

use resilient_http_core::{EventHub, Handler, HeaderMap, PipelineBuilder, Transport};
use resilient_http_bulkhead::{BulkheadHandler, BulkheadPolicy};
use resilient_http_circuitbreaker::{CircuitBreakerHandler, CircuitBreakerPolicy, CircuitBreakerRegistry};
use resilient_http_fallback::{FallbackAction, FallbackHandler, FallbackTrigger};
use resilient_http_hedge::{HedgingHandler, HedgingPolicy};
use resilient_http_logging::{LoggingHandler, RedactionPolicy};
use resilient_http_retry::{RetryHandler, RetryPolicy};
use resilient_http_timeout::{TimeoutHandler, TimeoutPolicy};

use crate::client::ResilientHttpClient;

/// Where a built-in circuit breaker layer should look up its shared state.
#[derive(Clone)]
enum RegistrySource {
    /// The process-wide [`CircuitBreakerRegistry::global`] instance.
    Global,
    /// A caller-supplied registry, typically used to isolate tests.
    Custom(Arc<CircuitBreakerRegistry>),
}

/// Failure to finish building a client.
#[derive(Debug, thiserror::Error)]
pub enum ClientBuildError {
    /// [`ClientBuilder::build`] was called without ever supplying a
    /// transport via [`ClientBuilder::http_client`].
    #[error("client builder has no transport set; call .http_client(...) before .build()")]
    MissingTransport,
}

/// Fluently composes a pipeline of resilience policies into a
/// [`ResilientHttpClient`].
///
/// Layers are applied in call order, outermost first — the same
/// outermost-first convention as [`PipelineBuilder`], since `ClientBuilder`
/// is sugar over exactly that. A typical chain runs
/// `logging → retry → circuit_breaker → hedging → timeout → bulkhead →
/// fallback`, matching the order the JSON config binder uses, but nothing
/// enforces that order here: callers are free to compose policies in
/// whatever sequence their use case needs.
pub struct ClientBuilder {
    base_uri: Option<String>,
    default_headers: HeaderMap,
    transport: Option<Arc<dyn Transport>>,
    streaming_mode: bool,
    pipeline: PipelineBuilder,
    event_hub: Arc<EventHub>,
    circuit_registry: RegistrySource,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientBuilder {
    /// A builder with no handlers, no transport, and a private
    /// [`EventHub`] that nothing outside this builder's client sees.
    pub fn new() -> Self {
        Self {
            base_uri: None,
            default_headers: HeaderMap::new(),
            transport: None,
            streaming_mode: false,
            pipeline: PipelineBuilder::new(),
            event_hub: Arc::new(EventHub::new()),
            circuit_registry: RegistrySource::Global,
        }
    }

    /// A base URI prepended to any relative URI passed to a verb helper.
    pub fn base_uri(mut self, uri: impl Into<String>) -> Self {
        self.base_uri = Some(uri.into());
        self
    }

    /// A header sent with every request from the built client, unless a
    /// per-call header of the same name overrides it.
    pub fn default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.insert(name, value);
        self
    }

    /// The transport the built client's [`Terminal`](resilient_http_core::Terminal) dispatches to.
    pub fn http_client(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Requests streaming mode by default; equivalent to setting the
    /// `streaming` request metadata override on every call unless a caller
    /// overrides it per-request.
    pub fn streaming_mode(mut self) -> Self {
        self.streaming_mode = true;
        self
    }

    /// Directs the circuit breaker layer added by a subsequent
    /// [`Self::circuit_breaker`] call to look up circuits in `registry`
    /// instead of the process-wide default. Tests that want isolation from
    /// other tests' circuits should call this with a fresh registry.
    pub fn with_circuit_registry(mut self, registry: Arc<CircuitBreakerRegistry>) -> Self {
        self.circuit_registry = RegistrySource::Custom(registry);
        self
    }

    /// The event hub every policy layer added so far (and from now on)
    /// publishes into. Subscribe before or after adding layers — layers
    /// bridge their typed listeners into this exact hub instance as they
    /// are added, so a handle obtained here always reflects the final set.
    pub fn event_hub(&self) -> &Arc<EventHub> {
        &self.event_hub
    }

    /// Adds the logging handler, redacting headers per `redaction`.
    pub fn logging(mut self, redaction: RedactionPolicy) -> Self {
        self.pipeline = self
            .pipeline
            .layer(move |inner| Arc::new(LoggingHandler::new(redaction, inner)) as Arc<dyn Handler>);
        self
    }

    /// Adds a retry handler.
    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        let hub = Arc::clone(&self.event_hub);
        self.pipeline = self.pipeline.layer(move |inner| {
            let handler = RetryHandler::new(policy, "retry", inner);
            hub.bridge(handler.events());
            Arc::new(handler) as Arc<dyn Handler>
        });
        self
    }

    /// Adds a circuit breaker handler, looked up (or created) in whichever
    /// registry [`Self::with_circuit_registry`] selected (the process-wide
    /// one by default).
    pub fn circuit_breaker(mut self, policy: CircuitBreakerPolicy) -> Self {
        let hub = Arc::clone(&self.event_hub);
        let registry = self.circuit_registry.clone();
        self.pipeline = self.pipeline.layer(move |inner| {
            let handler = match &registry {
                RegistrySource::Global => CircuitBreakerHandler::new(policy, CircuitBreakerRegistry::global(), inner),
                RegistrySource::Custom(registry) => CircuitBreakerHandler::new(policy, registry, inner),
            };
            hub.bridge(handler.handle().open_events());
            hub.bridge(handler.handle().close_events());
            Arc::new(handler) as Arc<dyn Handler>
        });
        self
    }

    /// Adds a per-attempt timeout handler.
    pub fn timeout(mut self, policy: TimeoutPolicy) -> Self {
        let hub = Arc::clone(&self.event_hub);
        self.pipeline = self.pipeline.layer(move |inner| {
            let handler = TimeoutHandler::new(policy, "timeout", inner);
            hub.bridge(handler.events());
            Arc::new(handler) as Arc<dyn Handler>
        });
        self
    }

    /// Adds a bulkhead isolation handler.
    pub fn bulkhead(mut self, policy: BulkheadPolicy) -> Self {
        let hub = Arc::clone(&self.event_hub);
        self.pipeline = self.pipeline.layer(move |inner| {
            let handler = BulkheadHandler::new(policy, "bulkhead", inner);
            hub.bridge(handler.events());
            Arc::new(handler) as Arc<dyn Handler>
        });
        self
    }

    /// Adds a hedging handler.
    pub fn hedging(mut self, policy: HedgingPolicy) -> Self {
        let hub = Arc::clone(&self.event_hub);
        self.pipeline = self.pipeline.layer(move |inner| {
            let handler = HedgingHandler::new(policy, "hedging", inner);
            hub.bridge(handler.hedging_events());
            hub.bridge(handler.outcome_events());
            Arc::new(handler) as Arc<dyn Handler>
        });
        self
    }

    /// Adds a fallback handler substituting `action`'s response for
    /// outcomes `trigger` classifies as a failure.
    pub fn fallback(mut self, trigger: FallbackTrigger, action: Arc<dyn FallbackAction>) -> Self {
        let hub = Arc::clone(&self.event_hub);
        self.pipeline = self.pipeline.layer(move |inner| {
            let handler = FallbackHandler::new(trigger, action, "fallback", inner);
            hub.bridge(handler.events());
            Arc::new(handler) as Arc<dyn Handler>
        });
        self
    }

    /// Adds a caller-supplied handler, for policies outside this workspace.
    pub fn add_handler(mut self, layer: impl FnOnce(Arc<dyn Handler>) -> Arc<dyn Handler> + 'static) -> Self {
        self.pipeline = self.pipeline.layer(layer);
        self
    }

    /// Wires every added layer around the configured transport and returns
    /// the finished client. Fails if no transport was ever supplied.
    pub fn build(self) -> Result<ResilientHttpClient, ClientBuildError> {
        let transport = self.transport.ok_or(ClientBuildError::MissingTransport)?;
        let handler = self.pipeline.build_with_transport(transport);
        Ok(ResilientHttpClient::new(
            self.base_uri,
            self.default_headers,
            self.streaming_mode,
            handler,
            self.event_hub,
        ))
    }
}
