//! The assembled, callable client: verb helpers layered over the handler
//! chain a [`ClientBuilder`](crate::builder::ClientBuilder) produced.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use resilient_http_core::{
    EventHub, Handler, HeaderMap, HttpContext, HttpMethod, HttpRequest, HttpRequestBuildError,
    HttpResponse, MetadataValue, ResilienceError, METADATA_STREAMING,
};

use crate::builder::ClientBuilder;

/// Per-call overrides a verb helper accepts on top of a client's defaults.
#[derive(Default, Clone)]
pub struct RequestOptions {
    headers: HeaderMap,
    body: Option<Bytes>,
    metadata: HashMap<String, MetadataValue>,
}

impl RequestOptions {
    /// An empty set of overrides.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a header for this call only.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Sets the request body for this call.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Sets a metadata override for this call, e.g. `streaming`.
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A client built from a [`ClientBuilder`]: a base URI, a set of default
/// headers, and a fully assembled handler chain terminating at a
/// transport.
pub struct ResilientHttpClient {
    base_uri: Option<String>,
    default_headers: HeaderMap,
    streaming_mode: bool,
    handler: Arc<dyn Handler>,
    event_hub: Arc<EventHub>,
}

impl ResilientHttpClient {
    pub(crate) fn new(
        base_uri: Option<String>,
        default_headers: HeaderMap,
        streaming_mode: bool,
        handler: Arc<dyn Handler>,
        event_hub: Arc<EventHub>,
    ) -> Self {
        Self {
            base_uri,
            default_headers,
            streaming_mode,
            handler,
            event_hub,
        }
    }

    /// Starts a fresh [`ClientBuilder`].
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// The event hub every policy layer in this client's chain publishes
    /// into.
    pub fn events(&self) -> &Arc<EventHub> {
        &self.event_hub
    }

    /// The assembled handler chain, for callers that want to drive it
    /// directly (tests, custom verbs).
    pub fn handler(&self) -> &Arc<dyn Handler> {
        &self.handler
    }

    fn resolve_uri(&self, uri: &str) -> String {
        let is_absolute = uri.starts_with("http://") || uri.starts_with("https://");
        match (&self.base_uri, is_absolute) {
            (Some(base), false) => {
                let base = base.trim_end_matches('/');
                if let Some(path) = uri.strip_prefix('/') {
                    format!("{base}/{path}")
                } else {
                    format!("{base}/{uri}")
                }
            }
            _ => uri.to_string(),
        }
    }

    async fn send(
        &self,
        method: HttpMethod,
        uri: &str,
        options: RequestOptions,
    ) -> Result<HttpResponse, ResilienceError> {
        let resolved = self.resolve_uri(uri);
        let mut builder = HttpRequest::builder(resolved).method(method);
        for (name, value) in self.default_headers.iter() {
            builder = builder.header(name, value);
        }
        for (name, value) in options.headers.iter() {
            builder = builder.header(name, value);
        }
        if let Some(body) = options.body {
            builder = builder.body(body);
        }
        if self.streaming_mode {
            builder = builder.metadata(METADATA_STREAMING, true);
        }
        for (key, value) in options.metadata {
            builder = builder.metadata(key, value);
        }

        let request = builder
            .build()
            .map_err(|HttpRequestBuildError::MissingUri| ResilienceError::Transport {
                message: "request builder has no URI set".to_string(),
            })?;

        let mut ctx = HttpContext::new(request);
        self.handler.handle(&mut ctx).await
    }

    /// Sends a `GET` request.
    pub async fn get(&self, uri: &str) -> Result<HttpResponse, ResilienceError> {
        self.send(HttpMethod::GET, uri, RequestOptions::new()).await
    }

    /// Sends a `GET` request with per-call overrides.
    pub async fn get_with(&self, uri: &str, options: RequestOptions) -> Result<HttpResponse, ResilienceError> {
        self.send(HttpMethod::GET, uri, options).await
    }

    /// Sends a `POST` request with a body.
    pub async fn post(&self, uri: &str, body: impl Into<Bytes>) -> Result<HttpResponse, ResilienceError> {
        self.send(HttpMethod::POST, uri, RequestOptions::new().body(body)).await
    }

    /// Sends a `POST` request with per-call overrides.
    pub async fn post_with(&self, uri: &str, options: RequestOptions) -> Result<HttpResponse, ResilienceError> {
        self.send(HttpMethod::POST, uri, options).await
    }

    /// Sends a `PUT` request with a body.
    pub async fn put(&self, uri: &str, body: impl Into<Bytes>) -> Result<HttpResponse, ResilienceError> {
        self.send(HttpMethod::PUT, uri, RequestOptions::new().body(body)).await
    }

    /// Sends a `PUT` request with per-call overrides.
    pub async fn put_with(&self, uri: &str, options: RequestOptions) -> Result<HttpResponse, ResilienceError> {
        self.send(HttpMethod::PUT, uri, options).await
    }

    /// Sends a `PATCH` request with a body.
    pub async fn patch(&self, uri: &str, body: impl Into<Bytes>) -> Result<HttpResponse, ResilienceError> {
        self.send(HttpMethod::PATCH, uri, RequestOptions::new().body(body)).await
    }

    /// Sends a `PATCH` request with per-call overrides.
    pub async fn patch_with(&self, uri: &str, options: RequestOptions) -> Result<HttpResponse, ResilienceError> {
        self.send(HttpMethod::PATCH, uri, options).await
    }

    /// Sends a `DELETE` request.
    pub async fn delete(&self, uri: &str) -> Result<HttpResponse, ResilienceError> {
        self.send(HttpMethod::DELETE, uri, RequestOptions::new()).await
    }

    /// Sends a `DELETE` request with per-call overrides.
    pub async fn delete_with(&self, uri: &str, options: RequestOptions) -> Result<HttpResponse, ResilienceError> {
        self.send(HttpMethod::DELETE, uri, options).await
    }

    /// Sends a `HEAD` request.
    pub async fn head(&self, uri: &str) -> Result<HttpResponse, ResilienceError> {
        self.send(HttpMethod::HEAD, uri, RequestOptions::new()).await
    }

    /// Sends an `OPTIONS` request.
    pub async fn options(&self, uri: &str) -> Result<HttpResponse, ResilienceError> {
        self.send(HttpMethod::OPTIONS, uri, RequestOptions::new()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use resilient_http_core::Transport;
    use std::sync::Mutex;

    struct RecordingTransport {
        seen_uris: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ResilienceError> {
            self.seen_uris.lock().unwrap().push(request.uri().to_string());
            Ok(HttpResponse::buffered(200, HeaderMap::new(), "ok"))
        }
    }

    #[tokio::test]
    async fn base_uri_is_prepended_to_relative_paths() {
        let transport = Arc::new(RecordingTransport {
            seen_uris: Mutex::new(Vec::new()),
        });
        let client = ClientBuilder::new()
            .base_uri("https://api.example.test")
            .http_client(Arc::clone(&transport) as Arc<dyn Transport>)
            .build()
            .unwrap();

        client.get("/widgets").await.unwrap();
        client.get("widgets/2").await.unwrap();
        client.get("https://other.test/absolute").await.unwrap();

        let seen = transport.seen_uris.lock().unwrap();
        assert_eq!(seen[0], "https://api.example.test/widgets");
        assert_eq!(seen[1], "https://api.example.test/widgets/2");
        assert_eq!(seen[2], "https://other.test/absolute");
    }

    #[tokio::test]
    async fn default_headers_are_sent_and_per_call_headers_override() {
        struct HeaderCapture {
            headers: Mutex<Option<HeaderMap>>,
        }

        #[async_trait]
        impl Transport for HeaderCapture {
            async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ResilienceError> {
                *self.headers.lock().unwrap() = Some(request.headers().clone());
                Ok(HttpResponse::buffered(200, HeaderMap::new(), "ok"))
            }
        }

        let transport = Arc::new(HeaderCapture { headers: Mutex::new(None) });
        let client = ClientBuilder::new()
            .default_header("x-client", "default")
            .http_client(Arc::clone(&transport) as Arc<dyn Transport>)
            .build()
            .unwrap();

        client
            .get_with("/", RequestOptions::new().header("x-client", "override"))
            .await
            .unwrap();

        let headers = transport.headers.lock().unwrap().clone().unwrap();
        assert_eq!(headers.get("x-client"), Some("override"));
    }
}
