//! The immutable outbound request value.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;

use crate::method::HttpMethod;

/// Metadata value attached to a request for per-request policy overrides.
///
/// Kept as a small closed enum (rather than `Box<dyn Any>`) since the only
/// recognized override today is `streaming`; new keys extend this type.
#[derive(Clone, Debug, PartialEq)]
pub enum MetadataValue {
    /// A boolean override, e.g. the `streaming` key.
    Bool(bool),
    /// A free-form string override.
    Text(String),
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        MetadataValue::Bool(value)
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        MetadataValue::Text(value)
    }
}

/// The recognized metadata key that forces streaming or buffered handling
/// for a single request regardless of the client's default.
pub const METADATA_STREAMING: &str = "streaming";

/// Case-insensitive header map. Keys are stored lower-cased; lookups
/// normalize the same way.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HeaderMap {
    entries: Vec<(String, String)>,
}

impl HeaderMap {
    /// An empty header map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a header, comparing names case-insensitively.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let lower = name.to_ascii_lowercase();
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(&lower))
        {
            entry.1 = value.into();
        } else {
            self.entries.push((lower, value.into()));
        }
    }

    /// Looks up a header by case-insensitive name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Iterates `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of headers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` if there are no headers.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// An immutable outbound HTTP request.
///
/// `HttpRequest` is cheap to clone: headers and metadata are reference
/// counted, and the body is `Bytes`. Non-mutating builders (`copy_with`,
/// `with_header`) return a new value rather than mutating in place.
#[derive(Clone, Debug)]
pub struct HttpRequest {
    method: HttpMethod,
    uri: String,
    headers: Arc<HeaderMap>,
    body: Option<Bytes>,
    metadata: Arc<HashMap<String, MetadataValue>>,
}

impl HttpRequest {
    /// Starts building a request for `uri`.
    pub fn builder(uri: impl Into<String>) -> HttpRequestBuilder {
        HttpRequestBuilder::new(uri)
    }

    /// Shorthand for a `GET` request.
    pub fn get(uri: impl Into<String>) -> HttpRequest {
        HttpRequestBuilder::new(uri).method(HttpMethod::GET).build_unchecked()
    }

    /// The request method.
    pub fn method(&self) -> &HttpMethod {
        &self.method
    }

    /// The target URI.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// The (unmodifiable) header map.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The body bytes, if any.
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// The (unmodifiable) per-request metadata map.
    pub fn metadata(&self) -> &HashMap<String, MetadataValue> {
        &self.metadata
    }

    /// A metadata override, if a `streaming` key is present.
    pub fn streaming_override(&self) -> Option<bool> {
        match self.metadata.get(METADATA_STREAMING) {
            Some(MetadataValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    /// Returns a copy of this request with an additional/replaced header.
    pub fn with_header(&self, name: impl Into<String>, value: impl Into<String>) -> HttpRequest {
        let mut headers = (*self.headers).clone();
        headers.insert(name, value);
        HttpRequest {
            headers: Arc::new(headers),
            ..self.clone()
        }
    }

    /// Returns a copy of this request with the body replaced.
    pub fn with_body(&self, body: impl Into<Bytes>) -> HttpRequest {
        HttpRequest {
            body: Some(body.into()),
            ..self.clone()
        }
    }

    /// Returns a copy of this request with an updated method.
    pub fn with_method(&self, method: HttpMethod) -> HttpRequest {
        HttpRequest {
            method,
            ..self.clone()
        }
    }

    /// Returns a copy of this request with a metadata key set.
    pub fn with_metadata(&self, key: impl Into<String>, value: impl Into<MetadataValue>) -> HttpRequest {
        let mut metadata = (*self.metadata).clone();
        metadata.insert(key.into(), value.into());
        HttpRequest {
            metadata: Arc::new(metadata),
            ..self.clone()
        }
    }
}

/// Incremental constructor for [`HttpRequest`]. Construction fails if the
/// URI was never set.
pub struct HttpRequestBuilder {
    method: HttpMethod,
    uri: Option<String>,
    headers: HeaderMap,
    body: Option<Bytes>,
    metadata: HashMap<String, MetadataValue>,
}

impl HttpRequestBuilder {
    fn new(uri: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::GET,
            uri: Some(uri.into()),
            headers: HeaderMap::new(),
            body: None,
            metadata: HashMap::new(),
        }
    }

    /// A builder with no URI set; `build` will fail until one is provided.
    pub fn empty() -> Self {
        Self {
            method: HttpMethod::GET,
            uri: None,
            headers: HeaderMap::new(),
            body: None,
            metadata: HashMap::new(),
        }
    }

    /// Sets the target URI.
    pub fn uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    /// Sets the request method.
    pub fn method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    /// Adds or replaces a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Sets the body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Sets a metadata override.
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Builds the request, failing if no URI was ever set.
    pub fn build(self) -> Result<HttpRequest, HttpRequestBuildError> {
        let uri = self.uri.ok_or(HttpRequestBuildError::MissingUri)?;
        Ok(HttpRequest {
            method: self.method,
            uri,
            headers: Arc::new(self.headers),
            body: self.body,
            metadata: Arc::new(self.metadata),
        })
    }

    fn build_unchecked(self) -> HttpRequest {
        self.build().expect("uri was set by constructor")
    }
}

/// Failure building an [`HttpRequest`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum HttpRequestBuildError {
    /// `build` was called without ever supplying a URI.
    #[error("request builder has no URI set")]
    MissingUri,
}
