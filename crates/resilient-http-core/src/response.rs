//! The inbound response value, buffered or streaming.

use std::pin::Pin;

use bytes::Bytes;
use futures::stream::Stream;

use crate::error::ResilienceError;
use crate::request::HeaderMap;

/// A boxed stream of body chunks, used by the streaming variant of
/// [`HttpResponse`].
pub type BodyStream = Pin<Box<dyn Stream<Item = Result<Bytes, ResilienceError>> + Send>>;

/// An inbound HTTP response.
///
/// A response holds its body in exactly one of two mutually exclusive
/// forms: already materialized in memory (`Buffered`), or as a live,
/// not-yet-consumed stream (`Streaming`). Policies that must inspect or
/// retry the body (retry, fallback, logging redaction) require the
/// buffered form; [`HttpResponse::to_buffered`] performs that conversion,
/// consuming the stream exactly once.
pub struct HttpResponse {
    status: u16,
    headers: HeaderMap,
    body: ResponseBody,
}

enum ResponseBody {
    Buffered(Bytes),
    Streaming(BodyStream),
}

impl HttpResponse {
    /// Builds an already-buffered response.
    pub fn buffered(status: u16, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: ResponseBody::Buffered(body.into()),
        }
    }

    /// Builds a response whose body has not yet been read from the wire.
    pub fn streaming(status: u16, headers: HeaderMap, body: BodyStream) -> Self {
        Self {
            status,
            headers,
            body: ResponseBody::Streaming(body),
        }
    }

    /// The HTTP status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// The response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// `true` if the body has already been fully read into memory.
    pub fn is_buffered(&self) -> bool {
        matches!(self.body, ResponseBody::Buffered(_))
    }

    /// `true` if the body is a live stream that has not yet been consumed.
    pub fn is_streaming(&self) -> bool {
        matches!(self.body, ResponseBody::Streaming(_))
    }

    /// `2xx`.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// `3xx`.
    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status)
    }

    /// `4xx`.
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }

    /// `5xx`.
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }

    /// The buffered body, if this response is already buffered.
    ///
    /// Returns `None` for a streaming response; call [`Self::to_buffered`]
    /// first to materialize it.
    pub fn buffered_body(&self) -> Option<&Bytes> {
        match &self.body {
            ResponseBody::Buffered(bytes) => Some(bytes),
            ResponseBody::Streaming(_) => None,
        }
    }

    /// Drains a streaming body into memory, turning this response into a
    /// buffered one. A no-op (and cheap) if the response is already
    /// buffered.
    ///
    /// Fails with `Transport` if a chunk read fails partway through; the
    /// response is left in a streaming-but-partially-consumed state, which
    /// is why policies must not retry once this has been attempted on a
    /// response they did not originate.
    pub async fn to_buffered(self) -> Result<Self, ResilienceError> {
        match self.body {
            ResponseBody::Buffered(_) => Ok(self),
            ResponseBody::Streaming(mut stream) => {
                use futures::StreamExt;
                let mut collected = Vec::new();
                while let Some(chunk) = stream.next().await {
                    collected.extend_from_slice(&chunk?);
                }
                Ok(Self {
                    status: self.status,
                    headers: self.headers,
                    body: ResponseBody::Buffered(Bytes::from(collected)),
                })
            }
        }
    }

    /// Fails with `HttpStatus` unless the response is a 2xx.
    pub fn ensure_success(self) -> Result<Self, ResilienceError> {
        if self.is_success() {
            Ok(self)
        } else {
            let status = self.status;
            Err(ResilienceError::HttpStatus {
                status,
                response: Box::new(self),
            })
        }
    }
}

impl Clone for HttpResponse {
    /// Panics on a streaming response: a live stream cannot be duplicated.
    /// Policies that need to retain a copy (logging, fallback inspection)
    /// must call [`Self::to_buffered`] first.
    fn clone(&self) -> Self {
        match &self.body {
            ResponseBody::Buffered(bytes) => Self {
                status: self.status,
                headers: self.headers.clone(),
                body: ResponseBody::Buffered(bytes.clone()),
            },
            ResponseBody::Streaming(_) => {
                panic!("cannot clone a streaming HttpResponse; call to_buffered first")
            }
        }
    }
}

impl std::fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("buffered", &self.is_buffered())
            .finish()
    }
}
