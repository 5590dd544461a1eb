//! The leaf abstraction that actually puts bytes on the wire.

use async_trait::async_trait;

use crate::error::ResilienceError;
use crate::request::HttpRequest;
use crate::response::HttpResponse;

/// Sends a single request and returns its response.
///
/// This is the seam between the resilience pipeline and an actual HTTP
/// client. Implementations are expected to be cheap to clone (an `Arc`
/// around a connection pool, typically) since the [`crate::terminal::Terminal`]
/// handler may hold one for the lifetime of a client.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends `request` and awaits its response.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ResilienceError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ResilienceError> {
        (**self).send(request).await
    }
}
