//! Observability-only handler: never alters the outcome, only reports it.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use resilient_http_core::{DelegatingHandler, Handler, HttpContext, HttpResponse, ResilienceError};

/// Headers redacted from log output by default.
pub const DEFAULT_REDACTED_HEADERS: &[&str] =
    &["authorization", "proxy-authorization", "cookie", "set-cookie", "x-api-key"];

const REDACTED_PLACEHOLDER: &str = "<redacted>";

/// Which headers to redact before logging.
#[derive(Clone)]
pub struct RedactionPolicy {
    redacted: HashSet<String>,
}

impl Default for RedactionPolicy {
    fn default() -> Self {
        Self {
            redacted: DEFAULT_REDACTED_HEADERS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl RedactionPolicy {
    /// The default redaction set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from an empty redaction set.
    pub fn none() -> Self {
        Self {
            redacted: HashSet::new(),
        }
    }

    /// Adds a header name to the redaction set (case-insensitive).
    pub fn redact(mut self, header: impl Into<String>) -> Self {
        self.redacted.insert(header.into().to_ascii_lowercase());
        self
    }

    fn is_redacted(&self, header: &str) -> bool {
        self.redacted.contains(&header.to_ascii_lowercase())
    }
}

/// Logs request/response metadata through `tracing`, redacting configured
/// headers, without affecting the pipeline's outcome.
pub struct LoggingHandler {
    redaction: RedactionPolicy,
    inner: Arc<dyn Handler>,
}

impl LoggingHandler {
    pub fn new(redaction: RedactionPolicy, inner: Arc<dyn Handler>) -> Self {
        Self { redaction, inner }
    }

    fn redacted_headers(&self, headers: &resilient_http_core::HeaderMap) -> Vec<(String, String)> {
        headers
            .iter()
            .map(|(name, value)| {
                if self.redaction.is_redacted(name) {
                    (name.to_string(), REDACTED_PLACEHOLDER.to_string())
                } else {
                    (name.to_string(), value.to_string())
                }
            })
            .collect()
    }
}

#[async_trait]
impl Handler for LoggingHandler {
    async fn handle(&self, ctx: &mut HttpContext) -> Result<HttpResponse, ResilienceError> {
        let span = tracing::info_span!(
            "resilient_http_request",
            method = %ctx.request().method(),
            uri = %ctx.request().uri(),
        );
        let _entered = span.enter();

        tracing::debug!(headers = ?self.redacted_headers(ctx.request().headers()), "sending request");

        let outcome = self.inner.handle(ctx).await;

        match &outcome {
            Ok(response) => {
                tracing::info!(
                    status = response.status(),
                    headers = ?self.redacted_headers(response.headers()),
                    "request completed"
                );
            }
            Err(error) => {
                tracing::warn!(error = %error, "request failed");
            }
        }

        outcome
    }
}

impl DelegatingHandler for LoggingHandler {
    fn inner(&self) -> &Arc<dyn Handler> {
        &self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resilient_http_core::{HeaderMap, HttpRequest};

    struct Echo;

    #[async_trait]
    impl Handler for Echo {
        async fn handle(&self, _ctx: &mut HttpContext) -> Result<HttpResponse, ResilienceError> {
            Ok(HttpResponse::buffered(200, HeaderMap::new(), "ok"))
        }
    }

    #[test]
    fn default_redaction_set_matches_spec() {
        let policy = RedactionPolicy::default();
        for header in DEFAULT_REDACTED_HEADERS {
            assert!(policy.is_redacted(header));
        }
        assert!(!policy.is_redacted("x-correlation-id"));
    }

    #[test]
    fn redaction_is_case_insensitive() {
        let policy = RedactionPolicy::default();
        assert!(policy.is_redacted("Authorization"));
    }

    #[tokio::test]
    async fn never_alters_the_outcome() {
        let handler = LoggingHandler::new(RedactionPolicy::default(), Arc::new(Echo));
        let mut ctx = HttpContext::new(
            HttpRequest::builder("https://example.test/")
                .header("authorization", "secret")
                .build()
                .unwrap(),
        );
        let response = handler.handle(&mut ctx).await.unwrap();
        assert_eq!(response.status(), 200);
    }
}
