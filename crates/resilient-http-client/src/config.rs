//! JSON configuration document loading and pipeline binding.
//!
//! Maps a `Resilience` document onto policy values and composes them into a
//! pipeline in the fixed outer-to-inner order `Logging → Retry →
//! CircuitBreaker → Hedging → Timeout → Bulkhead → Fallback → Terminal`.
//! Missing subsections are skipped; a malformed document fails descriptively
//! rather than panicking or silently defaulting.

use std::sync::Arc;
use std::time::Duration;

use resilient_http_bulkhead::BulkheadPolicy;
use resilient_http_circuitbreaker::CircuitBreakerPolicy;
use resilient_http_core::{HttpContext, HttpResponse, ResilienceError, Transport};
use resilient_http_fallback::{FallbackFn, FallbackTrigger};
use resilient_http_hedge::HedgingPolicy;
use resilient_http_logging::RedactionPolicy;
use resilient_http_retry::{Backoff, RetryPolicy};
use resilient_http_timeout::TimeoutPolicy;
use serde::Deserialize;

use crate::builder::{ClientBuildError, ClientBuilder};
use crate::client::ResilientHttpClient;

/// Default `CircuitBreakerPolicy.success_threshold` when binding from a
/// config document: the JSON schema has no `SuccessThreshold` field, so one
/// consecutive success in HalfOpen is enough to close.
const DEFAULT_SUCCESS_THRESHOLD: usize = 1;

/// Default bulkhead queue wait when `QueueTimeoutMs` is omitted.
const DEFAULT_QUEUE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default exponential backoff cap when the document doesn't carry one: the
/// schema has no separate cap field, so one is derived from `BaseMs`.
const EXPONENTIAL_CAP_MULTIPLE: u64 = 32;

/// The top-level configuration document.
#[derive(Debug, Deserialize)]
pub struct ConfigDocument {
    #[serde(rename = "Resilience")]
    pub resilience: ResilienceSection,
}

/// The `Resilience` section: every subsection is optional and independently
/// skippable.
#[derive(Debug, Default, Deserialize)]
pub struct ResilienceSection {
    #[serde(rename = "Retry")]
    pub retry: Option<RetryConfig>,
    #[serde(rename = "Timeout")]
    pub timeout: Option<TimeoutConfig>,
    #[serde(rename = "CircuitBreaker")]
    pub circuit_breaker: Option<CircuitBreakerConfig>,
    #[serde(rename = "BulkheadIsolation")]
    pub bulkhead: Option<BulkheadConfig>,
    #[serde(rename = "Hedging")]
    pub hedging: Option<HedgingConfig>,
    #[serde(rename = "Fallback")]
    pub fallback: Option<FallbackConfig>,
}

#[derive(Debug, Deserialize)]
pub struct RetryConfig {
    #[serde(rename = "MaxRetries")]
    pub max_retries: usize,
    #[serde(rename = "Backoff")]
    pub backoff: BackoffConfig,
}

#[derive(Debug, Deserialize)]
pub struct BackoffConfig {
    #[serde(rename = "Type")]
    pub kind: BackoffKind,
    #[serde(rename = "BaseMs")]
    pub base_ms: u64,
    #[serde(rename = "UseJitter", default)]
    pub use_jitter: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    Constant,
    Linear,
    Exponential,
}

#[derive(Debug, Deserialize)]
pub struct TimeoutConfig {
    #[serde(rename = "Seconds")]
    pub seconds: u64,
}

#[derive(Debug, Deserialize)]
pub struct CircuitBreakerConfig {
    #[serde(rename = "CircuitName")]
    pub circuit_name: String,
    #[serde(rename = "FailureThreshold")]
    pub failure_threshold: usize,
    #[serde(rename = "BreakSeconds")]
    pub break_seconds: u64,
}

#[derive(Debug, Deserialize)]
pub struct BulkheadConfig {
    #[serde(rename = "MaxConcurrentRequests")]
    pub max_concurrent_requests: usize,
    #[serde(rename = "MaxQueueSize")]
    pub max_queue_size: usize,
    #[serde(rename = "QueueTimeoutMs", default)]
    pub queue_timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct HedgingConfig {
    #[serde(rename = "HedgeAfterMs")]
    pub hedge_after_ms: u64,
    #[serde(rename = "MaxHedgedAttempts")]
    pub max_hedged_attempts: usize,
}

#[derive(Debug, Deserialize)]
pub struct FallbackConfig {
    #[serde(rename = "StatusCodes")]
    pub status_codes: Vec<u16>,
}

/// Failure loading or binding a configuration document.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The document did not parse as valid JSON, or didn't match the
    /// expected shape (wrong type, unknown `Backoff.Type`).
    #[error("invalid resilience configuration document: {0}")]
    Parse(#[from] serde_json::Error),
    /// Parsing succeeded but the pipeline could not be built, typically
    /// because no transport was supplied.
    #[error("failed to build pipeline from configuration: {0}")]
    Build(#[from] ClientBuildError),
}

/// Parses `document` into a [`ConfigDocument`].
pub fn load_config(document: &str) -> Result<ConfigDocument, ConfigError> {
    Ok(serde_json::from_str(document)?)
}

impl RetryConfig {
    fn to_policy(&self) -> RetryPolicy {
        let base = Duration::from_millis(self.backoff.base_ms);
        let backoff = match self.backoff.kind {
            BackoffKind::Constant => Backoff::Constant(base),
            BackoffKind::Linear => Backoff::Linear(base),
            BackoffKind::Exponential => {
                Backoff::exponential(base, base.saturating_mul(EXPONENTIAL_CAP_MULTIPLE as u32))
            }
        };
        RetryPolicy {
            max_retries: self.max_retries,
            backoff,
            use_jitter: self.backoff.use_jitter,
            should_retry: resilient_http_retry::default_predicate(),
        }
    }
}

impl TimeoutConfig {
    fn to_policy(&self) -> TimeoutPolicy {
        TimeoutPolicy::new(Duration::from_secs(self.seconds))
    }
}

impl CircuitBreakerConfig {
    fn to_policy(&self) -> CircuitBreakerPolicy {
        CircuitBreakerPolicy::new(
            self.circuit_name.clone(),
            self.failure_threshold,
            DEFAULT_SUCCESS_THRESHOLD,
            Duration::from_secs(self.break_seconds),
        )
    }
}

impl BulkheadConfig {
    fn to_policy(&self) -> BulkheadPolicy {
        let queue_timeout = self
            .queue_timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_QUEUE_TIMEOUT);
        BulkheadPolicy::new(self.max_concurrent_requests, self.max_queue_size, queue_timeout)
    }
}

impl HedgingConfig {
    fn to_policy(&self) -> HedgingPolicy {
        HedgingPolicy::new(Duration::from_millis(self.hedge_after_ms), self.max_hedged_attempts)
    }
}

impl FallbackConfig {
    fn trigger(&self) -> FallbackTrigger {
        FallbackTrigger::on_status_codes(self.status_codes.iter().copied())
    }
}

/// A minimal substitute response used when a config-driven `Fallback`
/// subsection is present but the caller supplied no real fallback action:
/// config can only describe which outcomes trigger a fallback, not what to
/// return instead, so this default makes config-only binding usable
/// without requiring a companion `ClientBuilder::fallback` call.
fn default_fallback_action() -> Arc<dyn resilient_http_fallback::FallbackAction> {
    Arc::new(FallbackFn::new(|_ctx: &HttpContext, _error: Option<&ResilienceError>| async {
        Ok(HttpResponse::buffered(
            503,
            resilient_http_core::HeaderMap::new(),
            "fallback: no substitute response configured",
        ))
    }))
}

/// Builds a [`ResilientHttpClient`] from a parsed configuration document and
/// a transport, binding present subsections in the fixed order `Logging →
/// Retry → CircuitBreaker → Hedging → Timeout → Bulkhead → Fallback`.
pub fn bind_pipeline(
    config: &ResilienceSection,
    transport: Arc<dyn Transport>,
) -> Result<ResilientHttpClient, ConfigError> {
    let mut builder = ClientBuilder::new().http_client(transport).logging(RedactionPolicy::new());

    if let Some(retry) = &config.retry {
        builder = builder.retry(retry.to_policy());
    }
    if let Some(circuit_breaker) = &config.circuit_breaker {
        builder = builder.circuit_breaker(circuit_breaker.to_policy());
    }
    if let Some(hedging) = &config.hedging {
        builder = builder.hedging(hedging.to_policy());
    }
    if let Some(timeout) = &config.timeout {
        builder = builder.timeout(timeout.to_policy());
    }
    if let Some(bulkhead) = &config.bulkhead {
        builder = builder.bulkhead(bulkhead.to_policy());
    }
    if let Some(fallback) = &config.fallback {
        builder = builder.fallback(fallback.trigger(), default_fallback_action());
    }

    Ok(builder.build()?)
}

/// Parses `document` and binds it against `transport` in one call.
pub fn client_from_document(document: &str, transport: Arc<dyn Transport>) -> Result<ResilientHttpClient, ConfigError> {
    let parsed = load_config(document)?;
    bind_pipeline(&parsed.resilience, transport)
}
