//! Error kinds shared by every policy in the pipeline.

use std::fmt;
use std::time::Duration;

use crate::response::HttpResponse;

/// Unified error type surfaced by the handler chain.
///
/// Every variant corresponds to one of the semantic error kinds in the
/// resilience core: a policy recovers from the subset it is configured to
/// handle and propagates everything else unchanged.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ResilienceError {
    /// The call's cancellation token was cancelled.
    #[error("request cancelled{}", reason.as_deref().map(|r| format!(": {r}")).unwrap_or_default())]
    Cancellation {
        /// Why the token was cancelled, if known.
        reason: Option<String>,
    },

    /// A timeout policy's budget was exceeded.
    #[error("request timed out after {elapsed:?} (limit {limit:?})")]
    Timeout {
        /// How long the attempt actually ran before being aborted.
        elapsed: Duration,
        /// The configured deadline.
        limit: Duration,
    },

    /// The circuit is open (or the half-open probe slot was taken) and the
    /// request was rejected without reaching the inner handler.
    #[error("circuit '{circuit_name}' is open, retry after {retry_after:?}")]
    CircuitOpen {
        /// The circuit's configured name.
        circuit_name: String,
        /// Advisory duration the caller may wait before trying again.
        retry_after: Duration,
    },

    /// The bulkhead rejected the request.
    #[error("bulkhead rejected request: {reason}")]
    BulkheadRejected {
        /// Why the request was rejected.
        reason: BulkheadRejectReason,
        /// The configured concurrency limit.
        max_concurrency: usize,
        /// The configured queue depth.
        max_queue_depth: usize,
    },

    /// Every retry attempt was exhausted.
    #[error("retry exhausted after {attempts} attempt(s)")]
    RetryExhausted {
        /// Total attempts made, including the first.
        attempts: usize,
        /// The outcome of the last attempt.
        #[source]
        last: Box<ResilienceError>,
    },

    /// `ensure_success` was called on a non-2xx response.
    #[error("unsuccessful HTTP status {status}")]
    HttpStatus {
        /// The offending status code.
        status: u16,
        /// The response that failed the check.
        response: Box<HttpResponse>,
    },

    /// The inner transport failed (network, DNS, TLS, ...).
    #[error("transport error: {message}")]
    Transport {
        /// A human-readable description of the failure.
        message: String,
    },

    /// The fallback action itself failed; its failure is surfaced as the
    /// primary error since there is nothing left to fall back to.
    #[error("fallback action failed: {message}")]
    FallbackFailed {
        /// A human-readable description of the failure.
        message: String,
    },
}

/// Why a bulkhead rejected a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkheadRejectReason {
    /// The queue was already at `max_queue_depth` when the request arrived.
    QueueFull,
    /// The request waited in the queue but its budget expired first.
    QueueTimeout,
}

impl fmt::Display for BulkheadRejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QueueFull => write!(f, "queueFull"),
            Self::QueueTimeout => write!(f, "queueTimeout"),
        }
    }
}

impl ResilienceError {
    /// Convenience constructor for a cancellation with no recorded reason.
    pub fn cancelled(reason: Option<String>) -> Self {
        Self::Cancellation { reason }
    }

    /// `true` if this is (transitively, through `RetryExhausted`) a timeout.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::RetryExhausted { last, .. } => last.is_timeout(),
            _ => false,
        }
    }

    /// `true` if this is a circuit-open rejection.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. })
    }

    /// `true` if this is a bulkhead rejection.
    pub fn is_bulkhead_rejected(&self) -> bool {
        matches!(self, Self::BulkheadRejected { .. })
    }

    /// `true` if this is a cancellation.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancellation { .. })
    }

    /// Borrow the response carried by an `HttpStatus` error, if present.
    pub fn response(&self) -> Option<&HttpResponse> {
        match self {
            Self::HttpStatus { response, .. } => Some(response),
            _ => None,
        }
    }
}
