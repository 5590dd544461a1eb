//! Retry configuration: backoff strategy, jitter, and the retry predicate.

use std::sync::Arc;
use std::time::Duration;

use resilient_http_core::{HttpContext, HttpResponse, ResilienceError};

/// How the delay between attempts grows.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Backoff {
    /// Every retry waits the same fixed delay.
    Constant(Duration),
    /// Delay grows linearly: `base * attempt`.
    Linear(Duration),
    /// Delay grows geometrically: `base * multiplier.powi(attempt - 1)`, capped at `cap`.
    Exponential {
        base: Duration,
        cap: Duration,
        multiplier: f64,
    },
}

impl Backoff {
    /// An exponential backoff with the conventional multiplier of 2.
    pub fn exponential(base: Duration, cap: Duration) -> Self {
        Backoff::Exponential {
            base,
            cap,
            multiplier: 2.0,
        }
    }

    /// Computes the un-jittered delay for the given 1-based attempt number.
    pub fn delay_for(&self, attempt: usize) -> Duration {
        debug_assert!(attempt >= 1);
        match *self {
            Backoff::Constant(delay) => delay,
            Backoff::Linear(base) => base.saturating_mul(attempt as u32),
            Backoff::Exponential { base, cap, multiplier } => {
                let factor = multiplier.powi(attempt as i32 - 1);
                let scaled_nanos = (base.as_nanos() as f64) * factor;
                let scaled = Duration::from_nanos(scaled_nanos.min(u64::MAX as f64).max(0.0) as u64);
                scaled.min(cap)
            }
        }
    }
}

/// Decides whether an attempt's outcome should be retried.
pub type RetryPredicate =
    Arc<dyn Fn(Option<&HttpResponse>, Option<&ResilienceError>, &HttpContext) -> bool + Send + Sync>;

/// Immutable retry configuration.
#[derive(Clone)]
pub struct RetryPolicy {
    /// Extra attempts beyond the first; total attempts = `max_retries + 1`.
    pub max_retries: usize,
    pub backoff: Backoff,
    pub use_jitter: bool,
    pub should_retry: RetryPredicate,
}

impl RetryPolicy {
    /// A constant-delay policy using the default predicate (5xx + transport errors).
    pub fn constant(max_retries: usize, delay: Duration) -> Self {
        Self {
            max_retries,
            backoff: Backoff::Constant(delay),
            use_jitter: false,
            should_retry: default_predicate(),
        }
    }

    /// An exponential-backoff policy using the default predicate.
    pub fn exponential_backoff(max_retries: usize, base: Duration, cap: Duration) -> Self {
        Self {
            max_retries,
            backoff: Backoff::exponential(base, cap),
            use_jitter: true,
            should_retry: default_predicate(),
        }
    }

    /// Returns a copy with a custom retry predicate.
    pub fn with_predicate(mut self, predicate: RetryPredicate) -> Self {
        self.should_retry = predicate;
        self
    }

    /// Returns a copy with jitter enabled or disabled.
    pub fn with_jitter(mut self, use_jitter: bool) -> Self {
        self.use_jitter = use_jitter;
        self
    }
}

/// The default retry predicate: retries server errors (5xx) and transport
/// failures, never client errors, cancellation, or other resilience
/// rejections (circuit-open, bulkhead-rejected are not retried by
/// default — they already represent a deliberate local decision not to
/// call through).
pub fn default_predicate() -> RetryPredicate {
    Arc::new(|response, error, _ctx| {
        if let Some(response) = response {
            return response.is_server_error();
        }
        if let Some(error) = error {
            return matches!(error, ResilienceError::Transport { .. });
        }
        false
    })
}
