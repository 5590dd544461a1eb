//! Composable client-side HTTP resilience middleware.
//!
//! `resilient-http` assembles a chain-of-responsibility pipeline around an
//! HTTP transport: retry with backoff, circuit breaking, per-attempt
//! timeouts, bulkhead isolation, hedging, fallback, and structured logging,
//! all coordinated through one typed event hub. Each pattern lives in its
//! own crate and is available here as both a standalone module (behind its
//! feature) and, with the `client` feature, composed fluently through
//! [`client::ClientBuilder`].
//!
//! # Quick start
//!
//! ```toml
//! [dependencies]
//! resilient-http = { version = "0.1", features = ["full"] }
//! ```
//!
//! ```rust,no_run
//! # #[cfg(feature = "client")]
//! # {
//! use resilient_http::client::ClientBuilder;
//! use resilient_http::retry::RetryPolicy;
//! use resilient_http::circuitbreaker::CircuitBreakerPolicy;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example(transport: Arc<dyn resilient_http::core::Transport>) {
//! let client = ClientBuilder::new()
//!     .base_uri("https://api.example.test")
//!     .retry(RetryPolicy::constant(2, Duration::from_millis(50)))
//!     .circuit_breaker(CircuitBreakerPolicy::new("payments", 5, 2, Duration::from_secs(30)))
//!     .http_client(transport)
//!     .build()
//!     .unwrap();
//!
//! let _ = client.get("/accounts/1").await;
//! # }
//! # }
//! ```
//!
//! # Resilience patterns
//!
//! - **Retry** (`retry`) — re-attempts with constant/linear/exponential backoff and jitter.
//! - **Circuit breaker** (`circuitbreaker`) — stops calling a consistently failing destination.
//! - **Timeout** (`timeout`) — bounds how long a single attempt may run.
//! - **Bulkhead** (`bulkhead`) — bounds concurrency and queue depth per destination.
//! - **Hedging** (`hedge`) — races speculative concurrent attempts to cut tail latency.
//! - **Fallback** (`fallback`) — substitutes a response for a classified failure.
//! - **Logging** (`logging`) — observability-only `tracing` instrumentation.
//! - **Client** (`client`) — the fluent builder, assembled client, named-client factory, and JSON config binder.

pub use resilient_http_core as core;

#[cfg(feature = "bulkhead")]
pub use resilient_http_bulkhead as bulkhead;

#[cfg(feature = "circuitbreaker")]
pub use resilient_http_circuitbreaker as circuitbreaker;

#[cfg(feature = "client")]
pub use resilient_http_client as client;

#[cfg(feature = "fallback")]
pub use resilient_http_fallback as fallback;

#[cfg(feature = "hedge")]
pub use resilient_http_hedge as hedge;

#[cfg(feature = "logging")]
pub use resilient_http_logging as logging;

#[cfg(feature = "retry")]
pub use resilient_http_retry as retry;

#[cfg(feature = "timeout")]
pub use resilient_http_timeout as timeout;
