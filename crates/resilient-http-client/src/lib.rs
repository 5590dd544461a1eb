//! High-level client surface for resilient-http: a fluent [`ClientBuilder`],
//! the assembled [`ResilientHttpClient`], a named-client [`ClientFactory`],
//! and a JSON configuration document loader/binder.

mod builder;
mod client;
mod config;
mod factory;

pub use builder::{ClientBuildError, ClientBuilder};
pub use client::{RequestOptions, ResilientHttpClient};
pub use config::{
    bind_pipeline, client_from_document, load_config, BackoffConfig, BackoffKind, BulkheadConfig,
    CircuitBreakerConfig, ConfigDocument, ConfigError, FallbackConfig, HedgingConfig, ResilienceSection,
    RetryConfig, TimeoutConfig,
};
pub use factory::{ClientFactory, FactoryError};
