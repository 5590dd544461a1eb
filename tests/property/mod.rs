//! Property-based tests for the resilience pipeline.
//!
//! Invariants tested:
//! - Exponential backoff is monotonically non-decreasing and never exceeds its cap.
//! - Full-jitter delays emitted by the retry handler always fall within `[0, computed_delay]`.
//! - A bulkhead's in-flight count never exceeds its configured concurrency limit.

pub mod backoff;
pub mod bulkhead;
