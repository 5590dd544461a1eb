//! The per-call context threaded through the handler chain.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::cancellation::CancellationToken;
use crate::error::ResilienceError;
use crate::request::HttpRequest;

/// A single arbitrary value attached to a [`HttpContext`] by a policy,
/// e.g. the attempt count a retry policy records for the logging handler
/// to read back.
pub type Property = Arc<dyn Any + Send + Sync>;

/// Per-call state shared by every handler in the pipeline for a single
/// logical request.
///
/// A context owns the current [`HttpRequest`] (replaced, not mutated, as
/// handlers rewrite headers) plus a bag of properties policies use to
/// communicate with each other and with the terminal logging handler, and
/// a [`CancellationToken`]. Forking a child context (for a hedged or
/// retried attempt) creates an independent properties bag backed by a
/// child cancellation token, so concurrent attempts cannot corrupt each
/// other's bookkeeping.
#[derive(Clone)]
pub struct HttpContext {
    request: HttpRequest,
    properties: Arc<RwLock<HashMap<String, Property>>>,
    cancellation: CancellationToken,
}

impl HttpContext {
    /// Starts a new top-level context for `request` with a fresh
    /// cancellation token.
    pub fn new(request: HttpRequest) -> Self {
        Self {
            request,
            properties: Arc::new(RwLock::new(HashMap::new())),
            cancellation: CancellationToken::new(),
        }
    }

    /// The current request.
    pub fn request(&self) -> &HttpRequest {
        &self.request
    }

    /// Replaces the current request, e.g. after a handler adds a header.
    pub fn update_request(&mut self, request: HttpRequest) {
        self.request = request;
    }

    /// This context's cancellation token.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Fails with `Cancellation` if this context's token has been
    /// cancelled.
    pub fn throw_if_cancelled(&self) -> Result<(), ResilienceError> {
        self.cancellation.throw_if_cancelled()
    }

    /// Stores a property value under `key`, replacing any prior value.
    pub fn set_property(&self, key: impl Into<String>, value: impl Any + Send + Sync) {
        self.properties
            .write()
            .unwrap()
            .insert(key.into(), Arc::new(value));
    }

    /// Reads a property value previously stored under `key`, if it exists
    /// and is of type `T`.
    pub fn property<T: 'static + Clone>(&self, key: &str) -> Option<T> {
        self.properties
            .read()
            .unwrap()
            .get(key)
            .and_then(|value| value.downcast_ref::<T>())
            .cloned()
    }

    /// Forks an independent child context for a concurrent or sequential
    /// sub-attempt (a hedged racer, a retried attempt).
    ///
    /// The child starts with its own properties bag (so attempts don't
    /// clobber each other's bookkeeping) and a cancellation token that is
    /// a child of this context's token: cancelling the child (e.g. because
    /// a sibling hedge attempt won) does not cancel this context or any
    /// other sibling, but cancelling this context cancels every fork.
    pub fn fork(&self) -> Self {
        Self {
            request: self.request.clone(),
            properties: Arc::new(RwLock::new(HashMap::new())),
            cancellation: self.cancellation.child(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_request_replaces_current_request() {
        let mut ctx = HttpContext::new(HttpRequest::get("https://example.test/"));
        let updated = ctx.request().with_header("x-a", "1");
        ctx.update_request(updated);
        assert_eq!(ctx.request().headers().get("x-a"), Some("1"));
    }

    #[test]
    fn property_roundtrip() {
        let ctx = HttpContext::new(HttpRequest::get("https://example.test/"));
        ctx.set_property("attempt", 3usize);
        assert_eq!(ctx.property::<usize>("attempt"), Some(3));
        assert_eq!(ctx.property::<usize>("missing"), None);
    }

    #[test]
    fn fork_has_independent_properties_but_linked_cancellation() {
        let parent = HttpContext::new(HttpRequest::get("https://example.test/"));
        parent.set_property("attempt", 1usize);

        let child = parent.fork();
        assert_eq!(child.property::<usize>("attempt"), None);

        child.set_property("attempt", 2usize);
        assert_eq!(parent.property::<usize>("attempt"), Some(1usize));

        parent.cancellation().cancel("caller gave up");
        assert!(child.cancellation().is_cancelled());
    }

    #[test]
    fn sibling_forks_do_not_cancel_each_other() {
        let parent = HttpContext::new(HttpRequest::get("https://example.test/"));
        let child_a = parent.fork();
        let child_b = parent.fork();

        child_a.cancellation().cancel("lost the race");
        assert!(child_a.cancellation().is_cancelled());
        assert!(!child_b.cancellation().is_cancelled());
        assert!(!parent.cancellation().is_cancelled());
    }
}
