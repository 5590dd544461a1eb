//! A one-shot, tree-shaped cancellation signal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use crate::error::ResilienceError;

struct Inner {
    cancelled: AtomicBool,
    reason: Mutex<Option<String>>,
    children: Mutex<Vec<Arc<Inner>>>,
    notify: Notify,
}

/// A monotonic, idempotent cancellation signal shared by a top-level call and
/// every child context forked from it (hedging attempts, retried attempts,
/// per-attempt timeouts).
///
/// Cancelling a token propagates synchronously to every live child; a child
/// may be cancelled independently without affecting its siblings or parent.
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationToken {
    /// Creates a fresh, uncancelled root token.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                reason: Mutex::new(None),
                children: Mutex::new(Vec::new()),
                notify: Notify::new(),
            }),
        }
    }

    /// Forks a child token that inherits the current cancellation state and
    /// will observe any future cancellation of this token, without being
    /// able to cancel siblings or this token itself.
    pub fn child(&self) -> CancellationToken {
        let child_inner = Arc::new(Inner {
            cancelled: AtomicBool::new(self.is_cancelled()),
            reason: Mutex::new(self.reason()),
            children: Mutex::new(Vec::new()),
            notify: Notify::new(),
        });
        self.inner.children.lock().unwrap().push(Arc::clone(&child_inner));
        CancellationToken { inner: child_inner }
    }

    /// Cancels this token and every live descendant. Idempotent: the reason
    /// is recorded only on the first call.
    pub fn cancel(&self, reason: impl Into<String>) {
        let was_cancelled = self.inner.cancelled.swap(true, Ordering::SeqCst);
        if !was_cancelled {
            *self.inner.reason.lock().unwrap() = Some(reason.into());
            self.inner.notify.notify_waiters();
        }
        for child in self.inner.children.lock().unwrap().iter() {
            propagate(child, &self.reason());
        }
    }

    /// Resolves once this token is cancelled; resolves immediately if it
    /// already is. Every suspension point in the pipeline (retry backoff,
    /// hedging inter-attempt delay, bulkhead queue wait, timeout deadline)
    /// races this against its own timer/semaphore/channel so cancellation
    /// wakes it promptly instead of only being checked on the next poll.
    pub async fn cancelled(&self) {
        loop {
            if self.is_cancelled() {
                return;
            }
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }

    /// `true` once `cancel` has been called on this token or an ancestor.
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// The recorded cancellation reason, if any.
    pub fn reason(&self) -> Option<String> {
        self.inner.reason.lock().unwrap().clone()
    }

    /// Fails with a `Cancellation` error if the token has been cancelled.
    pub fn throw_if_cancelled(&self) -> Result<(), ResilienceError> {
        if self.is_cancelled() {
            Err(ResilienceError::cancelled(self.reason()))
        } else {
            Ok(())
        }
    }
}

fn propagate(inner: &Arc<Inner>, reason: &Option<String>) {
    let was_cancelled = inner.cancelled.swap(true, Ordering::SeqCst);
    if !was_cancelled {
        *inner.reason.lock().unwrap() = reason.clone();
        inner.notify.notify_waiters();
    }
    for child in inner.children.lock().unwrap().iter() {
        propagate(child, reason);
    }
}
