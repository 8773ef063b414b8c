//! Single-slot restart signal.
//!
//! A worker raises at most one pending restart request; further requests
//! are dropped until the process acts on the pending one. Implemented as a
//! try-set flag rather than a queue; only the presence of an unconsumed
//! request matters, never the count.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

/// Bounded, non-blocking restart indication with at-most-one-pending
/// semantics.
#[derive(Debug, Default)]
pub struct RestartSignal {
    pending: AtomicBool,
    notify: Notify,
}

impl RestartSignal {
    /// Creates a signal with no pending request.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises a restart request.
    ///
    /// Returns `true` when this call set the pending flag, `false` when a
    /// request was already pending (the new request is dropped).
    pub fn request(&self) -> bool {
        let was_pending = self.pending.swap(true, Ordering::AcqRel);
        if !was_pending {
            self.notify.notify_waiters();
        }
        !was_pending
    }

    /// Whether a request is currently pending.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Resolves once a restart request is pending.
    pub async fn requested(&self) {
        loop {
            if self.is_pending() {
                return;
            }
            let notified = self.notify.notified();
            // Re-check after registering: request() may have fired between
            // the flag load and the listener registration.
            if self.is_pending() {
                return;
            }
            notified.await;
        }
    }
}
