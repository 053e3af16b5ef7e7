//! Cancellable timed waits

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct Flags {
    /// Pending one-shot interrupt, consumed by the next wait
    interrupted: bool,
    /// Owner is shutting down; every wait ends immediately until rearmed
    closed: bool,
}

impl Flags {
    fn raised(&self) -> bool {
        self.interrupted || self.closed
    }
}

#[derive(Debug, Default)]
struct CancelInner {
    flags: Mutex<Flags>,
    wake: Condvar,
}

/// Shared cancellation flag with a wait that wakes early on cancel.
///
/// Clones share the same flags, so one clone can be handed to another thread
/// to interrupt a retry loop blocked on the owning thread. An interrupt from
/// [`cancel`](Self::cancel) ends exactly one wait; [`close`](Self::close)
/// ends every wait until the token is rearmed.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

impl CancelToken {
    /// Create an un-cancelled token
    pub fn new() -> Self {
        Self::default()
    }

    /// Interrupt the current wait, or the next one if nobody is waiting
    pub fn cancel(&self) {
        let mut flags = self.inner.flags.lock();
        flags.interrupted = true;
        self.inner.wake.notify_all();
    }

    /// Cancel every wait until [`rearm`](Self::rearm)
    pub fn close(&self) {
        let mut flags = self.inner.flags.lock();
        flags.closed = true;
        self.inner.wake.notify_all();
    }

    /// Drop an interrupt nobody has waited on yet
    pub fn discard_interrupt(&self) {
        self.inner.flags.lock().interrupted = false;
    }

    /// Clear both the pending interrupt and the closed flag
    pub fn rearm(&self) {
        *self.inner.flags.lock() = Flags::default();
    }

    /// Whether the next wait would end immediately
    pub fn is_cancelled(&self) -> bool {
        self.inner.flags.lock().raised()
    }

    /// Whether [`close`](Self::close) has been called since the last rearm
    pub fn is_closed(&self) -> bool {
        self.inner.flags.lock().closed
    }

    /// Block for `timeout` or until cancelled.
    ///
    /// Returns `true` when the wait ended because of cancellation. A pending
    /// interrupt is consumed by the wait it ends.
    pub fn wait_for(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut flags = self.inner.flags.lock();
        while !flags.raised() {
            if self
                .inner
                .wake
                .wait_until(&mut flags, deadline)
                .timed_out()
            {
                break;
            }
        }
        let cancelled = flags.raised();
        flags.interrupted = false;
        cancelled
    }
}
