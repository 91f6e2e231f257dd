//! Cancellation token shared between a caller and a running workflow.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::warn;

/// A callback invoked once when the token is cancelled.
pub type CancelCallback = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct Inner {
    cancelled: AtomicBool,
    /// Reason and pending callbacks, guarded together so a callback
    /// registered concurrently with `cancel` runs exactly once.
    state: Mutex<State>,
    notify: Notify,
}

#[derive(Default)]
struct State {
    reason: Option<String>,
    callbacks: Vec<CancelCallback>,
}

/// A cloneable handle for cooperative cancellation.
///
/// All clones observe the same state. Cancellation is idempotent: only the
/// first reason is kept.
#[derive(Clone, Default)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

impl CancellationToken {
    /// Creates a token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Returns true if this call raised the token.
    ///
    /// Callbacks run on the calling thread; a panicking callback is logged
    /// and does not stop the others.
    pub fn cancel(&self, reason: impl Into<String>) -> bool {
        let callbacks = {
            let mut state = self.inner.state.lock();
            if self.inner.cancelled.swap(true, Ordering::SeqCst) {
                return false;
            }
            state.reason = Some(reason.into());
            std::mem::take(&mut state.callbacks)
        };

        self.inner.notify.notify_waiters();
        for callback in callbacks {
            run_callback(callback);
        }
        true
    }

    /// Registers a callback. If the token is already cancelled the callback
    /// runs immediately.
    pub fn on_cancel<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        {
            let mut state = self.inner.state.lock();
            if !self.is_cancelled() {
                state.callbacks.push(Box::new(callback));
                return;
            }
        }
        run_callback(Box::new(callback));
    }

    /// Returns whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Returns the cancellation reason, if any.
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        self.inner.state.lock().reason.clone()
    }

    /// Waits until the token is cancelled.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

fn run_callback(callback: CancelCallback) {
    if let Err(e) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(callback)) {
        warn!("Cancellation callback panicked: {:?}", e);
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .field("reason", &self.reason())
            .finish()
    }
}
