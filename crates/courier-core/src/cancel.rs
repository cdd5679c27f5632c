//! Cooperative cancellation for async work.
//!
//! A [`CancellationSource`] owns the right to cancel; the
//! [`CancellationToken`]s it hands out can only observe cancellation. Tokens
//! support both polling ([`CancellationToken::is_cancelled`]) and async
//! waiting ([`CancellationToken::cancelled`]), plus one-shot callbacks
//! ([`CancellationToken::register`]) used to forward cancellation from one
//! source into another.
//!
//! # Example
//!
//! ```
//! use courier_core::CancellationSource;
//!
//! let external = CancellationSource::new();
//! let internal = CancellationSource::new();
//!
//! // Cancelling `external` also cancels `internal`.
//! let _link = internal.link(&external.token());
//!
//! external.cancel();
//! assert!(internal.is_cancelled());
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use slotmap::{SlotMap, new_key_type};
use tokio::sync::Notify;

use crate::logging::targets;

new_key_type! {
    /// Identifies a callback registered on a [`CancellationToken`].
    struct CallbackKey;
}

type Callback = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct CancellationState {
    cancelled: AtomicBool,
    notify: Notify,
    callbacks: Mutex<SlotMap<CallbackKey, Callback>>,
}

impl CancellationState {
    /// Flip the flag, wake waiters and run callbacks. Returns `false` if the
    /// state was already cancelled.
    fn cancel(&self) -> bool {
        if self.cancelled.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.notify.notify_waiters();

        let callbacks: Vec<Callback> = self.callbacks.lock().drain().map(|(_, cb)| cb).collect();
        tracing::trace!(target: targets::CANCEL, callbacks = callbacks.len(), "cancellation requested");
        for callback in callbacks {
            callback();
        }
        true
    }
}

/// The owning side of a cancellation signal.
///
/// Dropping the source does not cancel its tokens.
#[derive(Default)]
pub struct CancellationSource {
    inner: Arc<CancellationState>,
}

impl CancellationSource {
    /// Create a new, non-cancelled source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a token observing this source.
    pub fn token(&self) -> CancellationToken {
        CancellationToken {
            inner: self.inner.clone(),
        }
    }

    /// Request cancellation.
    ///
    /// Idempotent: only the first call wakes waiters and runs callbacks.
    /// Returns `true` if this call performed the cancellation.
    pub fn cancel(&self) -> bool {
        self.inner.cancel()
    }

    /// Check if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Forward cancellation of `upstream` into this source.
    ///
    /// The forwarding is one-shot and keeps working for as long as the
    /// returned registration is alive.
    pub fn link(&self, upstream: &CancellationToken) -> CancellationRegistration {
        let target = Arc::downgrade(&self.inner);
        upstream.register(move || {
            if let Some(target) = target.upgrade() {
                target.cancel();
            }
        })
    }
}

impl std::fmt::Debug for CancellationSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationSource")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// A cloneable, observe-only view of a [`CancellationSource`].
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<CancellationState>,
}

impl CancellationToken {
    /// A token that is never cancelled.
    pub fn none() -> Self {
        Self {
            inner: Arc::new(CancellationState::default()),
        }
    }

    /// Check if cancellation has been requested.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Wait asynchronously until cancellation is requested.
    ///
    /// Returns immediately if already cancelled.
    pub async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }
        loop {
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
            if self.is_cancelled() {
                return;
            }
        }
    }

    /// Register a callback that runs once when cancellation is requested.
    ///
    /// If the token is already cancelled the callback runs immediately on the
    /// calling thread. Dropping the returned registration unregisters a
    /// callback that has not run yet.
    pub fn register<F>(&self, callback: F) -> CancellationRegistration
    where
        F: FnOnce() + Send + 'static,
    {
        if self.is_cancelled() {
            callback();
            return CancellationRegistration::empty();
        }

        let key = self.inner.callbacks.lock().insert(Box::new(callback));

        // `cancel` may have drained the callbacks between the check and the insert.
        if self.is_cancelled()
            && let Some(callback) = self.inner.callbacks.lock().remove(key)
        {
            callback();
            return CancellationRegistration::empty();
        }

        CancellationRegistration {
            state: Arc::downgrade(&self.inner),
            key: Some(key),
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::none()
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Keeps a [`CancellationToken::register`] callback alive.
///
/// Dropping it removes the callback if it has not run yet.
#[must_use = "dropping the registration unregisters the callback"]
pub struct CancellationRegistration {
    state: Weak<CancellationState>,
    key: Option<CallbackKey>,
}

impl CancellationRegistration {
    fn empty() -> Self {
        Self {
            state: Weak::new(),
            key: None,
        }
    }

    /// Check whether the callback is still waiting to run.
    pub fn is_pending(&self) -> bool {
        match (self.state.upgrade(), self.key) {
            (Some(state), Some(key)) => state.callbacks.lock().contains_key(key),
            _ => false,
        }
    }
}

impl Drop for CancellationRegistration {
    fn drop(&mut self) {
        if let (Some(state), Some(key)) = (self.state.upgrade(), self.key.take()) {
            state.callbacks.lock().remove(key);
        }
    }
}

impl std::fmt::Debug for CancellationRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationRegistration")
            .field("pending", &self.is_pending())
            .finish()
    }
}
