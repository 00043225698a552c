//! Multi-subscriber event emitter
//!
//! Connection-state and message callbacks in this codebase are
//! multi-listener: the call coordinator and the chat side-channel both
//! observe the same relay channel, so a single last-writer-wins callback
//! slot would silently drop one of them. Listeners are held in an
//! ordered list and are each independently removable.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Inner<T> {
    listeners: Mutex<Vec<(u64, Listener<T>)>>,
    next_id: AtomicU64,
}

/// Handle identifying one registered listener
///
/// Pass it back to [`EventEmitter::unsubscribe`] to remove the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription {
    id: u64,
}

/// Ordered, removable listener list for events of type `T`
///
/// Cloning the emitter clones the handle, not the listener list; all
/// clones emit to the same listeners.
pub struct EventEmitter<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for EventEmitter<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for EventEmitter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> EventEmitter<T> {
    /// Create an emitter with no listeners
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                listeners: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Register a listener; it fires for every subsequent emit until
    /// unsubscribed
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.listeners.lock().push((id, Arc::new(listener)));
        Subscription { id }
    }

    /// Remove a listener; unknown subscriptions are ignored
    pub fn unsubscribe(&self, subscription: &Subscription) {
        self.inner
            .listeners
            .lock()
            .retain(|(id, _)| *id != subscription.id);
    }

    /// Deliver `event` to every listener in subscription order
    ///
    /// The listener list is snapshotted first, so a listener may
    /// subscribe or unsubscribe without deadlocking; such changes take
    /// effect from the next emit.
    pub fn emit(&self, event: &T) {
        let snapshot: Vec<Listener<T>> = self
            .inner
            .listeners
            .lock()
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in snapshot {
            listener(event);
        }
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.lock().len()
    }
}
