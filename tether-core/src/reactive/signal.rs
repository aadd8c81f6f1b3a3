//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive. It holds a value and
//! tracks which computations depend on it.
//!
//! # How Signals Work
//!
//! 1. When a signal is read within a reactive context (a computed value),
//!    the signal registers itself as a dependency of that context.
//!
//! 2. When a signal's value changes, its version advances and all listeners
//!    are notified.
//!
//! 3. Listeners are called after the value lock is released, so a listener
//!    may read the signal again.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use super::context::{next_source_id, ReactiveContext, Trackable};
use super::subscriber::{notify_all, Listener, ListenerSet, SubscriberId};
use crate::bridge::SnapshotSource;

struct SignalInner<T> {
    id: u64,
    value: RwLock<T>,
    version: AtomicU64,
    listeners: Mutex<ListenerSet>,
}

impl<T> Trackable for SignalInner<T>
where
    T: Send + Sync,
{
    fn source_id(&self) -> u64 {
        self.id
    }

    fn watch(&self, listener: Listener) -> SubscriberId {
        self.listeners.lock().insert(listener)
    }

    fn unwatch(&self, id: SubscriberId) {
        self.listeners.lock().remove(id);
    }
}

/// A reactive signal holding a value of type T.
///
/// Clones share the same value.
///
/// # Example
///
/// ```rust
/// use tether_core::reactive::Signal;
///
/// let count = Signal::new(0);
/// count.set(5);
/// assert_eq!(count.get(), 5);
/// ```
pub struct Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Arc<SignalInner<T>>,
}

impl<T> Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a new signal with the given initial value.
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(SignalInner {
                id: next_source_id(),
                value: RwLock::new(value),
                version: AtomicU64::new(0),
                listeners: Mutex::new(ListenerSet::new()),
            }),
        }
    }

    /// Get the signal's unique ID.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Get the current value.
    ///
    /// If called within a reactive context, this also registers the signal
    /// as a dependency of the running computation.
    pub fn get(&self) -> T {
        if ReactiveContext::is_active() {
            ReactiveContext::track(Arc::clone(&self.inner) as Arc<dyn Trackable>);
        }
        self.get_untracked()
    }

    /// Get the current value without tracking dependencies.
    pub fn get_untracked(&self) -> T {
        self.inner.value.read().clone()
    }

    /// Set a new value and notify listeners.
    pub fn set(&self, value: T) {
        *self.inner.value.write() = value;
        self.inner.version.fetch_add(1, Ordering::SeqCst);
        self.notify();
    }

    /// Update the value using a function of the current value.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        let next = f(&self.inner.value.read());
        self.set(next);
    }

    /// Number of writes so far.
    pub fn version(&self) -> u64 {
        self.inner.version.load(Ordering::SeqCst)
    }

    /// Register a callback invoked after every write.
    pub fn subscribe<F>(&self, notify: F) -> SubscriberId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.watch(Arc::new(notify))
    }

    /// Remove a subscriber.
    pub fn unsubscribe(&self, subscriber_id: SubscriberId) {
        self.inner.unwatch(subscriber_id);
    }

    /// Get the number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.listeners.lock().len()
    }

    /// Whether both handles refer to the same signal.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn notify(&self) {
        let listeners = self.inner.listeners.lock().snapshot();
        notify_all(listeners);
    }
}

impl<T> Clone for Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Signal<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.inner.id)
            .field("value", &self.get_untracked())
            .field("version", &self.version())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

impl<T> SnapshotSource for Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    type Value = T;

    fn version(&self) -> u64 {
        Signal::version(self)
    }

    fn value(&self) -> T {
        self.get_untracked()
    }

    fn watch(&self, listener: Listener) -> SubscriberId {
        self.inner.watch(listener)
    }

    fn unwatch(&self, id: SubscriberId) {
        self.inner.unwatch(id);
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
