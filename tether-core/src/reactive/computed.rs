//! Computed Implementation
//!
//! A Computed is a cached derived value that re-evaluates only when its
//! dependencies change.
//!
//! # How Computed Values Work
//!
//! 1. On first access, the computation runs inside a reactive context and
//!    the signals (or other computed values) it reads become its
//!    dependencies.
//!
//! 2. When a dependency notifies, the computed value is marked "maybe
//!    dirty" and forwards the notification to its own listeners.
//!
//! 3. On next access it recomputes. If the result equals the cached value
//!    the version stays put, so snapshot readers see no change.
//!
//! Dependencies are re-collected on every recompute; a branch that stops
//! reading a signal stops depending on it.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use super::context::{next_source_id, ReactiveContext, Trackable};
use super::subscriber::{notify_all, Listener, ListenerSet, SubscriberId};
use crate::bridge::SnapshotSource;

/// Dirty state for a computed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoState {
    /// The cached value is up-to-date.
    Clean,

    /// A dependency notified. Recompute on next access.
    MaybeDirty,

    /// Never computed, or explicitly invalidated.
    Dirty,
}

struct ComputedInner<T> {
    id: u64,
    compute: Box<dyn Fn() -> T + Send + Sync>,
    value: RwLock<Option<T>>,
    state: Mutex<MemoState>,
    version: AtomicU64,
    dependencies: Mutex<Vec<(Arc<dyn Trackable>, SubscriberId)>>,
    listeners: Mutex<ListenerSet>,
}

impl<T> ComputedInner<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    fn read(self: &Arc<Self>) -> T {
        if *self.state.lock() == MemoState::Clean {
            if let Some(value) = self.value.read().clone() {
                return value;
            }
        }
        self.recompute()
    }

    fn recompute(self: &Arc<Self>) -> T {
        let ctx = ReactiveContext::enter(self.id);
        let next = (self.compute)();
        let dependencies = ctx.finish();
        self.rewire(dependencies);

        let changed = {
            let mut value = self.value.write();
            if value.as_ref() != Some(&next) {
                *value = Some(next.clone());
                true
            } else {
                false
            }
        };

        if changed {
            self.version.fetch_add(1, Ordering::SeqCst);
        }
        *self.state.lock() = MemoState::Clean;

        next
    }

    fn rewire(self: &Arc<Self>, dependencies: Vec<Arc<dyn Trackable>>) {
        let previous = std::mem::take(&mut *self.dependencies.lock());
        for (source, id) in previous {
            source.unwatch(id);
        }

        let wired = dependencies
            .into_iter()
            .map(|source| {
                let weak: Weak<Self> = Arc::downgrade(self);
                let id = source.watch(Arc::new(move || {
                    if let Some(inner) = weak.upgrade() {
                        inner.invalidate(MemoState::MaybeDirty);
                    }
                }));
                (source, id)
            })
            .collect();

        *self.dependencies.lock() = wired;
    }

    /// Add a listener, bringing the value up to date first.
    ///
    /// Change notifications only flow once the dependencies are wired and
    /// the state is clean, so a listener attached before the first read
    /// would otherwise never fire.
    fn watch_fresh(self: &Arc<Self>, listener: Listener) -> SubscriberId {
        if *self.state.lock() != MemoState::Clean {
            self.read();
        }
        self.listeners.lock().insert(listener)
    }

    fn invalidate(&self, to: MemoState) {
        let was_clean = {
            let mut state = self.state.lock();
            let was_clean = *state == MemoState::Clean;
            if was_clean || to == MemoState::Dirty {
                *state = to;
            }
            was_clean
        };

        // Listeners already know about a pending recompute.
        if was_clean {
            let listeners = self.listeners.lock().snapshot();
            notify_all(listeners);
        }
    }
}

impl<T> Trackable for ComputedInner<T>
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

impl<T> Drop for ComputedInner<T> {
    fn drop(&mut self) {
        for (source, id) in self.dependencies.get_mut().drain(..) {
            source.unwatch(id);
        }
    }
}

/// A cached derived value that recomputes only when dependencies change.
///
/// The PartialEq bound lets a recompute that produced the same value leave
/// the version unchanged.
///
/// # Example
///
/// ```rust
/// use tether_core::reactive::{Computed, Signal};
///
/// let count = Signal::new(2);
/// let source = count.clone();
/// let doubled = Computed::new(move || source.get() * 2);
///
/// assert_eq!(doubled.get(), 4);
/// count.set(5);
/// assert_eq!(doubled.get(), 10);
/// ```
pub struct Computed<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    inner: Arc<ComputedInner<T>>,
}

impl<T> Computed<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    /// Create a new computed value.
    ///
    /// The computation is not run immediately. It runs on first access.
    pub fn new<F>(compute: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(ComputedInner {
                id: next_source_id(),
                compute: Box::new(compute),
                value: RwLock::new(None),
                state: Mutex::new(MemoState::Dirty),
                version: AtomicU64::new(0),
                dependencies: Mutex::new(Vec::new()),
                listeners: Mutex::new(ListenerSet::new()),
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Get the current value, recomputing if necessary.
    ///
    /// Inside a reactive context this also registers the computed value as
    /// a dependency of the running computation.
    pub fn get(&self) -> T {
        if ReactiveContext::is_active() {
            ReactiveContext::track(Arc::clone(&self.inner) as Arc<dyn Trackable>);
        }
        self.inner.read()
    }

    pub fn get_untracked(&self) -> T {
        self.inner.read()
    }

    /// Force a recompute on next access.
    pub fn mark_dirty(&self) {
        self.inner.invalidate(MemoState::Dirty);
    }

    pub fn state(&self) -> MemoState {
        *self.inner.state.lock()
    }

    /// Number of times the computed value changed. Brings the value up to
    /// date first.
    pub fn version(&self) -> u64 {
        self.inner.read();
        self.inner.version.load(Ordering::SeqCst)
    }

    /// Register a callback invoked when a dependency changes.
    ///
    /// Computes the value if it has never been read.
    pub fn subscribe<F>(&self, notify: F) -> SubscriberId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.watch_fresh(Arc::new(notify))
    }

    pub fn unsubscribe(&self, id: SubscriberId) {
        self.inner.unwatch(id);
    }

    pub fn dependency_count(&self) -> usize {
        self.inner.dependencies.lock().len()
    }

    /// Check if the computed value has a cached value.
    pub fn has_value(&self) -> bool {
        self.inner.value.read().is_some()
    }
}

impl<T> Clone for Computed<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Computed<T>
where
    T: Clone + Send + Sync + PartialEq + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Computed")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .field("has_value", &self.has_value())
            .field("dependency_count", &self.dependency_count())
            .finish()
    }
}

impl<T> SnapshotSource for Computed<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    type Value = T;

    fn version(&self) -> u64 {
        Computed::version(self)
    }

    fn value(&self) -> T {
        self.get_untracked()
    }

    fn watch(&self, listener: Listener) -> SubscriberId {
        self.inner.watch_fresh(listener)
    }

    fn unwatch(&self, id: SubscriberId) {
        self.inner.unwatch(id);
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
