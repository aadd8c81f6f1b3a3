//! Snapshots and the handler that produces them.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::reactive::{Listener, SubscriberId};

/// A value read from a source, tagged with the source version it was read
/// at.
///
/// Handlers hand snapshots out behind an `Arc`; two reads that observed no
/// change return the same `Arc`.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot<T> {
    pub value: T,
    pub version: u64,
}

/// A mutable source the bridge can adapt.
pub trait SnapshotSource {
    type Value: Clone;

    /// Monotonic counter that advances whenever the value the source would
    /// return changes.
    fn version(&self) -> u64;

    /// The current value, read without dependency tracking.
    fn value(&self) -> Self::Value;

    fn watch(&self, listener: Listener) -> SubscriberId;

    fn unwatch(&self, id: SubscriberId);
}

/// Ends one subscription.
///
/// Both [`Unsubscribe::unsubscribe`] and dropping the value end the
/// subscription; whichever comes first runs the teardown and the other is a
/// no-op.
#[must_use = "dropping an Unsubscribe ends the subscription immediately"]
pub struct Unsubscribe {
    teardown: Option<Box<dyn FnOnce()>>,
}

impl Unsubscribe {
    pub fn new<F>(teardown: F) -> Self
    where
        F: FnOnce() + 'static,
    {
        Self {
            teardown: Some(Box::new(teardown)),
        }
    }

    /// An `Unsubscribe` with nothing to tear down.
    pub fn noop() -> Self {
        Self { teardown: None }
    }

    pub fn unsubscribe(&mut self) {
        if let Some(teardown) = self.teardown.take() {
            teardown();
        }
    }

    pub fn is_active(&self) -> bool {
        self.teardown.is_some()
    }
}

impl Drop for Unsubscribe {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for Unsubscribe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unsubscribe")
            .field("active", &self.is_active())
            .finish()
    }
}

/// The shape a host renderer's external-store primitive reads from.
///
/// `get_server_snapshot` exists for hosts that render on a server first;
/// it defaults to the client path.
pub trait ExternalStore<T> {
    /// Register `listener` for change notifications. Must not call it
    /// before returning.
    fn subscribe(&self, listener: Listener) -> Unsubscribe;

    fn get_snapshot(&self) -> Arc<Snapshot<T>>;

    fn get_server_snapshot(&self) -> Arc<Snapshot<T>> {
        self.get_snapshot()
    }
}

/// Adapts a [`SnapshotSource`] to [`ExternalStore`].
///
/// The handler caches the last snapshot it produced and reuses it for as
/// long as the source version does not move, so the host's identity check
/// only sees a new snapshot after a real change.
pub struct SnapshotHandler<S>
where
    S: SnapshotSource,
{
    source: S,
    cached: Mutex<Option<Arc<Snapshot<S::Value>>>>,
}

impl<S> SnapshotHandler<S>
where
    S: SnapshotSource + Clone + 'static,
{
    pub fn new(source: S) -> Self {
        Self {
            source,
            cached: Mutex::new(None),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn get_snapshot(&self) -> Arc<Snapshot<S::Value>> {
        let version = self.source.version();
        let mut cached = self.cached.lock();

        if let Some(snapshot) = cached.as_ref() {
            if snapshot.version == version {
                return Arc::clone(snapshot);
            }
        }

        let snapshot = Arc::new(Snapshot {
            value: self.source.value(),
            version,
        });
        *cached = Some(Arc::clone(&snapshot));
        snapshot
    }

    pub fn subscribe(&self, listener: Listener) -> Unsubscribe {
        let id = self.source.watch(listener);
        let source = self.source.clone();
        Unsubscribe::new(move || source.unwatch(id))
    }
}

impl<S> ExternalStore<S::Value> for SnapshotHandler<S>
where
    S: SnapshotSource + Clone + 'static,
{
    fn subscribe(&self, listener: Listener) -> Unsubscribe {
        SnapshotHandler::subscribe(self, listener)
    }

    fn get_snapshot(&self) -> Arc<Snapshot<S::Value>> {
        SnapshotHandler::get_snapshot(self)
    }
}

impl<S> fmt::Debug for SnapshotHandler<S>
where
    S: SnapshotSource,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotHandler")
            .field("cached_version", &self.cached.lock().as_ref().map(|s| s.version))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Signal;
    use std::cell::Cell;
    use std::rc::Rc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn snapshot_is_reused_until_source_changes() {
        let count = Signal::new(0);
        let handler = SnapshotHandler::new(count.clone());

        let first = handler.get_snapshot();
        let second = handler.get_snapshot();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.value, 0);

        count.set(1);
        let third = handler.get_snapshot();
        assert!(!Arc::ptr_eq(&second, &third));
        assert_eq!(third.value, 1);
        assert!(third.version > second.version);
        assert!(Arc::ptr_eq(&third, &handler.get_snapshot()));
    }

    #[test]
    fn subscribe_does_not_call_listener_synchronously() {
        let count = Signal::new(0);
        let handler = SnapshotHandler::new(count.clone());
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let mut unsubscribe = handler.subscribe(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        count.set(1);
        count.set(2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        unsubscribe.unsubscribe();
        count.set(3);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(count.subscriber_count(), 0);
    }

    #[test]
    fn unsubscribe_runs_teardown_once() {
        let runs = Rc::new(Cell::new(0));
        let counter = runs.clone();

        let mut unsubscribe = Unsubscribe::new(move || counter.set(counter.get() + 1));
        assert!(unsubscribe.is_active());
        unsubscribe.unsubscribe();
        unsubscribe.unsubscribe();
        drop(unsubscribe);

        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn dropping_unsubscribe_ends_subscription() {
        let count = Signal::new(0);
        let handler = SnapshotHandler::new(count.clone());

        let unsubscribe = handler.subscribe(Arc::new(|| {}));
        assert_eq!(count.subscriber_count(), 1);
        drop(unsubscribe);
        assert_eq!(count.subscriber_count(), 0);
    }
}
