//! Subscriber types for the reactive system.
//!
//! Every reactive source keeps a set of listeners, each registered under a
//! [`SubscriberId`] so it can later be removed.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use smallvec::SmallVec;

/// A change notification callback.
pub type Listener = Arc<dyn Fn() + Send + Sync>;

/// Unique identifier for a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    ///
    /// Uses an atomic counter to ensure uniqueness across threads.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// The listeners of one reactive source.
///
/// Most sources have one or two listeners (a bridge subscription and maybe
/// a derived value), so they are stored inline.
#[derive(Default)]
pub struct ListenerSet {
    entries: SmallVec<[(SubscriberId, Listener); 2]>,
}

impl ListenerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, listener: Listener) -> SubscriberId {
        let id = SubscriberId::new();
        self.entries.push((id, listener));
        id
    }

    /// Remove a listener. Removing an unknown ID is a no-op.
    pub fn remove(&mut self, id: SubscriberId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _)| *entry != id);
        self.entries.len() != before
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Clone the current listeners so they can be called without holding
    /// the lock that guards this set.
    pub fn snapshot(&self) -> SmallVec<[Listener; 2]> {
        self.entries.iter().map(|(_, listener)| Arc::clone(listener)).collect()
    }
}

/// Call every listener in `listeners`.
pub fn notify_all(listeners: SmallVec<[Listener; 2]>) {
    for listener in listeners {
        listener();
    }
}
