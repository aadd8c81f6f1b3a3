//! Store bindings.
//!
//! A [`StoreBinding`] is what a call site holds while it is mounted against
//! an [`ExternalStore`]: one subscription for its whole mounted lifetime,
//! plus the snapshot it last rendered so it can tell whether a change
//! notification actually changed anything.

use std::sync::Arc;

use parking_lot::Mutex;

use super::snapshot::{ExternalStore, Snapshot, Unsubscribe};

pub struct StoreBinding<T> {
    store: Arc<dyn ExternalStore<T>>,
    rendered: Mutex<Option<Arc<Snapshot<T>>>>,
    unsubscribe: Unsubscribe,
}

impl<T> StoreBinding<T>
where
    T: Clone + 'static,
{
    /// Subscribe to `store` for as long as the binding is mounted.
    pub fn mount(store: Arc<dyn ExternalStore<T>>) -> Self {
        Self::mount_with(store, || {})
    }

    /// Like [`StoreBinding::mount`], calling `on_change` on every
    /// notification from the store. Hosts use it to schedule a re-render.
    pub fn mount_with<F>(store: Arc<dyn ExternalStore<T>>, on_change: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let unsubscribe = store.subscribe(Arc::new(on_change));
        tracing::trace!("store binding mounted");

        Self {
            store,
            rendered: Mutex::new(None),
            unsubscribe,
        }
    }

    /// Read the snapshot for a render pass and remember it.
    pub fn snapshot(&self) -> Arc<Snapshot<T>> {
        let snapshot = self.store.get_snapshot();
        *self.rendered.lock() = Some(Arc::clone(&snapshot));
        snapshot
    }

    /// The value rendering code sees.
    pub fn value(&self) -> T {
        self.snapshot().value.clone()
    }

    /// Whether the store now holds a different snapshot than the one last
    /// rendered. Identity comparison only.
    pub fn has_changed(&self) -> bool {
        let current = self.store.get_snapshot();
        match self.rendered.lock().as_ref() {
            Some(rendered) => !Arc::ptr_eq(rendered, &current),
            None => true,
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.unsubscribe.is_active()
    }

    /// End the subscription. Idempotent; dropping the binding does the same.
    pub fn unmount(&mut self) {
        if self.unsubscribe.is_active() {
            tracing::trace!("store binding unmounted");
        }
        self.unsubscribe.unsubscribe();
    }
}
