//! Lifecycle Scopes
//!
//! A Scope is the reactive-core half of a molecule-style instance: the
//! state a factory builds during render, plus the hooks and watches that
//! must only run once that instance is visible to a committed render.
//!
//! # Lifecycle
//!
//! - Construction: hooks and watches are registered but nothing runs.
//! - Mount: watches subscribe to their sources and `on_mount` hooks run.
//! - Unmount: watches unsubscribe and `on_unmount` hooks run.
//! - Dispose: unmounts if still mounted, then runs `on_dispose` hooks once.
//!
//! Every transition is idempotent. Disposing twice, or mounting a disposed
//! scope, does nothing.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::context::next_source_id;
use super::subscriber::{Listener, SubscriberId};
use crate::binder::Lifecycle;
use crate::bridge::SnapshotSource;
use crate::error::BoxError;

type Hook = Box<dyn FnMut() + Send>;

struct Watch {
    activate: Box<dyn Fn() -> SubscriberId + Send>,
    deactivate: Box<dyn Fn(SubscriberId) + Send>,
    active: Option<SubscriberId>,
}

impl Watch {
    fn start(&mut self) {
        if self.active.is_none() {
            self.active = Some((self.activate)());
        }
    }

    fn stop(&mut self) {
        if let Some(id) = self.active.take() {
            (self.deactivate)(id);
        }
    }
}

struct ScopeInner {
    id: u64,
    mounted: AtomicBool,
    disposed: AtomicBool,
    on_mount: Mutex<Vec<Hook>>,
    on_unmount: Mutex<Vec<Hook>>,
    on_dispose: Mutex<Vec<Box<dyn FnOnce() + Send>>>,
    watches: Mutex<Vec<Watch>>,
}

/// Hooks and watches tied to one instance's mount state.
///
/// Clones share state.
#[derive(Clone)]
pub struct Scope {
    inner: Arc<ScopeInner>,
}

impl Scope {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ScopeInner {
                id: next_source_id(),
                mounted: AtomicBool::new(false),
                disposed: AtomicBool::new(false),
                on_mount: Mutex::new(Vec::new()),
                on_unmount: Mutex::new(Vec::new()),
                on_dispose: Mutex::new(Vec::new()),
                watches: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn on_mount<F>(&self, hook: F)
    where
        F: FnMut() + Send + 'static,
    {
        self.inner.on_mount.lock().push(Box::new(hook));
    }

    pub fn on_unmount<F>(&self, hook: F)
    where
        F: FnMut() + Send + 'static,
    {
        self.inner.on_unmount.lock().push(Box::new(hook));
    }

    pub fn on_dispose<F>(&self, hook: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner.on_dispose.lock().push(Box::new(hook));
    }

    /// Call `f` with the source's value on every change while mounted.
    ///
    /// The subscription is only held while the scope is mounted; changes
    /// made before mount or after unmount are not reported.
    pub fn watch<S, F>(&self, source: &S, f: F)
    where
        S: SnapshotSource + Clone + Send + Sync + 'static,
        F: Fn(S::Value) + Send + Sync + 'static,
    {
        let reader = source.clone();
        let listener: Listener = Arc::new(move || f(reader.value()));

        let on = source.clone();
        let off = source.clone();
        let mut watch = Watch {
            activate: Box::new(move || on.watch(Arc::clone(&listener))),
            deactivate: Box::new(move |id| off.unwatch(id)),
            active: None,
        };

        if self.is_mounted() {
            watch.start();
        }
        self.inner.watches.lock().push(watch);
    }

    pub fn is_mounted(&self) -> bool {
        self.inner.mounted.load(Ordering::SeqCst)
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Number of watches currently subscribed to their source.
    pub fn active_watch_count(&self) -> usize {
        self.inner
            .watches
            .lock()
            .iter()
            .filter(|watch| watch.active.is_some())
            .count()
    }

    fn run_hooks(hooks: &Mutex<Vec<Hook>>) {
        // Hooks may register more hooks; run them with the lock released.
        let mut running = std::mem::take(&mut *hooks.lock());
        for hook in running.iter_mut() {
            hook();
        }

        let mut guard = hooks.lock();
        running.append(&mut guard);
        *guard = running;
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle for Scope {
    fn mount(&self) -> Result<(), BoxError> {
        if self.is_disposed() || self.inner.mounted.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        for watch in self.inner.watches.lock().iter_mut() {
            watch.start();
        }
        Self::run_hooks(&self.inner.on_mount);
        Ok(())
    }

    fn unmount(&self) -> Result<(), BoxError> {
        if !self.inner.mounted.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        for watch in self.inner.watches.lock().iter_mut() {
            watch.stop();
        }
        Self::run_hooks(&self.inner.on_unmount);
        Ok(())
    }

    fn dispose(&self) -> Result<(), BoxError> {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        self.unmount()?;

        let hooks = std::mem::take(&mut *self.inner.on_dispose.lock());
        for hook in hooks {
            hook();
        }
        self.inner.watches.lock().clear();
        Ok(())
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.inner.id)
            .field("mounted", &self.is_mounted())
            .field("disposed", &self.is_disposed())
            .field("active_watches", &self.active_watch_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
