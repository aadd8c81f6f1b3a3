//! Deep Signals
//!
//! A DeepSignal holds a structured value (a struct with nested fields, a
//! document) that is mutated in place rather than replaced. Readers keep
//! one stable handle to it; what changes is a version.
//!
//! # Dirty Tracking
//!
//! Every mutation names the path it touches (`"nested.count"`, or `""` for
//! the whole value). The signal records, per path, the version of the last
//! mutation there. A view observing a path reports the newest version of
//! any mutation at, above or beneath that path, so a snapshot of
//! `"settings"` is untouched by a mutation of `"nested.count"`.
//!
//! Nothing is compared structurally; a mutation marks its path dirty even
//! if it wrote the same value back.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use smallvec::SmallVec;

use super::context::{next_source_id, ReactiveContext, Trackable};
use super::subscriber::{notify_all, Listener, SubscriberId};
use crate::bridge::SnapshotSource;

/// A dot-separated location inside a deep value. The empty path is the
/// root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Path(Vec<String>);

impl Path {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn parse(path: &str) -> Self {
        Self(
            path.split('.')
                .filter(|segment| !segment.is_empty())
                .map(str::to_owned)
                .collect(),
        )
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether a mutation at one path can affect a reader of the other.
    pub fn overlaps(&self, other: &Path) -> bool {
        let shared = self.0.len().min(other.0.len());
        self.0[..shared] == other.0[..shared]
    }
}

impl From<&str> for Path {
    fn from(path: &str) -> Self {
        Path::parse(path)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

struct DeepInner<T> {
    id: u64,
    value: RwLock<T>,
    version: AtomicU64,
    dirty: Mutex<HashMap<Path, u64>>,
    listeners: Mutex<SmallVec<[(SubscriberId, Path, Listener); 2]>>,
}

impl<T> DeepInner<T> {
    fn watch_path(&self, path: Path, listener: Listener) -> SubscriberId {
        let id = SubscriberId::new();
        self.listeners.lock().push((id, path, listener));
        id
    }

    fn path_version(&self, path: &Path) -> u64 {
        self.dirty
            .lock()
            .iter()
            .filter(|(dirty, _)| dirty.overlaps(path))
            .map(|(_, version)| *version)
            .max()
            .unwrap_or(0)
    }
}

impl<T> Trackable for DeepInner<T>
where
    T: Send + Sync,
{
    fn source_id(&self) -> u64 {
        self.id
    }

    fn watch(&self, listener: Listener) -> SubscriberId {
        self.watch_path(Path::root(), listener)
    }

    fn unwatch(&self, id: SubscriberId) {
        self.listeners.lock().retain(|(entry, _, _)| *entry != id);
    }
}

/// A structured value with path-based change tracking.
///
/// # Example
///
/// ```rust
/// use tether_core::reactive::DeepSignal;
///
/// #[derive(Default)]
/// struct State {
///     count: i32,
/// }
///
/// let state = DeepSignal::new(State::default());
/// state.mutate_at("count", |s| s.count += 1);
/// assert_eq!(state.with(|s| s.count), 1);
/// ```
pub struct DeepSignal<T>
where
    T: Send + Sync + 'static,
{
    inner: Arc<DeepInner<T>>,
}

impl<T> DeepSignal<T>
where
    T: Send + Sync + 'static,
{
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(DeepInner {
                id: next_source_id(),
                value: RwLock::new(value),
                version: AtomicU64::new(0),
                dirty: Mutex::new(HashMap::new()),
                listeners: Mutex::new(SmallVec::new()),
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Read the value. Tracked inside a reactive context.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        if ReactiveContext::is_active() {
            ReactiveContext::track(Arc::clone(&self.inner) as Arc<dyn Trackable>);
        }
        f(&self.inner.value.read())
    }

    /// Mutate the whole value.
    pub fn mutate<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        self.mutate_at(Path::root(), f)
    }

    /// Mutate the value, declaring that only `path` and what lies beneath
    /// it changed.
    ///
    /// `f` runs under the value's write lock. Reading this signal from
    /// inside `f` (through [`Self::with`], a view or a snapshot) deadlocks.
    /// Listeners run after the lock is released and may read freely.
    pub fn mutate_at<R>(&self, path: impl Into<Path>, f: impl FnOnce(&mut T) -> R) -> R {
        let path = path.into();
        let result = {
            let mut value = self.inner.value.write();
            f(&mut value)
        };

        let version = self.inner.version.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.dirty.lock().insert(path.clone(), version);

        let listeners: SmallVec<[Listener; 2]> = self
            .inner
            .listeners
            .lock()
            .iter()
            .filter(|(_, observed, _)| observed.overlaps(&path))
            .map(|(_, _, listener)| Arc::clone(listener))
            .collect();
        notify_all(listeners);

        result
    }

    /// A view of the value at `path`, usable as a snapshot source.
    pub fn observe(&self, path: impl Into<Path>) -> DeepView<T> {
        DeepView {
            signal: self.clone(),
            path: path.into(),
        }
    }

    /// Number of mutations so far, anywhere in the value.
    pub fn version(&self) -> u64 {
        self.inner.version.load(Ordering::SeqCst)
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.listeners.lock().len()
    }

    /// Whether both handles refer to the same value.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T> Clone for DeepSignal<T>
where
    T: Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for DeepSignal<T>
where
    T: Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeepSignal")
            .field("id", &self.inner.id)
            .field("version", &self.version())
            .finish()
    }
}

impl<T> SnapshotSource for DeepSignal<T>
where
    T: Send + Sync + 'static,
{
    type Value = DeepSignal<T>;

    fn version(&self) -> u64 {
        DeepSignal::version(self)
    }

    fn value(&self) -> DeepSignal<T> {
        self.clone()
    }

    fn watch(&self, listener: Listener) -> SubscriberId {
        self.inner.watch_path(Path::root(), listener)
    }

    fn unwatch(&self, id: SubscriberId) {
        self.inner.unwatch(id);
    }
}

/// A [`DeepSignal`] observed at one path.
///
/// The snapshot value is the signal handle itself, so every snapshot a
/// view produces refers to the same underlying value.
pub struct DeepView<T>
where
    T: Send + Sync + 'static,
{
    signal: DeepSignal<T>,
    path: Path,
}

impl<T> Clone for DeepView<T>
where
    T: Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            signal: self.signal.clone(),
            path: self.path.clone(),
        }
    }
}

impl<T> fmt::Debug for DeepView<T>
where
    T: Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeepView")
            .field("signal", &self.signal)
            .field("path", &self.path.to_string())
            .finish()
    }
}

impl<T> DeepView<T>
where
    T: Send + Sync + 'static,
{
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn signal(&self) -> &DeepSignal<T> {
        &self.signal
    }
}

impl<T> SnapshotSource for DeepView<T>
where
    T: Send + Sync + 'static,
{
    type Value = DeepSignal<T>;

    fn version(&self) -> u64 {
        self.signal.inner.path_version(&self.path)
    }

    fn value(&self) -> DeepSignal<T> {
        self.signal.clone()
    }

    fn watch(&self, listener: Listener) -> SubscriberId {
        self.signal.inner.watch_path(self.path.clone(), listener)
    }

    fn unwatch(&self, id: SubscriberId) {
        self.signal.inner.unwatch(id);
    }
}
