//! Snapshot Bridge
//!
//! Host renderers that render concurrently need to read external mutable
//! state without tearing: every component in one render pass must see the
//! same value. They do this through a pull/subscribe pair:
//!
//! - `get_snapshot()` returns the current value. It must return an
//!   identical object while nothing has changed, otherwise the host sees a
//!   change on every read and re-synchronizes forever.
//! - `subscribe(listener)` tells the host when to pull again.
//!
//! [`SnapshotHandler`] implements that pair for any [`SnapshotSource`]: a
//! [`Signal`](crate::reactive::Signal), a
//! [`Computed`](crate::reactive::Computed), or a view into a
//! [`DeepSignal`](crate::reactive::DeepSignal). Snapshots carry the
//! source's version, and the handler rebuilds its cached snapshot only when
//! that version moves.
//!
//! [`StoreBinding`] is the consuming side: one subscription per mount, torn
//! down exactly once.

mod snapshot;
mod sync;

pub use snapshot::{ExternalStore, Snapshot, SnapshotHandler, SnapshotSource, Unsubscribe};
pub use sync::StoreBinding;
