//! Reactive Primitives
//!
//! A small reactive core: the sources the snapshot bridge adapts and the
//! lifecycle scope molecule-style instances are built on.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A [`Signal`] is a container for mutable state with a version counter.
//! Reading it inside a tracking context registers it as a dependency.
//!
//! ## Computed values
//!
//! A [`Computed`] is a derived value that caches its result and recomputes
//! only after one of its dependencies notifies.
//!
//! ## Deep signals
//!
//! A [`DeepSignal`] is a structured value mutated in place, with
//! path-based dirty tracking so that readers of one branch are not
//! disturbed by writes to another.
//!
//! ## Scopes
//!
//! A [`Scope`] holds mount/unmount/dispose hooks and watches whose
//! subscriptions only live while the scope is mounted. It implements
//! [`Lifecycle`](crate::binder::Lifecycle), so an instance built around a
//! scope can be bound directly.
//!
//! # Implementation Notes
//!
//! Dependency tracking uses a thread-local context stack. When a signal is
//! read, we check if there is an active tracking context and, if so,
//! register the dependency.

mod computed;
mod context;
mod deep;
mod scope;
mod signal;
mod subscriber;

pub use computed::{Computed, MemoState};
pub use context::{ReactiveContext, Trackable};
pub use deep::{DeepSignal, DeepView, Path};
pub use scope::Scope;
pub use signal::Signal;
pub use subscriber::{Listener, ListenerSet, SubscriberId};
