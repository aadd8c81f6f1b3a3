//! Tether Core
//!
//! This crate binds reactive instances to the render/commit lifecycle of a
//! component-based host renderer. It implements:
//!
//! - An instance binder that keeps one instance per call site across render
//!   passes, remounts on identity change, and disposes exactly once with a
//!   microtask-deferred protocol that survives debug effect replays
//! - A snapshot bridge that exposes mutable reactive sources through the
//!   pull/subscribe contract tearing-safe renderers read from
//! - A small reactive core (signals, computed values, deep signals and
//!   lifecycle scopes) implementing both boundaries
//!
//! # Architecture
//!
//! - `binder`: binding records, reference counting, deferred disposal and
//!   the tracking registry
//! - `bridge`: snapshots, snapshot handlers and store bindings
//! - `reactive`: reactive primitives and dependency tracking
//! - `scheduler`: the per-thread microtask queue
//!
//! # Example
//!
//! ```rust
//! use tether_core::binder::{Factory, InstanceBinder, Scalar};
//! use tether_core::reactive::{Scope, Signal};
//! use tether_core::scheduler::Microtasks;
//!
//! let counter: Factory<Scope, Scalar<i32>> = Factory::infallible(|Scalar(start)| {
//!     let scope = Scope::new();
//!     let count = Signal::new(start);
//!     scope.watch(&count, |value| println!("count: {value}"));
//!     scope
//! });
//!
//! let binder = InstanceBinder::new();
//!
//! // Render.
//! let scope = binder.bind(&counter, Scalar(0))?;
//!
//! // Commit: effect setup.
//! let interest = binder.register_interest(&scope)?;
//! assert!(scope.is_mounted());
//!
//! // Unmount: effect cleanup, then the next microtask checkpoint.
//! binder.release_interest(interest)?;
//! Microtasks::run_until_idle()?;
//! assert!(scope.is_disposed());
//! # Ok::<(), tether_core::Error>(())
//! ```

pub mod binder;
pub mod bridge;
pub mod config;
pub mod error;
pub mod reactive;
pub mod scheduler;

pub use binder::{teardown_all, InstanceBinder};
pub use bridge::{Snapshot, SnapshotHandler};
pub use config::{BinderConfig, Deferral};
pub use error::{BoxError, Error, Result};
