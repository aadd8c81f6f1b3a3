//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! When a signal or computed value is read while a context is active, it
//! registers itself as a dependency of that computation.
//!
//! # Implementation
//!
//! We use a thread-local stack to track the currently executing computation.
//! Entering a context pushes a frame; dropping the returned guard pops it
//! and hands back whatever was read in the meantime. Nested contexts (a
//! computed value reading another computed value) each collect their own
//! dependencies.

use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::subscriber::{Listener, SubscriberId};

/// A source a computation can depend on.
pub trait Trackable: Send + Sync {
    /// Stable identity of the source, used to de-duplicate dependencies.
    fn source_id(&self) -> u64;

    fn watch(&self, listener: Listener) -> SubscriberId;

    fn unwatch(&self, id: SubscriberId);
}

/// Allocate an identity for a new reactive source.
pub(crate) fn next_source_id() -> u64 {
    static COUNTER: AtomicU64 = AtomicU64::new(1);
    COUNTER.fetch_add(1, Ordering::Relaxed)
}

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<Frame>> = RefCell::new(Vec::new());
}

struct Frame {
    owner: u64,
    dependencies: Vec<Arc<dyn Trackable>>,
}

/// Guard for an active tracking frame.
///
/// This ensures the context stack is properly maintained even if the
/// computation panics.
pub struct ReactiveContext {
    owner: u64,
    finished: bool,
}

impl ReactiveContext {
    /// Enter a new tracking frame on behalf of `owner`.
    pub fn enter(owner: u64) -> Self {
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(Frame {
                owner,
                dependencies: Vec::new(),
            });
        });

        Self {
            owner,
            finished: false,
        }
    }

    /// Check if there is an active reactive context.
    pub fn is_active() -> bool {
        CONTEXT_STACK.with(|stack| !stack.borrow().is_empty())
    }

    /// Record that the running computation read `source`.
    ///
    /// Does nothing outside a context. Reading the same source twice records
    /// it once.
    pub fn track(source: Arc<dyn Trackable>) {
        CONTEXT_STACK.with(|stack| {
            if let Some(frame) = stack.borrow_mut().last_mut() {
                let id = source.source_id();
                if id != frame.owner
                    && !frame.dependencies.iter().any(|dep| dep.source_id() == id)
                {
                    frame.dependencies.push(source);
                }
            }
        });
    }

    /// Leave the frame and return the dependencies it collected.
    pub fn finish(mut self) -> Vec<Arc<dyn Trackable>> {
        self.finished = true;
        self.pop()
    }

    fn pop(&self) -> Vec<Arc<dyn Trackable>> {
        CONTEXT_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();

            match popped {
                Some(frame) => {
                    debug_assert_eq!(
                        frame.owner, self.owner,
                        "ReactiveContext mismatch: expected {}, got {}",
                        self.owner, frame.owner
                    );
                    frame.dependencies
                }
                None => Vec::new(),
            }
        })
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        if !self.finished {
            self.pop();
        }
    }
}
