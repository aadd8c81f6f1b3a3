//! Tracking Registry
//!
//! Binders register every record they construct here so a host can retire
//! all outstanding instances at once (test teardown, hot reload, shutting a
//! root down). Entries hold weak references; a binder that was dropped
//! without disposing its record simply disappears from the registry.
//!
//! The registry is per thread, like the microtask queue.

use std::cell::RefCell;
use std::sync::Weak;

use indexmap::IndexMap;

use super::record::RecordId;
use crate::error::Result;

/// Something that can retire one of its records on request.
pub(crate) trait Teardown {
    /// Dispose record `id` if it is still live. Returns whether it was.
    fn teardown(&self, id: RecordId) -> Result<bool>;
}

thread_local! {
    static TRACKED: RefCell<IndexMap<RecordId, Weak<dyn Teardown>>> = RefCell::new(IndexMap::new());
}

pub(crate) fn track(id: RecordId, owner: Weak<dyn Teardown>) {
    TRACKED.with(|tracked| {
        tracked.borrow_mut().insert(id, owner);
    });
}

pub(crate) fn untrack(id: RecordId) {
    TRACKED.with(|tracked| {
        tracked.borrow_mut().shift_remove(&id);
    });
}

/// Number of records currently tracked on this thread.
pub fn tracked_count() -> usize {
    TRACKED.with(|tracked| tracked.borrow().len())
}

/// Dispose every tracked record on this thread, newest first.
///
/// Returns how many records were disposed. Calling it again with nothing
/// tracked returns `Ok(0)`. Every record is attempted even if one fails;
/// the first failure is returned after the sweep and the rest are logged.
pub fn teardown_all() -> Result<usize> {
    let entries: Vec<_> = TRACKED.with(|tracked| tracked.borrow_mut().drain(..).collect());

    let mut disposed = 0;
    let mut first_error = None;

    for (id, owner) in entries.into_iter().rev() {
        let Some(owner) = owner.upgrade() else {
            continue;
        };

        match owner.teardown(id) {
            Ok(true) => disposed += 1,
            Ok(false) => {}
            Err(err) => {
                if first_error.is_none() {
                    first_error = Some(err);
                } else {
                    tracing::warn!(record = ?id, error = %err, "teardown failed");
                }
            }
        }
    }

    tracing::debug!(disposed, "tracked records torn down");

    match first_error {
        Some(err) => Err(err),
        None => Ok(disposed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Default)]
    struct Owner {
        torn_down: Mutex<Vec<RecordId>>,
        fail: bool,
    }

    impl Teardown for Owner {
        fn teardown(&self, id: RecordId) -> Result<bool> {
            self.torn_down.lock().push(id);
            if self.fail {
                Err(Error::Dispose("stuck".into()))
            } else {
                Ok(true)
            }
        }
    }

    #[test]
    fn teardown_runs_newest_first_and_is_idempotent() {
        let owner = Arc::new(Owner::default());
        let weak: Weak<dyn Teardown> = Arc::downgrade(&owner) as Weak<dyn Teardown>;

        let a = RecordId::next();
        let b = RecordId::next();
        track(a, weak.clone());
        track(b, weak);
        assert_eq!(tracked_count(), 2);

        assert_eq!(teardown_all().unwrap(), 2);
        assert_eq!(*owner.torn_down.lock(), vec![b, a]);
        assert_eq!(tracked_count(), 0);
        assert_eq!(teardown_all().unwrap(), 0);
    }

    #[test]
    fn untracked_records_are_skipped() {
        let owner = Arc::new(Owner::default());
        let id = RecordId::next();
        track(id, Arc::downgrade(&owner) as Weak<dyn Teardown>);
        untrack(id);

        assert_eq!(teardown_all().unwrap(), 0);
        assert!(owner.torn_down.lock().is_empty());
    }

    #[test]
    fn dropped_owners_are_skipped() {
        let owner = Arc::new(Owner::default());
        track(RecordId::next(), Arc::downgrade(&owner) as Weak<dyn Teardown>);
        drop(owner);

        assert_eq!(teardown_all().unwrap(), 0);
    }

    #[test]
    fn failures_do_not_stop_the_sweep() {
        let failing = Arc::new(Owner { fail: true, ..Default::default() });
        let healthy = Arc::new(Owner::default());

        track(RecordId::next(), Arc::downgrade(&healthy) as Weak<dyn Teardown>);
        track(RecordId::next(), Arc::downgrade(&failing) as Weak<dyn Teardown>);

        assert!(teardown_all().is_err());
        assert_eq!(healthy.torn_down.lock().len(), 1);
        assert_eq!(tracked_count(), 0);
    }
}
