//! Microtask Queue
//!
//! Deferred disposal needs a continuation that runs after the current
//! synchronous work (a render pass plus its effect commit, including any
//! debug replay of those effects) but before anything else observes the
//! instance. That is exactly a microtask.
//!
//! # Model
//!
//! Each thread owns one FIFO queue, the way a browser agent owns one
//! microtask queue. Tasks are queued with [`Microtasks::queue`] and run by
//! the host with [`Microtasks::run_until_idle`], which models a microtask
//! checkpoint: tasks queued while draining run in the same checkpoint.
//!
//! Cancellation is not supported here. Callers neutralise a queued task by
//! invalidating whatever token the task checks when it runs.

use std::cell::RefCell;
use std::collections::VecDeque;

use crate::error::Result;

type Task = Box<dyn FnOnce() -> Result<()>>;

thread_local! {
    static QUEUE: RefCell<VecDeque<Task>> = RefCell::new(VecDeque::new());
}

/// Handle to the current thread's microtask queue.
pub struct Microtasks;

impl Microtasks {
    /// Queue a task to run at the next checkpoint.
    pub fn queue<F>(task: F)
    where
        F: FnOnce() -> Result<()> + 'static,
    {
        QUEUE.with(|queue| queue.borrow_mut().push_back(Box::new(task)));
    }

    /// Number of tasks waiting to run.
    pub fn pending() -> usize {
        QUEUE.with(|queue| queue.borrow().len())
    }

    /// Run queued tasks until the queue is empty.
    ///
    /// Returns the number of tasks that ran. The first failing task stops
    /// the checkpoint and its error is returned; tasks behind it stay queued
    /// for the next call.
    pub fn run_until_idle() -> Result<usize> {
        let mut ran = 0;

        loop {
            // The borrow must end before the task runs: tasks may queue more.
            let next = QUEUE.with(|queue| queue.borrow_mut().pop_front());
            let Some(task) = next else {
                break;
            };

            ran += 1;
            task()?;
        }

        if ran > 0 {
            tracing::trace!(ran, "microtask checkpoint finished");
        }

        Ok(ran)
    }

    /// Drop every queued task without running it.
    pub fn clear() {
        QUEUE.with(|queue| queue.borrow_mut().clear());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::rc::Rc;
    use std::cell::Cell;

    #[test]
    fn runs_in_fifo_order() {
        let order = Rc::new(RefCell::new(Vec::new()));

        for i in 0..3 {
            let order = order.clone();
            Microtasks::queue(move || {
                order.borrow_mut().push(i);
                Ok(())
            });
        }

        assert_eq!(Microtasks::pending(), 3);
        assert_eq!(Microtasks::run_until_idle().unwrap(), 3);
        assert_eq!(*order.borrow(), vec![0, 1, 2]);
        assert_eq!(Microtasks::pending(), 0);
    }

    #[test]
    fn tasks_queued_while_draining_run_in_same_checkpoint() {
        let ran = Rc::new(Cell::new(0));
        let outer = ran.clone();

        Microtasks::queue(move || {
            outer.set(outer.get() + 1);
            let inner = outer.clone();
            Microtasks::queue(move || {
                inner.set(inner.get() + 1);
                Ok(())
            });
            Ok(())
        });

        assert_eq!(Microtasks::run_until_idle().unwrap(), 2);
        assert_eq!(ran.get(), 2);
    }

    #[test]
    fn failing_task_stops_checkpoint() {
        let ran = Rc::new(Cell::new(false));
        let flag = ran.clone();

        Microtasks::queue(|| Err(Error::Dispose("teardown failed".into())));
        Microtasks::queue(move || {
            flag.set(true);
            Ok(())
        });

        assert!(matches!(Microtasks::run_until_idle(), Err(Error::Dispose(_))));
        assert!(!ran.get());
        assert_eq!(Microtasks::pending(), 1);

        assert_eq!(Microtasks::run_until_idle().unwrap(), 1);
        assert!(ran.get());
    }

    #[test]
    fn clear_discards_tasks() {
        Microtasks::queue(|| Ok(()));
        Microtasks::clear();
        assert_eq!(Microtasks::pending(), 0);
        assert_eq!(Microtasks::run_until_idle().unwrap(), 0);
    }
}
