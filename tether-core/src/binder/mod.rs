//! Instance Binder
//!
//! The binder keeps exactly one live instance visible to a call site across
//! any number of render passes, and disposes every instance exactly once.
//!
//! # Protocol
//!
//! A call site drives its binder from three places:
//!
//! 1. **Render** calls [`InstanceBinder::bind`]. If the factory changed, or a
//!    [`Scalar`] argument changed value, the current instance is disposed on
//!    the spot and a new one is constructed. Otherwise the current instance
//!    is returned.
//!
//! 2. **Effect setup** (after commit) calls
//!    [`InstanceBinder::register_interest`]. The first committed subscriber
//!    delivers the instance's mount notification.
//!
//! 3. **Effect cleanup** calls [`InstanceBinder::release_interest`]. When the
//!    last subscriber leaves, disposal is queued on the microtask queue
//!    rather than run immediately.
//!
//! # Debug replay
//!
//! Hosts with a debug mode run effect setup, cleanup and setup again
//! synchronously within one task. The cleanup queues a disposal carrying a
//! fresh [`DisposalToken`]; the second setup clears the token before the
//! microtask checkpoint, so the queued task finds a mismatched token and
//! does nothing. The instance survives the replay with a single mount
//! notification.
//!
//! # State machine
//!
//! ```text
//! Constructed ──register──▶ Active(n) ◀──register/release──▶ Active(n±1)
//!                               │ release to 0
//!                               ▼
//!                           Draining ──register──▶ Active(1)
//!                               │ microtask, token still current
//!                               ▼
//!                           Disposed
//! ```
//!
//! Any state before `Disposed` can also be replaced by a new `Constructed`
//! record when `bind` sees a changed identity.

mod args;
mod factory;
mod lifecycle;
mod record;
mod registry;

pub use args::{BindArgs, ComparePolicy, Props, SameValue, Scalar};
pub use factory::Factory;
pub use lifecycle::Lifecycle;
pub use record::{DisposalToken, RecordId, RecordState};
pub use registry::{teardown_all, tracked_count};

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::config::{BinderConfig, Deferral};
use crate::error::{Error, Result};
use crate::scheduler::Microtasks;
use record::BindingRecord;
use registry::Teardown;

/// Committed interest in a bound instance.
///
/// Returned by [`InstanceBinder::register_interest`] from an effect's setup
/// and handed back to [`InstanceBinder::release_interest`] from the same
/// effect's cleanup.
#[must_use = "interest must be released from the effect cleanup"]
pub struct Interest<I> {
    instance: Arc<I>,
    record: Option<RecordId>,
}

impl<I> Interest<I> {
    fn detached(instance: Arc<I>) -> Self {
        Self {
            instance,
            record: None,
        }
    }

    pub fn instance(&self) -> &Arc<I> {
        &self.instance
    }

    /// Whether the setup that produced this interest raced a remount. A
    /// detached interest holds nothing and releasing it is a no-op.
    pub fn is_detached(&self) -> bool {
        self.record.is_none()
    }
}

impl<I> fmt::Debug for Interest<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interest")
            .field("record", &self.record)
            .finish()
    }
}

struct Slot<I, A> {
    record: Option<BindingRecord<I, A>>,
    /// The last record was retired and nothing has been bound since.
    retired: bool,
    config: Arc<BinderConfig>,
}

/// What a release left behind.
enum Release {
    Held,
    Stale,
    DisposeNow,
    DisposeLater(DisposalToken),
}

/// Holds one instance per call site and owns its disposal.
///
/// `I` is the instance type and `A` the argument shape ([`()`](unit),
/// [`Scalar`] or [`Props`]).
pub struct InstanceBinder<I, A = ()> {
    slot: Arc<Mutex<Slot<I, A>>>,
    config: Arc<BinderConfig>,
}

impl<I, A> InstanceBinder<I, A>
where
    I: Lifecycle + 'static,
    A: BindArgs + 'static,
{
    pub fn new() -> Self {
        Self::with_config(BinderConfig::default())
    }

    pub fn with_config(config: BinderConfig) -> Self {
        let config = Arc::new(config);
        Self {
            slot: Arc::new(Mutex::new(Slot {
                record: None,
                retired: false,
                config: Arc::clone(&config),
            })),
            config,
        }
    }

    pub fn config(&self) -> &BinderConfig {
        &self.config
    }

    /// Return the instance for this render, constructing it if needed.
    ///
    /// Runs during render. When the factory or a scalar argument changed
    /// since the last bind, the previous instance is disposed before the
    /// new one is constructed. A failing factory leaves the binder empty;
    /// the previous instance stays disposed.
    pub fn bind(&self, factory: &Factory<I, A>, args: A) -> Result<Arc<I>> {
        let superseded = {
            let mut slot = self.slot.lock();
            if let Some(record) = slot.record.as_ref() {
                if !record.disposed && record.factory.same(factory) && !args.diverged(&record.args) {
                    return Ok(Arc::clone(&record.instance));
                }
            }
            slot.record.take()
        };

        if let Some(mut old) = superseded {
            old.pending = None;
            if !old.disposed {
                old.disposed = true;
                tracing::debug!(
                    binder = self.config.label(),
                    record = ?old.id,
                    "identity changed, disposing superseded instance"
                );
                self.slot.lock().retired = true;
                retire(old, &self.config)?;
            }
        }

        let instance = factory.construct(args.clone()).map_err(Error::Construct)?;
        let record = BindingRecord::new(Arc::new(instance), factory.clone(), args);
        let id = record.id;

        tracing::debug!(
            binder = self.config.label(),
            record = ?id,
            policy = ?A::policy(),
            "constructed instance"
        );

        {
            let mut slot = self.slot.lock();
            slot.record = Some(record);
            slot.retired = false;
        }

        if self.config.track {
            let owner: Weak<dyn Teardown> = Arc::downgrade(&self.slot) as Weak<dyn Teardown>;
            registry::track(id, owner);
        }

        self.slot
            .lock()
            .record
            .as_ref()
            .map(|record| Arc::clone(&record.instance))
            .ok_or(Error::Invariant("no binding record after remount"))
    }

    /// Register committed interest in `instance`.
    ///
    /// Cancels a pending deferred disposal. The first registration for a
    /// record delivers the mount notification.
    pub fn register_interest(&self, instance: &Arc<I>) -> Result<Interest<I>> {
        let (id, first) = {
            let mut slot = self.slot.lock();
            let live = slot
                .record
                .as_mut()
                .filter(|record| !record.disposed && Arc::ptr_eq(&record.instance, instance));

            let Some(record) = live else {
                tracing::trace!(
                    binder = self.config.label(),
                    "interest registered for a superseded instance"
                );
                return Ok(Interest::detached(Arc::clone(instance)));
            };

            if let Some(token) = record.pending.take() {
                tracing::trace!(
                    binder = self.config.label(),
                    record = ?record.id,
                    ?token,
                    "interest returned, deferred disposal cancelled"
                );
            }

            record.subscribers += 1;
            let first = !record.mounted;
            record.mounted = true;
            (record.id, first)
        };

        let interest = Interest {
            instance: Arc::clone(instance),
            record: Some(id),
        };

        if first {
            tracing::debug!(binder = self.config.label(), record = ?id, "mounting instance");
            if let Err(err) = instance.mount() {
                self.withdraw_failed_mount(interest);
                return Err(Error::Mount(err));
            }
        }

        Ok(interest)
    }

    /// Undo a registration whose mount notification failed.
    ///
    /// The caller never receives the interest, so it is released here: the
    /// record goes back to unmounted and, with no other subscriber, drains
    /// like any other record.
    fn withdraw_failed_mount(&self, interest: Interest<I>) {
        if let Some(record) = self
            .slot
            .lock()
            .record
            .as_mut()
            .filter(|record| Some(record.id) == interest.record)
        {
            record.mounted = false;
        }

        tracing::warn!(
            binder = self.config.label(),
            record = ?interest.record,
            "mount failed, interest withdrawn"
        );
        if let Err(err) = self.release_interest(interest) {
            tracing::warn!(binder = self.config.label(), error = %err, "release after failed mount");
        }
    }

    /// Withdraw interest registered by [`Self::register_interest`].
    ///
    /// When the released interest belongs to a record this binder has
    /// already replaced, its instance is disposed right away. When the last
    /// subscriber of the live record leaves, disposal is deferred to the
    /// next microtask checkpoint (or run now under [`Deferral::Immediate`]).
    pub fn release_interest(&self, interest: Interest<I>) -> Result<()> {
        let Interest { instance, record } = interest;
        let Some(id) = record else {
            return Ok(());
        };

        let release = {
            let mut slot = self.slot.lock();
            let deferral = slot.config.deferral;
            match slot.record.as_mut() {
                Some(record) if record.id == id => {
                    record.subscribers = record.subscribers.saturating_sub(1);
                    if record.subscribers > 0 || record.disposed {
                        Release::Held
                    } else if deferral == Deferral::Immediate {
                        Release::DisposeNow
                    } else {
                        let token = DisposalToken::next();
                        record.pending = Some(token);
                        Release::DisposeLater(token)
                    }
                }
                _ => Release::Stale,
            }
        };

        match release {
            Release::Held => Ok(()),
            Release::Stale => {
                tracing::trace!(
                    binder = self.config.label(),
                    record = ?id,
                    "cleanup for a superseded instance, disposing it"
                );
                instance.dispose().map_err(Error::Dispose)
            }
            Release::DisposeNow => match take_record(&self.slot, id, None) {
                Some(record) => retire(record, &self.config),
                None => Ok(()),
            },
            Release::DisposeLater(token) => {
                tracing::debug!(
                    binder = self.config.label(),
                    record = ?id,
                    ?token,
                    "interest drained, disposal deferred"
                );
                self.schedule_disposal(id, token);
                Ok(())
            }
        }
    }

    /// Dispose the current instance now; the call site is going away.
    ///
    /// Idempotent. A deferred disposal still queued for the record becomes
    /// a no-op.
    pub fn detach(&self) -> Result<()> {
        let taken = {
            let mut slot = self.slot.lock();
            let taken = slot.record.take();
            if taken.is_some() {
                slot.retired = true;
            }
            taken
        };

        let Some(mut record) = taken else {
            return Ok(());
        };
        if record.disposed {
            return Ok(());
        }

        record.disposed = true;
        record.pending = None;
        tracing::debug!(binder = self.config.label(), record = ?record.id, "call site detached");
        retire(record, &self.config)
    }

    /// The currently bound instance, if any.
    pub fn instance(&self) -> Option<Arc<I>> {
        self.slot
            .lock()
            .record
            .as_ref()
            .map(|record| Arc::clone(&record.instance))
    }

    /// State of the current record. `None` before the first bind.
    pub fn state(&self) -> Option<RecordState> {
        let slot = self.slot.lock();
        match slot.record.as_ref() {
            Some(record) => Some(record.state()),
            None if slot.retired => Some(RecordState::Disposed),
            None => None,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.slot
            .lock()
            .record
            .as_ref()
            .map_or(0, |record| record.subscribers)
    }

    fn schedule_disposal(&self, id: RecordId, token: DisposalToken) {
        let slot = Arc::clone(&self.slot);
        let config = Arc::clone(&self.config);

        Microtasks::queue(move || {
            let Some(record) = take_record(&slot, id, Some(token)) else {
                tracing::trace!(
                    binder = config.label(),
                    record = ?id,
                    ?token,
                    "deferred disposal superseded"
                );
                return Ok(());
            };

            retire(record, &config)
        });
    }
}

impl<I, A> Default for InstanceBinder<I, A>
where
    I: Lifecycle + 'static,
    A: BindArgs + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<I, A> fmt::Debug for InstanceBinder<I, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = self.slot.lock();
        f.debug_struct("InstanceBinder")
            .field("label", &self.config.label())
            .field("record", &slot.record.as_ref().map(|r| r.id))
            .field("state", &slot.record.as_ref().map(|r| r.state()))
            .finish()
    }
}

impl<I, A> Teardown for Mutex<Slot<I, A>>
where
    I: Lifecycle,
{
    fn teardown(&self, id: RecordId) -> Result<bool> {
        let config = Arc::clone(&self.lock().config);
        match take_record(self, id, None) {
            Some(record) => retire(record, &config).map(|()| true),
            None => Ok(false),
        }
    }
}

/// Take record `id` out of `slot` for disposal if it is still live.
///
/// With a token, the record must also still be waiting on that exact
/// deferred disposal.
fn take_record<I, A>(
    slot: &Mutex<Slot<I, A>>,
    id: RecordId,
    token: Option<DisposalToken>,
) -> Option<BindingRecord<I, A>> {
    let mut slot = slot.lock();
    let record = slot.record.as_mut()?;

    if record.id != id || record.disposed {
        return None;
    }
    if let Some(token) = token {
        if !record.accepts_disposal(token) {
            return None;
        }
    }

    record.disposed = true;
    record.pending = None;
    slot.retired = true;
    slot.record.take()
}

/// Deliver the final notifications to a record taken out of its slot.
fn retire<I, A>(record: BindingRecord<I, A>, config: &BinderConfig) -> Result<()>
where
    I: Lifecycle,
{
    registry::untrack(record.id);
    tracing::debug!(binder = config.label(), record = ?record.id, "disposing instance");

    let unmounted = if record.mounted {
        record.instance.unmount().map_err(Error::Unmount)
    } else {
        Ok(())
    };
    let disposed = record.instance.dispose().map_err(Error::Dispose);

    unmounted.and(disposed)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
