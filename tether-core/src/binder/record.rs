//! Binding records.
//!
//! A record is the binder's bookkeeping for one constructed instance: who
//! built it, with what, how many committed subscribers hold interest in it,
//! and whether a deferred disposal is waiting to fire.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::factory::Factory;

/// Unique identifier for a binding record.
///
/// Effect cleanups and queued disposal tasks capture this to tell whether
/// the record they were created for is still the live one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(u64);

impl RecordId {
    pub(crate) fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Token identifying one scheduled deferred disposal.
///
/// Tokens increase monotonically, so a task carrying an older token than
/// the one stored on its record knows it has been superseded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DisposalToken(u64);

impl DisposalToken {
    pub(crate) fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Observable state of a binder's current record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    /// Built during render; no committed subscriber yet.
    Constructed,

    /// At least one committed subscriber holds interest.
    Active(usize),

    /// Interest dropped to zero and a deferred disposal is pending.
    Draining,

    /// Retired. The binder builds a fresh record on the next bind.
    Disposed,
}

pub(crate) struct BindingRecord<I, A> {
    pub(crate) id: RecordId,
    pub(crate) instance: Arc<I>,
    pub(crate) factory: Factory<I, A>,
    pub(crate) args: A,
    pub(crate) subscribers: usize,
    pub(crate) mounted: bool,
    pub(crate) disposed: bool,
    pub(crate) pending: Option<DisposalToken>,
}

impl<I, A> BindingRecord<I, A> {
    pub(crate) fn new(instance: Arc<I>, factory: Factory<I, A>, args: A) -> Self {
        Self {
            id: RecordId::next(),
            instance,
            factory,
            args,
            subscribers: 0,
            mounted: false,
            disposed: false,
            pending: None,
        }
    }

    pub(crate) fn state(&self) -> RecordState {
        if self.disposed {
            RecordState::Disposed
        } else if self.subscribers > 0 {
            RecordState::Active(self.subscribers)
        } else if self.pending.is_some() {
            RecordState::Draining
        } else {
            RecordState::Constructed
        }
    }

    /// Whether a disposal task carrying `token` may still retire this record.
    pub(crate) fn accepts_disposal(&self, token: DisposalToken) -> bool {
        self.subscribers == 0 && !self.disposed && self.pending == Some(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> BindingRecord<u8, ()> {
        BindingRecord::new(Arc::new(0), Factory::infallible(|()| 0), ())
    }

    #[test]
    fn ids_and_tokens_are_unique() {
        assert_ne!(RecordId::next(), RecordId::next());
        let first = DisposalToken::next();
        let second = DisposalToken::next();
        assert!(second > first);
    }

    #[test]
    fn state_follows_fields() {
        let mut record = record();
        assert_eq!(record.state(), RecordState::Constructed);

        record.subscribers = 2;
        assert_eq!(record.state(), RecordState::Active(2));

        record.subscribers = 0;
        record.pending = Some(DisposalToken::next());
        assert_eq!(record.state(), RecordState::Draining);

        record.disposed = true;
        assert_eq!(record.state(), RecordState::Disposed);
    }

    #[test]
    fn disposal_requires_matching_token() {
        let mut record = record();
        let stale = DisposalToken::next();
        let fresh = DisposalToken::next();
        record.pending = Some(fresh);

        assert!(!record.accepts_disposal(stale));
        assert!(record.accepts_disposal(fresh));

        record.subscribers = 1;
        assert!(!record.accepts_disposal(fresh));
    }
}
