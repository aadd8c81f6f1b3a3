//! The reactive-core side of an instance's lifecycle.

use std::sync::Arc;

use crate::error::BoxError;

/// Lifecycle notifications the binder delivers to a bound instance.
///
/// Instances that do not distinguish "constructed" from "mounted" (plain
/// logic bundles) only implement [`Lifecycle::dispose`]. Molecule-style
/// instances also implement `mount` and `unmount`; the binder delivers
/// `mount` once the first committed subscriber appears and `unmount` right
/// before the instance is disposed, each at most once per instance.
pub trait Lifecycle {
    fn mount(&self) -> Result<(), BoxError> {
        Ok(())
    }

    fn unmount(&self) -> Result<(), BoxError> {
        Ok(())
    }

    /// Tear the instance down.
    ///
    /// Must be idempotent: a stale effect cleanup can dispose an instance
    /// that the binder already disposed during a remount.
    fn dispose(&self) -> Result<(), BoxError>;
}

impl<T: Lifecycle + ?Sized> Lifecycle for Arc<T> {
    fn mount(&self) -> Result<(), BoxError> {
        (**self).mount()
    }

    fn unmount(&self) -> Result<(), BoxError> {
        (**self).unmount()
    }

    fn dispose(&self) -> Result<(), BoxError> {
        (**self).dispose()
    }
}

impl<T: Lifecycle + ?Sized> Lifecycle for Box<T> {
    fn mount(&self) -> Result<(), BoxError> {
        (**self).mount()
    }

    fn unmount(&self) -> Result<(), BoxError> {
        (**self).unmount()
    }

    fn dispose(&self) -> Result<(), BoxError> {
        (**self).dispose()
    }
}
