//! Instance factories.

use std::fmt;
use std::sync::Arc;

use crate::error::BoxError;

type Construct<I, A> = dyn Fn(A) -> Result<I, BoxError> + Send + Sync;

/// A reference-identified constructor for instances of `I`.
///
/// Two factories are the same factory only if one is a clone of the other;
/// wrapping the same closure twice yields two distinct factories. Define a
/// factory once (typically in a `static` or alongside the component) and
/// pass clones of it on every render.
pub struct Factory<I, A = ()> {
    construct: Arc<Construct<I, A>>,
}

impl<I, A> Factory<I, A> {
    /// Wrap a fallible constructor.
    pub fn new<F>(construct: F) -> Self
    where
        F: Fn(A) -> Result<I, BoxError> + Send + Sync + 'static,
    {
        Self {
            construct: Arc::new(construct),
        }
    }

    /// Wrap a constructor that cannot fail.
    pub fn infallible<F>(construct: F) -> Self
    where
        F: Fn(A) -> I + Send + Sync + 'static,
    {
        Self::new(move |args| Ok(construct(args)))
    }

    /// Whether `self` and `other` are the same factory.
    pub fn same(&self, other: &Self) -> bool {
        // Compare data pointers only: vtable pointers are not unique.
        std::ptr::eq(
            Arc::as_ptr(&self.construct) as *const (),
            Arc::as_ptr(&other.construct) as *const (),
        )
    }

    pub(crate) fn construct(&self, args: A) -> Result<I, BoxError> {
        (self.construct)(args)
    }
}

impl<I, A> Clone for Factory<I, A> {
    fn clone(&self) -> Self {
        Self {
            construct: Arc::clone(&self.construct),
        }
    }
}

impl<I, A> fmt::Debug for Factory<I, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Factory")
            .field("ptr", &(Arc::as_ptr(&self.construct) as *const ()))
            .finish()
    }
}
