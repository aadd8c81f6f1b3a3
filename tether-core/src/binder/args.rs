//! Argument comparison policies.
//!
//! A bind call site passes its factory together with an argument value on
//! every render. Whether a changed argument should rebuild the instance
//! depends on the argument's shape, so the shape is chosen at the type
//! level by wrapping the value in [`Scalar`] or [`Props`].

/// How a binder decides whether an argument has changed between renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparePolicy {
    /// No argument; only the factory identity matters.
    None,

    /// Compared by value against the previous render's argument.
    Scalar,

    /// Copied at construction and never compared again; only the factory
    /// identity matters.
    ObjectShape,
}

/// An argument value accepted by [`super::InstanceBinder::bind`].
pub trait BindArgs: Clone {
    /// The comparison policy for this argument shape.
    fn policy() -> ComparePolicy;

    /// Whether `self` (this render's argument) should force a remount given
    /// the value `retained` by the current record.
    fn diverged(&self, retained: &Self) -> bool;
}

impl BindArgs for () {
    fn policy() -> ComparePolicy {
        ComparePolicy::None
    }

    fn diverged(&self, _retained: &Self) -> bool {
        false
    }
}

/// Identity comparison for scalar arguments.
///
/// Equality except for floats, where `NaN` is the same as `NaN` and `0.0`
/// differs from `-0.0`, and for `Arc`, which compares by pointer. A value
/// that is always the same as itself keeps its instance across renders.
pub trait SameValue {
    fn same_value(&self, other: &Self) -> bool;
}

macro_rules! same_value_by_eq {
    ($($ty:ty),* $(,)?) => {
        $(
            impl SameValue for $ty {
                fn same_value(&self, other: &Self) -> bool {
                    self == other
                }
            }
        )*
    };
}

same_value_by_eq!(
    (), bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, str, String,
);

macro_rules! same_value_float {
    ($($ty:ty),*) => {
        $(
            impl SameValue for $ty {
                fn same_value(&self, other: &Self) -> bool {
                    (self.is_nan() && other.is_nan()) || self.to_bits() == other.to_bits()
                }
            }
        )*
    };
}

same_value_float!(f32, f64);

impl<T: SameValue + ?Sized> SameValue for &T {
    fn same_value(&self, other: &Self) -> bool {
        (**self).same_value(*other)
    }
}

impl<T: SameValue> SameValue for Option<T> {
    fn same_value(&self, other: &Self) -> bool {
        match (self, other) {
            (Some(a), Some(b)) => a.same_value(b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl<T: ?Sized> SameValue for std::sync::Arc<T> {
    fn same_value(&self, other: &Self) -> bool {
        std::sync::Arc::ptr_eq(self, other)
    }
}

/// A single value-sensitive argument.
///
/// Changing the value between renders disposes the current instance and
/// constructs a new one. Values are compared with [`SameValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Scalar<T>(pub T);

impl<T> BindArgs for Scalar<T>
where
    T: Clone + SameValue,
{
    fn policy() -> ComparePolicy {
        ComparePolicy::Scalar
    }

    fn diverged(&self, retained: &Self) -> bool {
        !self.0.same_value(&retained.0)
    }
}

/// An object-shaped argument (a props bag).
///
/// The binder clones the value when it constructs an instance and hands the
/// copy to the factory. Passing a fresh `Props` with different fields on a
/// later render does not rebuild the instance: the instance is keyed to its
/// factory alone and keeps the props it was constructed with.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Props<T>(pub T);

impl<T> BindArgs for Props<T>
where
    T: Clone,
{
    fn policy() -> ComparePolicy {
        ComparePolicy::ObjectShape
    }

    fn diverged(&self, _retained: &Self) -> bool {
        false
    }
}

impl<T> std::ops::Deref for Props<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_diverges_on_value_change() {
        assert!(!Scalar(1).diverged(&Scalar(1)));
        assert!(Scalar(2).diverged(&Scalar(1)));
        assert!(Scalar("b".to_string()).diverged(&Scalar("a".to_string())));
        assert_eq!(<Scalar<i32>>::policy(), ComparePolicy::Scalar);
    }

    #[test]
    fn float_scalars_compare_by_identity() {
        assert!(!Scalar(f64::NAN).diverged(&Scalar(f64::NAN)));
        assert!(Scalar(0.0_f64).diverged(&Scalar(-0.0_f64)));
        assert!(!Scalar(1.5_f32).diverged(&Scalar(1.5_f32)));
        assert!(Scalar(Some(1.0_f64)).diverged(&Scalar(None)));
    }

    #[test]
    fn shared_scalars_compare_by_pointer() {
        let first = std::sync::Arc::new(String::from("config"));
        let copy = std::sync::Arc::new(String::from("config"));

        assert!(!Scalar(first.clone()).diverged(&Scalar(first.clone())));
        assert!(Scalar(copy).diverged(&Scalar(first)));
        assert!(!Scalar("a").diverged(&Scalar("a")));
    }

    #[test]
    fn props_never_diverge() {
        #[derive(Clone)]
        struct Counter {
            start: i32,
        }

        let first = Props(Counter { start: 1 });
        let second = Props(Counter { start: 2 });
        assert!(!second.diverged(&first));
        assert_eq!(second.start, 2);
        assert_eq!(<Props<Counter>>::policy(), ComparePolicy::ObjectShape);
    }

    #[test]
    fn unit_never_diverges() {
        assert!(!().diverged(&()));
        assert_eq!(<()>::policy(), ComparePolicy::None);
    }
}
