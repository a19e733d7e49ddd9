//! Scalar abstraction shared by plain and derivative-carrying evaluation.

mod dual;

pub use dual::{Dual, gradient, jacobian, seed, values};

use std::fmt::Debug;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// A real-valued scalar usable throughout dynamics and constraint evaluation.
///
/// Every computation in the transcription pipeline is written once against
/// this trait and then instantiated with `f64` (plain evaluation) or [`Dual`]
/// (evaluation with exact first derivatives).
///
/// The supertraits make any `Scalar` a valid `nalgebra` element, so scalars
/// can be stored in `DVector<T>` and `DMatrix<T>`. Arithmetic on those
/// containers goes through the helpers in [`crate::linalg`].
pub trait Scalar:
    Clone
    + PartialEq
    + Debug
    + 'static
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
    + Add<f64, Output = Self>
    + Sub<f64, Output = Self>
    + Mul<f64, Output = Self>
    + Div<f64, Output = Self>
{
    /// Lifts a constant into the scalar type.
    fn from_f64(value: f64) -> Self;

    /// Returns the primal value, discarding any derivative information.
    fn value(&self) -> f64;

    /// Returns `true` if `self` and `other` are interchangeable as cache keys.
    ///
    /// For `f64` this is exact equality. For [`Dual`] both the value and the
    /// derivative must match, since a cached result carries derivatives.
    fn same_as(&self, other: &Self) -> bool;

    #[must_use]
    fn sin(&self) -> Self;

    #[must_use]
    fn cos(&self) -> Self;

    #[must_use]
    fn sqrt(&self) -> Self;

    #[must_use]
    fn powi(&self, n: i32) -> Self;

    /// Returns the additive identity.
    #[must_use]
    fn zero() -> Self {
        Self::from_f64(0.0)
    }
}

impl Scalar for f64 {
    fn from_f64(value: f64) -> Self {
        value
    }

    fn value(&self) -> f64 {
        *self
    }

    #[allow(clippy::float_cmp)]
    fn same_as(&self, other: &Self) -> bool {
        self == other
    }

    fn sin(&self) -> Self {
        f64::sin(*self)
    }

    fn cos(&self) -> Self {
        f64::cos(*self)
    }

    fn sqrt(&self) -> Self {
        f64::sqrt(*self)
    }

    fn powi(&self, n: i32) -> Self {
        f64::powi(*self, n)
    }
}
