use num_traits::{One, Zero};
use std::fmt::Debug;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// A numeric type the equation engine can evaluate over.
/// Implemented for `f64` and for `Dual` (forward-mode derivatives).
pub trait Scalar:
    Copy
    + Debug
    + Zero
    + One
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
    + 'static
{
    fn from_f64(value: f64) -> Self;
    fn value(self) -> f64;
    fn powf(self, exponent: Self) -> Self;
    fn sin(self) -> Self;
    fn cos(self) -> Self;
    fn tan(self) -> Self;
    fn exp(self) -> Self;
    fn ln(self) -> Self;
    fn sqrt(self) -> Self;
}

impl Scalar for f64 {
    fn from_f64(value: f64) -> Self {
        value
    }
    fn value(self) -> f64 {
        self
    }
    fn powf(self, exponent: Self) -> Self {
        f64::powf(self, exponent)
    }
    fn sin(self) -> Self {
        f64::sin(self)
    }
    fn cos(self) -> Self {
        f64::cos(self)
    }
    fn tan(self) -> Self {
        f64::tan(self)
    }
    fn exp(self) -> Self {
        f64::exp(self)
    }
    fn ln(self) -> Self {
        f64::ln(self)
    }
    fn sqrt(self) -> Self {
        f64::sqrt(self)
    }
}

/// Represents a (possibly time-dependent) flow.
pub trait DynamicalSystem<T: Scalar> {
    /// Returns the dimension of the state space.
    fn dimension(&self) -> usize;

    /// Evaluates the vector field at `(t, x)` into `out`.
    fn apply(&self, t: T, x: &[T], out: &mut [T]);
}

/// The field provider consumed by the LEGS integrators.
///
/// `eval` is the autonomous vector field `F(x)`. Providers that can apply
/// their Jacobian exactly report it through `has_jacobian` and override
/// `jacobian_product`; everyone else gets the finite-difference fallback,
/// selected once when an integrator is built.
pub trait VectorField {
    fn dimension(&self) -> usize;

    fn eval(&self, x: &[f64], out: &mut [f64]);

    /// Whether `jacobian_product` is exact for this field.
    fn has_jacobian(&self) -> bool {
        false
    }

    /// Writes `J(x)·v` into `out` for a single direction `v`.
    fn jacobian_product(&self, x: &[f64], v: &[f64], out: &mut [f64]) {
        crate::jacobian::forward_difference(self, x, None, v, out);
    }
}

impl<F: VectorField + ?Sized> VectorField for &F {
    fn dimension(&self) -> usize {
        (**self).dimension()
    }

    fn eval(&self, x: &[f64], out: &mut [f64]) {
        (**self).eval(x, out)
    }

    fn has_jacobian(&self) -> bool {
        (**self).has_jacobian()
    }

    fn jacobian_product(&self, x: &[f64], v: &[f64], out: &mut [f64]) {
        (**self).jacobian_product(x, v, out)
    }
}
