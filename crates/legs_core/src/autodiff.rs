use crate::traits::{DynamicalSystem, Scalar, VectorField};
use num_traits::{One, Zero};
use std::ops::{Add, Div, Mul, Neg, Sub};

/// Dual number for forward-mode AD.
/// val: real part
/// eps: infinitesimal part
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Dual {
    pub val: f64,
    pub eps: f64,
}

impl Dual {
    pub fn new(val: f64, eps: f64) -> Self {
        Self { val, eps }
    }

    pub fn constant(val: f64) -> Self {
        Self::new(val, 0.0)
    }
}

impl Zero for Dual {
    fn zero() -> Self {
        Self::constant(0.0)
    }
    fn is_zero(&self) -> bool {
        self.val == 0.0 && self.eps == 0.0
    }
}

impl One for Dual {
    fn one() -> Self {
        Self::constant(1.0)
    }
}

impl Add for Dual {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.val + rhs.val, self.eps + rhs.eps)
    }
}

impl Sub for Dual {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.val - rhs.val, self.eps - rhs.eps)
    }
}

impl Mul for Dual {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        Self::new(self.val * rhs.val, self.val * rhs.eps + self.eps * rhs.val)
    }
}

impl Div for Dual {
    type Output = Self;
    fn div(self, rhs: Self) -> Self {
        Self::new(
            self.val / rhs.val,
            (self.eps * rhs.val - self.val * rhs.eps) / (rhs.val * rhs.val),
        )
    }
}

impl Neg for Dual {
    type Output = Self;
    fn neg(self) -> Self {
        Self::new(-self.val, -self.eps)
    }
}

impl Scalar for Dual {
    fn from_f64(value: f64) -> Self {
        Self::constant(value)
    }

    fn value(self) -> f64 {
        self.val
    }

    fn powf(self, exponent: Self) -> Self {
        // x^y = exp(y ln x); integer-valued constant exponents keep negative bases usable.
        let val = self.val.powf(exponent.val);
        if exponent.eps == 0.0 {
            // A constant base has zero slope even where x^(y-1) is infinite.
            if self.eps == 0.0 {
                return Self::constant(val);
            }
            let slope = exponent.val * self.val.powf(exponent.val - 1.0);
            return Self::new(val, slope * self.eps);
        }
        let eps = val * (exponent.eps * self.val.ln() + exponent.val * self.eps / self.val);
        Self::new(val, eps)
    }

    fn sin(self) -> Self {
        Self::new(self.val.sin(), self.eps * self.val.cos())
    }

    fn cos(self) -> Self {
        Self::new(self.val.cos(), -self.eps * self.val.sin())
    }

    fn tan(self) -> Self {
        let t = self.val.tan();
        Self::new(t, self.eps * (1.0 + t * t))
    }

    fn exp(self) -> Self {
        let e = self.val.exp();
        Self::new(e, e * self.eps)
    }

    fn ln(self) -> Self {
        Self::new(self.val.ln(), self.eps / self.val)
    }

    fn sqrt(self) -> Self {
        let s = self.val.sqrt();
        if self.eps == 0.0 {
            return Self::constant(s);
        }
        Self::new(s, self.eps / (2.0 * s))
    }
}

/// Exposes an autonomous `DynamicalSystem` as a `VectorField` whose
/// Jacobian product is exact.
///
/// `J(x)·v` is the directional derivative of the field along `v`, so each
/// direction costs one dual evaluation with `x + ε v` as input; the full
/// Jacobian is never assembled.
pub struct AutodiffField<S> {
    pub inner: S,
    /// Time at which the (assumed autonomous) system is sampled.
    pub time: f64,
}

impl<S> AutodiffField<S> {
    pub fn new(inner: S) -> Self {
        Self { inner, time: 0.0 }
    }

    pub fn at_time(inner: S, time: f64) -> Self {
        Self { inner, time }
    }
}

impl<S> VectorField for AutodiffField<S>
where
    S: DynamicalSystem<f64> + DynamicalSystem<Dual>,
{
    fn dimension(&self) -> usize {
        DynamicalSystem::<f64>::dimension(&self.inner)
    }

    fn eval(&self, x: &[f64], out: &mut [f64]) {
        self.inner.apply(self.time, x, out);
    }

    fn has_jacobian(&self) -> bool {
        true
    }

    fn jacobian_product(&self, x: &[f64], v: &[f64], out: &mut [f64]) {
        let dual_x: Vec<Dual> = x.iter().zip(v).map(|(&xi, &vi)| Dual::new(xi, vi)).collect();
        let mut dual_out = vec![Dual::zero(); out.len()];
        self.inner
            .apply(Dual::constant(self.time), &dual_x, &mut dual_out);
        for (slot, value) in out.iter_mut().zip(&dual_out) {
            *slot = value.eps;
        }
    }
}
