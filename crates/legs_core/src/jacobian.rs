//! Jacobian-vector products `J(x)·V` for a block of tangent directions.
//!
//! The strategy is fixed when a [`JvProvider`] is built: exact products
//! when the field reports `has_jacobian()`, forward differences otherwise.

use crate::traits::VectorField;
use nalgebra::DMatrix;

/// Signature shared by both strategies. `f_x` is an optional cached `F(x)`.
pub type JvFn<F> = fn(&F, &[f64], &DMatrix<f64>, Option<&[f64]>) -> DMatrix<f64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JvStrategy {
    Exact,
    FiniteDifference,
}

pub struct JvProvider<F> {
    strategy: JvStrategy,
    apply: JvFn<F>,
}

impl<F: VectorField> JvProvider<F> {
    pub fn for_field(field: &F) -> Self {
        if field.has_jacobian() {
            Self {
                strategy: JvStrategy::Exact,
                apply: exact_jv::<F>,
            }
        } else {
            Self {
                strategy: JvStrategy::FiniteDifference,
                apply: finite_difference_jv::<F>,
            }
        }
    }

    pub fn strategy(&self) -> JvStrategy {
        self.strategy
    }

    /// Returns `J(x)·directions` (n×k).
    pub fn apply(
        &self,
        field: &F,
        x: &[f64],
        directions: &DMatrix<f64>,
        f_x: Option<&[f64]>,
    ) -> DMatrix<f64> {
        (self.apply)(field, x, directions, f_x)
    }
}

impl<F> Clone for JvProvider<F> {
    fn clone(&self) -> Self {
        Self {
            strategy: self.strategy,
            apply: self.apply,
        }
    }
}

fn exact_jv<F: VectorField>(
    field: &F,
    x: &[f64],
    directions: &DMatrix<f64>,
    _f_x: Option<&[f64]>,
) -> DMatrix<f64> {
    let n = x.len();
    let mut out = DMatrix::zeros(n, directions.ncols());
    let mut column = vec![0.0; n];
    for (j, direction) in directions.column_iter().enumerate() {
        field.jacobian_product(x, direction.as_slice(), &mut column);
        out.column_mut(j).copy_from_slice(&column);
    }
    out
}

fn finite_difference_jv<F: VectorField>(
    field: &F,
    x: &[f64],
    directions: &DMatrix<f64>,
    f_x: Option<&[f64]>,
) -> DMatrix<f64> {
    let n = x.len();
    let base = match f_x {
        Some(values) => values.to_vec(),
        None => {
            let mut values = vec![0.0; n];
            field.eval(x, &mut values);
            values
        }
    };
    let mut out = DMatrix::zeros(n, directions.ncols());
    let mut column = vec![0.0; n];
    for (j, direction) in directions.column_iter().enumerate() {
        forward_difference(field, x, Some(&base), direction.as_slice(), &mut column);
        out.column_mut(j).copy_from_slice(&column);
    }
    out
}

/// Forward-difference directional derivative `(F(x + h v) - F(x)) / h`.
///
/// `h = sqrt(eps) * max(1, |x|_inf) / |v|_inf`, so the perturbation of the
/// largest component is relative to the state magnitude. A zero direction
/// has zero derivative.
pub fn forward_difference<F: VectorField + ?Sized>(
    field: &F,
    x: &[f64],
    f_x: Option<&[f64]>,
    v: &[f64],
    out: &mut [f64],
) {
    let v_norm = inf_norm(v);
    if v_norm == 0.0 {
        out.fill(0.0);
        return;
    }
    let h = f64::EPSILON.sqrt() * inf_norm(x).max(1.0) / v_norm;

    let shifted: Vec<f64> = x.iter().zip(v).map(|(xi, vi)| xi + h * vi).collect();
    field.eval(&shifted, out);

    match f_x {
        Some(base) => {
            for (slot, b) in out.iter_mut().zip(base) {
                *slot = (*slot - b) / h;
            }
        }
        None => {
            let mut base = vec![0.0; x.len()];
            field.eval(x, &mut base);
            for (slot, b) in out.iter_mut().zip(&base) {
                *slot = (*slot - b) / h;
            }
        }
    }
}

fn inf_norm(values: &[f64]) -> f64 {
    values.iter().fold(0.0, |acc: f64, v| acc.max(v.abs()))
}
