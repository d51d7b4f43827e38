//! Lyapunov Exponent spectra via Gram-Schmidt (LEGS).
//!
//! The trajectory `x` and an n×k tangent basis `Ψ` are advanced together.
//! After every step the basis is orthogonalized left to right; the log of
//! each column norm is the local growth along that direction and is folded
//! into a time-weighted running average `λ`, then the basis is normalized
//! and carried into the next step.
//!
//! Two integrators share that machinery:
//! - [`EulerLegs`]: first-order update with a harmonic step-decay schedule.
//! - [`HeunEulerLegs`]: embedded Heun–Euler pair with step-size control.
//!
//! Each step is a pure function from the previous [`LegsRecord`] to the
//! next one, so a driver only needs the latest record.

pub mod euler;
pub mod heun_euler;
pub mod step_control;

pub use euler::EulerLegs;
pub use heun_euler::HeunEulerLegs;
pub use step_control::{adapt_step, ScheduleState};

use crate::jacobian::{JvProvider, JvStrategy};
use crate::orthonormalize::{normalize_columns, orthogonalize_with_norms};
use crate::projection::Projection;
use crate::traits::VectorField;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LegsError {
    #[error("Requested {requested} Lyapunov exponents; must be between 1 and the state dimension {dimension}.")]
    InvalidExponentCount { requested: usize, dimension: usize },
    #[error("Dimension mismatch: expected {expected}, got {actual}.")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),
    #[error("Tangent direction {column} collapsed during orthonormalization; its growth rate is undefined.")]
    DegenerateDirection { column: usize },
    #[error("Encountered non-finite {quantity}; the trajectory may be diverging.")]
    NonFinite { quantity: &'static str },
    #[error("Elapsed time is zero; cannot update the running Lyapunov average.")]
    ZeroElapsedTime,
    #[error("Step size is zero; the integration cannot advance.")]
    ZeroStep,
}

/// Everything known after one completed step.
///
/// `psi` and `d_psi` are n×k matrices flattened row-major. For the
/// adaptive integrator `step` is the step the next call will take; for the
/// fixed-form integrator it is the step that produced this record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegsRecord {
    pub state: Vec<f64>,
    pub field: Vec<f64>,
    pub psi: Vec<f64>,
    pub d_psi: Vec<f64>,
    pub lyapunov: Vec<f64>,
    pub elapsed_time: f64,
    pub step: f64,
    pub field_evaluations: usize,
    pub projections: usize,
    pub iteration: usize,
    #[serde(default)]
    pub schedule: Option<ScheduleState>,
    #[serde(default)]
    pub error_estimate: Option<f64>,
}

impl LegsRecord {
    pub fn dimension(&self) -> usize {
        self.state.len()
    }

    pub fn exponent_count(&self) -> usize {
        self.lyapunov.len()
    }

    /// Tangent basis as an n×k matrix.
    pub fn basis(&self) -> DMatrix<f64> {
        DMatrix::from_row_slice(self.dimension(), self.exponent_count(), &self.psi)
    }

    /// Cached `J(x)Ψ` as an n×k matrix.
    pub fn tangent_derivative(&self) -> DMatrix<f64> {
        DMatrix::from_row_slice(self.dimension(), self.exponent_count(), &self.d_psi)
    }
}

/// A LEGS time-stepping strategy.
pub trait LegsSolver {
    fn name(&self) -> &'static str;

    fn dimension(&self) -> usize;

    fn exponent_count(&self) -> usize;

    /// Builds the record at `T = 0` for `start`.
    fn initialize(&self, start: &[f64]) -> Result<LegsRecord, LegsError>;

    /// Computes the record following `previous`.
    fn step(&self, previous: &LegsRecord) -> Result<LegsRecord, LegsError>;
}

/// Field evaluation plus the orthonormalization/averaging step shared by
/// both integrators.
pub(crate) struct TangentCore<F> {
    pub field: F,
    jv: JvProvider<F>,
    dimension: usize,
    exponents: usize,
}

/// Output of [`TangentCore::reorthonormalize`].
pub(crate) struct BasisUpdate {
    pub basis: DMatrix<f64>,
    pub lyapunov: Vec<f64>,
    pub elapsed_time: f64,
}

impl<F: VectorField> TangentCore<F> {
    pub fn new(field: F, exponent_count: Option<usize>) -> Result<Self, LegsError> {
        let dimension = field.dimension();
        let exponents = exponent_count.unwrap_or(dimension);
        if exponents == 0 || exponents > dimension {
            return Err(LegsError::InvalidExponentCount {
                requested: exponents,
                dimension,
            });
        }
        let jv = JvProvider::for_field(&field);
        Ok(Self {
            field,
            jv,
            dimension,
            exponents,
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn exponents(&self) -> usize {
        self.exponents
    }

    pub fn strategy(&self) -> JvStrategy {
        self.jv.strategy()
    }

    /// Rejects a projection built for a different state dimension.
    pub fn check_projection<P: Projection>(&self, projection: &P) -> Result<(), LegsError> {
        match projection.required_dimension() {
            Some(actual) if actual != self.dimension => Err(LegsError::DimensionMismatch {
                expected: self.dimension,
                actual,
            }),
            _ => Ok(()),
        }
    }

    /// Checks that `record` was produced for this field and exponent count.
    pub fn check_record(&self, record: &LegsRecord) -> Result<(), LegsError> {
        let (n, k) = (self.dimension, self.exponents);
        let lengths = [
            (n, record.state.len()),
            (n, record.field.len()),
            (k, record.lyapunov.len()),
            (n * k, record.psi.len()),
            (n * k, record.d_psi.len()),
        ];
        match lengths.iter().find(|(expected, actual)| expected != actual) {
            Some(&(expected, actual)) => Err(LegsError::DimensionMismatch { expected, actual }),
            None => Ok(()),
        }
    }

    /// `F(x)`, rejecting non-finite output.
    pub fn evaluate(&self, x: &[f64]) -> Result<Vec<f64>, LegsError> {
        ensure_finite(x, "state")?;
        let mut out = vec![0.0; self.dimension];
        self.field.eval(x, &mut out);
        ensure_finite(&out, "field value")?;
        Ok(out)
    }

    /// `J(x)Ψ`, reusing the cached `F(x)`.
    pub fn tangent_derivative(
        &self,
        x: &[f64],
        basis: &DMatrix<f64>,
        f_x: &[f64],
    ) -> Result<DMatrix<f64>, LegsError> {
        let derivative = self.jv.apply(&self.field, x, basis, Some(f_x));
        ensure_finite(derivative.as_slice(), "tangent derivative")?;
        Ok(derivative)
    }

    /// Initial record: first k standard basis directions, zero estimate.
    pub fn initial_record(
        &self,
        start: &[f64],
        step: f64,
        schedule: Option<ScheduleState>,
    ) -> Result<LegsRecord, LegsError> {
        if start.len() != self.dimension {
            return Err(LegsError::DimensionMismatch {
                expected: self.dimension,
                actual: start.len(),
            });
        }
        let basis = DMatrix::<f64>::identity(self.dimension, self.exponents);
        let field = self.evaluate(start)?;
        let d_psi = self.tangent_derivative(start, &basis, &field)?;
        Ok(LegsRecord {
            state: start.to_vec(),
            field,
            psi: row_major(&basis),
            d_psi: row_major(&d_psi),
            lyapunov: vec![0.0; self.exponents],
            elapsed_time: 0.0,
            step,
            field_evaluations: 1,
            projections: 0,
            iteration: 0,
            schedule,
            error_estimate: None,
        })
    }

    /// Orthogonalizes the advanced basis, folds `ln‖Ψ_j‖` into the running
    /// average and returns the normalized basis:
    /// `λ'_j = (λ_j T + ln‖Ψ_j‖) / (T + |step|)`.
    pub fn reorthonormalize(
        &self,
        advanced: &DMatrix<f64>,
        lyapunov: &[f64],
        elapsed_time: f64,
        step: f64,
    ) -> Result<BasisUpdate, LegsError> {
        if step == 0.0 {
            return Err(LegsError::ZeroStep);
        }
        let (mut basis, norms) = orthogonalize_with_norms(advanced)?;
        let new_time = elapsed_time + step.abs();
        if new_time <= 0.0 {
            return Err(LegsError::ZeroElapsedTime);
        }
        let new_lyapunov: Vec<f64> = lyapunov
            .iter()
            .zip(&norms)
            .map(|(lambda, norm)| (lambda * elapsed_time + norm.ln()) / new_time)
            .collect();
        ensure_finite(&new_lyapunov, "Lyapunov estimate")?;
        normalize_columns(&mut basis, &norms);
        Ok(BasisUpdate {
            basis,
            lyapunov: new_lyapunov,
            elapsed_time: new_time,
        })
    }
}

pub(crate) fn ensure_finite(values: &[f64], quantity: &'static str) -> Result<(), LegsError> {
    if values.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(LegsError::NonFinite { quantity })
    }
}

/// Flattens an n×k matrix row by row.
pub(crate) fn row_major(matrix: &DMatrix<f64>) -> Vec<f64> {
    matrix.transpose().as_slice().to_vec()
}
