use crate::legs::LegsError;
use serde::{Deserialize, Serialize};

/// Feasibility projection applied to every state update
/// `x' = P(x, step, direction)`.
pub trait Projection {
    fn project(&self, x: &[f64], step: f64, direction: &[f64]) -> Vec<f64>;

    /// State dimension the operator is built for, if it is tied to one.
    fn required_dimension(&self) -> Option<usize> {
        None
    }
}

/// Unconstrained update `x + step * direction`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct IdentityProjection;

impl Projection for IdentityProjection {
    fn project(&self, x: &[f64], step: f64, direction: &[f64]) -> Vec<f64> {
        x.iter().zip(direction).map(|(xi, di)| xi + step * di).collect()
    }
}

/// Euclidean projection onto the box `lower <= x <= upper`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoxProjection {
    lower: Vec<f64>,
    upper: Vec<f64>,
}

impl BoxProjection {
    pub fn new(lower: Vec<f64>, upper: Vec<f64>) -> Result<Self, LegsError> {
        if lower.len() != upper.len() {
            return Err(LegsError::InvalidSettings(format!(
                "Box bounds differ in length ({} vs {}).",
                lower.len(),
                upper.len()
            )));
        }
        if let Some(i) = (0..lower.len()).find(|&i| !(lower[i] <= upper[i])) {
            return Err(LegsError::InvalidSettings(format!(
                "Box bound {i} is empty: lower {} > upper {}.",
                lower[i], upper[i]
            )));
        }
        Ok(Self { lower, upper })
    }

    pub fn dimension(&self) -> usize {
        self.lower.len()
    }
}

impl Projection for BoxProjection {
    fn project(&self, x: &[f64], step: f64, direction: &[f64]) -> Vec<f64> {
        let mut next = IdentityProjection.project(x, step, direction);
        for ((value, lo), hi) in next.iter_mut().zip(&self.lower).zip(&self.upper) {
            *value = value.clamp(*lo, *hi);
        }
        next
    }

    fn required_dimension(&self) -> Option<usize> {
        Some(self.dimension())
    }
}

/// Projection onto the nonnegative orthant.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct NonnegativeProjection;

impl Projection for NonnegativeProjection {
    fn project(&self, x: &[f64], step: f64, direction: &[f64]) -> Vec<f64> {
        let mut next = IdentityProjection.project(x, step, direction);
        for value in &mut next {
            *value = value.max(0.0);
        }
        next
    }
}
