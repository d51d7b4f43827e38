//! Configuration for the integrators and the runner.
//!
//! Every struct deserializes with missing fields falling back to the
//! defaults, so a driver can pass a partial JSON/JS object.

use crate::legs::LegsError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EulerSettings {
    pub initial_step: f64,
    /// Reuse `initial_step` forever instead of the harmonic decay schedule.
    pub fixed_step: bool,
    /// Number of tracked exponents; `None` tracks the full spectrum.
    pub exponent_count: Option<usize>,
}

impl Default for EulerSettings {
    fn default() -> Self {
        Self {
            initial_step: 0.1,
            fixed_step: false,
            exponent_count: None,
        }
    }
}

impl EulerSettings {
    pub fn validate(&self) -> Result<(), LegsError> {
        validate_step(self.initial_step)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeunEulerSettings {
    pub initial_step: f64,
    /// Target local error per step (Δ0).
    pub tolerance: f64,
    /// Largest factor the step may grow by in one step.
    pub growth_limit: f64,
    pub min_step: f64,
    pub max_step: f64,
    pub exponent_count: Option<usize>,
}

impl Default for HeunEulerSettings {
    fn default() -> Self {
        Self {
            initial_step: 0.1,
            tolerance: 1e-2,
            growth_limit: 2.0,
            min_step: -1e10,
            max_step: 1e10,
            exponent_count: None,
        }
    }
}

impl HeunEulerSettings {
    pub fn validate(&self) -> Result<(), LegsError> {
        validate_step(self.initial_step)?;
        if !(self.tolerance > 0.0 && self.tolerance.is_finite()) {
            return Err(invalid("tolerance must be positive and finite."));
        }
        if !(self.growth_limit > 0.0 && self.growth_limit.is_finite()) {
            return Err(invalid("growth_limit must be positive and finite."));
        }
        if self.min_step.is_nan() || self.max_step.is_nan() || self.min_step > self.max_step {
            return Err(invalid("min_step must not exceed max_step."));
        }
        // Adapted steps stay nonzero only while the clip range contains the start.
        if self.initial_step < self.min_step || self.initial_step > self.max_step {
            return Err(invalid("initial_step must lie within [min_step, max_step]."));
        }
        Ok(())
    }
}

/// Termination and retention for [`LegsRunner`](crate::runner::LegsRunner).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    pub max_steps: usize,
    /// Stop once the elapsed integration time reaches this value.
    pub max_time: Option<f64>,
    /// Number of most recent records kept in memory.
    pub retention: usize,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            max_steps: 10_000,
            max_time: None,
            retention: 1,
        }
    }
}

impl RunSettings {
    pub fn validate(&self) -> Result<(), LegsError> {
        if self.max_steps == 0 {
            return Err(invalid("max_steps must be at least 1."));
        }
        if self.retention == 0 {
            return Err(invalid("retention must keep at least one record."));
        }
        if let Some(max_time) = self.max_time {
            if !(max_time > 0.0) {
                return Err(invalid("max_time must be positive."));
            }
        }
        Ok(())
    }
}

fn validate_step(step: f64) -> Result<(), LegsError> {
    if step == 0.0 || !step.is_finite() {
        return Err(invalid("initial_step must be finite and nonzero."));
    }
    Ok(())
}

fn invalid(message: &str) -> LegsError {
    LegsError::InvalidSettings(message.to_string())
}
