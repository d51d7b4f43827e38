//! Field construction and error conversion shared by the bindings.

use anyhow::{bail, Result};
use legs_core::autodiff::AutodiffField;
use legs_core::equation_engine::EquationSystem;
use wasm_bindgen::prelude::*;

/// Field compiled from user equation strings, with exact Jacobian products.
pub(crate) type EquationField = AutodiffField<EquationSystem>;

pub(crate) fn build_field(
    equations: &[String],
    params: Vec<f64>,
    param_names: &[String],
    var_names: &[String],
) -> Result<EquationField> {
    if equations.is_empty() {
        bail!("System must have at least one equation.");
    }
    let system = EquationSystem::compile(equations, var_names, params, param_names)?;
    Ok(AutodiffField::new(system))
}

pub(crate) fn js_error(err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&err.to_string())
}
