//! Batch LEGS runner exposed to JavaScript.

use crate::system::{build_field, js_error, EquationField};
use anyhow::{anyhow, bail, Context, Result};
use js_sys::Float64Array;
use legs_core::legs::{EulerLegs, HeunEulerLegs, LegsError, LegsRecord};
use legs_core::runner::{LegsRunner, LyapunovSummary, RunProgress};
use legs_core::settings::{EulerSettings, HeunEulerSettings, RunSettings};
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;

/// Integrator-specific settings, already deserialized.
pub(crate) enum MethodSettings {
    Euler(EulerSettings),
    HeunEuler(HeunEulerSettings),
}

impl MethodSettings {
    fn from_js(method: &str, settings_val: JsValue) -> Result<Self> {
        let missing = settings_val.is_undefined() || settings_val.is_null();
        match method {
            "euler" => {
                let settings = if missing {
                    EulerSettings::default()
                } else {
                    from_value(settings_val).map_err(|e| anyhow!("Invalid Euler settings: {e}"))?
                };
                Ok(Self::Euler(settings))
            }
            "heun_euler" => {
                let settings = if missing {
                    HeunEulerSettings::default()
                } else {
                    from_value(settings_val)
                        .map_err(|e| anyhow!("Invalid Heun-Euler settings: {e}"))?
                };
                Ok(Self::HeunEuler(settings))
            }
            other => bail!("Unknown LEGS method: {other}"),
        }
    }
}

enum RunnerKind {
    Euler(LegsRunner<EulerLegs<EquationField>>),
    HeunEuler(LegsRunner<HeunEulerLegs<EquationField>>),
}

impl RunnerKind {
    fn run_steps(&mut self, batch: usize) -> Result<RunProgress, LegsError> {
        match self {
            Self::Euler(runner) => runner.run_steps(batch),
            Self::HeunEuler(runner) => runner.run_steps(batch),
        }
    }

    fn progress(&self) -> RunProgress {
        match self {
            Self::Euler(runner) => runner.progress(),
            Self::HeunEuler(runner) => runner.progress(),
        }
    }

    fn summary(&self) -> Result<LyapunovSummary, LegsError> {
        match self {
            Self::Euler(runner) => runner.summary(),
            Self::HeunEuler(runner) => runner.summary(),
        }
    }

    fn latest(&self) -> Option<&LegsRecord> {
        match self {
            Self::Euler(runner) => runner.latest(),
            Self::HeunEuler(runner) => runner.latest(),
        }
    }
}

#[wasm_bindgen]
pub struct WasmLegsRunner {
    runner: RunnerKind,
}

#[wasm_bindgen]
impl WasmLegsRunner {
    /// `method` is `"euler"` or `"heun_euler"`; `settings_val` may be
    /// `undefined` or a partial settings object.
    #[wasm_bindgen(constructor)]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        equations: Vec<String>,
        params: Vec<f64>,
        param_names: Vec<String>,
        var_names: Vec<String>,
        method: &str,
        initial_state: Vec<f64>,
        settings_val: JsValue,
        max_steps: u32,
    ) -> Result<WasmLegsRunner, JsValue> {
        console_error_panic_hook::set_once();

        let settings = MethodSettings::from_js(method, settings_val).map_err(js_error)?;
        Self::build(
            &equations,
            params,
            &param_names,
            &var_names,
            settings,
            &initial_state,
            max_steps as usize,
        )
        .map_err(|e| js_error(format!("{e:#}")))
    }

    pub fn is_done(&self) -> bool {
        self.progress().done
    }

    pub fn run_steps(&mut self, batch_size: u32) -> Result<JsValue, JsValue> {
        let progress = self.advance(batch_size as usize).map_err(js_error)?;
        to_value(&progress).map_err(|e| js_error(format!("Serialization error: {e}")))
    }

    pub fn get_progress(&self) -> Result<JsValue, JsValue> {
        to_value(&self.progress()).map_err(|e| js_error(format!("Serialization error: {e}")))
    }

    pub fn get_result(&self) -> Result<JsValue, JsValue> {
        let summary = self.runner.summary().map_err(js_error)?;
        to_value(&summary).map_err(|e| js_error(format!("Serialization error: {e}")))
    }

    pub fn get_latest_record(&self) -> Result<JsValue, JsValue> {
        let record = self
            .runner
            .latest()
            .ok_or_else(|| js_error("Runner has no records"))?;
        to_value(record).map_err(|e| js_error(format!("Serialization error: {e}")))
    }

    /// Current exponent estimates without a serde round trip.
    pub fn get_exponents(&self) -> Float64Array {
        Float64Array::from(self.exponents().as_slice())
    }
}

impl WasmLegsRunner {
    pub(crate) fn build(
        equations: &[String],
        params: Vec<f64>,
        param_names: &[String],
        var_names: &[String],
        settings: MethodSettings,
        initial_state: &[f64],
        max_steps: usize,
    ) -> Result<Self> {
        if initial_state.is_empty() {
            bail!("Initial state must have positive dimension.");
        }
        let field = build_field(equations, params, param_names, var_names)?;
        let run_settings = RunSettings {
            max_steps,
            ..RunSettings::default()
        };
        let runner = match settings {
            MethodSettings::Euler(settings) => {
                let solver = EulerLegs::new(field, settings)?;
                RunnerKind::Euler(LegsRunner::new(solver, initial_state, run_settings)?)
            }
            MethodSettings::HeunEuler(settings) => {
                let solver = HeunEulerLegs::new(field, settings)?;
                RunnerKind::HeunEuler(LegsRunner::new(solver, initial_state, run_settings)?)
            }
        };
        Ok(Self { runner })
    }

    pub(crate) fn advance(&mut self, batch: usize) -> Result<RunProgress> {
        self.runner
            .run_steps(batch)
            .context("LEGS step failed")
    }

    pub(crate) fn progress(&self) -> RunProgress {
        self.runner.progress()
    }

    pub(crate) fn exponents(&self) -> Vec<f64> {
        self.runner
            .latest()
            .map(|record| record.lyapunov.clone())
            .unwrap_or_default()
    }
}
