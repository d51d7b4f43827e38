//! Batch driver that repeatedly advances a [`LegsSolver`].
//!
//! The runner owns the solver and a bounded [`History`]; callers advance it
//! in batches (so a UI thread can yield between them) until the step budget
//! or the elapsed-time target is reached.

use crate::history::History;
use crate::legs::{LegsError, LegsRecord, LegsSolver};
use crate::settings::RunSettings;
use serde::Serialize;
use tracing::{debug, warn};

/// Progress payload reported after every batch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RunProgress {
    pub done: bool,
    pub current_step: usize,
    pub max_steps: usize,
    pub elapsed_time: f64,
}

/// Final (or intermediate) spectrum estimate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LyapunovSummary {
    pub exponents: Vec<f64>,
    pub kaplan_yorke_dimension: f64,
    pub elapsed_time: f64,
    pub steps: usize,
    pub field_evaluations: usize,
    pub projections: usize,
}

pub struct LegsRunner<S> {
    solver: S,
    history: History<LegsRecord>,
    settings: RunSettings,
    steps_done: usize,
    done: bool,
}

impl<S: LegsSolver> LegsRunner<S> {
    pub fn new(solver: S, initial_state: &[f64], settings: RunSettings) -> Result<Self, LegsError> {
        settings.validate()?;
        let first = solver.initialize(initial_state)?;
        let mut history = History::with_capacity(settings.retention);
        history.push(first);
        debug!(
            method = solver.name(),
            dimension = solver.dimension(),
            exponents = solver.exponent_count(),
            max_steps = settings.max_steps,
            max_time = ?settings.max_time,
            retention = settings.retention,
            "created LEGS runner"
        );
        Ok(Self {
            solver,
            history,
            settings,
            steps_done: 0,
            done: false,
        })
    }

    /// Advances by at most `batch` steps.
    ///
    /// A failed step is returned as-is and nothing is appended, so the
    /// latest record is still the last good one.
    pub fn run_steps(&mut self, batch: usize) -> Result<RunProgress, LegsError> {
        for _ in 0..batch {
            if self.done || self.limit_reached() {
                self.done = true;
                break;
            }
            let Some(previous) = self.history.latest() else {
                break;
            };
            let next = match self.solver.step(previous) {
                Ok(record) => record,
                Err(err) => {
                    warn!(
                        method = self.solver.name(),
                        step = self.steps_done + 1,
                        error = %err,
                        "LEGS step failed"
                    );
                    return Err(err);
                }
            };
            self.history.push(next);
            self.steps_done += 1;
        }
        if self.limit_reached() {
            self.done = true;
        }

        let progress = self.progress();
        debug!(
            current_step = progress.current_step,
            elapsed_time = progress.elapsed_time,
            done = progress.done,
            "LEGS batch finished"
        );
        Ok(progress)
    }

    fn limit_reached(&self) -> bool {
        if self.steps_done >= self.settings.max_steps {
            return true;
        }
        match (self.settings.max_time, self.history.latest()) {
            (Some(max_time), Some(latest)) => latest.elapsed_time >= max_time,
            _ => false,
        }
    }

    pub fn progress(&self) -> RunProgress {
        RunProgress {
            done: self.done,
            current_step: self.steps_done,
            max_steps: self.settings.max_steps,
            elapsed_time: self.history.latest().map_or(0.0, |r| r.elapsed_time),
        }
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn latest(&self) -> Option<&LegsRecord> {
        self.history.latest()
    }

    pub fn history(&self) -> &History<LegsRecord> {
        &self.history
    }

    pub fn solver(&self) -> &S {
        &self.solver
    }

    pub fn summary(&self) -> Result<LyapunovSummary, LegsError> {
        let latest = self
            .history
            .latest()
            .filter(|r| r.elapsed_time > 0.0)
            .ok_or(LegsError::ZeroElapsedTime)?;
        Ok(LyapunovSummary {
            kaplan_yorke_dimension: kaplan_yorke(&latest.lyapunov),
            exponents: latest.lyapunov.clone(),
            elapsed_time: latest.elapsed_time,
            steps: self.steps_done,
            field_evaluations: latest.field_evaluations,
            projections: latest.projections,
        })
    }
}

/// Kaplan–Yorke (Lyapunov) dimension of a spectrum.
///
/// With exponents sorted in decreasing order, `k` is the largest count
/// whose partial sum is non-negative and the result is
/// `k + (λ_1 + … + λ_k) / |λ_{k+1}|`. Returns `k` alone when every partial
/// sum stays non-negative.
pub fn kaplan_yorke(exponents: &[f64]) -> f64 {
    let mut sorted = exponents.to_vec();
    sorted.sort_by(|a, b| b.total_cmp(a));

    let mut partial = 0.0;
    for (k, &lambda) in sorted.iter().enumerate() {
        if partial + lambda < 0.0 {
            if lambda.abs() <= f64::EPSILON {
                return k as f64;
            }
            return k as f64 + partial / lambda.abs();
        }
        partial += lambda;
    }
    sorted.len() as f64
}
