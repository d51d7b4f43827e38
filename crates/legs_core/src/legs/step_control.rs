use serde::{Deserialize, Serialize};

/// Harmonic decay schedule for the fixed-form integrator.
///
/// The step is `initial / s`; `s` is held for `s` consecutive steps before
/// it is incremented, so the step shrinks while the summed time diverges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleState {
    pub s: usize,
    pub scount: usize,
}

impl Default for ScheduleState {
    fn default() -> Self {
        Self { s: 1, scount: 0 }
    }
}

impl ScheduleState {
    /// Schedule position for the next step.
    pub fn advance(self) -> Self {
        let Self { mut s, mut scount } = self;
        if scount >= s {
            scount = 0;
            s += 1;
        }
        Self {
            s,
            scount: scount + 1,
        }
    }

    pub fn step(&self, initial_step: f64) -> f64 {
        initial_step / self.s as f64
    }
}

/// Growth-limited step update for the embedded pair.
///
/// `growth = min(sqrt(tolerance / error), growth_limit)`, or `growth_limit`
/// when the two solutions agree exactly; the result is clipped to
/// `[min_step, max_step]`.
pub fn adapt_step(
    step: f64,
    error: f64,
    tolerance: f64,
    growth_limit: f64,
    min_step: f64,
    max_step: f64,
) -> f64 {
    let growth = if error == 0.0 {
        growth_limit
    } else {
        (tolerance / error).sqrt().min(growth_limit)
    };
    (growth * step).max(min_step).min(max_step)
}
