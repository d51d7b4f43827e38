use super::{
    ensure_finite, row_major, LegsError, LegsRecord, LegsSolver, ScheduleState, TangentCore,
};
use crate::projection::{IdentityProjection, Projection};
use crate::settings::EulerSettings;
use crate::traits::VectorField;
use tracing::{debug, trace};

/// First-order LEGS integrator.
///
/// Unless `fixed_step` is set, the step follows the harmonic schedule
/// `initial_step / s` (see [`ScheduleState`]), which keeps the summed time
/// divergent while the step shrinks so the running average converges.
pub struct EulerLegs<F, P = IdentityProjection> {
    core: TangentCore<F>,
    projection: P,
    settings: EulerSettings,
}

impl<F: VectorField> EulerLegs<F> {
    pub fn new(field: F, settings: EulerSettings) -> Result<Self, LegsError> {
        Self::with_projection(field, IdentityProjection, settings)
    }
}

impl<F: VectorField, P: Projection> EulerLegs<F, P> {
    pub fn with_projection(
        field: F,
        projection: P,
        settings: EulerSettings,
    ) -> Result<Self, LegsError> {
        settings.validate()?;
        let core = TangentCore::new(field, settings.exponent_count)?;
        core.check_projection(&projection)?;
        debug!(
            dimension = core.dimension(),
            exponents = core.exponents(),
            strategy = ?core.strategy(),
            initial_step = settings.initial_step,
            fixed_step = settings.fixed_step,
            "built Euler LEGS integrator"
        );
        Ok(Self {
            core,
            projection,
            settings,
        })
    }

    pub fn field(&self) -> &F {
        &self.core.field
    }

    pub fn settings(&self) -> &EulerSettings {
        &self.settings
    }
}

impl<F: VectorField, P: Projection> LegsSolver for EulerLegs<F, P> {
    fn name(&self) -> &'static str {
        "euler"
    }

    fn dimension(&self) -> usize {
        self.core.dimension()
    }

    fn exponent_count(&self) -> usize {
        self.core.exponents()
    }

    fn initialize(&self, start: &[f64]) -> Result<LegsRecord, LegsError> {
        self.core.initial_record(
            start,
            self.settings.initial_step,
            Some(ScheduleState::default()),
        )
    }

    fn step(&self, previous: &LegsRecord) -> Result<LegsRecord, LegsError> {
        self.core.check_record(previous)?;
        let current = previous.schedule.unwrap_or_default();
        let (step, schedule) = if self.settings.fixed_step {
            (self.settings.initial_step, current)
        } else {
            let next = current.advance();
            (next.step(self.settings.initial_step), next)
        };

        let state = self.projection.project(&previous.state, step, &previous.field);
        ensure_finite(&state, "state")?;
        let advanced = previous.basis() + previous.tangent_derivative() * step;

        let update = self.core.reorthonormalize(
            &advanced,
            &previous.lyapunov,
            previous.elapsed_time,
            step,
        )?;

        let field = self.core.evaluate(&state)?;
        let d_psi = self.core.tangent_derivative(&state, &update.basis, &field)?;

        trace!(
            iteration = previous.iteration + 1,
            step,
            s = schedule.s,
            elapsed_time = update.elapsed_time,
            "euler LEGS step"
        );

        Ok(LegsRecord {
            state,
            field,
            psi: row_major(&update.basis),
            d_psi: row_major(&d_psi),
            lyapunov: update.lyapunov,
            elapsed_time: update.elapsed_time,
            step,
            field_evaluations: previous.field_evaluations + 1,
            projections: previous.projections + 1,
            iteration: previous.iteration + 1,
            schedule: Some(schedule),
            error_estimate: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::legs::fixtures::{Blowup, LinearField};
    use crate::orthonormalize::orthonormality_defect;

    fn settings(initial_step: f64) -> EulerSettings {
        EulerSettings {
            initial_step,
            ..EulerSettings::default()
        }
    }

    fn run<S: LegsSolver>(solver: &S, start: &[f64], steps: usize) -> Vec<LegsRecord> {
        let mut records = vec![solver.initialize(start).expect("initialize")];
        for _ in 0..steps {
            let next = solver.step(records.last().unwrap()).expect("step");
            records.push(next);
        }
        records
    }

    #[test]
    fn step_sizes_follow_harmonic_schedule() {
        let field = LinearField::diagonal(&[-1.0, -3.0]);
        let solver = EulerLegs::new(&field, settings(0.12)).expect("solver");
        let records = run(&solver, &[1.0, 1.0], 10);
        let steps: Vec<f64> = records[1..].iter().map(|r| r.step).collect();
        let divisors = [1.0, 2.0, 2.0, 3.0, 3.0, 3.0, 4.0, 4.0, 4.0, 4.0];
        for (step, divisor) in steps.iter().zip(divisors) {
            assert_eq!(*step, 0.12 / divisor);
        }
        for record in &records[1..] {
            let schedule = record.schedule.expect("schedule");
            assert_eq!(record.step, 0.12 / schedule.s as f64);
        }
    }

    #[test]
    fn fixed_step_reuses_initial_step() {
        let field = LinearField::diagonal(&[-1.0]);
        let solver = EulerLegs::new(
            &field,
            EulerSettings {
                fixed_step: true,
                ..settings(0.05)
            },
        )
        .expect("solver");
        let records = run(&solver, &[1.0], 6);
        assert!(records[1..].iter().all(|r| r.step == 0.05));
        assert!((records[6].elapsed_time - 0.3).abs() < 1e-15);
    }

    #[test]
    fn bookkeeping_invariants_hold_every_step() {
        let field = LinearField {
            matrix: nalgebra::DMatrix::from_row_slice(3, 3, &[
                0.1, 2.0, 0.0, -2.0, 0.1, 0.5, 0.3, 0.0, -1.0,
            ]),
            exact: true,
        };
        let solver = EulerLegs::new(&field, settings(0.05)).expect("solver");
        let records = run(&solver, &[1.0, 0.5, -0.2], 50);

        let mut time = 0.0;
        for pair in records.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            time += next.step.abs();
            assert!((next.elapsed_time - time).abs() < 1e-12);
            assert!(next.elapsed_time >= prev.elapsed_time);
            assert_eq!(next.field_evaluations, prev.field_evaluations + 1);
            assert_eq!(next.projections, prev.projections + 1);
            assert!(orthonormality_defect(&next.basis()) < 1e-12);

            // λ'T' = λT + ln‖Ψ_j‖ with the norms recomputed from the raw update.
            let advanced = prev.basis() + prev.tangent_derivative() * next.step;
            let (_, norms) =
                crate::orthonormalize::orthogonalize_with_norms(&advanced).expect("norms");
            for j in 0..3 {
                let lhs = next.lyapunov[j] * next.elapsed_time;
                let rhs = prev.lyapunov[j] * prev.elapsed_time + norms[j].ln();
                assert!((lhs - rhs).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn converges_to_eigenvalues_of_diagonal_field() {
        let field = LinearField::diagonal(&[-1.0, -3.0]);
        let solver = EulerLegs::new(&field, settings(0.1)).expect("solver");
        let mut record = solver.initialize(&[1.0, 1.0]).expect("initialize");
        for _ in 0..5000 {
            record = solver.step(&record).expect("step");
        }
        assert!((record.lyapunov[0] + 1.0).abs() < 0.05, "{:?}", record.lyapunov);
        assert!((record.lyapunov[1] + 3.0).abs() < 0.05, "{:?}", record.lyapunov);
    }

    #[test]
    fn finite_difference_fallback_tracks_exact_run() {
        let exact = LinearField::diagonal(&[-0.5, -2.0]);
        let numeric = LinearField::diagonal(&[-0.5, -2.0]).numeric();
        let exact_solver = EulerLegs::new(&exact, settings(0.1)).expect("solver");
        let numeric_solver = EulerLegs::new(&numeric, settings(0.1)).expect("solver");
        let a = run(&exact_solver, &[1.0, 2.0], 40);
        let b = run(&numeric_solver, &[1.0, 2.0], 40);
        for (x, y) in a.last().unwrap().lyapunov.iter().zip(&b.last().unwrap().lyapunov) {
            assert!((x - y).abs() < 1e-6);
        }
    }

    #[test]
    fn runs_are_deterministic() {
        let field = LinearField::diagonal(&[0.3, -1.0]);
        let solver = EulerLegs::new(&field, settings(0.2)).expect("solver");
        assert_eq!(run(&solver, &[0.1, 0.2], 30), run(&solver, &[0.1, 0.2], 30));
    }

    #[test]
    fn collapsed_direction_is_reported_not_averaged() {
        // With step 1 the tangent update I + A maps e1 to zero.
        let field = LinearField::diagonal(&[-1.0, 0.5]);
        let solver = EulerLegs::new(
            &field,
            EulerSettings {
                fixed_step: true,
                ..settings(1.0)
            },
        )
        .expect("solver");
        let start = solver.initialize(&[1.0, 1.0]).expect("initialize");
        assert_eq!(
            solver.step(&start).unwrap_err(),
            LegsError::DegenerateDirection { column: 0 }
        );
    }

    #[test]
    fn non_finite_field_fails_the_step() {
        let solver = EulerLegs::new(
            Blowup,
            EulerSettings {
                fixed_step: true,
                ..settings(0.6)
            },
        )
        .expect("solver");
        let start = solver.initialize(&[0.0, 0.0]).expect("initialize");
        let first = solver.step(&start).expect("first step stays finite");
        assert_eq!(
            solver.step(&first).unwrap_err(),
            LegsError::NonFinite {
                quantity: "field value"
            }
        );
    }

    #[test]
    fn projection_is_applied_to_the_state() {
        let field = LinearField::diagonal(&[1.0, 1.0]);
        let projection = crate::projection::BoxProjection::new(vec![0.0, 0.0], vec![1.05, 10.0])
            .expect("bounds");
        let solver =
            EulerLegs::with_projection(&field, projection, settings(0.1)).expect("solver");
        let records = run(&solver, &[1.0, 1.0], 3);
        assert!(records.iter().all(|r| r.state[0] <= 1.05));
        assert!(records[3].state[1] > 1.05);
    }

    #[test]
    fn record_from_another_solver_is_rejected() {
        let wide = LinearField::diagonal(&[-1.0, -2.0, -3.0]);
        let narrow = LinearField::diagonal(&[-1.0, -2.0]);
        let wide_solver = EulerLegs::new(&wide, settings(0.1)).expect("solver");
        let narrow_solver = EulerLegs::new(&narrow, settings(0.1)).expect("solver");
        let record = wide_solver.initialize(&[1.0, 1.0, 1.0]).expect("initialize");
        assert_eq!(
            narrow_solver.step(&record).unwrap_err(),
            LegsError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        );
    }

    #[test]
    fn projection_bounds_must_match_dimension() {
        let field = LinearField::diagonal(&[1.0, 1.0, 1.0]);
        let projection = crate::projection::BoxProjection::new(vec![0.0, 0.0], vec![1.0, 1.0])
            .expect("bounds");
        assert_eq!(
            EulerLegs::with_projection(&field, projection, settings(0.1))
                .err()
                .expect("error"),
            LegsError::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        );
    }

    #[test]
    fn rejects_invalid_configuration() {
        let field = LinearField::diagonal(&[-1.0, -2.0]);
        let err = EulerLegs::new(
            &field,
            EulerSettings {
                exponent_count: Some(3),
                ..settings(0.1)
            },
        )
        .err()
        .expect("error");
        assert_eq!(
            err,
            LegsError::InvalidExponentCount {
                requested: 3,
                dimension: 2
            }
        );
        assert!(EulerLegs::new(&field, settings(0.0)).is_err());
        assert!(EulerLegs::new(&field, settings(f64::NAN)).is_err());
    }
}
