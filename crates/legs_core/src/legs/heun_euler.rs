use super::{
    adapt_step, ensure_finite, row_major, LegsError, LegsRecord, LegsSolver, TangentCore,
};
use crate::projection::{IdentityProjection, Projection};
use crate::settings::HeunEulerSettings;
use crate::traits::VectorField;
use tracing::{debug, trace};

/// Adaptive LEGS integrator built on the embedded Heun–Euler pair.
///
/// The Euler predictor and the Heun corrector are compared over the state
/// and every tangent column at once; the largest discrepancy drives the
/// shared step size. Steps are never rejected: the corrected solution is
/// always kept and only the next step is adjusted.
pub struct HeunEulerLegs<F, P = IdentityProjection> {
    core: TangentCore<F>,
    projection: P,
    settings: HeunEulerSettings,
}

impl<F: VectorField> HeunEulerLegs<F> {
    pub fn new(field: F, settings: HeunEulerSettings) -> Result<Self, LegsError> {
        Self::with_projection(field, IdentityProjection, settings)
    }
}

impl<F: VectorField, P: Projection> HeunEulerLegs<F, P> {
    pub fn with_projection(
        field: F,
        projection: P,
        settings: HeunEulerSettings,
    ) -> Result<Self, LegsError> {
        settings.validate()?;
        let core = TangentCore::new(field, settings.exponent_count)?;
        core.check_projection(&projection)?;
        debug!(
            dimension = core.dimension(),
            exponents = core.exponents(),
            strategy = ?core.strategy(),
            initial_step = settings.initial_step,
            tolerance = settings.tolerance,
            growth_limit = settings.growth_limit,
            "built Heun-Euler LEGS integrator"
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

    pub fn settings(&self) -> &HeunEulerSettings {
        &self.settings
    }

    fn next_step(&self, step: f64, error: f64) -> f64 {
        let s = &self.settings;
        adapt_step(
            step,
            error,
            s.tolerance,
            s.growth_limit,
            s.min_step,
            s.max_step,
        )
    }
}

impl<F: VectorField, P: Projection> LegsSolver for HeunEulerLegs<F, P> {
    fn name(&self) -> &'static str {
        "heun_euler"
    }

    fn dimension(&self) -> usize {
        self.core.dimension()
    }

    fn exponent_count(&self) -> usize {
        self.core.exponents()
    }

    fn initialize(&self, start: &[f64]) -> Result<LegsRecord, LegsError> {
        self.core
            .initial_record(start, self.settings.initial_step, None)
    }

    fn step(&self, previous: &LegsRecord) -> Result<LegsRecord, LegsError> {
        self.core.check_record(previous)?;
        let step = previous.step;
        if step == 0.0 {
            return Err(LegsError::ZeroStep);
        }
        ensure_finite(&[step], "step")?;
        let basis = previous.basis();
        let d_psi = previous.tangent_derivative();

        // Euler predictor.
        let trial_state = self.projection.project(&previous.state, step, &previous.field);
        let trial_basis = &basis + &d_psi * step;
        let trial_field = self.core.evaluate(&trial_state)?;
        let trial_d_psi = self
            .core
            .tangent_derivative(&trial_state, &trial_basis, &trial_field)?;

        // Heun corrector.
        let mean_field: Vec<f64> = previous
            .field
            .iter()
            .zip(&trial_field)
            .map(|(a, b)| 0.5 * (a + b))
            .collect();
        let state = self.projection.project(&previous.state, step, &mean_field);
        ensure_finite(&state, "state")?;
        let advanced = &basis + (&d_psi + &trial_d_psi) * (0.5 * step);

        let state_error = state
            .iter()
            .zip(&trial_state)
            .fold(0.0_f64, |acc, (a, b)| acc.max((a - b).abs()));
        let error = state_error.max((&advanced - &trial_basis).amax());
        if error.is_nan() {
            return Err(LegsError::NonFinite {
                quantity: "error estimate",
            });
        }

        let update = self.core.reorthonormalize(
            &advanced,
            &previous.lyapunov,
            previous.elapsed_time,
            step,
        )?;
        let next_step = self.next_step(step, error);

        let field = self.core.evaluate(&state)?;
        let d_psi = self.core.tangent_derivative(&state, &update.basis, &field)?;

        trace!(
            iteration = previous.iteration + 1,
            step,
            next_step,
            error,
            elapsed_time = update.elapsed_time,
            "heun-euler LEGS step"
        );

        Ok(LegsRecord {
            state,
            field,
            psi: row_major(&update.basis),
            d_psi: row_major(&d_psi),
            lyapunov: update.lyapunov,
            elapsed_time: update.elapsed_time,
            step: next_step,
            field_evaluations: previous.field_evaluations + 2,
            projections: previous.projections + 2,
            iteration: previous.iteration + 1,
            schedule: None,
            error_estimate: Some(error),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autodiff::AutodiffField;
    use crate::equation_engine::EquationSystem;
    use crate::legs::fixtures::{Blowup, ConstantField, LinearField};
    use crate::orthonormalize::orthogonalize_with_norms;
    use nalgebra::DMatrix;
    use crate::orthonormalize::orthonormality_defect;

    fn settings(initial_step: f64, tolerance: f64) -> HeunEulerSettings {
        HeunEulerSettings {
            initial_step,
            tolerance,
            ..HeunEulerSettings::default()
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn exact_agreement_grows_step_by_limit() {
        let field = ConstantField(vec![1.0, -2.0]);
        let solver = HeunEulerLegs::new(
            &field,
            HeunEulerSettings {
                max_step: 0.3,
                ..settings(0.1, 1e-2)
            },
        )
        .expect("solver");
        let start = solver.initialize(&[0.0, 0.0]).expect("initialize");
        let first = solver.step(&start).expect("step");
        assert_eq!(first.error_estimate, Some(0.0));
        assert_eq!(first.step, 0.2);
        assert!((first.state[0] - 0.1).abs() < 1e-15);
        assert!((first.state[1] + 0.2).abs() < 1e-15);

        let second = solver.step(&first).expect("step");
        assert_eq!(second.step, 0.3);
        assert!((second.elapsed_time - 0.3).abs() < 1e-15);
    }

    #[test]
    fn counters_and_time_follow_the_step_taken() {
        let field = LinearField::diagonal(&[-1.0, 0.5, -2.0]);
        let solver = HeunEulerLegs::new(&field, settings(0.05, 1e-4)).expect("solver");
        let mut previous = solver.initialize(&[1.0, -1.0, 0.5]).expect("initialize");
        for _ in 0..30 {
            let next = solver.step(&previous).expect("step");
            assert_eq!(next.field_evaluations, previous.field_evaluations + 2);
            assert_eq!(next.projections, previous.projections + 2);
            assert_eq!(next.iteration, previous.iteration + 1);
            assert!(
                (next.elapsed_time - (previous.elapsed_time + previous.step.abs())).abs() < 1e-15
            );
            assert!(next.schedule.is_none());
            assert!(next.error_estimate.expect("error") >= 0.0);
            assert!(orthonormality_defect(&next.basis()) < 1e-12);
            previous = next;
        }
    }

    #[test]
    fn converges_to_eigenvalues_of_diagonal_field() {
        let field = LinearField::diagonal(&[-1.0, -3.0]);
        let solver = HeunEulerLegs::new(&field, settings(0.01, 1e-3)).expect("solver");
        let mut record = solver.initialize(&[1.0, 1.0]).expect("initialize");
        while record.elapsed_time < 40.0 {
            record = solver.step(&record).expect("step");
        }
        assert!((record.lyapunov[0] + 1.0).abs() < 0.05, "{:?}", record.lyapunov);
        assert!((record.lyapunov[1] + 3.0).abs() < 0.05, "{:?}", record.lyapunov);
    }

    #[test]
    fn lorenz_spectrum_sums_to_trace() {
        let system = EquationSystem::compile(
            &names(&["sigma * (y - x)", "x * (rho - z) - y", "x * y - beta * z"]),
            &names(&["x", "y", "z"]),
            vec![10.0, 28.0, 8.0 / 3.0],
            &names(&["sigma", "rho", "beta"]),
        )
        .expect("compile");
        let field = AutodiffField::new(system);
        let solver = HeunEulerLegs::new(&field, settings(1e-3, 1e-3)).expect("solver");
        let mut record = solver.initialize(&[1.0, 1.0, 1.0]).expect("initialize");
        for _ in 0..2000 {
            record = solver.step(&record).expect("step");
            assert!(orthonormality_defect(&record.basis()) < 1e-10);
        }
        let sum: f64 = record.lyapunov.iter().sum();
        let trace = -(10.0 + 1.0 + 8.0 / 3.0);
        assert!(
            ((sum - trace) / trace).abs() < 0.05,
            "sum {sum}, lyapunov {:?}",
            record.lyapunov
        );
    }

    #[test]
    fn runs_are_deterministic() {
        let field = LinearField::diagonal(&[0.2, -0.7]).numeric();
        let solver = HeunEulerLegs::new(&field, settings(0.1, 1e-3)).expect("solver");
        let run = || {
            let mut records = vec![solver.initialize(&[0.3, -0.4]).expect("initialize")];
            for _ in 0..20 {
                let next = solver.step(records.last().unwrap()).expect("step");
                records.push(next);
            }
            records
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn running_average_uses_corrected_basis_norms() {
        let matrix = DMatrix::from_row_slice(3, 3, &[
            0.1, 2.0, 0.0, -2.0, 0.1, 0.5, 0.3, 0.0, -1.0,
        ]);
        let field = LinearField {
            matrix: matrix.clone(),
            exact: true,
        };
        let solver = HeunEulerLegs::new(&field, settings(0.05, 1e-3)).expect("solver");
        let mut previous = solver.initialize(&[1.0, 0.5, -0.2]).expect("initialize");
        for _ in 0..20 {
            let next = solver.step(&previous).expect("step");

            // For a linear field the trial derivative is A (Ψ + h AΨ).
            let h = previous.step;
            let basis = previous.basis();
            let d_psi = previous.tangent_derivative();
            let trial_d_psi = &matrix * (&basis + &d_psi * h);
            let corrected = &basis + (&d_psi + trial_d_psi) * (0.5 * h);
            let (_, norms) = orthogonalize_with_norms(&corrected).expect("norms");
            for j in 0..3 {
                let lhs = next.lyapunov[j] * next.elapsed_time;
                let rhs = previous.lyapunov[j] * previous.elapsed_time + norms[j].ln();
                assert!((lhs - rhs).abs() < 1e-12, "column {j}: {lhs} vs {rhs}");
            }
            previous = next;
        }
    }

    #[test]
    fn non_finite_trial_field_fails_the_step() {
        let solver = HeunEulerLegs::new(Blowup, settings(1.0, 1e-2)).expect("solver");
        let start = solver.initialize(&[0.5, 0.0]).expect("initialize");
        assert_eq!(
            solver.step(&start).unwrap_err(),
            LegsError::NonFinite {
                quantity: "field value"
            }
        );
    }

    #[test]
    fn collapsed_corrected_basis_is_reported() {
        // hA has eigenvalues -1 ± i, so I + hA + (hA)²/2 vanishes.
        let field = LinearField {
            matrix: DMatrix::from_row_slice(2, 2, &[-1.0, 1.0, -1.0, -1.0]),
            exact: true,
        };
        let solver = HeunEulerLegs::new(&field, settings(1.0, 1e-2)).expect("solver");
        let start = solver.initialize(&[1.0, 0.0]).expect("initialize");
        assert_eq!(
            solver.step(&start).unwrap_err(),
            LegsError::DegenerateDirection { column: 0 }
        );
    }

    #[test]
    fn zero_step_record_fails_instead_of_stalling() {
        let field = LinearField::diagonal(&[-1.0, -2.0]);
        let solver = HeunEulerLegs::new(&field, settings(0.1, 1e-2)).expect("solver");
        let mut start = solver.initialize(&[1.0, 1.0]).expect("initialize");
        start.step = 0.0;
        assert_eq!(solver.step(&start).unwrap_err(), LegsError::ZeroStep);
    }

    #[test]
    fn record_from_another_solver_is_rejected() {
        let wide = LinearField::diagonal(&[-1.0, -2.0, -3.0]);
        let narrow = LinearField::diagonal(&[-1.0, -2.0]);
        let record = HeunEulerLegs::new(&wide, settings(0.1, 1e-2))
            .expect("solver")
            .initialize(&[1.0, 1.0, 1.0])
            .expect("initialize");
        let solver = HeunEulerLegs::new(&narrow, settings(0.1, 1e-2)).expect("solver");
        assert_eq!(
            solver.step(&record).unwrap_err(),
            LegsError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        );
    }

    #[test]
    fn rejects_invalid_configuration() {
        let field = LinearField::diagonal(&[-1.0]);
        assert!(HeunEulerLegs::new(&field, settings(0.1, -1.0)).is_err());
        assert!(HeunEulerLegs::new(
            &field,
            HeunEulerSettings {
                exponent_count: Some(0),
                ..settings(0.1, 1e-2)
            }
        )
        .is_err());
        assert!(HeunEulerLegs::new(
            &field,
            HeunEulerSettings {
                initial_step: -0.1,
                min_step: 0.0,
                max_step: 1.0,
                ..settings(0.1, 1e-2)
            }
        )
        .is_err());
    }
}
