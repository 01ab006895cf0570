// aperture_core/src/safety/filter.rs

use nalgebra::{DMatrix, DVector};
use tracing::{debug, trace};

use crate::error::{FilterError, SolverFailure};
use crate::safety::barrier::ConstraintRow;
use crate::safety::qp::{QpSettings, QuadraticProgram};
use crate::types::Control;

/// Elementwise box limits on the decision vector. Infinite entries are unbounded.
#[derive(Debug, Clone, PartialEq)]
pub struct ActuatorBounds {
    pub lower: DVector<f64>,
    pub upper: DVector<f64>,
}

impl ActuatorBounds {
    pub fn new(lower: DVector<f64>, upper: DVector<f64>) -> Self {
        Self { lower, upper }
    }

    /// `-limit <= u_i <= limit` for every entry.
    pub fn symmetric(limit: f64, dim: usize) -> Self {
        Self {
            lower: DVector::from_element(dim, -limit),
            upper: DVector::from_element(dim, limit),
        }
    }

    pub fn unbounded(dim: usize) -> Self {
        Self::symmetric(f64::INFINITY, dim)
    }

    pub fn dim(&self) -> usize {
        self.lower.len()
    }

    pub fn contains(&self, u: &DVector<f64>) -> bool {
        u.len() == self.dim()
            && u
                .iter()
                .zip(self.lower.iter().zip(self.upper.iter()))
                .all(|(v, (lo, hi))| *lo <= *v && *v <= *hi)
    }

    pub fn clamp(&self, u: &DVector<f64>) -> DVector<f64> {
        DVector::from_iterator(
            u.len(),
            u.iter()
                .zip(self.lower.iter().zip(self.upper.iter()))
                .map(|(v, (lo, hi))| v.max(*lo).min(*hi)),
        )
    }
}

/// The command that leaves the safety filter.
#[derive(Debug, Clone, PartialEq)]
pub struct FilteredCommand {
    pub command: Control,
    /// Features whose barrier rows were active at the solution.
    pub active_constraints: Vec<usize>,
    pub iterations: usize,
}

impl FilteredCommand {
    /// True when the filter had to change the nominal command.
    pub fn intervened(&self) -> bool {
        self.iterations > 0
    }
}

/// Minimally invasive CBF filter: `min |u - u_nom|^2` subject to every barrier row
/// and the actuator bounds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SafetyFilter {
    pub settings: QpSettings,
}

impl SafetyFilter {
    pub fn new(settings: QpSettings) -> Self {
        Self { settings }
    }

    /// Assembles `P = 2I`, `q = -2 u_nom`, one `G` row per barrier row and the box.
    pub fn build_problem(
        u_nom: &Control,
        rows: &[ConstraintRow],
        bounds: &ActuatorBounds,
    ) -> Result<QuadraticProgram, FilterError> {
        let n = u_nom.len();
        if bounds.dim() != n || bounds.upper.len() != n {
            return Err(SolverFailure::Malformed(format!(
                "actuator bounds have dimension {}, command has {n}",
                bounds.dim()
            ))
            .into());
        }
        if let Some(row) = rows.iter().find(|row| row.a.len() != n) {
            return Err(SolverFailure::Malformed(format!(
                "constraint row for feature {} has {} coefficients, command has {n}",
                row.feature,
                row.a.len()
            ))
            .into());
        }

        let mut g = DMatrix::zeros(rows.len(), n);
        for (i, row) in rows.iter().enumerate() {
            g.set_row(i, &row.a.transpose());
        }

        Ok(QuadraticProgram {
            p: DMatrix::identity(n, n) * 2.0,
            q: u_nom * -2.0,
            g,
            h: DVector::from_iterator(rows.len(), rows.iter().map(|row| row.b)),
            lb: Some(bounds.lower.clone()),
            ub: Some(bounds.upper.clone()),
        })
    }

    pub fn solve(
        &self,
        u_nom: &Control,
        rows: &[ConstraintRow],
        bounds: &ActuatorBounds,
    ) -> Result<FilteredCommand, FilterError> {
        if !u_nom.iter().all(|v| v.is_finite()) {
            return Err(SolverFailure::NonFinite.into());
        }

        // Nothing to enforce: hand the nominal command back untouched.
        if rows.is_empty() && bounds.contains(u_nom) {
            trace!("no active barrier rows, passing nominal command through");
            return Ok(FilteredCommand {
                command: u_nom.clone(),
                active_constraints: Vec::new(),
                iterations: 0,
            });
        }

        let problem = Self::build_problem(u_nom, rows, bounds)?;
        let solution = problem.solve(&self.settings)?;

        let active_constraints: Vec<usize> = solution
            .active_set
            .iter()
            .filter(|&&index| index < rows.len())
            .map(|&index| rows[index].feature)
            .collect();

        if solution.iterations > 0 {
            debug!(
                iterations = solution.iterations,
                active = ?active_constraints,
                correction = (&solution.x - u_nom).norm(),
                "safety filter modified nominal command"
            );
        }

        Ok(FilteredCommand {
            command: solution.x,
            active_constraints,
            iterations: solution.iterations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    fn row(feature: usize, a: &[f64], b: f64) -> ConstraintRow {
        ConstraintRow {
            feature,
            a: DVector::from_column_slice(a),
            b,
            h: 0.0,
        }
    }

    #[test]
    fn inactive_rows_leave_command_unchanged() {
        let filter = SafetyFilter::default();
        let u_nom = DVector::from_vec(vec![1.0, 2.0, 3.0]);
        let rows = vec![row(0, &[1.0, 0.0, 0.0], 10.0)];
        let out = filter
            .solve(&u_nom, &rows, &ActuatorBounds::symmetric(50.0, 3))
            .unwrap();
        assert_abs_diff_eq!(out.command, u_nom, epsilon = 1e-12);
        assert!(out.active_constraints.is_empty());
        assert!(!out.intervened());
    }

    #[test]
    fn out_of_bounds_nominal_is_clamped() {
        let filter = SafetyFilter::default();
        let bounds = ActuatorBounds::symmetric(1.0, 3);
        let u_nom = DVector::from_vec(vec![3.0, -0.5, -7.0]);
        let out = filter.solve(&u_nom, &[], &bounds).unwrap();
        assert_abs_diff_eq!(out.command, bounds.clamp(&u_nom), epsilon = 1e-12);
        assert!(out.active_constraints.is_empty());
    }

    #[test]
    fn active_rows_are_reported_by_feature() {
        let filter = SafetyFilter::default();
        let u_nom = DVector::from_vec(vec![0.0, 5.0, 0.0]);
        let rows = vec![row(3, &[0.0, 0.0, 1.0], 1.0), row(7, &[0.0, 1.0, 0.0], 1.0)];
        let out = filter
            .solve(&u_nom, &rows, &ActuatorBounds::unbounded(3))
            .unwrap();
        assert_abs_diff_eq!(out.command[1], 1.0, epsilon = 1e-12);
        assert_eq!(out.active_constraints, vec![7]);
    }

    #[test]
    fn solution_is_the_nearest_feasible_point() {
        let filter = SafetyFilter::default();
        let bounds = ActuatorBounds::symmetric(2.0, 3);
        let u_nom = DVector::from_vec(vec![1.5, 3.0, -0.5]);
        let rows = vec![
            row(0, &[0.3, 0.8, 0.0], 0.5),
            row(1, &[-0.2, 0.4, 0.6], 0.2),
        ];
        let best = filter.solve(&u_nom, &rows, &bounds).unwrap().command;
        let best_cost = (&best - &u_nom).norm_squared();

        let feasible = |u: &DVector<f64>| {
            bounds.contains(u) && rows.iter().all(|r| r.slack(u) >= -1e-12)
        };
        assert!(feasible(&best));

        // No feasible perturbation of the solution is closer to the nominal command.
        let steps = [-0.05, 0.0, 0.05];
        for &dx in &steps {
            for &dy in &steps {
                for &dz in &steps {
                    let candidate = &best + DVector::from_vec(vec![dx, dy, dz]);
                    if feasible(&candidate) {
                        assert!((&candidate - &u_nom).norm_squared() >= best_cost - 1e-12);
                    }
                }
            }
        }
    }

    #[test]
    fn infeasible_and_malformed_inputs_are_distinct_errors() {
        let filter = SafetyFilter::default();
        let bounds = ActuatorBounds::symmetric(1.0, 2);
        let u_nom = DVector::from_vec(vec![0.0, 0.0]);

        let needs_too_much = vec![row(0, &[1.0, 0.0], -3.0)];
        assert!(matches!(
            filter.solve(&u_nom, &needs_too_much, &bounds),
            Err(FilterError::Infeasible { .. })
        ));

        let wrong_width = vec![row(0, &[1.0, 0.0, 0.0], 1.0)];
        assert!(matches!(
            filter.solve(&u_nom, &wrong_width, &bounds),
            Err(FilterError::SolverFailure(SolverFailure::Malformed(_)))
        ));

        let nan = DVector::from_vec(vec![f64::NAN, 0.0]);
        assert_eq!(
            filter.solve(&nan, &[], &bounds),
            Err(FilterError::SolverFailure(SolverFailure::NonFinite))
        );
    }

    proptest! {
        #[test]
        fn unconstrained_nominal_passes_through_exactly(
            u in prop::collection::vec(-50.0f64..50.0, 3..=6)
        ) {
            let u_nom = DVector::from_vec(u);
            let bounds = ActuatorBounds::symmetric(50.0, u_nom.len());
            let out = SafetyFilter::default().solve(&u_nom, &[], &bounds).unwrap();
            prop_assert_eq!(out.command, u_nom);
            prop_assert_eq!(out.iterations, 0);
        }

        #[test]
        fn solutions_satisfy_rows_and_kkt(
            a in prop::collection::vec(prop::collection::vec(-1.0f64..1.0, 3), 1..4),
            b in prop::collection::vec(0.0f64..2.0, 4),
            u in prop::collection::vec(-5.0f64..5.0, 3),
        ) {
            // b >= 0 keeps u = 0 feasible, so every generated problem has a solution.
            let rows: Vec<ConstraintRow> = a
                .iter()
                .enumerate()
                .map(|(i, ai)| row(i, ai, b[i]))
                .collect();
            let u_nom = DVector::from_vec(u);
            let bounds = ActuatorBounds::unbounded(3);
            let problem = SafetyFilter::build_problem(&u_nom, &rows, &bounds).unwrap();
            let solution = problem.solve(&QpSettings::default()).unwrap();

            for r in &rows {
                prop_assert!(r.slack(&solution.x) >= -1e-8);
            }
            let m = rows.len();
            let stationarity = (&solution.x - &u_nom) * 2.0
                + problem.g.transpose() * solution.multipliers.rows(0, m);
            prop_assert!(stationarity.norm() < 1e-7);
        }
    }
}
