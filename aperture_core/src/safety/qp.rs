// aperture_core/src/safety/qp.rs

//! A small dense convex QP solver.
//!
//! Problems have the form
//!
//! ```text
//! minimize    1/2 x^T P x + q^T x
//! subject to  G x <= h
//!             lb <= x <= ub
//! ```
//!
//! and are solved with the Goldfarb-Idnani dual active-set method. The method starts
//! at the unconstrained minimiser and adds the most violated constraint each outer
//! iteration, so it needs no feasible starting point and reports infeasibility
//! directly. Intended for the handful of variables and rows a safety filter produces;
//! every iteration rebuilds the working-set matrices from scratch.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{FilterError, SolverFailure};

// Below this, a search direction or a dual step direction is treated as zero.
const DIRECTION_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QpSettings {
    /// Cap on working-set changes (constraint additions and removals).
    pub max_iterations: usize,
    /// A constraint counts as violated when its slack is below `-feasibility_tolerance`.
    pub feasibility_tolerance: f64,
}

impl Default for QpSettings {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            feasibility_tolerance: 1e-9,
        }
    }
}

/// Problem data. `g` is `m x n` (it may have zero rows), `h` has length `m`.
/// Infinite entries in `lb`/`ub` mean the variable is unbounded on that side.
#[derive(Debug, Clone, PartialEq)]
pub struct QuadraticProgram {
    pub p: DMatrix<f64>,
    pub q: DVector<f64>,
    pub g: DMatrix<f64>,
    pub h: DVector<f64>,
    pub lb: Option<DVector<f64>>,
    pub ub: Option<DVector<f64>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QpSolution {
    pub x: DVector<f64>,
    /// Lagrange multipliers for the `<=` form of every constraint, stacked as
    /// `G` rows, then lower bounds, then upper bounds (length `m + 2n`). They
    /// satisfy `P x + q + G^T l_G - l_lb + l_ub = 0`.
    pub multipliers: DVector<f64>,
    /// Stacked indices of the constraints active at the solution, ascending.
    pub active_set: Vec<usize>,
    pub iterations: usize,
}

// A constraint rewritten as `normal . x >= rhs`.
struct Halfspace {
    normal: DVector<f64>,
    rhs: f64,
    /// Position in the stacked (G, lb, ub) ordering.
    index: usize,
}

impl Halfspace {
    fn slack(&self, x: &DVector<f64>) -> f64 {
        self.normal.dot(x) - self.rhs
    }
}

impl QuadraticProgram {
    pub fn num_variables(&self) -> usize {
        self.q.len()
    }

    pub fn num_rows(&self) -> usize {
        self.g.nrows()
    }

    fn validate(&self) -> Result<(), SolverFailure> {
        let n = self.num_variables();
        let m = self.num_rows();
        if self.p.shape() != (n, n) {
            return Err(SolverFailure::Malformed(format!(
                "P is {}x{}, expected {n}x{n}",
                self.p.nrows(),
                self.p.ncols()
            )));
        }
        if m > 0 && self.g.ncols() != n {
            return Err(SolverFailure::Malformed(format!(
                "G has {} columns, expected {n}",
                self.g.ncols()
            )));
        }
        if self.h.len() != m {
            return Err(SolverFailure::Malformed(format!(
                "h has length {}, expected {m}",
                self.h.len()
            )));
        }
        for (name, bound) in [("lb", &self.lb), ("ub", &self.ub)] {
            if let Some(bound) = bound {
                if bound.len() != n {
                    return Err(SolverFailure::Malformed(format!(
                        "{name} has length {}, expected {n}",
                        bound.len()
                    )));
                }
                if bound.iter().any(|v| v.is_nan()) {
                    return Err(SolverFailure::NonFinite);
                }
            }
        }

        if !all_finite(self.p.iter())
            || !all_finite(self.q.iter())
            || !all_finite(self.g.iter())
            || !all_finite(self.h.iter())
        {
            return Err(SolverFailure::NonFinite);
        }
        Ok(())
    }

    /// Every constraint as a `>=` halfspace. Infinite bounds are dropped.
    fn halfspaces(&self) -> Vec<Halfspace> {
        let n = self.num_variables();
        let m = self.num_rows();
        let mut out = Vec::with_capacity(m + 2 * n);

        for i in 0..m {
            out.push(Halfspace {
                normal: -self.g.row(i).transpose(),
                rhs: -self.h[i],
                index: i,
            });
        }
        if let Some(lb) = &self.lb {
            for (j, &value) in lb.iter().enumerate() {
                if value.is_finite() {
                    out.push(Halfspace {
                        normal: unit(n, j, 1.0),
                        rhs: value,
                        index: m + j,
                    });
                }
            }
        }
        if let Some(ub) = &self.ub {
            for (j, &value) in ub.iter().enumerate() {
                if value.is_finite() {
                    out.push(Halfspace {
                        normal: unit(n, j, -1.0),
                        rhs: -value,
                        index: m + n + j,
                    });
                }
            }
        }
        out
    }

    pub fn solve(&self, settings: &QpSettings) -> Result<QpSolution, FilterError> {
        self.validate()?;
        let n = self.num_variables();
        let m = self.num_rows();

        // Crossed bounds can never be satisfied; report the upper bound that breaks.
        if let (Some(lb), Some(ub)) = (&self.lb, &self.ub) {
            if let Some(j) = (0..n).find(|&j| lb[j] > ub[j]) {
                return Err(FilterError::Infeasible {
                    constraint: m + n + j,
                });
            }
        }

        // --- 1. Unconstrained minimiser ---
        let p_inv = self
            .p
            .clone()
            .cholesky()
            .ok_or(SolverFailure::NotPositiveDefinite)?
            .inverse();
        let mut x = -(&p_inv * &self.q);

        let constraints = self.halfspaces();
        let tol = settings.feasibility_tolerance;

        // Working set: positions into `constraints`, with their (>= form) multipliers.
        let mut active: Vec<usize> = Vec::new();
        let mut lambda: Vec<f64> = Vec::new();
        let mut iterations = 0usize;

        // --- 2. Outer loop: pick the most violated constraint ---
        loop {
            let violated = constraints
                .iter()
                .enumerate()
                .filter(|(k, _)| !active.contains(k))
                .map(|(k, c)| (k, c.slack(&x)))
                .filter(|&(_, s)| s < -tol)
                .min_by(|a, b| a.1.total_cmp(&b.1));

            let Some((added, _)) = violated else {
                break;
            };
            let np = &constraints[added].normal;
            let mut lambda_added = 0.0;

            // --- 3. Inner loop: move until `added` is satisfied, dropping blockers ---
            loop {
                iterations += 1;
                if iterations > settings.max_iterations {
                    return Err(SolverFailure::IterationLimit(settings.max_iterations).into());
                }

                let (z, r) = step_directions(&p_inv, &constraints, &active, np)?;

                // Dual step length: the first active multiplier to hit zero.
                let mut dual_step = f64::INFINITY;
                let mut blocking = None;
                for (k, &rk) in r.iter().enumerate() {
                    if rk > DIRECTION_EPSILON {
                        let ratio = lambda[k].max(0.0) / rk;
                        if ratio < dual_step {
                            dual_step = ratio;
                            blocking = Some(k);
                        }
                    }
                }

                // Primal step length: what it takes to make `added` tight.
                let curvature = z.dot(np);
                let primal_step = if curvature > DIRECTION_EPSILON * np.norm_squared() {
                    -constraints[added].slack(&x) / curvature
                } else {
                    f64::INFINITY
                };

                let step = dual_step.min(primal_step);
                if !step.is_finite() {
                    return Err(FilterError::Infeasible {
                        constraint: constraints[added].index,
                    });
                }

                if primal_step.is_finite() {
                    x += step * &z;
                }
                for (lk, rk) in lambda.iter_mut().zip(r.iter()) {
                    *lk -= step * rk;
                }
                lambda_added += step;

                if primal_step <= dual_step {
                    // Full step: `added` joins the working set.
                    active.push(added);
                    lambda.push(lambda_added);
                    trace!(constraint = constraints[added].index, "constraint added to working set");
                    break;
                }

                // Partial step: drop the blocking constraint and try again.
                if let Some(k) = blocking {
                    trace!(constraint = constraints[active[k]].index, "constraint dropped from working set");
                    active.remove(k);
                    lambda.remove(k);
                }
            }
        }

        // --- 4. Verify ---
        if !x.iter().all(|v| v.is_finite()) {
            return Err(SolverFailure::NonFinite.into());
        }
        for c in &constraints {
            let s = c.slack(&x);
            if s < -tol {
                return Err(SolverFailure::ConstraintViolation {
                    constraint: c.index,
                    violation: -s,
                }
                .into());
            }
        }

        let mut multipliers = DVector::zeros(m + 2 * n);
        let mut active_set = Vec::with_capacity(active.len());
        for (&k, &l) in active.iter().zip(lambda.iter()) {
            let index = constraints[k].index;
            multipliers[index] = l.max(0.0);
            active_set.push(index);
        }
        active_set.sort_unstable();

        Ok(QpSolution {
            x,
            multipliers,
            active_set,
            iterations,
        })
    }
}

fn all_finite<'a>(mut values: impl Iterator<Item = &'a f64>) -> bool {
    values.all(|v| v.is_finite())
}

fn unit(n: usize, j: usize, sign: f64) -> DVector<f64> {
    let mut e = DVector::zeros(n);
    e[j] = sign;
    e
}

/// Primal direction `z = H n_p` and dual direction `r = N* n_p` for the current
/// working set, where `N* = (N^T P^-1 N)^-1 N^T P^-1` and `H = P^-1 - P^-1 N N*`.
fn step_directions(
    p_inv: &DMatrix<f64>,
    constraints: &[Halfspace],
    active: &[usize],
    np: &DVector<f64>,
) -> Result<(DVector<f64>, DVector<f64>), SolverFailure> {
    if active.is_empty() {
        return Ok((p_inv * np, DVector::zeros(0)));
    }

    let columns: Vec<DVector<f64>> = active
        .iter()
        .map(|&k| constraints[k].normal.clone())
        .collect();
    let normals = DMatrix::from_columns(&columns);

    let p_inv_n = p_inv * &normals;
    let gram = normals.transpose() * &p_inv_n;
    let gram_inv = gram
        .try_inverse()
        .ok_or(SolverFailure::SingularWorkingSet)?;
    let n_star = &gram_inv * p_inv_n.transpose();

    let r = &n_star * np;
    let z = p_inv * np - &p_inv_n * &r;
    Ok((z, r))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn nearest_point(target: &[f64], g: DMatrix<f64>, h: DVector<f64>) -> QuadraticProgram {
        let n = target.len();
        QuadraticProgram {
            p: DMatrix::identity(n, n) * 2.0,
            q: DVector::from_column_slice(target) * -2.0,
            g,
            h,
            lb: None,
            ub: None,
        }
    }

    fn assert_kkt(qp: &QuadraticProgram, sol: &QpSolution) {
        let n = qp.num_variables();
        let m = qp.num_rows();
        let mut residual = &qp.p * &sol.x + &qp.q;
        if m > 0 {
            residual += qp.g.transpose() * sol.multipliers.rows(0, m);
        }
        residual -= sol.multipliers.rows(m, n);
        residual += sol.multipliers.rows(m + n, n);
        assert_abs_diff_eq!(residual.norm(), 0.0, epsilon = 1e-9);
        assert!(sol.multipliers.iter().all(|&l| l >= 0.0));
    }

    #[test]
    fn unconstrained_problem_returns_minimiser() {
        let qp = nearest_point(&[1.0, -2.0], DMatrix::zeros(0, 2), DVector::zeros(0));
        let sol = qp.solve(&QpSettings::default()).unwrap();
        assert_abs_diff_eq!(sol.x, DVector::from_vec(vec![1.0, -2.0]), epsilon = 1e-12);
        assert!(sol.active_set.is_empty());
        assert_eq!(sol.iterations, 0);
    }

    #[test]
    fn projects_onto_halfspace() {
        // Nearest point to (2, 2) with x + y <= 1 is (0.5, 0.5).
        let qp = nearest_point(
            &[2.0, 2.0],
            DMatrix::from_row_slice(1, 2, &[1.0, 1.0]),
            DVector::from_vec(vec![1.0]),
        );
        let sol = qp.solve(&QpSettings::default()).unwrap();
        assert_abs_diff_eq!(sol.x, DVector::from_vec(vec![0.5, 0.5]), epsilon = 1e-12);
        assert_eq!(sol.active_set, vec![0]);
        assert_abs_diff_eq!(sol.multipliers[0], 3.0, epsilon = 1e-12);
        assert_kkt(&qp, &sol);
    }

    #[test]
    fn corner_of_two_halfspaces_and_a_box() {
        let mut qp = nearest_point(
            &[3.0, 3.0, 3.0],
            DMatrix::from_row_slice(2, 3, &[1.0, 0.0, 0.0, 0.0, 1.0, 1.0]),
            DVector::from_vec(vec![1.0, 2.0]),
        );
        qp.lb = Some(DVector::from_element(3, -5.0));
        qp.ub = Some(DVector::from_vec(vec![f64::INFINITY, f64::INFINITY, 0.5]));
        let sol = qp.solve(&QpSettings::default()).unwrap();
        assert_abs_diff_eq!(sol.x, DVector::from_vec(vec![1.0, 1.5, 0.5]), epsilon = 1e-12);
        // Row 0, row 1 and the upper bound on x2 (stacked index 2 + 3 + 2).
        assert_eq!(sol.active_set, vec![0, 1, 7]);
        assert_kkt(&qp, &sol);
    }

    #[test]
    fn drops_constraints_that_stop_binding() {
        // x >= 2 is the most violated row at the origin and enters first. Satisfying
        // 0.1 x + 0.1 y >= 1 afterwards drives its multiplier to zero, so it leaves
        // the working set and the answer is the projection onto the second row alone.
        let qp = nearest_point(
            &[0.0, 0.0],
            DMatrix::from_row_slice(2, 2, &[-1.0, 0.0, -0.1, -0.1]),
            DVector::from_vec(vec![-2.0, -1.0]),
        );
        let sol = qp.solve(&QpSettings::default()).unwrap();
        assert_abs_diff_eq!(sol.x, DVector::from_vec(vec![5.0, 5.0]), epsilon = 1e-9);
        assert_eq!(sol.active_set, vec![1]);
        assert_eq!(sol.multipliers[0], 0.0);
        assert_abs_diff_eq!(sol.multipliers[1], 100.0, epsilon = 1e-7);
        assert_eq!(sol.iterations, 3);
        assert_kkt(&qp, &sol);
    }

    #[test]
    fn contradictory_rows_are_infeasible() {
        // x <= -1 and -x <= -1 (x >= 1).
        let qp = nearest_point(
            &[0.0],
            DMatrix::from_row_slice(2, 1, &[1.0, -1.0]),
            DVector::from_vec(vec![-1.0, -1.0]),
        );
        let err = qp.solve(&QpSettings::default()).unwrap_err();
        assert!(matches!(err, FilterError::Infeasible { .. }));
    }

    #[test]
    fn zero_row_with_negative_bound_is_infeasible() {
        let qp = nearest_point(
            &[0.0, 0.0],
            DMatrix::zeros(1, 2),
            DVector::from_vec(vec![-0.1]),
        );
        assert_eq!(
            qp.solve(&QpSettings::default()),
            Err(FilterError::Infeasible { constraint: 0 })
        );
    }

    #[test]
    fn row_conflicting_with_box_is_infeasible() {
        let mut qp = nearest_point(
            &[0.0, 0.0],
            DMatrix::from_row_slice(1, 2, &[1.0, 0.0]),
            DVector::from_vec(vec![-2.0]),
        );
        qp.lb = Some(DVector::from_element(2, -1.0));
        qp.ub = Some(DVector::from_element(2, 1.0));
        assert!(matches!(
            qp.solve(&QpSettings::default()),
            Err(FilterError::Infeasible { .. })
        ));
    }

    #[test]
    fn crossed_bounds_are_infeasible() {
        let mut qp = nearest_point(&[0.0], DMatrix::zeros(0, 1), DVector::zeros(0));
        qp.lb = Some(DVector::from_vec(vec![1.0]));
        qp.ub = Some(DVector::from_vec(vec![-1.0]));
        // No rows and one variable: the upper bound is stacked index 1.
        assert_eq!(
            qp.solve(&QpSettings::default()),
            Err(FilterError::Infeasible { constraint: 1 })
        );
    }

    #[test]
    fn numerical_failures_are_not_infeasibility() {
        let mut qp = nearest_point(&[f64::NAN, 0.0], DMatrix::zeros(0, 2), DVector::zeros(0));
        assert_eq!(
            qp.solve(&QpSettings::default()),
            Err(FilterError::SolverFailure(SolverFailure::NonFinite))
        );

        qp.q = DVector::zeros(2);
        qp.p = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, -1.0]);
        assert_eq!(
            qp.solve(&QpSettings::default()),
            Err(FilterError::SolverFailure(SolverFailure::NotPositiveDefinite))
        );

        qp.p = DMatrix::identity(3, 3);
        assert!(matches!(
            qp.solve(&QpSettings::default()),
            Err(FilterError::SolverFailure(SolverFailure::Malformed(_)))
        ));
    }

    #[test]
    fn iteration_cap_is_reported() {
        let qp = nearest_point(
            &[2.0, 2.0],
            DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, 1.0]),
            DVector::from_vec(vec![0.0, 0.0]),
        );
        let settings = QpSettings {
            max_iterations: 1,
            ..Default::default()
        };
        assert_eq!(
            qp.solve(&settings),
            Err(FilterError::SolverFailure(SolverFailure::IterationLimit(1)))
        );
    }
}
