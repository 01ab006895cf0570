// aperture_core/src/error.rs

use thiserror::Error;

/// Errors produced while assembling or solving the safety-filter QP.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FilterError {
    /// No command satisfies every barrier row and the actuator bounds at once.
    /// `constraint` is the stacked index (`G` rows, then lower, then upper bounds)
    /// of the row that could not be added to the working set.
    #[error("safety filter QP is infeasible (constraint {constraint} cannot be satisfied)")]
    Infeasible { constraint: usize },

    /// Numerical trouble inside the solver. Logged separately from infeasibility
    /// because it points at conditioning rather than geometry.
    #[error("safety filter QP solver failure: {0}")]
    SolverFailure(#[from] SolverFailure),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SolverFailure {
    #[error("no convergence after {0} iterations")]
    IterationLimit(usize),

    #[error("working set became linearly dependent")]
    SingularWorkingSet,

    #[error("objective matrix is not positive definite")]
    NotPositiveDefinite,

    #[error("problem data contains NaN or infinite values")]
    NonFinite,

    #[error("malformed problem: {0}")]
    Malformed(String),

    #[error("solution violates constraint {constraint} by {violation:e}")]
    ConstraintViolation { constraint: usize, violation: f64 },
}

/// Errors from the attitude / camera geometry.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum KinematicsError {
    /// The attitude drifted too far from SO(3) to be re-projected safely.
    #[error(
        "attitude is not a rotation (orthogonality error {orthogonality_error:e}, determinant {determinant})"
    )]
    DegenerateAttitude {
        orthogonality_error: f64,
        determinant: f64,
    },

    #[error("camera aperture must lie in (0, pi/2) rad, got {0}")]
    InvalidAperture(f64),

    #[error("camera boresight must be a finite, non-zero vector")]
    InvalidBoresight,
}
