// aperture_core/src/safety/barrier.rs

use nalgebra::{DVector, Matrix3, Rotation3, Vector3};
use tracing::debug;

use crate::diagnostics::Diagnostic;
use crate::models::camera::CameraModel;
use crate::models::feature::Feature;
use crate::types::{AgentState, ControlMode};

/// Features closer than this are treated as coincident with the camera.
pub const DEFAULT_MIN_RANGE: f64 = 1e-6;

/// One linear CBF constraint `a . u <= b` on the decision vector.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintRow {
    /// Index of the feature this row protects.
    pub feature: usize,
    pub a: DVector<f64>,
    pub b: f64,
    /// Barrier value the row was built from.
    pub h: f64,
}

impl ConstraintRow {
    /// `b - a . u`. Non-negative when `u` satisfies the row.
    pub fn slack(&self, u: &DVector<f64>) -> f64 {
        self.b - self.a.dot(u)
    }
}

/// Everything the barrier model produced for one step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BarrierEvaluation {
    /// One row per non-degenerate feature, in feature order.
    pub rows: Vec<ConstraintRow>,
    /// Barrier value per feature, `None` where the geometry was degenerate.
    pub h_values: Vec<Option<f64>>,
    pub diagnostics: Vec<Diagnostic>,
}

impl BarrierEvaluation {
    pub fn min_h(&self) -> Option<f64> {
        self.h_values.iter().flatten().copied().reduce(f64::min)
    }
}

/// Gradient of `z . r/|r|` with respect to `r`: `(I - n n^T) z / |r|`.
///
/// This is the sensitivity of the barrier to the relative position, so
/// `dh/dt` picks up `g . (v_feature - v_agent)`.
pub fn line_of_sight_gradient(r: &Vector3<f64>, z: &Vector3<f64>) -> Vector3<f64> {
    let range = r.norm();
    let n = r / range;
    let projector = Matrix3::identity() - n * n.transpose();
    projector * z / range
}

/// Coefficients `c` such that the boresight contribution to `dh/dt` is `c . omega_body`.
///
/// With `z = R b` and `R_dot = R [omega]x`, `z_dot . n = (omega x b) . (R^T n) = omega . (b x R^T n)`.
pub fn boresight_rate_coefficients(
    attitude: &Rotation3<f64>,
    boresight_body: &Vector3<f64>,
    n: &Vector3<f64>,
) -> Vector3<f64> {
    boresight_body.cross(&(attitude.inverse() * n))
}

/// The field-of-view barrier `h = z . n - cos(a)` and its first-order CBF rows.
///
/// `h >= 0` exactly when the feature lies inside the visibility cone. The CBF
/// condition `h_dot + alpha h >= 0` is linear in the command and becomes
///
/// * `a_v = g`, `a_w = -c` (the angular part only exists in full mode)
/// * `b = alpha h + g . v_feature` (+ `c . omega` when the angular rate is not a decision variable)
#[derive(Debug, Clone, PartialEq)]
pub struct FovBarrier {
    pub camera: CameraModel,
    /// Class-K gain. Larger values let the feature approach the cone edge faster.
    pub alpha: f64,
    pub min_range: f64,
}

impl FovBarrier {
    pub fn new(camera: CameraModel, alpha: f64) -> Self {
        Self {
            camera,
            alpha,
            min_range: DEFAULT_MIN_RANGE,
        }
    }

    pub fn with_min_range(mut self, min_range: f64) -> Self {
        self.min_range = min_range;
        self
    }

    /// `h` for a single feature position, or `None` if the feature is within
    /// `min_range` of the camera.
    pub fn barrier_value(&self, state: &AgentState, feature_position: &Vector3<f64>) -> Option<f64> {
        let r = feature_position - state.position;
        let range = r.norm();
        if !(range >= self.min_range) {
            return None;
        }
        let z = self.camera.boresight_world(&state.attitude);
        Some(z.dot(&(r / range)) - self.camera.cos_aperture())
    }

    /// Builds the CBF row for one feature. `Err` carries the diagnostic when the
    /// geometry is degenerate and the feature has to be skipped.
    pub fn constraint_row(
        &self,
        index: usize,
        state: &AgentState,
        feature: &Feature,
        mode: ControlMode,
    ) -> Result<ConstraintRow, Diagnostic> {
        let r = feature.position - state.position;
        let range = r.norm();
        if !(range >= self.min_range) {
            return Err(Diagnostic::DegenerateFeatureGeometry {
                feature: index,
                range,
            });
        }

        // 1. Geometry
        let n = r / range;
        let z = self.camera.boresight_world(&state.attitude);
        let h = z.dot(&n) - self.camera.cos_aperture();

        // 2. Sensitivities
        let g = line_of_sight_gradient(&r, &z);
        let c = boresight_rate_coefficients(
            &state.attitude,
            &self.camera.boresight_body().into_inner(),
            &n,
        );

        // 3. Assemble a . u <= b
        let mut b = self.alpha * h + g.dot(&feature.velocity);
        let a = match mode {
            ControlMode::Translational => {
                // The angular rate is part of the state here, so it is a known drift.
                b += c.dot(&state.angular_velocity);
                DVector::from_column_slice(g.as_slice())
            }
            ControlMode::Full => {
                DVector::from_iterator(6, g.iter().copied().chain(c.iter().map(|ci| -ci)))
            }
        };

        Ok(ConstraintRow {
            feature: index,
            a,
            b,
            h,
        })
    }

    /// Rows, barrier values and diagnostics for every feature, in feature order.
    pub fn evaluate(
        &self,
        state: &AgentState,
        features: &[Feature],
        mode: ControlMode,
    ) -> BarrierEvaluation {
        let mut eval = BarrierEvaluation {
            rows: Vec::with_capacity(features.len()),
            h_values: Vec::with_capacity(features.len()),
            diagnostics: Vec::new(),
        };

        for (index, feature) in features.iter().enumerate() {
            match self.constraint_row(index, state, feature, mode) {
                Ok(row) => {
                    eval.h_values.push(Some(row.h));
                    eval.rows.push(row);
                }
                Err(diagnostic) => {
                    debug!(feature = index, name = %feature.name, "skipping degenerate feature geometry");
                    eval.h_values.push(None);
                    eval.diagnostics.push(diagnostic);
                }
            }
        }
        eval
    }
}
