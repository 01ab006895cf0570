// aperture_core/src/models/feature.rs

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::control::trajectory::SinusoidalTrajectory;

/// How a tracked feature moves through the world. Every variant is a closed form in
/// time, so a feature's state at `t` never depends on the step size.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "PascalCase")]
pub enum FeatureMotion {
    #[default]
    Static,
    /// `p(t) = origin + velocity * t`
    ConstantVelocity { velocity: Vector3<f64> },
    /// `p(t) = origin + trajectory(t)`
    Sinusoidal { trajectory: SinusoidalTrajectory },
}

/// A point of interest that must stay inside the camera's field of view.
///
/// Features are identified by their index in the scenario's feature list; the index
/// fixes the order of the barrier rows handed to the QP.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub name: String,
    /// Reference point of the motion model (the position at `t = 0` for the
    /// static and constant-velocity models).
    pub origin: Vector3<f64>,
    /// World position at the current simulation time.
    pub position: Vector3<f64>,
    /// World velocity at the current simulation time. Enters the barrier as a known drift.
    pub velocity: Vector3<f64>,
    pub motion: FeatureMotion,
}

impl Feature {
    /// Creates a feature and places it at its `t = 0` position.
    pub fn new(name: impl Into<String>, origin: Vector3<f64>, motion: FeatureMotion) -> Self {
        let mut feature = Self {
            name: name.into(),
            origin,
            position: origin,
            velocity: Vector3::zeros(),
            motion,
        };
        feature.advance_to(0.0);
        feature
    }

    pub fn stationary(name: impl Into<String>, position: Vector3<f64>) -> Self {
        Self::new(name, position, FeatureMotion::Static)
    }

    /// Evaluates the motion model at absolute time `t`.
    pub fn advance_to(&mut self, t: f64) {
        let (position, velocity) = match &self.motion {
            FeatureMotion::Static => (self.origin, Vector3::zeros()),
            FeatureMotion::ConstantVelocity { velocity } => {
                (self.origin + velocity * t, *velocity)
            }
            FeatureMotion::Sinusoidal { trajectory } => (
                self.origin + trajectory.position(t),
                trajectory.velocity(t),
            ),
        };
        self.position = position;
        self.velocity = velocity;
    }

    pub fn is_moving(&self) -> bool {
        !matches!(self.motion, FeatureMotion::Static)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::trajectory::{AxisTrajectory, SinusoidTerm};
    use approx::assert_abs_diff_eq;
    use std::f64::consts::PI;

    #[test]
    fn static_feature_never_moves() {
        let mut f = Feature::stationary("target", Vector3::new(5.0, 0.0, 0.0));
        f.advance_to(12.5);
        assert_eq!(f.position, Vector3::new(5.0, 0.0, 0.0));
        assert_eq!(f.velocity, Vector3::zeros());
        assert!(!f.is_moving());
    }

    #[test]
    fn constant_velocity_feature_is_evaluated_in_closed_form() {
        let motion = FeatureMotion::ConstantVelocity {
            velocity: Vector3::new(0.0, 1.0, -0.5),
        };
        let mut f = Feature::new("drone", Vector3::new(5.0, 0.0, 2.0), motion);
        f.advance_to(2.0);
        assert_abs_diff_eq!(f.position, Vector3::new(5.0, 2.0, 1.0), epsilon = 1e-12);
        // Going back in time is just another evaluation.
        f.advance_to(0.0);
        assert_abs_diff_eq!(f.position, Vector3::new(5.0, 0.0, 2.0), epsilon = 1e-12);
    }

    #[test]
    fn sinusoidal_feature_oscillates_about_origin() {
        let trajectory = SinusoidalTrajectory {
            z: AxisTrajectory::single(SinusoidTerm::new(2.0, PI, 0.0)),
            ..Default::default()
        };
        let mut f = Feature::new(
            "buoy",
            Vector3::new(4.0, 0.0, 0.0),
            FeatureMotion::Sinusoidal { trajectory },
        );
        f.advance_to(0.5);
        assert_abs_diff_eq!(f.position, Vector3::new(4.0, 0.0, 2.0), epsilon = 1e-12);
        assert_abs_diff_eq!(f.velocity.z, 0.0, epsilon = 1e-12);
        f.advance_to(1.0);
        assert_abs_diff_eq!(f.velocity.z, -2.0 * PI, epsilon = 1e-12);
    }
}
