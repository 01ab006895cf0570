// aperture_core/src/control/pd.rs

use nalgebra::Vector3;

use crate::control::trajectory::SinusoidalTrajectory;
use crate::control::{NominalCommand, NominalController};
use crate::types::AgentState;

/// Velocity-level PD tracking of a closed-form trajectory:
///
/// `u_nom = v_des - Kp (p - p_des) - Kd (v - v_des)`
///
/// with diagonal gains stored as per-axis vectors. The law does not command any
/// angular rate; in full 6-DOF mode the nominal angular rate is zero and the safety
/// filter is free to add rotation when it needs to.
#[derive(Debug, Clone, PartialEq)]
pub struct PdTrackingController {
    pub trajectory: SinusoidalTrajectory,
    pub kp: Vector3<f64>,
    pub kd: Vector3<f64>,
}

impl PdTrackingController {
    pub fn new(trajectory: SinusoidalTrajectory, kp: Vector3<f64>, kd: Vector3<f64>) -> Self {
        Self { trajectory, kp, kd }
    }

    pub fn with_scalar_gains(trajectory: SinusoidalTrajectory, kp: f64, kd: f64) -> Self {
        Self::new(trajectory, Vector3::repeat(kp), Vector3::repeat(kd))
    }
}

impl NominalController for PdTrackingController {
    fn compute(&self, t: f64, state: &AgentState) -> NominalCommand {
        let desired_position = self.trajectory.position(t);
        let desired_velocity = self.trajectory.velocity(t);

        let position_error = state.position - desired_position;
        let velocity_error = state.velocity - desired_velocity;

        let linear = desired_velocity
            - self.kp.component_mul(&position_error)
            - self.kd.component_mul(&velocity_error);

        NominalCommand {
            linear,
            angular: Vector3::zeros(),
            desired_position,
            desired_velocity,
        }
    }
}
