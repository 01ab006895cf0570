// aperture_core/src/types.rs

use nalgebra::{DVector, Rotation3, Vector3};
use serde::{Deserialize, Serialize};

// --- Core Type Aliases ---
pub type State = DVector<f64>;
pub type Control = DVector<f64>;

/// Which quantities the safety filter is allowed to change.
///
/// In `Translational` mode the decision vector is the world-frame linear velocity
/// `[vx, vy, vz]` and the attitude only evolves under the agent's own (uncontrolled)
/// angular velocity. In `Full` mode the decision vector is `[vx, vy, vz, wx, wy, wz]`
/// with the angular rate expressed in the body frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlMode {
    #[default]
    Translational,
    Full,
}

impl ControlMode {
    /// Number of entries in the control decision vector `u`.
    pub fn control_dim(self) -> usize {
        match self {
            ControlMode::Translational => 3,
            ControlMode::Full => 6,
        }
    }
}

/// The full kinematic state of the camera-carrying agent.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentState {
    /// Position in the world frame.
    pub position: Vector3<f64>,
    /// Velocity in the world frame. For the first-order model this is the last
    /// linear command that was applied.
    pub velocity: Vector3<f64>,
    /// Rotation FROM the body frame TO the world frame.
    pub attitude: Rotation3<f64>,
    /// Angular velocity expressed in the body frame.
    pub angular_velocity: Vector3<f64>,
}

impl AgentState {
    /// An agent at rest at `position` with the given attitude.
    pub fn at_rest(position: Vector3<f64>, attitude: Rotation3<f64>) -> Self {
        Self {
            position,
            velocity: Vector3::zeros(),
            attitude,
            angular_velocity: Vector3::zeros(),
        }
    }
}

impl Default for AgentState {
    fn default() -> Self {
        Self::at_rest(Vector3::zeros(), Rotation3::identity())
    }
}
