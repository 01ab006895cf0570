// aperture_core/src/control/mod.rs

pub mod pd;
pub mod trajectory;

use nalgebra::{DVector, Vector3};

use crate::types::{AgentState, Control, ControlMode};

/// The nominal (unfiltered) command for one step, together with the reference it
/// was computed from so the run history can show tracking error.
#[derive(Debug, Clone, PartialEq)]
pub struct NominalCommand {
    /// Desired world-frame linear velocity.
    pub linear: Vector3<f64>,
    /// Desired body-frame angular rate. Only used in full 6-DOF mode.
    pub angular: Vector3<f64>,
    pub desired_position: Vector3<f64>,
    pub desired_velocity: Vector3<f64>,
}

impl NominalCommand {
    /// Packs the command into the QP decision-vector layout for `mode`.
    pub fn to_control(&self, mode: ControlMode) -> Control {
        match mode {
            ControlMode::Translational => DVector::from_column_slice(self.linear.as_slice()),
            ControlMode::Full => DVector::from_iterator(
                6,
                self.linear.iter().chain(self.angular.iter()).copied(),
            ),
        }
    }
}

/// A feedback law producing the nominal command the safety filter starts from.
///
/// Implementations are pure: the same `(t, state)` must always produce the same command.
pub trait NominalController: std::fmt::Debug + Send + Sync {
    fn compute(&self, t: f64, state: &AgentState) -> NominalCommand;
}
