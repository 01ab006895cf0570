// aperture_core/src/models/dynamics.rs

use nalgebra::DVector;
use std::fmt::Debug;

use crate::types::{Control, State};
use crate::utils::integrators::Integrator;

// --- DYNAMICS MODEL TRAIT ---
// Represents the kinematic model of the agent. `x_dot = f(x, u)`
/// Defines how the translational part of the agent's state evolves under a control input.
pub trait Dynamics: Debug + Send + Sync {
    /// Returns the total number of states (the length of the state vector `x`).
    fn state_dim(&self) -> usize;

    /// Returns the number of control entries this model consumes. The control vector
    /// passed in may be longer (e.g. the 6-DOF command); extra entries are ignored.
    fn control_dim(&self) -> usize;

    /// Computes the time derivative of the state vector: `x_dot = f(x, u, t)`.
    fn derivatives(&self, x: &State, u: &Control, t: f64) -> State;

    /// Propagates the state forward in time using a numerical integrator.
    ///
    /// # Arguments
    /// * `x`: Current state vector.
    /// * `u`: Current control input vector. Assumed constant over `dt`.
    /// * `t`: Current simulation time.
    /// * `dt`: Time step duration. Must be non-negative.
    /// * `integrator`: The scheme to use (e.g., `RK1` for forward Euler).
    ///
    /// # Returns
    /// The state vector at time `t + dt`.
    fn propagate(
        &self,
        x: &State,
        u: &Control,
        t: f64,
        dt: f64,
        integrator: &dyn Integrator<f64>,
    ) -> State {
        assert!(dt >= 0.0, "Dynamics::propagate: dt cannot be negative");
        debug_assert!(
            u.nrows() >= self.control_dim(),
            "control vector too short for dynamics model"
        );

        // Define the closure f(x, t) for the integrator, capturing the current control input 'u'.
        let func = |func_x: &State, func_t: f64| -> State { self.derivatives(func_x, u, func_t) };

        integrator.step(&func, x, t, t + dt)
    }
}

// --- Single Integrator ---
// The first-order agent model: the commanded linear velocity is the velocity.
// State is the world-frame position [px, py, pz]; control starts with [vx, vy, vz].
#[derive(Debug, Default, Clone, Copy)]
pub struct SingleIntegrator;

impl Dynamics for SingleIntegrator {
    fn state_dim(&self) -> usize {
        3
    }

    fn control_dim(&self) -> usize {
        3
    }

    fn derivatives(&self, _x: &State, u: &Control, _t: f64) -> State {
        DVector::from_column_slice(&u.as_slice()[..3])
    }
}
