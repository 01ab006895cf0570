// aperture_sim/src/simulation/core/state.rs

use aperture_core::prelude::{AgentState, Control, Feature};

use crate::simulation::core::app_state::RunStatus;

/// Everything that changes between steps. The runner consumes one of these and
/// produces the next; nothing else holds mutable simulation state.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationState {
    /// Index of the next step to take. The step starts at `t = step * dt`.
    pub step: usize,
    pub agent: AgentState,
    /// Features evaluated at the start of step `step`.
    pub features: Vec<Feature>,
    /// Command applied on the previous step, used by the hold-last fallback.
    pub last_command: Control,
    pub consecutive_failures: usize,
    pub status: RunStatus,
}

impl SimulationState {
    pub fn new(agent: AgentState, features: Vec<Feature>, control_dim: usize) -> Self {
        Self {
            step: 0,
            agent,
            features,
            last_command: Control::zeros(control_dim),
            consecutive_failures: 0,
            status: RunStatus::Initialized,
        }
    }

    pub fn time(&self, dt: f64) -> f64 {
        self.step as f64 * dt
    }
}
