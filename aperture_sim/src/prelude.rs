// aperture_sim/src/prelude.rs

// Re-export the entire aperture_core prelude so the pure types (`AgentState`,
// `SafetyFilter`, `FovBarrier`, ...) are available everywhere in this crate.
pub use aperture_core::prelude::*;

// Re-export common simulation-specific types.
pub use crate::error::{ConfigError, ExportError, SimulationError};
pub use crate::simulation::config::structs::*;
pub use crate::simulation::config::{load_scenario, load_scenario_str};
pub use crate::simulation::core::app_state::RunStatus;
pub use crate::simulation::core::prng::SimulationRng;
pub use crate::simulation::core::state::SimulationState;
pub use crate::simulation::history::{FailureKind, RunFailure, RunHistory, Snapshot, StepStatus};
pub use crate::simulation::runner::{Simulation, StepOutcome};
pub use crate::simulation::sweep::{run_sweep, SweepResult, SweepSettings};
