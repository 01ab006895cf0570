// aperture_sim/src/simulation/core/app_state.rs

use serde::Serialize;

/// Defines the phases of a single run's lifecycle.
///
/// `Initialized -> Running -> Completed | Failed`. The two terminal states are final:
/// a terminal run is never stepped again.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Built from configuration, no step taken yet.
    #[default]
    Initialized,

    /// At least one step has been taken and the horizon is not reached.
    Running,

    /// Every step up to the horizon ran.
    Completed,

    /// A fatal error stopped the run early. The history holds the steps taken before it.
    Failed,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }
}
