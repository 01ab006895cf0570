// aperture_sim/src/error.rs

use std::path::PathBuf;

use aperture_core::error::{FilterError, KinematicsError};
use thiserror::Error;

use crate::simulation::core::app_state::RunStatus;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("scenario file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to parse scenario '{origin}': {source}")]
    Parse {
        origin: String,
        #[source]
        source: Box<figment::Error>,
    },

    #[error("invalid scenario: {0}")]
    Invalid(String),

    #[error("invalid camera or attitude: {0}")]
    Kinematics(#[from] KinematicsError),
}

/// Errors that end a run. Everything recoverable is handled inside the step.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimulationError {
    #[error("safety filter failed {consecutive} steps in a row (last at step {step})")]
    FilterExhausted {
        step: usize,
        consecutive: usize,
        #[source]
        source: FilterError,
    },

    #[error("attitude degenerated at step {step}")]
    DegenerateAttitude {
        step: usize,
        #[source]
        source: KinematicsError,
    },

    #[error("cannot step a run that is already {0:?}")]
    Terminated(RunStatus),
}

impl SimulationError {
    /// The step index the error occurred at, if it happened inside a step.
    pub fn step(&self) -> Option<usize> {
        match self {
            SimulationError::FilterExhausted { step, .. }
            | SimulationError::DegenerateAttitude { step, .. } => Some(*step),
            SimulationError::Terminated(_) => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("could not write export file: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not serialize run history: {0}")]
    Json(#[from] serde_json::Error),
}
