// aperture_sim/src/simulation/history.rs

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use aperture_core::prelude::{Diagnostic, EulerAngles};
use serde::Serialize;
use tracing::info;

use crate::error::{ExportError, SimulationError};
use crate::simulation::core::app_state::RunStatus;

/// How the applied command of a step came about.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepStatus {
    /// The filter ran and left the nominal command as it was.
    Nominal,
    /// The filter changed the nominal command.
    Filtered {
        active_features: Vec<usize>,
        iterations: usize,
    },
    /// The filter is disabled; the nominal command was applied directly.
    Unfiltered,
    /// The filter failed and the fallback policy supplied the command.
    Fallback { reason: String, consecutive: usize },
}

/// One row of the run log, taken at the start of a step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub step: usize,
    pub t: f64,
    pub position: [f64; 3],
    pub velocity: [f64; 3],
    /// Body-to-world rotation, row-major.
    pub attitude: [[f64; 3]; 3],
    /// Attitude in the scenario's Euler sequence, radians.
    pub attitude_angles: EulerAngles,
    pub nominal_command: Vec<f64>,
    pub filtered_command: Vec<f64>,
    pub desired_position: [f64; 3],
    /// Barrier value per feature before the command is applied.
    pub per_feature_h: Vec<Option<f64>>,
    /// Barrier value per feature after integrating the step.
    pub per_feature_h_next: Vec<Option<f64>>,
    pub status: StepStatus,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    FilterExhausted,
    DegenerateAttitude,
    Terminated,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunFailure {
    pub kind: FailureKind,
    pub step: Option<usize>,
    pub message: String,
}

impl From<&SimulationError> for RunFailure {
    fn from(err: &SimulationError) -> Self {
        let kind = match err {
            SimulationError::FilterExhausted { .. } => FailureKind::FilterExhausted,
            SimulationError::DegenerateAttitude { .. } => FailureKind::DegenerateAttitude,
            SimulationError::Terminated(_) => FailureKind::Terminated,
        };
        // Include the source chain; the top-level message alone hides the solver error.
        let mut message = err.to_string();
        let mut source = std::error::Error::source(err);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        Self {
            kind,
            step: err.step(),
            message,
        }
    }
}

/// The ordered record of a run plus how it ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunHistory {
    pub dt: f64,
    pub filter_enabled: bool,
    pub feature_names: Vec<String>,
    pub status: RunStatus,
    pub failure: Option<RunFailure>,
    pub snapshots: Vec<Snapshot>,
}

impl RunHistory {
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Smallest pre-step barrier value over every step and feature.
    pub fn min_h(&self) -> Option<f64> {
        self.snapshots
            .iter()
            .flat_map(|s| s.per_feature_h.iter().flatten())
            .copied()
            .reduce(f64::min)
    }

    /// Smallest post-step barrier value over every step and feature.
    pub fn min_h_next(&self) -> Option<f64> {
        self.snapshots
            .iter()
            .flat_map(|s| s.per_feature_h_next.iter().flatten())
            .copied()
            .reduce(f64::min)
    }

    /// Index of the first step whose pre-step barrier is negative for any feature.
    pub fn first_violation(&self) -> Option<usize> {
        self.snapshots
            .iter()
            .find(|s| s.per_feature_h.iter().flatten().any(|&h| h < 0.0))
            .map(|s| s.step)
    }

    pub fn fallback_count(&self) -> usize {
        self.snapshots
            .iter()
            .filter(|s| matches!(s.status, StepStatus::Fallback { .. }))
            .count()
    }

    pub fn to_json(&self) -> Result<String, ExportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Writes the history as pretty-printed JSON.
    pub fn export_json(&self, path: &Path) -> Result<(), ExportError> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        info!("Run history written to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(step: usize, h: Vec<Option<f64>>, status: StepStatus) -> Snapshot {
        Snapshot {
            step,
            t: step as f64 * 0.1,
            position: [0.0; 3],
            velocity: [0.0; 3],
            attitude: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            attitude_angles: EulerAngles::default(),
            nominal_command: vec![0.0; 3],
            filtered_command: vec![0.0; 3],
            desired_position: [0.0; 3],
            per_feature_h_next: h.clone(),
            per_feature_h: h,
            status,
            diagnostics: Vec::new(),
        }
    }

    fn history() -> RunHistory {
        RunHistory {
            dt: 0.1,
            filter_enabled: true,
            feature_names: vec!["a".into(), "b".into()],
            status: RunStatus::Completed,
            failure: None,
            snapshots: vec![
                snapshot(0, vec![Some(0.3), None], StepStatus::Nominal),
                snapshot(1, vec![Some(0.1), Some(-0.2)], StepStatus::Unfiltered),
                snapshot(
                    2,
                    vec![Some(0.2), Some(0.05)],
                    StepStatus::Fallback {
                        reason: "infeasible".into(),
                        consecutive: 1,
                    },
                ),
            ],
        }
    }

    #[test]
    fn summaries_skip_missing_features() {
        let h = history();
        assert_eq!(h.min_h(), Some(-0.2));
        assert_eq!(h.first_violation(), Some(1));
        assert_eq!(h.fallback_count(), 1);
        assert_eq!(h.len(), 3);
    }

    #[test]
    fn json_carries_tagged_status_and_nulls() {
        let json = history().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["status"], "completed");
        assert_eq!(value["snapshots"][0]["per_feature_h"][1], serde_json::Value::Null);
        assert_eq!(value["snapshots"][2]["status"]["kind"], "fallback");
        assert_eq!(value["snapshots"][0]["attitude"][1][1], 1.0);
    }
}
