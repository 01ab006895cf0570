// aperture_core/src/diagnostics.rs

use serde::Serialize;

use crate::kinematics::rotation::EulerSequence;

/// Non-fatal conditions recovered from locally during a step. They are logged and
/// carried in the step snapshot so downstream tools can see what happened.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// Euler extraction hit the singular middle angle and used the limit convention.
    KinematicSingularity {
        sequence: EulerSequence,
        middle_angle: f64,
    },
    /// A feature sits (almost) on top of the agent; its constraint was dropped.
    DegenerateFeatureGeometry { feature: usize, range: f64 },
}
